//! In-memory balance sources for tests and the simulated "test mode".

use crate::{FetchError, FetchResult, TokenAccount, TokenBalanceSource};
use async_trait::async_trait;
use insider_core::{BONK_MINT, SOL_MINT, USDC_MINT};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scriptable balance source.
///
/// Balances are set explicitly; failures can be injected per call or per
/// wallet. Unknown wallets report no token accounts.
#[derive(Default)]
pub struct MockTokenSource {
    wallets: Mutex<HashMap<String, Vec<TokenAccount>>>,
    offline: AtomicBool,
    rate_limited_calls: AtomicU32,
    malformed: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    fetch_calls: AtomicU32,
    slot: AtomicU64,
}

impl MockTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`MockTokenSource::set_wallet`].
    pub fn with_wallet(self, address: &str, accounts: Vec<TokenAccount>) -> Self {
        self.set_wallet(address, accounts);
        self
    }

    /// Replace all token accounts of a wallet.
    pub fn set_wallet(&self, address: &str, accounts: Vec<TokenAccount>) {
        lock(&self.wallets).insert(address.to_string(), accounts);
    }

    /// Set (or add) one token balance of a wallet.
    pub fn set_balance(&self, address: &str, mint: &str, amount: u64, decimals: u8) {
        let mut wallets = lock(&self.wallets);
        let accounts = wallets.entry(address.to_string()).or_default();
        match accounts.iter_mut().find(|a| a.mint == mint) {
            Some(account) => account.amount = amount,
            None => accounts.push(TokenAccount::new(mint, amount, decimals)),
        }
    }

    /// Make the healthcheck and every wallet fetch fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The next `n` wallet fetches answer with a rate-limit error.
    pub fn rate_limit_next(&self, n: u32) {
        self.rate_limited_calls.store(n, Ordering::SeqCst);
    }

    /// Fetches for `address` return a malformed response.
    pub fn mark_malformed(&self, address: &str) {
        lock(&self.malformed).insert(address.to_string());
    }

    /// Fetches for `address` fail with a non-retryable error.
    pub fn mark_failing(&self, address: &str) {
        lock(&self.failing).insert(address.to_string());
    }

    /// Undo [`MockTokenSource::mark_malformed`] and
    /// [`MockTokenSource::mark_failing`] for `address`.
    pub fn clear_wallet_faults(&self, address: &str) {
        lock(&self.malformed).remove(address);
        lock(&self.failing).remove(address);
    }

    /// Number of wallet fetch calls received so far.
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenBalanceSource for MockTokenSource {
    async fn fetch_token_balances(&self, address: &str) -> FetchResult<Vec<TokenAccount>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::ConnectionFailure("mock offline".to_string()));
        }
        let limited = self
            .rate_limited_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(FetchError::RateLimited);
        }
        if lock(&self.malformed).contains(address) {
            return Err(FetchError::MalformedResponse {
                address: address.to_string(),
                reason: "mock malformed".to_string(),
            });
        }
        if lock(&self.failing).contains(address) {
            return Err(FetchError::Other(format!("mock failure for {}", address)));
        }

        Ok(lock(&self.wallets).get(address).cloned().unwrap_or_default())
    }

    async fn healthcheck(&self) -> FetchResult<u64> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::ConnectionFailure("mock offline".to_string()));
        }
        Ok(self.slot.fetch_add(1, Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Primary simulated wallet.
pub const SIMULATED_WALLET_1: &str = "TestWallet1";
/// Wallet that receives funds later in the simulation.
pub const SIMULATED_WALLET_2: &str = "TestWallet2";

/// Simulated source used in test mode.
///
/// Activity evolves with the scan count (one scan per healthcheck):
/// - scan 1: `TestWallet1` holds 1 SOL and 1 USDC
/// - scan 2: BONK appears
/// - scan 3: SOL doubles to 2
/// - scan 4: `TestWallet2` receives 5 SOL
#[derive(Default)]
pub struct SimulatedTokenSource {
    scans: AtomicU64,
}

impl SimulatedTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallets this source knows about.
    pub fn wallets() -> Vec<String> {
        vec![SIMULATED_WALLET_1.to_string(), SIMULATED_WALLET_2.to_string()]
    }

    fn accounts_at(address: &str, scan: u64) -> Vec<TokenAccount> {
        match address {
            SIMULATED_WALLET_1 => {
                let sol = if scan >= 3 { 2_000_000_000 } else { 1_000_000_000 };
                let mut accounts = vec![
                    TokenAccount::new(SOL_MINT, sol, 9),
                    TokenAccount::new(USDC_MINT, 1_000_000, 6),
                ];
                if scan >= 2 {
                    accounts.push(TokenAccount::new(BONK_MINT, 5_000_000, 5));
                }
                accounts
            }
            SIMULATED_WALLET_2 if scan >= 4 => vec![TokenAccount::new(SOL_MINT, 5_000_000_000, 9)],
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl TokenBalanceSource for SimulatedTokenSource {
    async fn fetch_token_balances(&self, address: &str) -> FetchResult<Vec<TokenAccount>> {
        let scan = self.scans.load(Ordering::SeqCst).max(1);
        Ok(Self::accounts_at(address, scan))
    }

    async fn healthcheck(&self) -> FetchResult<u64> {
        Ok(self.scans.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
