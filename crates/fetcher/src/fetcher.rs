//! Batched, rate-limit-aware portfolio fetching.

use crate::{FetchError, FetchResult, RetryPolicy, ScanFilter, TokenAccount, TokenBalanceSource};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use insider_core::{known_symbol, PortfolioSnapshot, TokenBalance, WalletSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for [`RetryingFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Wallets fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches (not after the last one).
    pub batch_delay: Duration,
    /// Backoff applied to rate-limited wallet fetches.
    pub retry_policy: RetryPolicy,
    /// Skip failing wallets instead of aborting the whole fetch.
    pub partial_failure_tolerant: bool,
    /// Token filter applied while building snapshots.
    pub scan_filter: ScanFilter,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_delay: Duration::from_millis(500),
            retry_policy: RetryPolicy::default(),
            partial_failure_tolerant: false,
            scan_filter: ScanFilter::default(),
        }
    }
}

/// Fetches a full [`PortfolioSnapshot`] from a [`TokenBalanceSource`].
///
/// Wallets are fetched in small concurrent batches with a fixed delay between
/// batches. Rate-limited wallets are retried with exponential backoff; any
/// other error fails immediately.
pub struct RetryingFetcher {
    source: Arc<dyn TokenBalanceSource>,
    config: FetcherConfig,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn TokenBalanceSource>, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch balances for all `wallets`.
    ///
    /// Fails fast with [`FetchError::ConnectionFailure`] when the upstream
    /// healthcheck fails. Wallets with malformed responses are dropped from
    /// the snapshot; other wallet errors abort the call unless
    /// `partial_failure_tolerant` is set.
    pub async fn fetch_all(&self, wallets: &[String]) -> FetchResult<PortfolioSnapshot> {
        let slot = self.source.healthcheck().await.map_err(|e| match e {
            FetchError::ConnectionFailure(_) => e,
            other => FetchError::ConnectionFailure(other.to_string()),
        })?;
        debug!(source = self.source.name(), slot, "Connectivity check passed");

        let captured_at = Utc::now();
        let batch_size = self.config.batch_size.max(1);
        let mut snapshot = PortfolioSnapshot::new();

        for (index, batch) in wallets.chunks(batch_size).enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|address| self.fetch_wallet_with_retry(address)),
            )
            .await;

            for (address, result) in batch.iter().zip(results) {
                match result {
                    Ok(accounts) => {
                        snapshot.insert(self.build_wallet(address, accounts, captured_at));
                    }
                    Err(e) if e.is_wallet_local() => {
                        warn!(wallet = %address, error = %e, "Dropping wallet for this scan");
                    }
                    Err(e) if self.config.partial_failure_tolerant => {
                        warn!(wallet = %address, error = %e, "Skipping wallet after fetch error");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            wallets = snapshot.len(),
            tokens = snapshot.token_count(),
            "Fetched portfolio snapshot"
        );
        Ok(snapshot)
    }

    /// Fetch one wallet, retrying only on rate limiting.
    async fn fetch_wallet_with_retry(&self, address: &str) -> FetchResult<Vec<TokenAccount>> {
        let policy = &self.config.retry_policy;
        let mut retry = 0u32;

        loop {
            match self.source.fetch_token_balances(address).await {
                Ok(accounts) => return Ok(accounts),
                Err(e) if e.is_retryable() => {
                    retry += 1;
                    if !policy.should_retry(retry) {
                        warn!(wallet = %address, attempts = retry, "Rate limit retries exhausted");
                        return Err(FetchError::RetriesExhausted {
                            address: address.to_string(),
                            attempts: retry,
                        });
                    }
                    let delay = policy.delay_for_attempt(retry);
                    warn!(
                        wallet = %address,
                        retry,
                        max_retries = policy.max_retries(),
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn build_wallet(
        &self,
        address: &str,
        accounts: Vec<TokenAccount>,
        captured_at: DateTime<Utc>,
    ) -> WalletSnapshot {
        accounts
            .into_iter()
            .filter(|account| account.amount > 0)
            .filter(|account| self.config.scan_filter.should_include(&account.mint))
            .fold(WalletSnapshot::new(address, captured_at), |wallet, account| {
                let symbol = known_symbol(&account.mint);
                wallet.with_token(TokenBalance::new(
                    account.mint,
                    account.amount,
                    account.decimals,
                    &symbol,
                ))
            })
    }
}
