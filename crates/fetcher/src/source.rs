//! Upstream balance source abstraction.

use crate::FetchResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One token account as reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: String,
    /// Raw amount.
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAccount {
    pub fn new(mint: impl Into<String>, amount: u64, decimals: u8) -> Self {
        Self {
            mint: mint.into(),
            amount,
            decimals,
        }
    }
}

/// Capability to read token balances for a wallet.
///
/// Implemented by the live Solana RPC client and by in-memory sources for
/// tests and simulation; the monitor picks one at construction time.
#[async_trait]
pub trait TokenBalanceSource: Send + Sync {
    /// Fetch all token accounts owned by `address`.
    async fn fetch_token_balances(&self, address: &str) -> FetchResult<Vec<TokenAccount>>;

    /// Cheap liveness probe. Returns the current chain height.
    async fn healthcheck(&self) -> FetchResult<u64>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
