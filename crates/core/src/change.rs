//! Changes detected between two portfolio snapshots.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewWallet,
    NewToken,
    BalanceChange,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::NewWallet => "new_wallet",
            ChangeKind::NewToken => "new_token",
            ChangeKind::BalanceChange => "balance_change",
        }
    }

    /// Human label used in alert headers (e.g., "BALANCE CHANGE").
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::NewWallet => "NEW WALLET",
            ChangeKind::NewToken => "NEW TOKEN",
            ChangeKind::BalanceChange => "BALANCE CHANGE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change between the previous and the current snapshot.
///
/// `NewToken` and `BalanceChange` are only produced for wallets present in
/// both snapshots. `NewWallet` carries the wallet's whole token map so a
/// freshly monitored wallet yields one change instead of one per token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    NewWallet {
        address: String,
        /// mint -> raw amount
        token_balances: BTreeMap<String, u64>,
    },
    NewToken {
        address: String,
        mint: String,
        symbol: CompactString,
        decimals: u8,
        new_balance: u64,
    },
    BalanceChange {
        address: String,
        mint: String,
        symbol: CompactString,
        decimals: u8,
        old_balance: u64,
        new_balance: u64,
        /// Signed percentage, truncated to two decimals.
        change_percent: f64,
    },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::NewWallet { .. } => ChangeKind::NewWallet,
            Change::NewToken { .. } => ChangeKind::NewToken,
            Change::BalanceChange { .. } => ChangeKind::BalanceChange,
        }
    }

    /// Address of the wallet that owns this change.
    pub fn address(&self) -> &str {
        match self {
            Change::NewWallet { address, .. }
            | Change::NewToken { address, .. }
            | Change::BalanceChange { address, .. } => address,
        }
    }

    /// Token mint, `None` for `NewWallet`.
    pub fn mint(&self) -> Option<&str> {
        match self {
            Change::NewWallet { .. } => None,
            Change::NewToken { mint, .. } | Change::BalanceChange { mint, .. } => Some(mint),
        }
    }

    /// New raw balance, `None` for `NewWallet` which carries a whole map.
    pub fn new_balance(&self) -> Option<u64> {
        match self {
            Change::NewWallet { .. } => None,
            Change::NewToken { new_balance, .. } | Change::BalanceChange { new_balance, .. } => {
                Some(*new_balance)
            }
        }
    }
}
