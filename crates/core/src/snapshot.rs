//! Token balance snapshots.
//!
//! A [`PortfolioSnapshot`] is a point-in-time capture of every monitored
//! wallet's token balances. It is the unit of comparison between scan cycles
//! and the unit of persistence.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Balance of a single token held by a wallet.
///
/// `amount` is always in raw integer units. Converting to human units is a
/// presentation concern, see [`TokenBalance::ui_amount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Unique token identifier (mint address).
    pub mint: String,
    /// Raw amount in the token's smallest unit.
    pub amount: u64,
    /// Decimal places of the token.
    pub decimals: u8,
    /// Display symbol (e.g., "SOL", "USDC").
    pub symbol: CompactString,
}

impl TokenBalance {
    /// Create a new token balance.
    pub fn new(mint: impl Into<String>, amount: u64, decimals: u8, symbol: &str) -> Self {
        Self {
            mint: mint.into(),
            amount,
            decimals,
            symbol: CompactString::new(symbol),
        }
    }

    /// Amount in human units (`amount / 10^decimals`). Display only.
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Token balances of one wallet captured during one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub address: String,
    /// mint -> balance, ordered by mint.
    pub tokens: BTreeMap<String, TokenBalance>,
    pub captured_at: DateTime<Utc>,
}

impl WalletSnapshot {
    /// Create an empty snapshot for a wallet.
    pub fn new(address: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            tokens: BTreeMap::new(),
            captured_at,
        }
    }

    /// Builder-style insert used while the snapshot is being assembled.
    pub fn with_token(mut self, balance: TokenBalance) -> Self {
        self.tokens.insert(balance.mint.clone(), balance);
        self
    }

    /// Get the balance for a mint.
    pub fn token(&self, mint: &str) -> Option<&TokenBalance> {
        self.tokens.get(mint)
    }

    /// Raw balances keyed by mint.
    pub fn raw_balances(&self) -> BTreeMap<String, u64> {
        self.tokens
            .iter()
            .map(|(mint, balance)| (mint.clone(), balance.amount))
            .collect()
    }
}

/// Snapshot of all monitored wallets, keyed by wallet address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioSnapshot {
    wallets: BTreeMap<String, WalletSnapshot>,
}

impl PortfolioSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a wallet. Only used while assembling a snapshot.
    pub fn insert(&mut self, wallet: WalletSnapshot) {
        self.wallets.insert(wallet.address.clone(), wallet);
    }

    /// Builder-style variant of [`PortfolioSnapshot::insert`].
    pub fn with_wallet(mut self, wallet: WalletSnapshot) -> Self {
        self.insert(wallet);
        self
    }

    /// Get a wallet by address.
    pub fn wallet(&self, address: &str) -> Option<&WalletSnapshot> {
        self.wallets.get(address)
    }

    /// Iterate wallets in address order.
    pub fn wallets(&self) -> impl Iterator<Item = &WalletSnapshot> {
        self.wallets.values()
    }

    /// Check if a wallet is present.
    pub fn contains(&self, address: &str) -> bool {
        self.wallets.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Distinct mints held across all wallets, sorted.
    pub fn mints(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .wallets
            .values()
            .flat_map(|w| w.tokens.keys())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Total number of token positions across all wallets.
    pub fn token_count(&self) -> usize {
        self.wallets.values().map(|w| w.tokens.len()).sum()
    }
}

impl FromIterator<WalletSnapshot> for PortfolioSnapshot {
    fn from_iter<I: IntoIterator<Item = WalletSnapshot>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for wallet in iter {
            snapshot.insert(wallet);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wallet(address: &str, tokens: &[(&str, u64)]) -> WalletSnapshot {
        tokens.iter().fold(
            WalletSnapshot::new(address, Utc::now()),
            |w, (mint, amount)| w.with_token(TokenBalance::new(*mint, *amount, 6, "TKN")),
        )
    }

    #[test]
    fn test_ui_amount() {
        let sol = TokenBalance::new("So11111111111111111111111111111111111111112", 1_500_000_000, 9, "SOL");
        assert!((sol.ui_amount() - 1.5).abs() < f64::EPSILON);

        let raw = TokenBalance::new("mint", 42, 0, "RAW");
        assert_eq!(raw.ui_amount(), 42.0);
    }

    #[test]
    fn test_portfolio_mints_are_distinct_and_sorted() {
        let snapshot: PortfolioSnapshot = vec![
            wallet("W2", &[("B", 1), ("A", 2)]),
            wallet("W1", &[("C", 3), ("A", 4)]),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.token_count(), 4);
        assert_eq!(snapshot.mints(), vec!["A", "B", "C"]);
        let order: Vec<&str> = snapshot.wallets().map(|w| w.address.as_str()).collect();
        assert_eq!(order, vec!["W1", "W2"]);
    }

    #[test]
    fn test_raw_balances() {
        let w = wallet("W1", &[("A", 100), ("B", 200)]);
        let balances = w.raw_balances();
        assert_eq!(balances.get("A"), Some(&100));
        assert_eq!(balances.get("B"), Some(&200));
    }

    #[test]
    fn test_snapshot_json_is_a_plain_wallet_map() {
        let snapshot = PortfolioSnapshot::new().with_wallet(wallet("W1", &[("A", 7)]));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("W1").is_some());
        assert_eq!(json["W1"]["tokens"]["A"]["amount"], 7);

        let parsed: PortfolioSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
