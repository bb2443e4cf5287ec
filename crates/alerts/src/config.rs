//! Alert configuration types.

use insider_core::{AlertLevel, Change};
use serde::{Deserialize, Serialize};

/// Alert thresholds and filters, loaded from the `alerts` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum raw balance a token must hold to be reported
    pub minimum_balance: u64,
    /// Significant change as a fraction (0.20 = 20%)
    pub significant_change: f64,
    /// Mints never reported
    pub ignore_tokens: Vec<String>,
    /// Level for newly monitored wallets
    pub new_wallet_level: AlertLevel,
    /// Level for tokens appearing in a known wallet
    pub new_token_level: AlertLevel,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            minimum_balance: 1000,
            significant_change: 0.20,
            ignore_tokens: Vec::new(),
            new_wallet_level: AlertLevel::Warning,
            new_token_level: AlertLevel::Warning,
        }
    }
}

impl AlertConfig {
    /// Significant change in percent, rounded to hundredths.
    pub fn significant_change_pct(&self) -> f64 {
        (self.significant_change * 10_000.0).round() / 100.0
    }

    /// Check if a mint is on the ignore list.
    pub fn is_ignored(&self, mint: &str) -> bool {
        self.ignore_tokens.iter().any(|t| t == mint)
    }

    /// Check if a token with this mint and balance should be reported.
    pub fn should_alert_token(&self, mint: &str, balance: u64) -> bool {
        // Ignore list first
        if self.is_ignored(mint) {
            return false;
        }
        balance >= self.minimum_balance
    }

    /// Apply ignore list and minimum balance to a change.
    ///
    /// Returns `None` if nothing reportable remains. New wallets keep only
    /// their reportable tokens.
    pub fn filter(&self, change: Change) -> Option<Change> {
        match change {
            Change::NewWallet {
                address,
                mut token_balances,
            } => {
                token_balances.retain(|mint, balance| self.should_alert_token(mint, *balance));
                if token_balances.is_empty() {
                    None
                } else {
                    Some(Change::NewWallet {
                        address,
                        token_balances,
                    })
                }
            }
            other => match (other.mint(), other.new_balance()) {
                (Some(mint), Some(balance)) if !self.should_alert_token(mint, balance) => None,
                _ => Some(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn balance_change(mint: &str, old: u64, new: u64) -> Change {
        Change::BalanceChange {
            address: "W1".to_string(),
            mint: mint.to_string(),
            symbol: "TKN".into(),
            decimals: 6,
            old_balance: old,
            new_balance: new,
            change_percent: 0.0,
        }
    }

    #[test]
    fn test_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.minimum_balance, 1000);
        assert_eq!(config.significant_change_pct(), 20.0);
        assert_eq!(config.new_wallet_level, AlertLevel::Warning);
    }

    #[test]
    fn test_significant_change_pct_rounding() {
        let config = AlertConfig {
            significant_change: 0.07,
            ..Default::default()
        };
        assert_eq!(config.significant_change_pct(), 7.0);
    }

    #[test]
    fn test_deserialize_config_section() {
        let json = r#"{"minimum_balance": 500, "significant_change": 0.05, "ignore_tokens": ["M1"]}"#;
        let config: AlertConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.minimum_balance, 500);
        assert_eq!(config.significant_change_pct(), 5.0);
        assert!(config.is_ignored("M1"));
        assert_eq!(config.new_token_level, AlertLevel::Warning);
    }

    #[test]
    fn test_filter_ignored_and_minimum() {
        let config = AlertConfig {
            ignore_tokens: vec!["IGN".to_string()],
            ..Default::default()
        };

        assert!(config.filter(balance_change("IGN", 1_000, 6_000)).is_none());
        assert!(config.filter(balance_change("M1", 5_000, 999)).is_none());
        assert!(config.filter(balance_change("M1", 5_000, 1_000)).is_some());
    }

    #[test]
    fn test_filter_prunes_new_wallet() {
        let config = AlertConfig {
            ignore_tokens: vec!["IGN".to_string()],
            ..Default::default()
        };
        let change = Change::NewWallet {
            address: "W1".to_string(),
            token_balances: BTreeMap::from([
                ("IGN".to_string(), 10_000),
                ("DUST".to_string(), 5),
                ("M1".to_string(), 2_000),
            ]),
        };

        let filtered = config.filter(change).unwrap();
        assert_eq!(
            filtered,
            Change::NewWallet {
                address: "W1".to_string(),
                token_balances: BTreeMap::from([("M1".to_string(), 2_000)]),
            }
        );

        let dust_only = Change::NewWallet {
            address: "W2".to_string(),
            token_balances: BTreeMap::from([("DUST".to_string(), 5)]),
        };
        assert!(config.filter(dust_only).is_none());
    }
}
