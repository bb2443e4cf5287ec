//! Change classification into alerts.

use crate::AlertConfig;
use chrono::{DateTime, Utc};
use insider_core::{format_token_amount, Alert, AlertLevel, Change};
use serde_json::{json, Map, Value};

/// Balance change at or above this multiple of the threshold is critical.
const CRITICAL_MULTIPLIER: f64 = 5.0;
/// Balance change at or above this multiple of the threshold is a warning.
const WARNING_MULTIPLIER: f64 = 2.0;

/// Maps detected changes to alert levels and messages.
#[derive(Debug, Clone)]
pub struct AlertClassifier {
    threshold_pct: f64,
    new_wallet_level: AlertLevel,
    new_token_level: AlertLevel,
}

impl AlertClassifier {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            threshold_pct: config.significant_change_pct(),
            new_wallet_level: config.new_wallet_level,
            new_token_level: config.new_token_level,
        }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Severity of a balance change of `change_percent`.
    pub fn balance_change_level(&self, change_percent: f64) -> AlertLevel {
        let magnitude = change_percent.abs();
        if magnitude >= self.threshold_pct * CRITICAL_MULTIPLIER {
            AlertLevel::Critical
        } else if magnitude >= self.threshold_pct * WARNING_MULTIPLIER {
            AlertLevel::Warning
        } else {
            AlertLevel::Info
        }
    }

    /// Build the alert for a change.
    pub fn classify(&self, change: &Change, now: DateTime<Utc>) -> Alert {
        let mut data = Map::new();

        let (token_mint, level, message) = match change {
            Change::NewWallet {
                address,
                token_balances,
            } => {
                data.insert("token_balances".into(), json!(token_balances));
                data.insert("token_count".into(), json!(token_balances.len()));
                (
                    String::new(),
                    self.new_wallet_level,
                    format!(
                        "New wallet detected: {} holding {} tokens",
                        address,
                        token_balances.len()
                    ),
                )
            }
            Change::NewToken {
                mint,
                symbol,
                decimals,
                new_balance,
                ..
            } => {
                data.insert("symbol".into(), Value::from(symbol.as_str()));
                data.insert("decimals".into(), json!(decimals));
                data.insert("balance".into(), json!(new_balance));
                (
                    mint.clone(),
                    self.new_token_level,
                    format!(
                        "New token {} ({}) detected with balance {}",
                        symbol,
                        mint,
                        format_token_amount(*new_balance, *decimals)
                    ),
                )
            }
            Change::BalanceChange {
                mint,
                symbol,
                decimals,
                old_balance,
                new_balance,
                change_percent,
                ..
            } => {
                data.insert("symbol".into(), Value::from(symbol.as_str()));
                data.insert("decimals".into(), json!(decimals));
                data.insert("old_balance".into(), json!(old_balance));
                data.insert("new_balance".into(), json!(new_balance));
                data.insert("change_percent".into(), json!(change_percent));
                (
                    mint.clone(),
                    self.balance_change_level(*change_percent),
                    format!(
                        "Balance change for {} ({}): from {} to {} ({:+.2}%)",
                        symbol,
                        mint,
                        format_token_amount(*old_balance, *decimals),
                        format_token_amount(*new_balance, *decimals),
                        change_percent
                    ),
                )
            }
        };

        Alert {
            timestamp: now,
            wallet_address: change.address().to_string(),
            token_mint,
            kind: change.kind(),
            level,
            message,
            data,
        }
    }
}
