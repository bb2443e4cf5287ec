//! Alert types handed to notification sinks.

use crate::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an alert.
///
/// Ordered so that `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }

    /// Whether alerts of this level go to external sinks.
    /// `Info` alerts are only logged locally.
    #[inline]
    pub fn is_dispatchable(&self) -> bool {
        *self >= AlertLevel::Warning
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified change ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub wallet_address: String,
    /// Empty for wallet-level alerts.
    pub token_mint: String,
    pub kind: ChangeKind,
    pub level: AlertLevel,
    pub message: String,
    /// Structured payload (balances, decimals, change percent, ...).
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Alert {
    /// Get a payload field as `u64`.
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }

    /// Get a payload field as `f64`.
    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(|v| v.as_f64())
    }

    /// Get a payload field as a string slice.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}
