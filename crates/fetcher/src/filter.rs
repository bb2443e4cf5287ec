//! Token filtering applied while building snapshots.

use serde::{Deserialize, Serialize};

/// Which tokens a scan keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Keep every token.
    #[default]
    All,
    /// Keep only `include_tokens`.
    Whitelist,
    /// Keep everything except `exclude_tokens`.
    Blacklist,
}

/// Scan-mode token filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilter {
    pub scan_mode: ScanMode,
    pub include_tokens: Vec<String>,
    pub exclude_tokens: Vec<String>,
}

impl ScanFilter {
    /// Filter that keeps every token.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn whitelist(tokens: Vec<String>) -> Self {
        Self {
            scan_mode: ScanMode::Whitelist,
            include_tokens: tokens,
            exclude_tokens: Vec::new(),
        }
    }

    pub fn blacklist(tokens: Vec<String>) -> Self {
        Self {
            scan_mode: ScanMode::Blacklist,
            include_tokens: Vec::new(),
            exclude_tokens: tokens,
        }
    }

    /// Check if a mint should be kept in the snapshot.
    pub fn should_include(&self, mint: &str) -> bool {
        match self.scan_mode {
            ScanMode::All => true,
            ScanMode::Whitelist => self.include_tokens.iter().any(|t| t == mint),
            ScanMode::Blacklist => !self.exclude_tokens.iter().any(|t| t == mint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_keeps_everything() {
        assert!(ScanFilter::all().should_include("anything"));
    }

    #[test]
    fn test_whitelist() {
        let filter = ScanFilter::whitelist(vec!["A".to_string()]);
        assert!(filter.should_include("A"));
        assert!(!filter.should_include("B"));
    }

    #[test]
    fn test_blacklist() {
        let filter = ScanFilter::blacklist(vec!["A".to_string()]);
        assert!(!filter.should_include("A"));
        assert!(filter.should_include("B"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let filter: ScanFilter = serde_json::from_str(r#"{"scan_mode": "blacklist"}"#).unwrap();
        assert_eq!(filter.scan_mode, ScanMode::Blacklist);
        assert!(filter.exclude_tokens.is_empty());

        let empty: ScanFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ScanFilter::all());
    }
}
