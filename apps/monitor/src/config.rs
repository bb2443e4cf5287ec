//! Application configuration.

use insider_alerts::{AlertConfig, DiscordConfig};
use insider_fetcher::{validate_address, FetcherConfig, RetryPolicy, ScanFilter, ScanMode, DEVNET_RPC_URL, MAINNET_RPC_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `discord.webhook_url`.
pub const DISCORD_WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";

/// Wallets used by the test configuration.
pub const TEST_WALLETS: [&str; 2] = [
    "55kBY9yxqQzj2zxZqRkqENYq6R8PkXmn5GKyQN9YeVFr",
    "DWuopnuSqYdBhCXqxfqjqzPGibnhkj6SQqFvgC4jkvjF",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Network URL is required")]
    MissingNetworkUrl,
    #[error("Invalid network URL {url}: {reason}")]
    InvalidNetworkUrl { url: String, reason: String },
    #[error("At least one wallet address is required")]
    NoWallets,
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),
    #[error("Invalid scan interval {0:?} (expected e.g. \"30s\", \"5m\", \"1h\")")]
    InvalidInterval(String),
    #[error("significant_change must be greater than 0, got {0}")]
    InvalidSignificantChange(f64),
    #[error("fetcher.batch_size must be at least 1")]
    InvalidBatchSize,
    #[error("Discord is enabled but no webhook URL is configured")]
    MissingWebhook,
    #[error("Whitelist scan mode requires include_tokens")]
    EmptyWhitelist,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Solana RPC endpoint.
    pub network_url: String,
    /// Wallet addresses to monitor.
    pub wallets: Vec<String>,
    /// Time between scans, e.g. "1m".
    pub scan_interval: String,
    /// Alert thresholds and filters.
    pub alerts: AlertConfig,
    /// Discord webhook delivery.
    pub discord: DiscordConfig,
    /// Token scan filter.
    pub scan: ScanFilter,
    /// Fetch batching and retry settings.
    pub fetcher: FetcherSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network_url: MAINNET_RPC_URL.to_string(),
            wallets: Vec::new(),
            scan_interval: "1m".to_string(),
            alerts: AlertConfig::default(),
            discord: DiscordConfig::default(),
            scan: ScanFilter::default(),
            fetcher: FetcherSettings::default(),
        }
    }
}

/// Fetch batching and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherSettings {
    /// Wallets fetched concurrently per batch.
    pub batch_size: usize,
    /// Delay between batches in milliseconds.
    pub batch_delay_ms: u64,
    /// Retries after a rate-limit response.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_backoff_ms: u64,
    /// Add random jitter to backoff delays.
    pub jitter: bool,
    /// Skip failing wallets instead of failing the scan.
    pub partial_failure_tolerant: bool,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_delay_ms: 500,
            max_retries: 5,
            initial_backoff_ms: 5000,
            max_backoff_ms: 30000,
            jitter: false,
            partial_failure_tolerant: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Configuration used with `--test`: devnet, 5s interval, 5% threshold.
    pub fn test_config() -> Self {
        Self {
            network_url: DEVNET_RPC_URL.to_string(),
            wallets: TEST_WALLETS.iter().map(|w| w.to_string()).collect(),
            scan_interval: "5s".to_string(),
            alerts: AlertConfig {
                minimum_balance: 1000,
                significant_change: 0.05,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Apply environment overrides. `lookup` returns the value of a variable.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DISCORD_WEBHOOK_ENV).filter(|u| !u.trim().is_empty()) {
            self.discord.webhook_url = url;
        }
    }

    /// Check the configuration and return the parsed scan interval.
    pub fn validate(&self) -> Result<Duration, ConfigError> {
        if self.network_url.trim().is_empty() {
            return Err(ConfigError::MissingNetworkUrl);
        }
        check_http_url(&self.network_url)?;

        if self.wallets.is_empty() {
            return Err(ConfigError::NoWallets);
        }
        for wallet in &self.wallets {
            validate_address(wallet).map_err(|_| ConfigError::InvalidWallet(wallet.clone()))?;
        }

        let interval = self.scan_interval()?;

        let change = self.alerts.significant_change;
        if !change.is_finite() || change <= 0.0 {
            return Err(ConfigError::InvalidSignificantChange(change));
        }

        if self.fetcher.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        if self.discord.enabled {
            if self.discord.webhook_url.trim().is_empty() {
                return Err(ConfigError::MissingWebhook);
            }
            check_http_url(&self.discord.webhook_url)?;
        }

        if self.scan.scan_mode == ScanMode::Whitelist && self.scan.include_tokens.is_empty() {
            return Err(ConfigError::EmptyWhitelist);
        }

        Ok(interval)
    }

    /// Parsed, non-zero scan interval.
    pub fn scan_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.scan_interval)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidInterval(self.scan_interval.clone()))
    }

    /// Build the fetcher configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        let settings = &self.fetcher;
        let mut retry_policy = RetryPolicy::new(
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
            settings.max_retries,
        );
        if settings.jitter {
            retry_policy = retry_policy.with_jitter();
        }

        FetcherConfig {
            batch_size: settings.batch_size,
            batch_delay: Duration::from_millis(settings.batch_delay_ms),
            retry_policy,
            partial_failure_tolerant: settings.partial_failure_tolerant,
            scan_filter: self.scan.clone(),
        }
    }
}

fn check_http_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidNetworkUrl {
        url: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {}", other))),
    }
}

/// Parse durations like `"500ms"`, `"30s"`, `"5m"`, `"1h"` or `"1m30s"`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(part)?;
        rest = &rest[unit_len..];
    }
    Some(total)
}
