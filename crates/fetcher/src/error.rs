//! Error types for balance fetching.

use thiserror::Error;

/// Errors that can occur while fetching wallet balances.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("RPC connection failed: {0}")]
    ConnectionFailure(String),

    #[error("Malformed response for {address}: {reason}")]
    MalformedResponse { address: String, reason: String },

    #[error("Retries exhausted for {address} after {attempts} attempts")]
    RetriesExhausted { address: String, attempts: u32 },

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            FetchError::RateLimited
        } else if err.is_decode() {
            FetchError::Other(format!("decode: {}", err))
        } else {
            FetchError::ConnectionFailure(err.to_string())
        }
    }
}

impl FetchError {
    /// Returns true if the request should be retried with backoff.
    /// Only rate limiting is treated as transient; everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }

    /// Returns true if the error means the endpoint itself is unreachable
    /// (or refused to serve us), which fails the whole cycle.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            FetchError::ConnectionFailure(_) | FetchError::RetriesExhausted { .. }
        )
    }

    /// Returns true if only the affected wallet should be dropped for this cycle.
    pub fn is_wallet_local(&self) -> bool {
        matches!(self, FetchError::MalformedResponse { .. })
    }

    /// Operator-facing remediation hint, if one applies.
    pub fn remediation_hint(&self) -> Option<&'static str> {
        match self {
            FetchError::RateLimited | FetchError::RetriesExhausted { .. } => Some(
                "The RPC endpoint is rate limiting requests. Consider a dedicated RPC provider \
                 or a longer scan interval.",
            ),
            FetchError::ConnectionFailure(_) => {
                Some("Check network connectivity and the configured network_url.")
            }
            FetchError::InvalidAddress(_) => Some("Fix the wallet list in the configuration file."),
            FetchError::MalformedResponse { .. } | FetchError::Other(_) => None,
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(FetchError::RateLimited.is_retryable());
        assert!(!FetchError::ConnectionFailure("down".into()).is_retryable());
        assert!(!FetchError::Other("bad".into()).is_retryable());
        assert!(!FetchError::MalformedResponse {
            address: "W1".into(),
            reason: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_classification() {
        assert!(FetchError::ConnectionFailure("down".into()).is_connection_failure());
        assert!(FetchError::RetriesExhausted {
            address: "W1".into(),
            attempts: 6
        }
        .is_connection_failure());
        assert!(FetchError::MalformedResponse {
            address: "W1".into(),
            reason: "x".into()
        }
        .is_wallet_local());
        assert!(!FetchError::RateLimited.is_wallet_local());
    }

    #[test]
    fn test_remediation_hint() {
        let hint = FetchError::RetriesExhausted {
            address: "W1".into(),
            attempts: 6,
        }
        .remediation_hint()
        .unwrap();
        assert!(hint.contains("dedicated RPC provider"));
        assert!(FetchError::Other("x".into()).remediation_hint().is_none());
    }
}
