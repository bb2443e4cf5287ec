//! Alert delivery abstraction.

use async_trait::async_trait;
use insider_core::Alert;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for dispatched alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
