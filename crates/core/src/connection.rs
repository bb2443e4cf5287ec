//! Upstream connection state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reachability of the upstream RPC endpoint as seen by the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Last scan succeeded; diffs and alerts flow normally.
    #[default]
    Connected,
    /// A scan failed recently but the outage is still short.
    Suspect,
    /// No successful scan for longer than the loss window.
    Lost,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Suspect => "suspect",
            ConnectionState::Lost => "lost",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
