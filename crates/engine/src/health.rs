//! RPC connection health tracking.
//!
//! Alerts are only produced while the connection is healthy. After an outage
//! longer than three scan intervals the in-memory baseline is considered
//! stale and must be reloaded from storage before diffing resumes.

use chrono::{DateTime, Utc};
use insider_core::ConnectionState;
use std::time::Duration;
use tracing::{info, warn};

/// Number of scan intervals without a successful scan before the
/// connection is considered lost.
pub const LOST_AFTER_INTERVALS: u32 = 3;

/// What the scan cycle should do with a freshly fetched snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// Diff against the in-memory previous snapshot.
    Compare,
    /// Reload the baseline from storage and skip the diff for this scan.
    ReloadBaseline,
}

/// Connection state machine driven by scan outcomes.
#[derive(Debug, Clone)]
pub struct ConnectionHealthTracker {
    state: ConnectionState,
    stale_after: Duration,
    last_success: DateTime<Utc>,
    consecutive_failures: u32,
}

impl ConnectionHealthTracker {
    /// Create a tracker. `started_at` counts as the last successful scan.
    pub fn new(scan_interval: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            state: ConnectionState::Connected,
            stale_after: scan_interval.saturating_mul(LOST_AFTER_INTERVALS),
            last_success: started_at,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_successful_scan_at(&self) -> DateTime<Utc> {
        self.last_success
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Alerts may only be dispatched while connected.
    pub fn can_alert(&self) -> bool {
        self.state.is_connected()
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match (now - self.last_success).to_std() {
            Ok(elapsed) => elapsed > self.stale_after,
            // clock went backwards
            Err(_) => false,
        }
    }

    fn mark_lost(&mut self, now: DateTime<Utc>) {
        if self.state != ConnectionState::Lost {
            warn!(
                last_success = %self.last_success,
                stale_for_secs = (now - self.last_success).num_seconds(),
                "Connection lost, alerts suppressed until the baseline is reloaded"
            );
            self.state = ConnectionState::Lost;
        }
    }

    /// Called at the start of every scan.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> ConnectionState {
        if self.is_stale(now) {
            self.mark_lost(now);
        }
        self.state
    }

    /// Called when fetching the snapshot failed.
    pub fn on_fetch_failure(&mut self, now: DateTime<Utc>) -> ConnectionState {
        self.consecutive_failures += 1;

        if self.is_stale(now) {
            self.mark_lost(now);
        } else if self.state == ConnectionState::Connected {
            warn!(
                failures = self.consecutive_failures,
                "Connection suspect, alerts suppressed"
            );
            self.state = ConnectionState::Suspect;
        }
        self.state
    }

    /// Called when a snapshot was fetched successfully.
    pub fn on_fetch_success(&mut self, now: DateTime<Utc>) -> ScanDecision {
        let decision = match self.state {
            ConnectionState::Lost => {
                info!(
                    failures = self.consecutive_failures,
                    "Connection restored, reloading baseline"
                );
                ScanDecision::ReloadBaseline
            }
            ConnectionState::Suspect => {
                info!(failures = self.consecutive_failures, "Connection recovered");
                ScanDecision::Compare
            }
            ConnectionState::Connected => ScanDecision::Compare,
        };

        self.state = ConnectionState::Connected;
        self.last_success = now;
        self.consecutive_failures = 0;
        decision
    }
}
