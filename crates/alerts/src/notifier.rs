//! Alert notification logic.

use crate::{AlertClassifier, AlertConfig, AlertSink};
use chrono::{DateTime, Utc};
use insider_core::Change;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of dispatching one batch of changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Changes dropped by the ignore list or minimum balance
    pub filtered: usize,
    /// Info-level alerts, logged only
    pub logged_only: usize,
    /// Alerts delivered to at least one sink
    pub dispatched: usize,
    /// Failed sink deliveries
    pub failed: usize,
}

/// Filters, classifies and delivers changes to every configured sink.
pub struct Notifier {
    config: AlertConfig,
    classifier: AlertClassifier,
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl Notifier {
    /// Create a new notifier.
    pub fn new(config: AlertConfig) -> Self {
        let classifier = AlertClassifier::new(&config);
        Self {
            config,
            classifier,
            sinks: Vec::new(),
        }
    }

    /// Add a delivery sink.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Process detected changes and send alerts where needed.
    ///
    /// A failing sink is logged and never stops the other sinks.
    pub async fn dispatch(&self, changes: Vec<Change>, now: DateTime<Utc>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for change in changes {
            let Some(change) = self.config.filter(change) else {
                summary.filtered += 1;
                continue;
            };

            let alert = self.classifier.classify(&change, now);

            if !alert.level.is_dispatchable() {
                info!(
                    wallet = %alert.wallet_address,
                    kind = %alert.kind,
                    level = %alert.level,
                    "{}",
                    alert.message
                );
                summary.logged_only += 1;
                continue;
            }

            let mut delivered = false;
            for sink in &self.sinks {
                match sink.send(&alert).await {
                    Ok(()) => {
                        debug!(sink = sink.name(), wallet = %alert.wallet_address, "Alert sent");
                        delivered = true;
                    }
                    Err(e) => {
                        error!(
                            sink = sink.name(),
                            wallet = %alert.wallet_address,
                            error = %e,
                            "Failed to send alert"
                        );
                        summary.failed += 1;
                    }
                }
            }
            if delivered {
                summary.dispatched += 1;
            }
        }

        if summary != DispatchSummary::default() {
            info!(
                filtered = summary.filtered,
                logged_only = summary.logged_only,
                dispatched = summary.dispatched,
                failed = summary.failed,
                "Dispatched alerts"
            );
        }
        summary
    }
}
