//! Scan cycle and scheduling loop.

use crate::{ConnectionHealthTracker, DiffEngine, ScanDecision, SnapshotStore};
use chrono::{DateTime, Utc};
use insider_alerts::{DispatchSummary, Notifier};
use insider_core::{ConnectionState, PortfolioSnapshot};
use insider_fetcher::RetryingFetcher;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("No wallets configured")]
    NoWallets,
    #[error("Scan interval must be greater than zero")]
    ZeroInterval,
}

/// Configuration for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Wallet addresses to scan.
    pub wallets: Vec<String>,
    /// Time between scan starts.
    pub scan_interval: Duration,
    /// Minimum absolute balance change, in percent, to report.
    pub significance_threshold_pct: f64,
}

/// Outcome of one scan cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// The snapshot could not be fetched.
    FetchFailed {
        state: ConnectionState,
        error: String,
    },
    /// Connection came back after an outage; the baseline was reloaded and
    /// no diff was run.
    BaselineReloaded { wallets: usize },
    /// Snapshot compared against the previous one.
    Compared {
        changes: usize,
        summary: DispatchSummary,
    },
}

/// Wallet monitor: fetch, diff, alert, persist.
pub struct Monitor {
    fetcher: RetryingFetcher,
    store: Arc<dyn SnapshotStore>,
    notifier: Notifier,
    config: MonitorConfig,
    health: ConnectionHealthTracker,
    previous: PortfolioSnapshot,
}

impl Monitor {
    pub fn new(
        fetcher: RetryingFetcher,
        store: Arc<dyn SnapshotStore>,
        notifier: Notifier,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        if config.wallets.is_empty() {
            return Err(MonitorError::NoWallets);
        }
        if config.scan_interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }

        let health = ConnectionHealthTracker::new(config.scan_interval, Utc::now());
        Ok(Self {
            fetcher,
            store,
            notifier,
            config,
            health,
            previous: PortfolioSnapshot::new(),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn health(&self) -> &ConnectionHealthTracker {
        &self.health
    }

    /// Baseline the next scan is compared against.
    pub fn previous(&self) -> &PortfolioSnapshot {
        &self.previous
    }

    /// Load the baseline from storage.
    pub async fn init(&mut self) {
        self.init_at(Utc::now()).await;
    }

    /// Load the baseline from storage, with `now` as the start of the
    /// connection health window.
    pub async fn init_at(&mut self, now: DateTime<Utc>) {
        self.health = ConnectionHealthTracker::new(self.config.scan_interval, now);

        match self.store.load().await {
            Ok(snapshot) => {
                info!(
                    wallets = snapshot.len(),
                    tokens = snapshot.token_count(),
                    "Loaded baseline snapshot"
                );
                self.previous = snapshot;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load baseline, starting empty");
                self.previous = PortfolioSnapshot::new();
            }
        }
    }

    /// Run one scan cycle.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let state = self.health.on_tick(now);
        debug!(state = %state, wallets = self.config.wallets.len(), "Starting scan");

        let mut current = match self.fetcher.fetch_all(&self.config.wallets).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let state = self.health.on_fetch_failure(now);
                error!(error = %e, state = %state, "Scan failed");
                if let Some(hint) = e.remediation_hint() {
                    warn!("{}", hint);
                }
                return CycleReport::FetchFailed {
                    state,
                    error: e.to_string(),
                };
            }
        };
        self.carry_forward_missing(&mut current);

        match self.health.on_fetch_success(now) {
            ScanDecision::ReloadBaseline => {
                let wallets = current.len();
                self.reload_baseline(current).await;
                CycleReport::BaselineReloaded { wallets }
            }
            ScanDecision::Compare => {
                let changes = DiffEngine::detect(
                    &self.previous,
                    &current,
                    self.config.significance_threshold_pct,
                );
                let count = changes.len();
                let summary = self.notifier.dispatch(changes, now).await;

                self.persist(&current).await;
                self.previous = current;

                CycleReport::Compared {
                    changes: count,
                    summary,
                }
            }
        }
    }

    /// Keep the last known state of configured wallets the fetch skipped.
    /// A wallet that could not be scanned has not been removed.
    fn carry_forward_missing(&self, current: &mut PortfolioSnapshot) {
        for address in &self.config.wallets {
            if current.contains(address) {
                continue;
            }
            if let Some(last_known) = self.previous.wallet(address) {
                debug!(wallet = %address, "Wallet missing from scan, keeping last known balances");
                current.insert(last_known.clone());
            }
        }
    }

    /// Persist `current` and take the stored snapshot as the new baseline.
    /// Falls back to `current` if storage is unavailable.
    async fn reload_baseline(&mut self, current: PortfolioSnapshot) {
        let saved = self.store.save(&current).await;
        self.previous = match saved {
            Ok(()) => match self.store.load().await {
                Ok(baseline) => baseline,
                Err(e) => {
                    warn!(error = %e, "Failed to reload baseline, using current scan");
                    current
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to save snapshot, using current scan as baseline");
                current
            }
        };
        info!(wallets = self.previous.len(), "Baseline reloaded");
    }

    async fn persist(&self, snapshot: &PortfolioSnapshot) {
        if let Err(e) = self.store.save(snapshot).await {
            warn!(error = %e, "Failed to save snapshot, keeping it in memory");
        }
    }

    /// Scan every `scan_interval` until `shutdown` turns true.
    ///
    /// Cycles never overlap. Shutdown is observed between cycles; a running
    /// cycle always completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            wallets = self.config.wallets.len(),
            interval_secs = self.config.scan_interval.as_secs_f64(),
            source = self.fetcher.source_name(),
            "Starting wallet monitor"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_cycle(Utc::now()).await;
                    debug!(?report, "Scan complete");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Wallet monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use insider_alerts::{AlertConfig, AlertSink, SinkError};
    use insider_core::{Alert, AlertLevel, SOL_MINT, USDC_MINT};
    use insider_fetcher::{FetcherConfig, MockTokenSource, TokenAccount};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const W1: &str = "W1";

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<Alert>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.alerts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Harness {
        monitor: Monitor,
        source: Arc<MockTokenSource>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn minutes(n: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::minutes(n)
    }

    fn harness(store: MemoryStore) -> Harness {
        let source = Arc::new(MockTokenSource::new().with_wallet(
            W1,
            vec![
                TokenAccount::new(SOL_MINT, 1_000_000_000, 9),
                TokenAccount::new(USDC_MINT, 5_000_000, 6),
            ],
        ));
        let store = Arc::new(store);
        let sink = Arc::new(RecordingSink::default());

        let fetcher = RetryingFetcher::new(source.clone(), FetcherConfig::default());
        let notifier = Notifier::new(AlertConfig::default()).with_sink(sink.clone());
        let config = MonitorConfig {
            wallets: vec![W1.to_string()],
            scan_interval: Duration::from_secs(60),
            significance_threshold_pct: 20.0,
        };
        let monitor = Monitor::new(fetcher, store.clone(), notifier, config).unwrap();

        Harness {
            monitor,
            source,
            store,
            sink,
        }
    }

    #[test]
    fn test_new_validates_config() {
        let fetcher = RetryingFetcher::new(Arc::new(MockTokenSource::new()), FetcherConfig::default());
        let result = Monitor::new(
            fetcher,
            Arc::new(MemoryStore::new()),
            Notifier::new(AlertConfig::default()),
            MonitorConfig {
                wallets: Vec::new(),
                scan_interval: Duration::from_secs(60),
                significance_threshold_pct: 20.0,
            },
        );
        assert!(matches!(result, Err(MonitorError::NoWallets)));
    }

    #[tokio::test]
    async fn test_first_scan_reports_new_wallet_and_persists() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;

        let report = h.monitor.run_cycle(t0()).await;

        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
        assert_eq!(h.sink.count(), 1);
        assert_eq!(h.store.saved().as_ref(), Some(h.monitor.previous()));
    }

    #[tokio::test]
    async fn test_unchanged_scan_is_quiet() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;

        let report = h.monitor.run_cycle(minutes(1)).await;

        assert!(matches!(report, CycleReport::Compared { changes: 0, .. }));
        assert_eq!(h.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_sol_doubling_dispatches_critical() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;

        h.source.set_balance(W1, SOL_MINT, 2_000_000_000, 9);
        let report = h.monitor.run_cycle(minutes(1)).await;

        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
        let alerts = h.sink.alerts.lock().unwrap();
        let last = alerts.last().unwrap();
        assert_eq!(last.level, AlertLevel::Critical);
        assert_eq!(last.token_mint, SOL_MINT);
        assert_eq!(last.data_f64("change_percent"), Some(100.0));
    }

    #[tokio::test]
    async fn test_connection_loss_suppresses_alerts() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;
        let alerts_before = h.sink.count();

        h.source.set_offline(true);
        let mut states = Vec::new();
        for n in 1..=4 {
            match h.monitor.run_cycle(minutes(n)).await {
                CycleReport::FetchFailed { state, .. } => states.push(state),
                other => panic!("unexpected report: {other:?}"),
            }
            assert!(!h.monitor.health().can_alert());
        }
        assert_eq!(
            states,
            vec![
                ConnectionState::Suspect,
                ConnectionState::Suspect,
                ConnectionState::Suspect,
                ConnectionState::Lost,
            ]
        );

        // Balance moves during the outage, connection comes back.
        h.source.set_balance(W1, SOL_MINT, 9_000_000_000, 9);
        h.source.set_offline(false);
        let report = h.monitor.run_cycle(minutes(5)).await;

        assert_eq!(report, CycleReport::BaselineReloaded { wallets: 1 });
        assert_eq!(h.sink.count(), alerts_before);
        assert!(h.monitor.health().can_alert());
    }

    #[tokio::test]
    async fn test_restoration_uses_stored_baseline() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;

        h.source.set_offline(true);
        for n in 1..=4 {
            h.monitor.run_cycle(minutes(n)).await;
        }
        h.source.set_offline(false);
        h.monitor.run_cycle(minutes(5)).await;

        let stored = h.store.saved().unwrap();
        assert_eq!(h.monitor.previous(), &stored);

        // Next diff runs against the stored baseline.
        h.source.set_balance(W1, SOL_MINT, 2_000_000_000, 9);
        let report = h.monitor.run_cycle(minutes(6)).await;
        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
    }

    #[tokio::test]
    async fn test_recovery_from_suspect_compares() {
        let mut h = harness(MemoryStore::new());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;

        h.source.set_offline(true);
        h.monitor.run_cycle(minutes(1)).await;
        h.source.set_offline(false);
        h.source.set_balance(W1, SOL_MINT, 2_000_000_000, 9);

        let report = h.monitor.run_cycle(minutes(2)).await;
        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_running() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let mut h = harness(store);

        h.monitor.init_at(t0()).await;
        assert!(h.monitor.previous().is_empty());

        let report = h.monitor.run_cycle(t0()).await;
        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
        assert_eq!(h.monitor.previous().len(), 1);

        // Reload after an outage falls back to the in-memory scan.
        h.source.set_offline(true);
        for n in 1..=4 {
            h.monitor.run_cycle(minutes(n)).await;
        }
        h.source.set_offline(false);
        let report = h.monitor.run_cycle(minutes(5)).await;
        assert_eq!(report, CycleReport::BaselineReloaded { wallets: 1 });
        assert_eq!(h.monitor.previous().len(), 1);
    }

    #[tokio::test]
    async fn test_init_loads_saved_baseline() {
        let mut seed = harness(MemoryStore::new());
        seed.monitor.init_at(t0()).await;
        seed.monitor.run_cycle(t0()).await;
        let saved = seed.store.saved().unwrap();

        let mut h = harness(MemoryStore::with_snapshot(saved.clone()));
        h.monitor.init_at(t0()).await;
        assert_eq!(h.monitor.previous(), &saved);

        let report = h.monitor.run_cycle(minutes(1)).await;
        assert!(matches!(report, CycleReport::Compared { changes: 0, .. }));
    }

    const W2: &str = "W2";

    fn two_wallet_harness(fetcher_config: FetcherConfig) -> Harness {
        let source = Arc::new(
            MockTokenSource::new()
                .with_wallet(W1, vec![TokenAccount::new(SOL_MINT, 1_000_000_000, 9)])
                .with_wallet(W2, vec![TokenAccount::new(SOL_MINT, 3_000_000_000, 9)]),
        );
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        let fetcher = RetryingFetcher::new(source.clone(), fetcher_config);
        let notifier = Notifier::new(AlertConfig::default()).with_sink(sink.clone());
        let config = MonitorConfig {
            wallets: vec![W1.to_string(), W2.to_string()],
            scan_interval: Duration::from_secs(60),
            significance_threshold_pct: 20.0,
        };
        let monitor = Monitor::new(fetcher, store.clone(), notifier, config).unwrap();

        Harness {
            monitor,
            source,
            store,
            sink,
        }
    }

    #[tokio::test]
    async fn test_malformed_wallet_is_not_reported_new_after_recovery() {
        let mut h = two_wallet_harness(FetcherConfig::default());
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;
        let alerts_before = h.sink.count();
        assert_eq!(alerts_before, 2);

        h.source.mark_malformed(W2);
        let report = h.monitor.run_cycle(minutes(1)).await;
        assert!(matches!(report, CycleReport::Compared { changes: 0, .. }));
        assert!(h.monitor.previous().contains(W2));
        assert!(h.store.saved().unwrap().contains(W2));

        h.source.clear_wallet_faults(W2);
        let report = h.monitor.run_cycle(minutes(2)).await;
        assert!(matches!(report, CycleReport::Compared { changes: 0, .. }));
        assert_eq!(h.sink.count(), alerts_before);
    }

    #[tokio::test]
    async fn test_skipped_wallet_keeps_history_in_tolerant_mode() {
        let mut h = two_wallet_harness(FetcherConfig {
            partial_failure_tolerant: true,
            ..FetcherConfig::default()
        });
        h.monitor.init_at(t0()).await;
        h.monitor.run_cycle(t0()).await;

        h.source.mark_failing(W2);
        h.monitor.run_cycle(minutes(1)).await;

        // Balance moved while the wallet could not be scanned.
        h.source.clear_wallet_faults(W2);
        h.source.set_balance(W2, SOL_MINT, 6_000_000_000, 9);
        let report = h.monitor.run_cycle(minutes(2)).await;

        assert!(matches!(report, CycleReport::Compared { changes: 1, .. }));
        let alerts = h.sink.alerts.lock().unwrap();
        let last = alerts.last().unwrap();
        assert_eq!(last.wallet_address, W2);
        assert_eq!(last.data_u64("old_balance"), Some(3_000_000_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let mut h = harness(MemoryStore::new());
        let source = h.source.clone();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            h.monitor.run(rx).await;
            h
        });

        // ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(125)).await;
        tx.send(true).unwrap();
        let h = handle.await.unwrap();

        assert_eq!(source.fetch_calls(), 3);
        assert_eq!(h.sink.count(), 1);
    }
}
