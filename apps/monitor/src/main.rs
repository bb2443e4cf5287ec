//! Insider Monitor
//!
//! Watches a set of Solana wallets and alerts on new wallets, new tokens and
//! significant balance changes.

mod config;
mod overview;

use clap::Parser;
use config::{AppConfig, ConfigError};
use insider_alerts::{ConsoleSink, DiscordSink, Notifier, SinkError};
use insider_core::PortfolioSnapshot;
use insider_engine::{JsonFileStore, Monitor, MonitorConfig, MonitorError};
use insider_fetcher::{
    FetchError, JupiterPriceService, RetryingFetcher, SimulatedTokenSource, SolanaRpcClient,
    StaticPriceService, TokenBalanceSource,
};
use overview::render_overview;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Time allowed for an in-flight scan to finish after Ctrl+C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Insider Monitor CLI
#[derive(Parser, Debug)]
#[command(name = "insider-monitor")]
#[command(about = "Solana wallet balance monitor", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Run with simulated wallets and the built-in test configuration
    #[arg(long, default_value_t = false)]
    test: bool,

    /// Directory for persisted wallet data
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Error, Debug)]
enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to create RPC client: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to create alert sink: {0}")]
    Sink(#[from] SinkError),
    #[error("Failed to create monitor: {0}")]
    Monitor(#[from] MonitorError),
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_config(args: &Args) -> Result<(AppConfig, Duration), ConfigError> {
    let mut config = if args.test {
        info!("Running in test mode with simulated wallets");
        AppConfig::test_config()
    } else {
        info!(path = %args.config, "Loading configuration");
        AppConfig::load(&args.config)?
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    let interval = config.validate()?;

    if args.test {
        config.wallets = SimulatedTokenSource::wallets();
    }
    Ok((config, interval))
}

fn build_monitor(
    args: &Args,
    config: &AppConfig,
    store: JsonFileStore,
    scan_interval: Duration,
) -> Result<Monitor, StartupError> {
    let source: Arc<dyn TokenBalanceSource> = if args.test {
        Arc::new(SimulatedTokenSource::new())
    } else {
        Arc::new(SolanaRpcClient::new(config.network_url.clone())?)
    };
    let fetcher = RetryingFetcher::new(source, config.fetcher_config());

    let mut notifier = Notifier::new(config.alerts.clone()).with_sink(Arc::new(ConsoleSink::new()));
    if config.discord.enabled {
        notifier = notifier.with_sink(Arc::new(DiscordSink::new(config.discord.clone())?));
        info!("Discord alerts enabled");
    }

    let store = Arc::new(store);
    let monitor_config = MonitorConfig {
        wallets: config.wallets.clone(),
        scan_interval,
        significance_threshold_pct: config.alerts.significant_change_pct(),
    };

    Ok(Monitor::new(fetcher, store, notifier, monitor_config)?)
}

async fn show_overview(snapshot: &PortfolioSnapshot, prices: Option<&JupiterPriceService>) {
    match prices {
        Some(service) => {
            if !snapshot.is_empty() {
                if let Err(e) = service.update_prices(&snapshot.mints()).await {
                    warn!(error = %e, "Failed to fetch token prices");
                }
            }
            println!("{}", render_overview(snapshot, service));
        }
        None => println!("{}", render_overview(snapshot, &StaticPriceService::new())),
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let (config, scan_interval) = load_config(&args)?;

    info!(
        network = %config.network_url,
        wallets = config.wallets.len(),
        interval_secs = scan_interval.as_secs_f64(),
        threshold_pct = config.alerts.significant_change_pct(),
        scan_mode = ?config.scan.scan_mode,
        "Configuration loaded"
    );

    let store = JsonFileStore::new(&args.data_dir);
    if store.has_data().await {
        match store.backup().await {
            Ok(path) => info!(path = %path.display(), "Backed up previous wallet data"),
            Err(e) => warn!(error = %e, "Failed to back up previous wallet data"),
        }
    }

    let mut monitor = build_monitor(&args, &config, store, scan_interval)?;
    monitor.init().await;

    let prices = if args.test {
        None
    } else {
        match JupiterPriceService::new() {
            Ok(service) => Some(service),
            Err(e) => {
                warn!(error = %e, "Price service unavailable, overview without USD values");
                None
            }
        }
    };
    show_overview(monitor.previous(), prices.as_ref()).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
        monitor
    });

    info!("Press Ctrl+C to stop...");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, monitor_handle).await {
        Ok(Ok(monitor)) => show_overview(monitor.previous(), prices.as_ref()).await,
        Ok(Err(e)) => error!(error = %e, "Monitor task failed"),
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Scan still running after grace period, exiting"
        ),
    }

    info!("Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    info!("🔍 Insider Monitor starting...");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
