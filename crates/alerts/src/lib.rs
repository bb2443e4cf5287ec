//! Alerting for detected wallet changes.
//!
//! This crate provides:
//! - Alert configuration and pre-classification filtering
//! - Change classification into leveled alerts
//! - Console and Discord delivery sinks
//! - Dispatch to all configured sinks

pub mod classifier;
pub mod config;
pub mod console;
pub mod discord;
pub mod notifier;
pub mod sink;

pub use classifier::AlertClassifier;
pub use config::AlertConfig;
pub use console::ConsoleSink;
pub use discord::{DiscordConfig, DiscordSink};
pub use notifier::{DispatchSummary, Notifier};
pub use sink::{AlertSink, SinkError};
