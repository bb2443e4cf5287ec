//! Terminal alert output.

use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use colored::{Color, Colorize};
use insider_core::{shorten_address, Alert, AlertLevel};

const BOX_WIDTH: usize = 80;

/// Prints alerts as coloured boxed blocks on stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    fn style(level: AlertLevel) -> (Color, &'static str) {
        match level {
            AlertLevel::Critical => (Color::Red, "🔴"),
            AlertLevel::Warning => (Color::Yellow, "🟡"),
            AlertLevel::Info => (Color::Green, "🟢"),
        }
    }

    /// Render an alert block.
    pub fn render(alert: &Alert) -> String {
        let (color, symbol) = Self::style(alert.level);
        let border = "━".repeat(BOX_WIDTH).color(color).to_string();

        let mut lines = Vec::new();
        lines.push(border.clone());
        lines.push(
            format!(
                "{} [{}] {} ALERT",
                symbol,
                alert.timestamp.format("%H:%M:%S"),
                alert.kind.label()
            )
            .color(color)
            .bold()
            .to_string(),
        );
        lines.push(format!(
            "Wallet: {}",
            shorten_address(&alert.wallet_address).bold()
        ));
        lines.extend(alert.message.lines().map(str::to_string));

        if let Some(pct) = alert.data_f64("change_percent") {
            let change = if pct < 0.0 {
                format!("↓ {:.2}%", pct).red()
            } else {
                format!("↑ {:.2}%", pct).green()
            };
            lines.push(format!("Change: {}", change));
        }

        lines.push(border);
        lines.join("\n")
    }
}

#[async_trait]
impl AlertSink for ConsoleSink {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        println!("{}", Self::render(alert));
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
