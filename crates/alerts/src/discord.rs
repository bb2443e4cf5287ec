//! Discord webhook alerts.

use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use insider_core::{format_token_amount, Alert, AlertLevel, ChangeKind};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const USERNAME: &str = "Solana Wallet Monitor";

const COLOR_CRITICAL: u32 = 0xFF0000;
const COLOR_WARNING: u32 = 0xFFA500;
const COLOR_DEFAULT: u32 = 0x7289DA;

/// Discord webhook settings, loaded from the `discord` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub channel_id: String,
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    username: &'static str,
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

/// Posts alerts to a Discord webhook as embeds.
pub struct DiscordSink {
    config: DiscordConfig,
    http_client: reqwest::Client,
    hostname: String,
}

impl DiscordSink {
    pub fn new(config: DiscordConfig) -> Result<Self, SinkError> {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            http_client,
            hostname,
        })
    }

    fn color(level: AlertLevel) -> u32 {
        match level {
            AlertLevel::Critical => COLOR_CRITICAL,
            AlertLevel::Warning => COLOR_WARNING,
            AlertLevel::Info => COLOR_DEFAULT,
        }
    }

    fn build_message(&self, alert: &Alert) -> WebhookMessage {
        let mut fields = Vec::new();
        let decimals = alert
            .data_u64("decimals")
            .and_then(|d| u8::try_from(d).ok());
        let symbol = alert.data_str("symbol").unwrap_or("?");

        let description = match (alert.kind, decimals) {
            (ChangeKind::BalanceChange, Some(decimals)) => {
                match (alert.data_u64("old_balance"), alert.data_u64("new_balance")) {
                    (Some(old), Some(new)) => {
                        fields.push(token_field(symbol, &alert.token_mint));
                        Some(format!(
                            "```diff\n- Old: {}\n+ New: {}\nChange: {:+.2}%```",
                            format_token_amount(old, decimals),
                            format_token_amount(new, decimals),
                            alert.data_f64("change_percent").unwrap_or_default()
                        ))
                    }
                    _ => None,
                }
            }
            (ChangeKind::NewToken, Some(decimals)) => alert.data_u64("balance").map(|balance| {
                fields.push(token_field(symbol, &alert.token_mint));
                format!(
                    "```ini\n[Initial Balance]\n{}```",
                    format_token_amount(balance, decimals)
                )
            }),
            _ => None,
        }
        .unwrap_or_else(|| format!("```{}```", alert.message));

        fields.push(EmbedField {
            name: "Wallet",
            value: format!("`{}`", alert.wallet_address),
            inline: false,
        });
        fields.push(EmbedField {
            name: "Time",
            value: alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            inline: true,
        });

        WebhookMessage {
            username: USERNAME,
            embeds: vec![Embed {
                title: format!("{} Alert", alert.kind.as_str().to_uppercase()),
                description,
                color: Self::color(alert.level),
                fields,
                footer: EmbedFooter {
                    text: format!("{} | {}", self.hostname, alert.level),
                },
            }],
        }
    }
}

fn token_field(symbol: &str, mint: &str) -> EmbedField {
    EmbedField {
        name: "Token",
        value: format!("{}\n`{}`", symbol, mint),
        inline: false,
    }
}

#[async_trait]
impl AlertSink for DiscordSink {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        if self.config.webhook_url.is_empty() {
            return Err(SinkError::Unavailable("webhook URL not configured".to_string()));
        }

        let message = self.build_message(alert);
        debug!(wallet = %alert.wallet_address, kind = %alert.kind, "Sending Discord alert");

        let response = self
            .http_client
            .post(&self.config.webhook_url)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "Discord alert sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "discord"
    }
}
