//! USD price lookups for the portfolio overview.

use crate::{FetchError, FetchResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Jupiter price API v2 endpoint.
pub const JUPITER_PRICE_URL: &str = "https://api.jup.ag/price/v2";

/// Jupiter accepts at most this many ids per request.
const MAX_MINTS_PER_BATCH: usize = 100;

/// Pause between batch requests.
const BATCH_DELAY: Duration = Duration::from_millis(100);

/// Read side of a price cache.
pub trait PriceService: Send + Sync {
    /// Cached USD price of `mint`, if known.
    fn get_price(&self, mint: &str) -> Option<f64>;
}

/// Cached price entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: f64,
    pub last_updated: DateTime<Utc>,
    pub confidence_level: String,
}

/// Price cache filled from the Jupiter price API.
pub struct JupiterPriceService {
    client: Client,
    base_url: String,
    prices: DashMap<String, PriceData>,
}

impl JupiterPriceService {
    pub fn new() -> FetchResult<Self> {
        Self::with_base_url(JUPITER_PRICE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Other(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            prices: DashMap::new(),
        })
    }

    /// Full cached entry for `mint`.
    pub fn price_data(&self, mint: &str) -> Option<PriceData> {
        self.prices.get(mint).map(|entry| entry.value().clone())
    }

    pub fn cached_count(&self) -> usize {
        self.prices.len()
    }

    /// Refresh prices for `mints` in batches of 100.
    pub async fn update_prices(&self, mints: &[String]) -> FetchResult<()> {
        let batches: Vec<&[String]> = mints.chunks(MAX_MINTS_PER_BATCH).collect();
        let total = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            self.update_batch(batch).await.map_err(|e| {
                warn!(batch = index, error = %e, "Price batch failed");
                e
            })?;

            if index + 1 < total {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        Ok(())
    }

    async fn update_batch(&self, mints: &[String]) -> FetchResult<()> {
        let url = format!("{}?ids={}", self.base_url, mints.join(","));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Other(format!(
                "price API returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let updated = self.apply_response(&body, Utc::now());
        debug!(requested = mints.len(), updated, "Updated prices");
        Ok(())
    }

    /// Store every parseable entry of a price response. Returns how many
    /// entries were stored.
    fn apply_response(&self, body: &Value, now: DateTime<Utc>) -> usize {
        let Some(data) = body["data"].as_object() else {
            return 0;
        };

        let mut updated = 0;
        for (mint, entry) in data {
            let Some(price) = entry["price"].as_str().and_then(|p| p.parse::<f64>().ok()) else {
                continue;
            };
            let confidence = entry["extraInfo"]["confidenceLevel"]
                .as_str()
                .unwrap_or("medium")
                .to_string();

            self.prices.insert(
                mint.clone(),
                PriceData {
                    price,
                    last_updated: now,
                    confidence_level: confidence,
                },
            );
            updated += 1;
        }
        updated
    }
}

impl PriceService for JupiterPriceService {
    fn get_price(&self, mint: &str) -> Option<f64> {
        self.prices.get(mint).map(|entry| entry.price)
    }
}

/// Fixed price table, for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticPriceService {
    prices: DashMap<String, f64>,
}

impl StaticPriceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, mint: &str, price: f64) -> Self {
        self.prices.insert(mint.to_string(), price);
        self
    }
}

impl PriceService for StaticPriceService {
    fn get_price(&self, mint: &str) -> Option<f64> {
        self.prices.get(mint).map(|p| *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insider_core::{SOL_MINT, USDC_MINT};
    use serde_json::json;

    #[test]
    fn test_apply_response() {
        let service = JupiterPriceService::new().unwrap();
        let body = json!({
            "data": {
                SOL_MINT: {
                    "id": SOL_MINT,
                    "type": "derivedPrice",
                    "price": "142.50",
                    "extraInfo": {"confidenceLevel": "high"}
                },
                USDC_MINT: {"id": USDC_MINT, "price": "1.0001"},
                "unknown": null,
                "bad": {"price": "n/a"}
            },
            "timeTaken": 0.01
        });

        let updated = service.apply_response(&body, Utc::now());

        assert_eq!(updated, 2);
        assert_eq!(service.get_price(SOL_MINT), Some(142.5));
        assert_eq!(service.price_data(SOL_MINT).unwrap().confidence_level, "high");
        assert_eq!(service.price_data(USDC_MINT).unwrap().confidence_level, "medium");
        assert_eq!(service.get_price("unknown"), None);
        assert_eq!(service.get_price("bad"), None);
    }

    #[test]
    fn test_apply_response_without_data() {
        let service = JupiterPriceService::new().unwrap();
        assert_eq!(service.apply_response(&json!({"error": "nope"}), Utc::now()), 0);
        assert_eq!(service.cached_count(), 0);
    }

    #[test]
    fn test_static_prices() {
        let service = StaticPriceService::new().with_price(SOL_MINT, 150.0);
        assert_eq!(service.get_price(SOL_MINT), Some(150.0));
        assert_eq!(service.get_price(USDC_MINT), None);
    }
}
