//! DOT/USD price sources.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::MonitorError;

/// Supplies the USD price of the relay-chain token.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Current price in USD.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Computation`] if no price is available.
    async fn price_usd(&self) -> Result<f64, MonitorError>;
}

/// A constant price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPrice(pub f64);

impl Default for FixedPrice {
    fn default() -> Self {
        Self(5.5)
    }
}

#[async_trait]
impl PriceSource for FixedPrice {
    async fn price_usd(&self) -> Result<f64, MonitorError> {
        Ok(self.0)
    }
}

/// Reads the price from a CoinGecko-style `simple/price` endpoint that
/// answers `{"polkadot": {"usd": <price>}}`.
///
/// Any failure falls back to `fallback` and is logged at `warn`.
#[derive(Debug, Clone)]
pub struct CoinGeckoPrice {
    client: Client,
    url: String,
    fallback: f64,
}

impl CoinGeckoPrice {
    /// Creates a source polling `url`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Internal`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, fallback: f64) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MonitorError::Internal(format!("price client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            fallback,
        })
    }

    async fn fetch(&self) -> Result<f64, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }
        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        body.get("polkadot")
            .and_then(|p| p.get("usd"))
            .and_then(Value::as_f64)
            .ok_or_else(|| "response has no polkadot.usd field".to_string())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoPrice {
    async fn price_usd(&self) -> Result<f64, MonitorError> {
        match self.fetch().await {
            Ok(price) => Ok(price),
            Err(reason) => {
                tracing::warn!(error = %reason, fallback = self.fallback, "price feed unavailable, using fallback");
                Ok(self.fallback)
            }
        }
    }
}
