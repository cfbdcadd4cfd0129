//! Exchange rate lookup
//!
//! Rates are expressed as satoshis per fiat unit. The HTTP client fetches the
//! BTC price from a public price source and inverts it.

use crate::Result;
use async_trait::async_trait;
use lnpos_core::{Currency, CurrencyContext, DisplayCurrency, SATS_PER_BTC};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Rate lookup errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    /// Request could not be sent
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Server answered with an error status
    #[error("Unexpected status {0}")]
    NotSuccessResponse(u16),

    /// Body is not JSON
    #[error("Cannot parse response: {0}")]
    CannotParseResponse(String),

    /// Price missing or invalid
    #[error("Cannot parse price data: {0}")]
    CannotParseData(String),

    /// Source has no price for the currency
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// Source of satoshis-per-unit rates
#[async_trait]
pub trait RateLookup: Send + Sync {
    /// Satoshis per unit of `currency`
    async fn satoshis_per_unit(&self, currency: Currency) -> std::result::Result<f64, RateError>;
}

/// Public BTC price APIs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSource {
    /// mempool.space `/api/v1/prices`
    #[default]
    #[serde(rename = "mempool.space")]
    MempoolSpace,
    /// CoinGecko `/api/v3/exchange_rates`
    #[serde(rename = "coingecko")]
    CoinGecko,
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MempoolSpace => write!(f, "mempool.space"),
            Self::CoinGecko => write!(f, "coingecko"),
        }
    }
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mempool.space" | "mempool" => Ok(Self::MempoolSpace),
            "coingecko" => Ok(Self::CoinGecko),
            other => Err(format!("Invalid price source: {}", other)),
        }
    }
}

impl PriceSource {
    /// Production API root
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::MempoolSpace => "https://mempool.space",
            Self::CoinGecko => "https://api.coingecko.com",
        }
    }

    /// Price endpoint path
    pub fn price_path(&self) -> &'static str {
        match self {
            Self::MempoolSpace => "/api/v1/prices",
            Self::CoinGecko => "/api/v3/exchange_rates",
        }
    }

    /// Required attribution, if any
    pub fn attribution(&self) -> Option<&'static str> {
        match self {
            Self::CoinGecko => Some("Powered by CoinGecko"),
            Self::MempoolSpace => None,
        }
    }

    /// Extract the BTC price in `currency` from a response body
    pub fn parse_price(
        &self,
        currency: Currency,
        data: &serde_json::Value,
    ) -> std::result::Result<f64, RateError> {
        let price = match self {
            Self::MempoolSpace => data.get(currency.code()).and_then(|v| v.as_f64()),
            Self::CoinGecko => data
                .get("rates")
                .and_then(|rates| rates.get(currency.code().to_lowercase()))
                .and_then(|rate| rate.get("value"))
                .and_then(|v| v.as_f64()),
        }
        .ok_or_else(|| RateError::UnsupportedCurrency(currency.code().to_string()))?;

        if !price.is_finite() || price <= 0.0 {
            return Err(RateError::CannotParseData(format!(
                "price {} for {}",
                price, currency
            )));
        }
        Ok(price)
    }
}

/// HTTP price client
#[derive(Debug, Clone)]
pub struct PriceClient {
    http: reqwest::Client,
    source: PriceSource,
    base_url: String,
}

impl PriceClient {
    /// Client for the production API of `source`
    pub fn new(source: PriceSource, timeout: Duration) -> Result<Self> {
        Self::with_base_url(source, source.default_base_url(), timeout)
    }

    /// Client for a custom API root (mirrors, tests)
    pub fn with_base_url(source: PriceSource, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateError::RequestFailed(e.to_string()))?;
        Ok(Self {
            http,
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Price source
    pub fn source(&self) -> PriceSource {
        self.source
    }

    /// BTC price in `currency`
    pub async fn btc_price(&self, currency: Currency) -> std::result::Result<f64, RateError> {
        let url = format!("{}{}", self.base_url, self.source.price_path());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::NotSuccessResponse(status.as_u16()));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RateError::CannotParseResponse(e.to_string()))?;
        self.source.parse_price(currency, &data)
    }
}

#[async_trait]
impl RateLookup for PriceClient {
    async fn satoshis_per_unit(&self, currency: Currency) -> std::result::Result<f64, RateError> {
        let price = self.btc_price(currency).await?;
        let rate = SATS_PER_BTC / price;
        tracing::debug!(
            "{} price from {}: {} ({:.4} sats/unit)",
            currency,
            self.source,
            price,
            rate
        );
        Ok(rate)
    }
}

/// Fixed rates for tests and offline use
#[derive(Debug, Default)]
pub struct MockRates {
    rates: RwLock<HashMap<Currency, f64>>,
    calls: AtomicUsize,
}

impl MockRates {
    /// No rates
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the satoshis-per-unit rate for a currency
    pub fn with_rate(self, currency: Currency, sats_per_unit: f64) -> Self {
        self.set_rate(currency, sats_per_unit);
        self
    }

    /// Set the satoshis-per-unit rate for a currency
    pub fn set_rate(&self, currency: Currency, sats_per_unit: f64) {
        self.rates.write().insert(currency, sats_per_unit);
    }

    /// Number of lookups performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLookup for MockRates {
    async fn satoshis_per_unit(&self, currency: Currency) -> std::result::Result<f64, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rates
            .read()
            .get(&currency)
            .copied()
            .ok_or_else(|| RateError::UnsupportedCurrency(currency.code().to_string()))
    }
}

/// Keep a [`CurrencyContext`] rate in sync with its selection
#[async_trait]
pub trait RefreshRate {
    /// Fetch the rate for the selected currency. SATS never hits the lookup.
    async fn refresh(&mut self, lookup: &dyn RateLookup) -> Result<()>;

    /// Change currency and fetch its rate when the selection changed or no
    /// rate is cached. Returns whether the selection changed.
    async fn switch_to(&mut self, currency: DisplayCurrency, lookup: &dyn RateLookup)
        -> Result<bool>;
}

#[async_trait]
impl RefreshRate for CurrencyContext {
    async fn refresh(&mut self, lookup: &dyn RateLookup) -> Result<()> {
        let DisplayCurrency::Fiat(currency) = self.currency() else {
            return Ok(());
        };
        let rate = lookup.satoshis_per_unit(currency).await?;
        self.set_rate(rate)?;
        Ok(())
    }

    async fn switch_to(
        &mut self,
        currency: DisplayCurrency,
        lookup: &dyn RateLookup,
    ) -> Result<bool> {
        let changed = self.select(currency);
        if changed || !self.is_ready() {
            self.refresh(lookup).await?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mempool_prices() {
        let data = json!({"time": 1700000000, "USD": 64000, "EUR": 59000});
        let source = PriceSource::MempoolSpace;
        assert_eq!(source.parse_price(Currency::USD, &data).unwrap(), 64_000.0);
        assert!(matches!(
            source.parse_price(Currency::JPY, &data),
            Err(RateError::UnsupportedCurrency(_))
        ));
    }

    #[test]
    fn test_parse_coingecko_prices() {
        let data = json!({"rates": {"usd": {"name": "US Dollar", "value": 50000.5}, "eur": {"value": 0}}});
        let source = PriceSource::CoinGecko;
        assert_eq!(source.parse_price(Currency::USD, &data).unwrap(), 50_000.5);
        assert!(matches!(
            source.parse_price(Currency::EUR, &data),
            Err(RateError::CannotParseData(_))
        ));
    }

    #[test]
    fn test_price_source_names() {
        assert_eq!("mempool.space".parse::<PriceSource>().unwrap(), PriceSource::MempoolSpace);
        assert_eq!("CoinGecko".parse::<PriceSource>().unwrap(), PriceSource::CoinGecko);
        assert!("kraken".parse::<PriceSource>().is_err());
        assert_eq!(PriceSource::CoinGecko.to_string(), "coingecko");
    }

    #[tokio::test]
    async fn test_refresh_skips_sats() {
        let rates = MockRates::new();
        let mut ctx = CurrencyContext::sats();
        ctx.refresh(&rates).await.unwrap();
        assert_eq!(rates.calls(), 0);
    }

    #[tokio::test]
    async fn test_switch_fetches_once_per_change() {
        let rates = MockRates::new().with_rate(Currency::EUR, 1_700.0);
        let mut ctx = CurrencyContext::sats();

        assert!(ctx
            .switch_to(DisplayCurrency::Fiat(Currency::EUR), &rates)
            .await
            .unwrap());
        assert_eq!(ctx.rate(), Some(1_700.0));
        assert!(!ctx
            .switch_to(DisplayCurrency::Fiat(Currency::EUR), &rates)
            .await
            .unwrap());
        assert_eq!(rates.calls(), 1);

        let err = ctx
            .switch_to(DisplayCurrency::Fiat(Currency::GBP), &rates)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Rate(RateError::UnsupportedCurrency(_))));
        assert!(!ctx.is_ready());
    }
}
