//! Currency conversion
//!
//! `RateConverter` multiplies an amount by a rate obtained from a
//! [`RateSource`], bounded by a timeout. Every failure of the lookup surfaces as
//! `PaymentError::ConversionFailed`; there is no retry and no 1:1 fallback.
//!
//! Two rate sources are provided:
//! - [`HttpRateSource`]: queries a currconv-compatible HTTP endpoint
//! - [`FixedRateSource`]: a static table, typically loaded from configuration

use crate::core::traits::{CurrencyConverter, RateSource};
use crate::types::{Currency, PaymentError};
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bound on a single rate lookup
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(2);

/// Public currconv endpoint
pub const DEFAULT_RATE_URL: &str = "https://free.currconv.com/api/v7/convert";

/// Converter backed by an injected rate source
#[derive(Clone)]
pub struct RateConverter {
    source: Arc<dyn RateSource>,
    timeout: Duration,
}

impl RateConverter {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self::with_timeout(source, DEFAULT_CONVERSION_TIMEOUT)
    }

    pub fn with_timeout(source: Arc<dyn RateSource>, timeout: Duration) -> Self {
        RateConverter { source, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CurrencyConverter for RateConverter {
    async fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
    ) -> Result<Decimal, PaymentError> {
        if from == to {
            return Ok(amount);
        }

        let rate = tokio::time::timeout(self.timeout, self.source.fetch_rate(from, to))
            .await
            .map_err(|_| {
                PaymentError::conversion_failed(
                    from.as_str(),
                    to.as_str(),
                    format!("rate lookup timed out after {}ms", self.timeout.as_millis()),
                )
            })??;

        if rate <= Decimal::ZERO {
            return Err(PaymentError::conversion_failed(
                from.as_str(),
                to.as_str(),
                format!("non-positive rate {}", rate),
            ));
        }

        let converted = amount.checked_mul(rate).ok_or_else(|| {
            PaymentError::conversion_failed(from.as_str(), to.as_str(), "converted amount overflows")
        })?;

        debug!(%from, %to, %rate, %amount, %converted, "converted amount");
        Ok(converted)
    }
}

/// Static rate table
///
/// Only the pairs registered are known; the inverse of a pair is not derived.
#[derive(Debug, Clone, Default)]
pub struct FixedRateSource {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl FixedRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rate for `from -> to`
    pub fn with_rate(mut self, from: impl Into<Currency>, to: impl Into<Currency>, rate: Decimal) -> Self {
        self.rates.insert((from.into(), to.into()), rate);
        self
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    async fn fetch_rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, PaymentError> {
        self.rates
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or_else(|| PaymentError::conversion_failed(from.as_str(), to.as_str(), "no rate for pair"))
    }
}

/// Rate source querying a currconv-compatible endpoint
///
/// Request: `GET {base_url}?q=FROM_TO&compact=ultra&apiKey=KEY`.
/// Response: a JSON object `{"FROM_TO": rate}`.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRateSource {
    /// Build a source whose HTTP client gives up after `timeout`
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpRateSource {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, PaymentError> {
        let pair = format!("{}_{}", from, to);
        let fail = |reason: String| PaymentError::conversion_failed(from.as_str(), to.as_str(), reason);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", pair.as_str()),
                ("compact", "ultra"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| fail(format!("rate service returned an error: {}", e)))?;

        let body: HashMap<String, f64> = response
            .json()
            .await
            .map_err(|e| fail(format!("invalid rate response: {}", e)))?;

        let rate = body
            .get(&pair)
            .copied()
            .ok_or_else(|| fail(format!("response has no rate for {}", pair)))?;

        Decimal::from_f64(rate).ok_or_else(|| fail(format!("rate {} is not representable", rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn usd() -> Currency {
        Currency::new("USD")
    }

    fn eur() -> Currency {
        Currency::new("EUR")
    }

    /// Rate source that never answers
    struct StalledRateSource;

    #[async_trait]
    impl RateSource for StalledRateSource {
        async fn fetch_rate(&self, _: &Currency, _: &Currency) -> Result<Decimal, PaymentError> {
            std::future::pending().await
        }
    }

    /// Rate source that must not be consulted
    struct UnreachableRateSource;

    #[async_trait]
    impl RateSource for UnreachableRateSource {
        async fn fetch_rate(&self, _: &Currency, _: &Currency) -> Result<Decimal, PaymentError> {
            panic!("rate source consulted for same-currency conversion");
        }
    }

    /// Serve a single HTTP response with the given status line and body
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/api/v7/convert", addr)
    }

    #[tokio::test]
    async fn test_convert_multiplies_by_rate() {
        let source = FixedRateSource::new().with_rate("EUR", "USD", dec!(1.1));
        let converter = RateConverter::new(Arc::new(source));

        let converted = converter.convert(dec!(10), &eur(), &usd()).await.unwrap();

        assert!((converted - dec!(11)).abs() < dec!(0.0001));
    }

    #[tokio::test]
    async fn test_same_currency_skips_rate_source() {
        let converter = RateConverter::new(Arc::new(UnreachableRateSource));

        let converted = converter.convert(dec!(42.5), &usd(), &usd()).await.unwrap();

        assert_eq!(converted, dec!(42.5));
    }

    #[tokio::test]
    async fn test_missing_pair_fails_without_default_rate() {
        let source = FixedRateSource::new().with_rate("EUR", "USD", dec!(1.1));
        let converter = RateConverter::new(Arc::new(source));

        let result = converter.convert(dec!(10), &usd(), &eur()).await;

        assert!(matches!(result, Err(PaymentError::ConversionFailed { .. })));
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_rejected() {
        let source = FixedRateSource::new().with_rate("EUR", "USD", Decimal::ZERO);
        let converter = RateConverter::new(Arc::new(source));

        let result = converter.convert(dec!(10), &eur(), &usd()).await;

        assert!(matches!(result, Err(PaymentError::ConversionFailed { .. })));
    }

    #[tokio::test]
    async fn test_slow_rate_source_times_out() {
        let converter =
            RateConverter::with_timeout(Arc::new(StalledRateSource), Duration::from_millis(20));

        let result = converter.convert(dec!(10), &eur(), &usd()).await;

        match result {
            Err(PaymentError::ConversionFailed { reason, .. }) => {
                assert!(reason.contains("timed out"), "unexpected reason: {}", reason)
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_source_reads_compact_response() {
        let url = serve_once("200 OK", r#"{"EUR_USD":1.25}"#).await;
        let source = HttpRateSource::new(url, "key", Duration::from_secs(2)).unwrap();

        let rate = source.fetch_rate(&eur(), &usd()).await.unwrap();

        assert!((rate - dec!(1.25)).abs() < dec!(0.0001));
    }

    #[tokio::test]
    async fn test_http_source_missing_rate_fails() {
        let url = serve_once("200 OK", r#"{}"#).await;
        let source = HttpRateSource::new(url, "key", Duration::from_secs(2)).unwrap();

        let result = source.fetch_rate(&eur(), &usd()).await;

        assert!(matches!(result, Err(PaymentError::ConversionFailed { .. })));
    }

    #[tokio::test]
    async fn test_http_source_undecodable_body_fails() {
        let url = serve_once("200 OK", "not json").await;
        let source = HttpRateSource::new(url, "key", Duration::from_secs(2)).unwrap();

        let result = source.fetch_rate(&eur(), &usd()).await;

        assert!(matches!(result, Err(PaymentError::ConversionFailed { .. })));
    }

    #[tokio::test]
    async fn test_http_source_error_status_fails() {
        let url = serve_once("500 Internal Server Error", r#"{"EUR_USD":1.25}"#).await;
        let source = HttpRateSource::new(url, "key", Duration::from_secs(2)).unwrap();

        let result = source.fetch_rate(&eur(), &usd()).await;

        assert!(matches!(result, Err(PaymentError::ConversionFailed { .. })));
    }
}
