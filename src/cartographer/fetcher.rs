//! Exchange Pair Sources
//!
//! Everything the scanner knows about the market comes through one
//! contract: "give me the current (base, target, last price) triples".
//!
//! Two sources ship with the crate:
//! - `CoinGeckoTickers` pages through an exchange's ticker list
//! - `StaticPairs` serves a fixed list (tests, offline JSON snapshots)

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

// ============================================
// CONSTANTS
// ============================================

/// Public CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying a demo-plan API key
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Timeout for API calls
const API_TIMEOUT_SECS: u64 = 10;

/// CoinGecko never returns more than 100 tickers per page
const TICKERS_PER_PAGE: usize = 100;

// ============================================
// TYPES
// ============================================

/// One quoted trading pair: `rate` units of `target` buy one `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangePair {
    pub base: String,
    pub target: String,
    pub rate: Decimal,
}

impl ExchangePair {
    pub fn new(base: impl Into<String>, target: impl Into<String>, rate: Decimal) -> Self {
        Self {
            base: base.into(),
            target: target.into(),
            rate,
        }
    }
}

/// Anything that can hand over the current set of quoted pairs.
#[async_trait]
pub trait PairSource: Send + Sync {
    /// Short label for logs and reports
    fn name(&self) -> &str;

    /// Fetch every currently known pair. A failure here is an upstream
    /// problem, never "no pairs".
    async fn fetch_pairs(&self) -> Result<Vec<ExchangePair>>;
}

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    tickers: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    base: String,
    target: String,
    /// Raw; converted per ticker by `parse_price`
    #[serde(default)]
    last: Value,
    #[serde(default)]
    is_stale: bool,
    #[serde(default)]
    is_anomaly: bool,
}

impl Ticker {
    /// Stale/anomalous quotes and missing or unusable prices never
    /// become pairs.
    fn into_pair(self) -> Option<ExchangePair> {
        if self.is_stale || self.is_anomaly {
            trace!("Dropping flagged ticker {}/{}", self.base, self.target);
            return None;
        }
        let Some(rate) = parse_price(&self.last).filter(|r| *r > Decimal::ZERO) else {
            trace!("Dropping unpriced ticker {}/{}: {}", self.base, self.target, self.last);
            return None;
        };
        Some(ExchangePair::new(self.base, self.target, rate))
    }
}

/// Numbers go through their shortest decimal rendering, so `0.0023`
/// stays `0.0023`. Anything Decimal can't hold is `None`.
fn parse_price(last: &Value) -> Option<Decimal> {
    let text = match last {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite())?.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text).ok()
}

// ============================================
// COINGECKO TICKERS
// ============================================

/// Pulls last-trade prices for every pair listed on one exchange.
pub struct CoinGeckoTickers {
    http_client: Client,
    api_url: String,
    exchange_id: String,
    api_key: Option<String>,
    max_pages: u32,
}

impl CoinGeckoTickers {
    pub fn new(
        api_url: impl Into<String>,
        exchange_id: impl Into<String>,
        api_key: Option<String>,
        max_pages: u32,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(API_TIMEOUT_SECS)))
            .build()
            .wrap_err("Failed to create HTTP client")?;
        let api_url: String = api_url.into();

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            exchange_id: exchange_id.into(),
            api_key,
            max_pages: max_pages.max(1),
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/exchanges/{}/tickers?page={}",
            self.api_url, self.exchange_id, page
        )
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Ticker>> {
        let mut request = self.http_client.get(self.page_url(page));
        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .wrap_err_with(|| format!("CoinGecko request failed (page {})", page))?;

        let status = response.status();
        if !status.is_success() {
            return Err(eyre!(
                "CoinGecko returned {} for exchange '{}' (page {})",
                status,
                self.exchange_id,
                page
            ));
        }

        let body: TickersResponse = response
            .json()
            .await
            .wrap_err_with(|| format!("Failed to decode CoinGecko tickers (page {})", page))?;

        Ok(body.tickers)
    }
}

#[async_trait]
impl PairSource for CoinGeckoTickers {
    fn name(&self) -> &str {
        &self.exchange_id
    }

    async fn fetch_pairs(&self) -> Result<Vec<ExchangePair>> {
        let start = Instant::now();
        let mut pairs = Vec::new();
        let mut dropped = 0usize;

        for page in 1..=self.max_pages {
            let tickers = self.fetch_page(page).await?;
            let count = tickers.len();
            debug!("Page {}: {} tickers", page, count);

            for ticker in tickers {
                match ticker.into_pair() {
                    Some(pair) => pairs.push(pair),
                    None => dropped += 1,
                }
            }

            if count < TICKERS_PER_PAGE {
                break;
            }
        }

        if dropped > 0 {
            warn!("Dropped {} stale/anomalous/unpriced tickers", dropped);
        }
        info!(
            "{} returned {} pairs in {:?}",
            self.exchange_id,
            pairs.len(),
            start.elapsed()
        );

        Ok(pairs)
    }
}

// ============================================
// STATIC PAIRS
// ============================================

/// A fixed pair list, served as-is on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticPairs {
    label: String,
    pairs: Vec<ExchangePair>,
}

impl StaticPairs {
    pub fn new(label: impl Into<String>, pairs: Vec<ExchangePair>) -> Self {
        Self {
            label: label.into(),
            pairs,
        }
    }

    /// Load a JSON array of `{ "base", "target", "rate" }` objects
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read pairs file {}", path.display()))?;
        let pairs: Vec<ExchangePair> = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Invalid pairs file {}", path.display()))?;

        Ok(Self::new(path.display().to_string(), pairs))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[async_trait]
impl PairSource for StaticPairs {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch_pairs(&self) -> Result<Vec<ExchangePair>> {
        Ok(self.pairs.clone())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_decoding_filters_bad_quotes() {
        let body = r#"{
            "name": "Binance",
            "tickers": [
                { "base": "ETH", "target": "USDT", "last": 2100.5, "is_stale": false, "is_anomaly": false },
                { "base": "BTC", "target": "USDT", "last": 64000, "is_stale": true, "is_anomaly": false },
                { "base": "DOGE", "target": "USDT", "last": 0.12, "is_stale": false, "is_anomaly": true },
                { "base": "XYZ", "target": "USDT", "last": null },
                { "base": "ABC", "target": "USDT", "last": 0 },
                { "base": "SOL", "target": "BTC", "last": 0.0023 }
            ]
        }"#;

        let response: TickersResponse = serde_json::from_str(body).unwrap();
        let pairs: Vec<_> = response
            .tickers
            .into_iter()
            .filter_map(Ticker::into_pair)
            .collect();

        assert_eq!(
            pairs,
            vec![
                ExchangePair::new("ETH", "USDT", dec!(2100.5)),
                ExchangePair::new("SOL", "BTC", dec!(0.0023)),
            ]
        );
    }

    #[test]
    fn test_unrepresentable_price_drops_only_that_ticker() {
        let body = r#"{
            "tickers": [
                { "base": "ETH", "target": "USDT", "last": 2100.5 },
                { "base": "SHIB", "target": "BTC", "last": 1e30 },
                { "base": "PEPE", "target": "USDT", "last": "n/a" },
                { "base": "WBTC", "target": "BTC", "last": [1] },
                { "base": "BNB", "target": "USDT" },
                { "base": "LTC", "target": "USDT", "last": "72.15" }
            ]
        }"#;

        let response: TickersResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.tickers.len(), 6);

        let pairs: Vec<_> = response
            .tickers
            .into_iter()
            .filter_map(Ticker::into_pair)
            .collect();

        assert_eq!(
            pairs,
            vec![
                ExchangePair::new("ETH", "USDT", dec!(2100.5)),
                ExchangePair::new("LTC", "USDT", dec!(72.15)),
            ]
        );
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(&serde_json::json!(64000)), Some(dec!(64000)));
        assert_eq!(parse_price(&serde_json::json!(0.0023)), Some(dec!(0.0023)));
        assert_eq!(parse_price(&serde_json::json!(" 1.5 ")), Some(dec!(1.5)));
        assert_eq!(parse_price(&serde_json::json!(1e30)), None);
        assert_eq!(parse_price(&Value::Null), None);
    }

    #[test]
    fn test_page_url() {
        let source = CoinGeckoTickers::new(
            "https://api.coingecko.com/api/v3/",
            "binance",
            None,
            3,
            None,
        )
        .unwrap();

        assert_eq!(
            source.page_url(2),
            "https://api.coingecko.com/api/v3/exchanges/binance/tickers?page=2"
        );
        assert_eq!(source.name(), "binance");
    }

    #[test]
    fn test_static_pairs_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "arbiscan_pairs_{}.json",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"[{ "base": "USDT", "target": "ETH", "rate": "0.0005" },
                { "base": "eth", "target": "btc", "rate": 0.05 }]"#,
        )
        .unwrap();

        let source = StaticPairs::from_json_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(source.len(), 2);
        let pairs = tokio_test::block_on(source.fetch_pairs()).unwrap();
        assert_eq!(pairs[0], ExchangePair::new("USDT", "ETH", dec!(0.0005)));
        assert_eq!(pairs[1].rate, dec!(0.05));
    }

    #[test]
    fn test_static_pairs_missing_file_is_an_error() {
        assert!(StaticPairs::from_json_file("/definitely/not/here.json").is_err());
    }
}
