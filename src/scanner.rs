//! Scanner - fetch, build, search
//!
//! Pulls pairs from a `PairSource`, builds the rate graph and runs the
//! cycle search on a blocking worker so the async runtime stays free.
//! Fetch failures come back as errors; "nothing found" is an empty list.

use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::brain::{ArbitrageOpportunity, CycleSearch, SearchControl, DEFAULT_MAX_PATH_LENGTH};
use crate::cartographer::{normalize_asset, PairSource, RateGraph};
use crate::config::Config;
use crate::tokens::StableAssetSet;

/// Result of one scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub base: String,
    pub max_path_length: usize,
    pub source: String,
    pub scanned_at: DateTime<Utc>,
    pub pairs_fetched: usize,
    pub pairs_skipped: usize,
    pub nodes: usize,
    pub edges: usize,
    pub search_steps: u64,
    /// The search hit its deadline/step budget/cancel flag
    pub truncated: bool,
    pub opportunities: Vec<ArbitrageOpportunity>,
}

impl ScanReport {
    /// Highest profit; the first discovered wins ties
    pub fn best(&self) -> Option<&ArbitrageOpportunity> {
        self.opportunities.iter().fold(None, |best, opp| match best {
            Some(b) if b.profit_percentage >= opp.profit_percentage => Some(b),
            _ => Some(opp),
        })
    }
}

/// Search limits as configured; turned into a `SearchControl` when a
/// search actually starts
#[derive(Debug, Clone, Default)]
struct SearchLimits {
    timeout: Option<Duration>,
    max_steps: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchLimits {
    fn start_now(&self) -> SearchControl {
        let mut control = SearchControl::unbounded();
        if let Some(timeout) = self.timeout {
            control = control.with_timeout(timeout);
        }
        if let Some(steps) = self.max_steps {
            control = control.with_max_steps(steps);
        }
        if let Some(ref flag) = self.cancel {
            control = control.with_cancel_flag(Arc::clone(flag));
        }
        control
    }
}

pub struct Scanner {
    source: Arc<dyn PairSource>,
    stable_assets: StableAssetSet,
    limits: SearchLimits,
}

impl Scanner {
    pub fn new(source: Arc<dyn PairSource>, stable_assets: StableAssetSet) -> Self {
        Self {
            source,
            stable_assets,
            limits: SearchLimits::default(),
        }
    }

    pub fn from_config(config: &Config, source: Arc<dyn PairSource>) -> Self {
        let mut scanner = Self::new(source, config.stable_asset_set());
        scanner.limits.timeout = config.search_timeout_ms.map(Duration::from_millis);
        scanner.limits.max_steps = config.max_search_steps;
        scanner
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = Some(timeout);
        self
    }

    pub fn with_max_search_steps(mut self, steps: u64) -> Self {
        self.limits.max_steps = Some(steps);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.limits.cancel = Some(flag);
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Scan with the default path bound
    pub async fn scan(&self, base_asset: &str) -> Result<ScanReport> {
        self.find_arbitrage_opportunities(base_asset, DEFAULT_MAX_PATH_LENGTH)
            .await
    }

    pub async fn find_arbitrage_opportunities(
        &self,
        base_asset: &str,
        max_path_length: usize,
    ) -> Result<ScanReport> {
        let base = normalize_asset(base_asset);
        let source = self.source.name().to_string();

        let start = Instant::now();
        let pairs = self
            .source
            .fetch_pairs()
            .await
            .wrap_err_with(|| format!("Failed to fetch pairs from {}", source))?;
        let pairs_fetched = pairs.len();
        debug!("Fetched {} pairs from {} in {:?}", pairs_fetched, source, start.elapsed());

        let stable_assets = self.stable_assets.clone();
        let search_base = base.clone();
        let limits = self.limits.clone();

        let (pairs_skipped, nodes, edges, outcome) = tokio::task::spawn_blocking(move || {
            let graph = RateGraph::from_pairs(&pairs);
            // deadline counts from here, after the fetch and the graph build
            let control = limits.start_now();
            let outcome = CycleSearch::new(&graph, &stable_assets).find_opportunities_with(
                &search_base,
                max_path_length,
                &control,
            );
            (graph.skipped(), graph.node_count(), graph.edge_count(), outcome)
        })
        .await
        .wrap_err("Cycle search worker failed")?;

        info!(
            "Scan {} (max {}): {} opportunities from {} pairs in {:?}",
            base,
            max_path_length,
            outcome.opportunities.len(),
            pairs_fetched,
            start.elapsed()
        );

        Ok(ScanReport {
            base,
            max_path_length,
            source,
            scanned_at: Utc::now(),
            pairs_fetched,
            pairs_skipped,
            nodes,
            edges,
            search_steps: outcome.steps,
            truncated: outcome.truncated,
            opportunities: outcome.opportunities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::{ExchangePair, StaticPairs};
    use async_trait::async_trait;
    use eyre::eyre;
    use rust_decimal_macros::dec;

    struct DownSource;

    #[async_trait]
    impl PairSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_pairs(&self) -> Result<Vec<ExchangePair>> {
            Err(eyre!("503 Service Unavailable"))
        }
    }

    fn triangle_source() -> Arc<dyn PairSource> {
        Arc::new(StaticPairs::new(
            "fixture",
            vec![
                ExchangePair::new("USDT", "ETH", dec!(0.0005)),
                ExchangePair::new("ETH", "BTC", dec!(0.05)),
                ExchangePair::new("BTC", "USDT", dec!(42000)),
                ExchangePair::new("BTC", "XRP", dec!(0)),
            ],
        ))
    }

    #[tokio::test]
    async fn test_scan_end_to_end() {
        let scanner = Scanner::new(triangle_source(), StableAssetSet::default());
        let report = scanner.scan("USDT").await.unwrap();

        assert_eq!(report.base, "usdt");
        assert_eq!(report.max_path_length, 4);
        assert_eq!(report.source, "fixture");
        assert_eq!(report.pairs_fetched, 4);
        assert_eq!(report.pairs_skipped, 1);
        assert_eq!(report.nodes, 3);
        assert_eq!(report.edges, 6);
        assert!(!report.truncated);

        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].path, vec!["usdt", "eth", "btc", "usdt"]);
        assert_eq!(report.best().unwrap().profit_percentage, dec!(5));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_an_error_not_an_empty_list() {
        let scanner = Scanner::new(Arc::new(DownSource), StableAssetSet::default());
        let err = scanner.scan("usdt").await.unwrap_err();
        assert!(format!("{:#}", err).contains("down"));
    }

    #[tokio::test]
    async fn test_empty_results_are_ok() {
        let scanner = Scanner::new(triangle_source(), StableAssetSet::default());

        let report = scanner.find_arbitrage_opportunities("usdt", 2).await.unwrap();
        assert!(report.opportunities.is_empty());

        let report = scanner.scan("doge").await.unwrap();
        assert!(report.opportunities.is_empty());
        assert!(report.best().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_scan_reports_truncation() {
        let flag = Arc::new(AtomicBool::new(true));
        let scanner = Scanner::new(triangle_source(), StableAssetSet::default())
            .with_cancel_flag(flag);

        let report = scanner.scan("usdt").await.unwrap();
        assert!(report.truncated);
        assert!(report.opportunities.is_empty());
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = Config::default();
        config.max_search_steps = Some(1);
        let scanner = Scanner::from_config(&config, triangle_source());

        let report = scanner.scan("usdt").await.unwrap();
        assert!(report.truncated);
    }

    #[test]
    fn test_search_deadline_starts_at_search_time() {
        let graph = RateGraph::from_pairs(&[
            ExchangePair::new("usdt", "eth", dec!(0.0005)),
            ExchangePair::new("eth", "btc", dec!(0.05)),
            ExchangePair::new("btc", "usdt", dec!(42000)),
        ]);
        let stables = StableAssetSet::default();
        let limits = SearchLimits {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        // time spent before the search must not eat into its budget
        std::thread::sleep(Duration::from_millis(300));

        let control = limits.start_now();
        let outcome =
            CycleSearch::new(&graph, &stables).find_opportunities_with("usdt", 4, &control);
        assert!(!outcome.truncated);
        assert_eq!(outcome.opportunities.len(), 1);
    }

    #[tokio::test]
    async fn test_search_timeout_from_config() {
        let mut config = Config::default();
        config.search_timeout_ms = Some(60_000);
        let scanner = Scanner::from_config(&config, triangle_source());

        let report = scanner.scan("usdt").await.unwrap();
        assert!(!report.truncated);
        assert_eq!(report.opportunities.len(), 1);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let scanner = Scanner::new(triangle_source(), StableAssetSet::default());
        let report = tokio_test::block_on(scanner.scan("usdt")).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["base"], "usdt");
        assert_eq!(json["opportunities"][0]["closure"], "forced_closure");
        assert_eq!(json["opportunities"][0]["path"][3], "usdt");
    }
}
