//! Phase 1: The Cartographer (Data Ingest)
//!
//! Pair sources feed quotes in; the rate graph comes out.

mod fetcher;
mod graph;

pub use fetcher::{CoinGeckoTickers, ExchangePair, PairSource, StaticPairs, COINGECKO_API_URL};
pub use graph::{normalize_asset, Edge, PairRejection, RateGraph};
