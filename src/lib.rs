//! arbiscan - cyclical arbitrage detection over exchange-rate graphs
//!
//! Phase 1 (cartographer) turns quoted pairs into a rate graph with
//! synthesized reverse edges. Phase 2 (brain) walks that graph depth-first
//! from a base asset looking for cycles whose rate product beats 1.

pub mod brain;
pub mod cartographer;
pub mod config;
pub mod scanner;
pub mod tokens;

pub use brain::{ArbitrageOpportunity, Closure, CycleSearch, SearchControl, SearchOutcome};
pub use cartographer::{ExchangePair, PairSource, RateGraph};
pub use config::Config;
pub use scanner::{ScanReport, Scanner};
pub use tokens::StableAssetSet;
