//! Phase 2: The Brain
//!
//! Responsible for:
//! - Walking the rate graph for profitable cycles through a start asset
//! - Bounding the walk (path length, optional deadline/step budget/cancel)

mod cycle_search;

pub use cycle_search::{
    ArbitrageOpportunity, Closure, CycleSearch, SearchControl, SearchOutcome,
    DEFAULT_MAX_PATH_LENGTH, MIN_PATH_LENGTH,
};
