//! Bounded Cycle Search
//!
//! Depth-first walk from a start asset, multiplying rates along the way.
//! A path that gets back to the start with a product above 1 is an
//! arbitrage opportunity.
//!
//! Two closure checks exist and stay separate:
//! 1. `natural_return` - the node just entered is a stable asset equal to
//!    the start. The start is visited from the outset, so the walk never
//!    re-enters it and this check does not fire in practice.
//! 2. `forced_closure` - an edge points back at the (visited) start. This
//!    is what actually detects cycles.
//!
//! Path and visited set are scratch buffers shared by the whole walk and
//! restored after every descent. Recorded paths are copies.
//!
//! Worst case is O(branching^max_path_length); keep the bound small
//! (<= 6-8) on dense graphs, or pass a `SearchControl`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::cartographer::{normalize_asset, Edge, RateGraph};
use crate::tokens::StableAssetSet;

/// Shortest path that can close a cycle: start -> X -> start
pub const MIN_PATH_LENGTH: usize = 3;

/// Default bound on path length
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Which check recorded an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    NaturalReturn,
    ForcedClosure,
}

impl std::fmt::Display for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Closure::NaturalReturn => write!(f, "natural"),
            Closure::ForcedClosure => write!(f, "forced"),
        }
    }
}

/// A profitable cycle found by the search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Visited assets, starting and ending at the start asset
    pub path: Vec<String>,
    /// (product of rates - 1) * 100
    pub profit_percentage: Decimal,
    pub closure: Closure,
}

impl ArbitrageOpportunity {
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_closed(&self) -> bool {
        self.path.len() >= 2 && self.path.first() == self.path.last()
    }

    pub fn format_path(&self) -> String {
        self.path.join(" → ")
    }
}

// ============================================
// SEARCH CONTROL
// ============================================

/// Optional limits on a search. The default never trips.
#[derive(Debug, Clone, Default)]
pub struct SearchControl {
    deadline: Option<Instant>,
    max_steps: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Setting the flag to `true` from any thread stops the search
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn should_stop(&self, steps: u64) -> bool {
        if self.max_steps.is_some_and(|max| steps > max) {
            return true;
        }
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Everything a search produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// In discovery order
    pub opportunities: Vec<ArbitrageOpportunity>,
    /// DFS steps taken
    pub steps: u64,
    /// The control stopped the walk early; results are partial
    pub truncated: bool,
}

// ============================================
// CYCLE SEARCH
// ============================================

pub struct CycleSearch<'a> {
    graph: &'a RateGraph,
    stable_assets: &'a StableAssetSet,
}

impl<'a> CycleSearch<'a> {
    pub fn new(graph: &'a RateGraph, stable_assets: &'a StableAssetSet) -> Self {
        Self {
            graph,
            stable_assets,
        }
    }

    /// Every profitable cycle through `start` of at most `max_path_length`
    /// nodes (closing repeat excluded)
    pub fn find_opportunities(
        &self,
        start: &str,
        max_path_length: usize,
    ) -> Vec<ArbitrageOpportunity> {
        self.find_opportunities_with(start, max_path_length, &SearchControl::default())
            .opportunities
    }

    pub fn find_opportunities_with(
        &self,
        start: &str,
        max_path_length: usize,
        control: &SearchControl,
    ) -> SearchOutcome {
        let start = normalize_asset(start);

        if max_path_length < MIN_PATH_LENGTH {
            debug!(
                "max_path_length {} < {}, nothing can close",
                max_path_length, MIN_PATH_LENGTH
            );
            return SearchOutcome::default();
        }

        if !self.graph.contains(&start) {
            debug!("Start asset '{}' is not in the graph", start);
            return SearchOutcome::default();
        }

        let mut traversal = Traversal {
            graph: self.graph,
            stable_assets: self.stable_assets,
            start: start.clone(),
            max_path_length,
            control,
            path: vec![start.clone()],
            visited: HashSet::from([start.clone()]),
            opportunities: Vec::new(),
            steps: 0,
            truncated: false,
        };

        traversal.step(&start, Decimal::ONE);

        debug!(
            "Search from {} (max {}): {} opportunities in {} steps{}",
            start,
            max_path_length,
            traversal.opportunities.len(),
            traversal.steps,
            if traversal.truncated { " [truncated]" } else { "" }
        );

        SearchOutcome {
            opportunities: traversal.opportunities,
            steps: traversal.steps,
            truncated: traversal.truncated,
        }
    }
}

/// Scratch state for one search call
struct Traversal<'a> {
    graph: &'a RateGraph,
    stable_assets: &'a StableAssetSet,
    start: String,
    max_path_length: usize,
    control: &'a SearchControl,
    path: Vec<String>,
    visited: HashSet<String>,
    opportunities: Vec<ArbitrageOpportunity>,
    steps: u64,
    truncated: bool,
}

impl<'a> Traversal<'a> {
    fn step(&mut self, current: &str, accumulated: Decimal) {
        self.steps += 1;
        if self.control.should_stop(self.steps) {
            self.truncated = true;
            return;
        }

        if self.path.len() > self.max_path_length {
            return;
        }

        trace!("step {} | path {:?} | rate {}", self.steps, self.path, accumulated);

        if self.natural_return(current, accumulated) {
            return;
        }

        let graph = self.graph;
        let edges = graph.edges_from(current);
        if edges.is_empty() {
            return;
        }

        for edge in edges {
            if self.truncated {
                return;
            }

            if !self.visited.contains(&edge.to) {
                let Some(next) = accumulated.checked_mul(edge.rate) else {
                    trace!("rate overflow via {} -> {}, pruning", current, edge.to);
                    continue;
                };

                self.visited.insert(edge.to.clone());
                self.path.push(edge.to.clone());

                self.step(&edge.to, next);

                // Backtrack
                self.visited.remove(&edge.to);
                self.path.pop();
            } else {
                self.forced_closure(edge, accumulated);
            }
        }
    }

    /// Closure 1: we just entered a stable asset equal to the start.
    fn natural_return(&mut self, current: &str, accumulated: Decimal) -> bool {
        if self.path.len() < MIN_PATH_LENGTH
            || !self.stable_assets.contains(current)
            || current != self.start
            || accumulated <= Decimal::ONE
        {
            return false;
        }

        let Some(profit_percentage) = profit_percentage(accumulated) else {
            return false;
        };

        self.opportunities.push(ArbitrageOpportunity {
            path: self.path.clone(),
            profit_percentage,
            closure: Closure::NaturalReturn,
        });
        true
    }

    /// Closure 2: an edge leads back to the already-visited start.
    fn forced_closure(&mut self, edge: &Edge, accumulated: Decimal) {
        if edge.to != self.start || self.path.len() < MIN_PATH_LENGTH {
            return;
        }

        let Some(profit_percentage) = accumulated
            .checked_mul(edge.rate)
            .and_then(profit_percentage)
        else {
            return;
        };

        if profit_percentage > Decimal::ZERO {
            let mut path = self.path.clone();
            path.push(edge.to.clone());
            self.opportunities.push(ArbitrageOpportunity {
                path,
                profit_percentage,
                closure: Closure::ForcedClosure,
            });
        }
    }
}

fn profit_percentage(rate_product: Decimal) -> Option<Decimal> {
    rate_product
        .checked_sub(Decimal::ONE)
        .and_then(|gain| gain.checked_mul(HUNDRED))
}

// ============================================
// TESTS
// ============================================
