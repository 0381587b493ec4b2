//! Stable asset definitions
//!
//! The stable set is a closure-eligibility filter only. It never changes
//! the graph topology.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cartographer::normalize_asset;

/// Stablecoins recognised out of the box
pub const DEFAULT_STABLE_ASSETS: [&str; 4] = ["usdt", "usdc", "busd", "dai"];

/// Set of asset ids treated as stable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableAssetSet {
    assets: HashSet<String>,
}

impl StableAssetSet {
    pub fn new<I, S>(assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            assets: assets
                .into_iter()
                .map(|a| normalize_asset(a.as_ref()))
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.assets.contains(asset)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Sorted, for stable display
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut assets: Vec<String> = self.assets.iter().cloned().collect();
        assets.sort();
        assets
    }
}

impl Default for StableAssetSet {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_ASSETS)
    }
}
