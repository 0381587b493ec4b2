//! Graph Construction
//!
//! Turns a flat list of quoted pairs into a directed rate graph.
//! Every accepted pair contributes two edges: the quoted direction with
//! the quoted rate, and the synthesized reverse direction with `1/rate`.
//!
//! Bad quotes (blank ids, zero or negative rates) are skipped and counted
//! so one broken ticker never takes down a whole scan.

use petgraph::graph::{DiGraph, NodeIndex};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::ExchangePair;

/// Canonical form of an asset id: trimmed, lowercase.
pub fn normalize_asset(id: &str) -> String {
    id.trim().to_lowercase()
}

/// One outgoing edge, as seen by the search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub to: String,
    pub rate: Decimal,
}

/// Why a pair was kept out of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRejection {
    BlankAsset,
    NonPositiveRate,
    UninvertibleRate,
}

impl std::fmt::Display for PairRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairRejection::BlankAsset => write!(f, "blank asset id"),
            PairRejection::NonPositiveRate => write!(f, "non-positive rate"),
            PairRejection::UninvertibleRate => write!(f, "rate has no representable inverse"),
        }
    }
}

/// The rate graph
pub struct RateGraph {
    graph: DiGraph<String, Decimal>,
    asset_to_node: HashMap<String, NodeIndex>,
    /// Outgoing edges per node, in insertion order
    adjacency: Vec<Vec<Edge>>,
    skipped: usize,
}

impl RateGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            asset_to_node: HashMap::new(),
            adjacency: Vec::new(),
            skipped: 0,
        }
    }

    pub fn from_pairs(pairs: &[ExchangePair]) -> Self {
        let mut graph = Self::new();

        for pair in pairs {
            if let Err(reason) = graph.add_pair(pair) {
                debug!(
                    "Skipping pair {}/{} @ {}: {}",
                    pair.base, pair.target, pair.rate, reason
                );
                graph.skipped += 1;
            }
        }

        info!(
            "Graph built: {} Nodes, {} Edges",
            graph.node_count(),
            graph.edge_count()
        );

        if graph.skipped > 0 {
            warn!("  Skipped {} pairs with invalid quotes", graph.skipped);
        }

        graph
    }

    /// Add both directions of a pair. Nothing is touched when the pair is
    /// rejected.
    pub fn add_pair(&mut self, pair: &ExchangePair) -> Result<(), PairRejection> {
        let base = normalize_asset(&pair.base);
        let target = normalize_asset(&pair.target);

        if base.is_empty() || target.is_empty() {
            return Err(PairRejection::BlankAsset);
        }

        if pair.rate <= Decimal::ZERO {
            return Err(PairRejection::NonPositiveRate);
        }

        let inverse = Decimal::ONE
            .checked_div(pair.rate)
            .filter(|inv| *inv > Decimal::ZERO)
            .ok_or(PairRejection::UninvertibleRate)?;

        let base_node = self.get_or_create_node(&base);
        let target_node = self.get_or_create_node(&target);

        self.graph.add_edge(base_node, target_node, pair.rate);
        self.graph.add_edge(target_node, base_node, inverse);

        self.adjacency[base_node.index()].push(Edge {
            to: target,
            rate: pair.rate,
        });
        self.adjacency[target_node.index()].push(Edge {
            to: base,
            rate: inverse,
        });

        Ok(())
    }

    fn get_or_create_node(&mut self, asset: &str) -> NodeIndex {
        if let Some(&node) = self.asset_to_node.get(asset) {
            return node;
        }

        let node = self.graph.add_node(asset.to_string());
        self.asset_to_node.insert(asset.to_string(), node);
        self.adjacency.push(Vec::new());
        node
    }

    pub fn get_node(&self, asset: &str) -> Option<NodeIndex> {
        self.asset_to_node.get(asset).copied()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.asset_to_node.contains_key(asset)
    }

    /// Outgoing edges of `asset` in the order their pairs were added.
    /// Unknown assets have no edges.
    pub fn edges_from(&self, asset: &str) -> &[Edge] {
        self.get_node(asset)
            .and_then(|node| self.adjacency.get(node.index()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Pairs rejected while building
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Default for RateGraph {
    fn default() -> Self {
        Self::new()
    }
}
