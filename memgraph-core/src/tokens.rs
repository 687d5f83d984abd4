//! Deterministic, integer-only token cost estimates.
//!
//! Pure functions over a [`Graph`](crate::model::Graph): no I/O, no clock,
//! same inputs always produce the same estimate.

use crate::model::{Graph, Node};

pub const BASE_NODE_TOKENS: usize = 20;
pub const CHARS_PER_TOKEN: usize = 4;
pub const TOKENS_PER_EDGE: usize = 15;

/// Token cost of a single node, regardless of archived state — callers that
/// want the live-budget contribution filter archived nodes out first.
pub fn estimate_node(node: &Node) -> usize {
    let gist_tokens = node.gist.len() / CHARS_PER_TOKEN;
    let notes_tokens = node
        .notes
        .as_ref()
        .map_or(0, |notes| notes.iter().map(|n| n.len() / CHARS_PER_TOKEN).sum());
    BASE_NODE_TOKENS + gist_tokens + notes_tokens
}

/// Total token cost of a level: active nodes plus a flat per-edge cost.
/// Archived nodes contribute nothing (invariant 3).
pub fn estimate_graph(graph: &Graph) -> usize {
    let node_tokens: usize = graph
        .nodes
        .values()
        .filter(|n| !n.archived)
        .map(estimate_node)
        .sum();
    node_tokens + graph.edges.len() * TOKENS_PER_EDGE
}
