//! Percentile-ranked node scoring for compaction decisions.
//!
//! The policy is self-calibrating: whatever the current graph looks like,
//! there's always a "bottom" to shed, regardless of the absolute scale of
//! recency, connectedness or richness.

use crate::clock::SECONDS_PER_DAY;
use crate::model::{Graph, NodeId, VersionKey};
use std::collections::HashMap;

pub struct NodeScorer {
    grace_period_secs: f64,
}

impl NodeScorer {
    pub fn new(grace_period_days: f64) -> Self {
        Self {
            grace_period_secs: grace_period_days * SECONDS_PER_DAY,
        }
    }

    /// Scores every active node whose last write is older than the grace
    /// period. Nodes within grace are simply absent from the result
    /// (protected); callers must not treat an absent score as zero.
    pub fn score_all(&self, graph: &Graph, now: f64) -> HashMap<NodeId, f64> {
        let mut edge_count: HashMap<&str, usize> = HashMap::new();
        for (from, to, _) in graph.edges.keys() {
            *edge_count.entry(from.as_str()).or_insert(0) += 1;
            *edge_count.entry(to.as_str()).or_insert(0) += 1;
        }

        struct Eligible<'a> {
            id: &'a NodeId,
            recency_raw: f64,
            connectedness_raw: usize,
            richness_raw: usize,
        }

        let mut eligible: Vec<Eligible> = graph
            .nodes
            .iter()
            .filter(|(_, node)| !node.archived)
            .filter_map(|(id, node)| {
                let ts = graph
                    .versions
                    .get(&VersionKey::Node(id.clone()))
                    .map_or(now, |v| v.ts);
                let age = now - ts;
                if age < self.grace_period_secs {
                    return None;
                }
                Some(Eligible {
                    id,
                    recency_raw: ts,
                    connectedness_raw: edge_count.get(id.as_str()).copied().unwrap_or(0)
                        + node.touches_len(),
                    richness_raw: node.gist.len() + node.notes_chars(),
                })
            })
            .collect();

        if eligible.is_empty() {
            return HashMap::new();
        }

        // `graph.nodes` is a HashMap, so its iteration order is not stable
        // across runs; fix a deterministic base order by id before the
        // metric sorts below, so ties between otherwise-equal nodes resolve
        // the same way every time rather than depending on hash order.
        eligible.sort_by(|a, b| a.id.cmp(b.id));

        let n = eligible.len();
        let percentile_of = |rank: usize| -> f64 {
            if n > 1 {
                rank as f64 / (n - 1) as f64
            } else {
                0.5
            }
        };

        let mut recency_pct = HashMap::with_capacity(n);
        eligible.sort_by(|a, b| a.recency_raw.partial_cmp(&b.recency_raw).unwrap());
        for (rank, e) in eligible.iter().enumerate() {
            recency_pct.insert(e.id.clone(), percentile_of(rank));
        }

        let mut connectedness_pct = HashMap::with_capacity(n);
        eligible.sort_by_key(|e| e.connectedness_raw);
        for (rank, e) in eligible.iter().enumerate() {
            connectedness_pct.insert(e.id.clone(), percentile_of(rank));
        }

        let mut richness_pct = HashMap::with_capacity(n);
        eligible.sort_by_key(|e| e.richness_raw);
        for (rank, e) in eligible.iter().enumerate() {
            richness_pct.insert(e.id.clone(), percentile_of(rank));
        }

        eligible
            .iter()
            .map(|e| {
                let score = recency_pct[e.id] * connectedness_pct[e.id] * richness_pct[e.id];
                (e.id.clone(), score)
            })
            .collect()
    }
}
