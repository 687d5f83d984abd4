//! Archives the lowest-scoring nodes until a level's estimated token cost
//! drops to 90% of its budget. Never deletes, never touches version
//! records, never archives a node still inside its grace period.

use crate::model::Graph;
use crate::scorer::NodeScorer;
use crate::tokens;

const COMPACTION_TARGET_RATIO: f64 = 0.9;

pub struct Compactor {
    scorer: NodeScorer,
    max_tokens: usize,
}

impl Compactor {
    pub fn new(grace_period_days: f64, max_tokens: usize) -> Self {
        Self {
            scorer: NodeScorer::new(grace_period_days),
            max_tokens,
        }
    }

    /// Returns the ids archived, in the order they were archived (lowest
    /// score first).
    pub fn compact_if_needed(&self, graph: &mut Graph, now: f64) -> Vec<String> {
        let mut estimated = tokens::estimate_graph(graph);
        if estimated <= self.max_tokens {
            return Vec::new();
        }
        log::info!(
            "compacting: {estimated} tokens exceeds limit of {}",
            self.max_tokens
        );

        let scores = self.scorer.score_all(graph, now);
        if scores.is_empty() {
            log::debug!("no nodes eligible for archiving (all within grace period)");
            return Vec::new();
        }

        let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let target = (self.max_tokens as f64 * COMPACTION_TARGET_RATIO) as usize;
        let mut archived = Vec::new();
        for (id, score) in ranked {
            if estimated <= target {
                break;
            }
            let Some(node) = graph.nodes.get_mut(&id) else {
                continue;
            };
            if node.archived {
                continue;
            }
            let cost = tokens::estimate_node(node);
            node.archived = true;
            estimated = estimated.saturating_sub(cost);
            log::debug!("archived node '{id}' (score: {score:.3}, tokens: {cost})");
            archived.push(id);
        }
        log::info!("compaction complete: archived {} nodes, now ~{estimated} tokens", archived.len());
        archived
    }
}
