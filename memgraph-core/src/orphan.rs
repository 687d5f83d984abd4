//! Marks archived nodes with zero active neighbors as orphans, and deletes
//! them once they've stayed orphaned past grace.

use crate::clock::SECONDS_PER_DAY;
use crate::model::Graph;
use std::collections::HashSet;

pub struct OrphanPruner {
    grace_secs: f64,
}

impl OrphanPruner {
    pub fn new(orphan_grace_days: f64) -> Self {
        Self {
            grace_secs: orphan_grace_days * SECONDS_PER_DAY,
        }
    }

    /// Runs one maintenance-tick pass over a level: reconnects orphans that
    /// regained an active neighbor, marks newly-unreachable archived nodes,
    /// and cascades-deletes any whose grace has expired. Returns the ids
    /// deleted.
    pub fn prune(&self, graph: &mut Graph, now: f64) -> Vec<String> {
        let active = graph.active_ids();

        let mut reachable: HashSet<String> = HashSet::new();
        for (from, to, _) in graph.edges.keys() {
            if active.contains(from) {
                reachable.insert(to.clone());
            }
            if active.contains(to) {
                reachable.insert(from.clone());
            }
        }

        let mut to_delete = Vec::new();
        for (id, node) in graph.nodes.iter_mut() {
            if !node.archived {
                continue;
            }
            if reachable.contains(id) {
                if node.orphaned_since.take().is_some() {
                    log::debug!("node '{id}' reconnected, clearing orphan timer");
                }
            } else {
                match node.orphaned_since {
                    None => {
                        node.orphaned_since = Some(now);
                        log::debug!("node '{id}' orphaned");
                    }
                    Some(since) if now - since > self.grace_secs => {
                        to_delete.push(id.clone());
                    }
                    Some(_) => {}
                }
            }
        }

        for id in &to_delete {
            graph.cascade_delete_node(id);
            log::info!("pruned orphaned node '{id}'");
        }
        to_delete
    }
}
