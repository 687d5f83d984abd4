//! The node/edge/version shapes that make up a single graph level.
//!
//! `Node` and `Edge` double as both the in-memory representation and the
//! serde shape persisted to disk (see [`crate::persistence`]); the internal
//! `archived`/`orphaned_since` flags are renamed on the wire and stripped
//! entirely from read-path snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NodeId = String;

/// A `(from, to, rel)` triple. Endpoints are plain id references, not
/// pointers: an edge may name an id that is archived or altogether absent
/// from the node map (see `orphan` for how that's reconciled).
pub type EdgeKey = (String, String, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub gist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(
        rename = "_archived",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub archived: bool,
    #[serde(rename = "_orphaned_ts", default, skip_serializing_if = "Option::is_none")]
    pub orphaned_since: Option<f64>,
}

impl Node {
    pub fn new(id: NodeId, gist: String, touches: Option<Vec<String>>, notes: Option<Vec<String>>) -> Self {
        Self {
            id,
            gist,
            touches,
            notes,
            archived: false,
            orphaned_since: None,
        }
    }

    /// The immutable copy handed back to callers on the read path: never
    /// carries `archived`/`orphaned_since`, since those are internal.
    pub fn public_view(&self) -> Node {
        Node {
            id: self.id.clone(),
            gist: self.gist.clone(),
            touches: self.touches.clone(),
            notes: self.notes.clone(),
            archived: false,
            orphaned_since: None,
        }
    }

    pub fn touches_len(&self) -> usize {
        self.touches.as_ref().map_or(0, Vec::len)
    }

    pub fn notes_chars(&self) -> usize {
        self.notes
            .as_ref()
            .map_or(0, |notes| notes.iter().map(String::len).sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub rel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        (self.from.clone(), self.to.clone(), self.rel.clone())
    }
}

/// Composite key for a version record: `node:<id>` or `edge:<from>-><to>:<rel>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionKey {
    Node(NodeId),
    Edge(EdgeKey),
}

impl VersionKey {
    pub fn storage_key(&self) -> String {
        match self {
            Self::Node(id) => format!("node:{id}"),
            Self::Edge((from, to, rel)) => format!("edge:{from}->{to}:{rel}"),
        }
    }

    /// Parses a persisted `_meta.versions` key back into a `VersionKey`.
    /// Unrecognized keys (neither `node:` nor `edge:`) are dropped by the
    /// caller; malformed edge keys (missing `->` or `:`) are dropped too.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(id) = raw.strip_prefix("node:") {
            return Some(Self::Node(id.to_owned()));
        }
        let rest = raw.strip_prefix("edge:")?;
        let (from_to, rel) = rest.rsplit_once(':')?;
        let (from, to) = from_to.split_once("->")?;
        Some(Self::Edge((from.to_owned(), to.to_owned(), rel.to_owned())))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub v: u64,
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// One graph level's live state: nodes, edges, and their version history.
/// Owned exclusively by the store; never handed out by reference.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: HashMap<NodeId, Node>,
    pub edges: HashMap<EdgeKey, Edge>,
    pub versions: HashMap<VersionKey, VersionRecord>,
}

impl Graph {
    /// Ids of nodes that are present and not archived.
    pub fn active_ids(&self) -> std::collections::HashSet<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| !n.archived)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn bump_version(&mut self, key: VersionKey, ts: f64, session: Option<String>) -> u64 {
        let entry = self.versions.entry(key).or_insert(VersionRecord {
            v: 0,
            ts,
            session: None,
        });
        entry.v += 1;
        entry.ts = ts;
        entry.session = session;
        entry.v
    }

    /// Removes a node's incident edges, the node itself, and every version
    /// record touched, as a single cascading unit.
    pub fn cascade_delete_node(&mut self, id: &str) -> usize {
        let victims: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(from, to, _)| from == id || to == id)
            .cloned()
            .collect();
        for key in &victims {
            self.edges.remove(key);
            self.versions.remove(&VersionKey::Edge(key.clone()));
        }
        self.nodes.remove(id);
        self.versions.remove(&VersionKey::Node(id.to_owned()));
        victims.len()
    }
}
