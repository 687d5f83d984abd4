//! On-disk format, atomic save, and load for a single graph level.
//!
//! The document shape is stable and compatibility-critical: nodes keyed by id, edges
//! keyed by the canonical `"from->to:rel"` string, and a `_meta.versions`
//! section keyed the same way but prefixed `node:`/`edge:`. We hand-roll the
//! (de)serialization at this boundary rather than deriving it on `Graph`
//! directly, since the in-memory representation (tuple-keyed edge map) and
//! the on-disk one (string-keyed) intentionally differ.

use crate::model::{Edge, Graph, Node, VersionKey, VersionRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct GraphPersistence {
    path: PathBuf,
    backup_marker: PathBuf,
}

impl GraphPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_marker = with_extension_suffix(&path, "last_backup");
        Self { path, backup_marker }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads a level's graph and version table from disk. A missing file
    /// yields empty structures (first run); a malformed file does too, with
    /// the error logged — the caller is expected to keep running on an
    /// empty graph rather than fail startup.
    pub fn load(&self) -> Graph {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Graph::default(),
            Err(e) => {
                log::error!("failed to read graph file {}: {e}", self.path.display());
                return Graph::default();
            }
        };
        match parse_document(&bytes) {
            Ok(graph) => {
                log::info!(
                    "loaded graph from {}: {} nodes, {} edges",
                    self.path.display(),
                    graph.nodes.len(),
                    graph.edges.len()
                );
                graph
            }
            Err(e) => {
                log::error!("graph file {} is corrupted: {e}", self.path.display());
                Graph::default()
            }
        }
    }

    /// Atomically persists a level: write to `<path>.tmp`, flush + fsync,
    /// then rename over `path`. A concurrent reader of the file therefore
    /// only ever observes the previous state or the new one, never a
    /// half-written file. Any failure removes the temp file and returns
    /// `false`; the caller's dirty flag should remain set so the next tick
    /// retries.
    pub fn save(&self, graph: &Graph) -> bool {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::error!("failed to create directory {}: {e}", parent.display());
                return false;
            }
        }
        let tmp_path = with_extension_suffix(&self.path, "tmp");
        match self.write_atomic(&tmp_path, graph) {
            Ok(()) => {
                log::debug!("saved graph to {}", self.path.display());
                true
            }
            Err(e) => {
                log::error!("failed to save graph to {}: {e}", self.path.display());
                let _ = fs::remove_file(&tmp_path);
                false
            }
        }
    }

    fn write_atomic(&self, tmp_path: &Path, graph: &Graph) -> std::io::Result<()> {
        let document = build_document(graph);
        let mut file = File::create(tmp_path)?;
        serde_json::to_writer_pretty(&mut file, &document)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    /// Rotates tiered backups if at least `BACKUP_INTERVAL_SECONDS` elapsed
    /// since the last rotation (gated by `backup_marker`'s mtime). Returns
    /// whether a rotation ran.
    pub fn maybe_backup(&self, now: std::time::SystemTime) -> bool {
        if !self.path.exists() {
            return false;
        }
        if let Ok(meta) = fs::metadata(&self.backup_marker) {
            if let Ok(modified) = meta.modified() {
                if let Ok(age) = now.duration_since(modified) {
                    if age.as_secs_f64() < crate::backup::BACKUP_INTERVAL_SECONDS {
                        return false;
                    }
                }
            }
        }
        crate::backup::rotate(&self.path, now);
        if let Err(e) = touch(&self.backup_marker) {
            log::error!("failed to touch backup marker {}: {e}", self.backup_marker.display());
        }
        true
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    File::create(path)?;
    Ok(())
}

pub fn with_extension_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

fn build_document(graph: &Graph) -> Value {
    let mut nodes = Map::new();
    for (id, node) in &graph.nodes {
        nodes.insert(id.clone(), serde_json::to_value(node).unwrap());
    }

    let mut edges = Map::new();
    for edge in graph.edges.values() {
        let key = format!("{}->{}:{}", edge.from, edge.to, edge.rel);
        edges.insert(key, serde_json::to_value(edge).unwrap());
    }

    let mut versions = Map::new();
    for (key, record) in &graph.versions {
        versions.insert(key.storage_key(), serde_json::to_value(record).unwrap());
    }

    let mut meta = Map::new();
    meta.insert("versions".to_string(), Value::Object(versions));

    let mut doc = Map::new();
    doc.insert("nodes".to_string(), Value::Object(nodes));
    doc.insert("edges".to_string(), Value::Object(edges));
    doc.insert("_meta".to_string(), Value::Object(meta));
    Value::Object(doc)
}

fn parse_document(bytes: &[u8]) -> serde_json::Result<Graph> {
    let doc: Value = serde_json::from_slice(bytes)?;

    let mut nodes: HashMap<String, Node> = HashMap::new();
    if let Some(raw_nodes) = doc.get("nodes").and_then(Value::as_object) {
        for (id, raw) in raw_nodes {
            let node: Node = serde_json::from_value(raw.clone())?;
            nodes.insert(id.clone(), node);
        }
    }

    let mut edges = HashMap::new();
    if let Some(raw_edges) = doc.get("edges").and_then(Value::as_object) {
        for raw in raw_edges.values() {
            let edge: Edge = serde_json::from_value(raw.clone())?;
            edges.insert(edge.key(), edge);
        }
    }

    let mut versions = HashMap::new();
    if let Some(raw_versions) = doc
        .get("_meta")
        .and_then(Value::as_object)
        .and_then(|meta| meta.get("versions"))
        .and_then(Value::as_object)
    {
        for (raw_key, raw) in raw_versions {
            if let Some(key) = VersionKey::parse(raw_key) {
                let record: VersionRecord = serde_json::from_value(raw.clone())?;
                versions.insert(key, record);
            }
        }
    }

    Ok(Graph { nodes, edges, versions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VersionKey;

    #[test]
    fn round_trips_a_populated_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        let persistence = GraphPersistence::new(&path);

        let mut graph = Graph::default();
        graph.nodes.insert(
            "a".into(),
            Node::new("a".into(), "gist".into(), Some(vec!["f.rs".into()]), None),
        );
        graph.edges.insert(
            ("a".into(), "b".into(), "uses".into()),
            Edge { from: "a".into(), to: "b".into(), rel: "uses".into(), notes: None },
        );
        graph.versions.insert(
            VersionKey::Node("a".into()),
            VersionRecord { v: 1, ts: 123.0, session: Some("sess1234".into()) },
        );

        assert!(persistence.save(&graph));
        let loaded = persistence.load();
        assert_eq!(loaded.nodes["a"].gist, "gist");
        assert_eq!(loaded.edges.len(), 1);
        assert_eq!(loaded.versions[&VersionKey::Node("a".into())].v, 1);
    }

    #[test]
    fn missing_file_yields_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = GraphPersistence::new(dir.path().join("nope.json"));
        let graph = persistence.load();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn malformed_file_yields_empty_graph_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        fs::write(&path, b"not json at all").unwrap();
        let graph = GraphPersistence::new(&path).load();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn failed_save_removes_temp_file() {
        // Pointing the path at a directory makes the rename fail, exercising
        // the cleanup branch without needing to simulate a real crash.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("as-a-dir");
        fs::create_dir(&path).unwrap();
        let persistence = GraphPersistence::new(&path);
        let graph = Graph::default();
        assert!(!persistence.save(&graph));
        assert!(!with_extension_suffix(&path, "tmp").exists());
    }
}
