//! The graph store itself: per-level state behind one mutex, exposing the
//! put/delete/read/sync/recall operations and the maintenance tick that
//! compacts, prunes and flushes to disk.
//!
//! A single `parking_lot::Mutex` covers every level, every version table
//! and the session table: critical sections are short and
//! `O(|nodes|+|edges|)` at worst, so contention at the graph sizes this is
//! built for is a non-issue.

use crate::broadcast::{BroadcastHook, MutationEvent};
use crate::clock::{Clock, SystemClock};
use crate::compactor::Compactor;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::{Edge, Graph, Node, VersionKey};
use crate::orphan::OrphanPruner;
use crate::persistence::GraphPersistence;
use crate::session::SessionManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    User,
    Project,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::User => "user",
            Level::Project => "project",
        }
    }
}

impl std::str::FromStr for Level {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, StoreError> {
        match s {
            "user" => Ok(Level::User),
            "project" => Ok(Level::Project),
            _ => Err(StoreError::InvalidLevel),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LevelView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Default, Clone)]
pub struct ReadSnapshot {
    pub user: LevelView,
    pub project: LevelView,
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub since_ts: f64,
    pub user: LevelView,
    pub project: LevelView,
    pub total_changes: usize,
}

#[derive(Debug, Clone)]
pub struct PutNodeOutcome {
    pub node: Node,
    pub action: &'static str, // "added" | "updated"
}

#[derive(Debug, Clone)]
pub struct DeleteNodeOutcome {
    pub deleted: String,
    pub edges_deleted: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteEdgeOutcome {
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PingResult {
    pub user_nodes: usize,
    pub user_edges: usize,
    pub project_nodes: usize,
    pub project_edges: usize,
    pub active_sessions: usize,
}

struct LevelState {
    graph: Graph,
    persistence: GraphPersistence,
    dirty: bool,
}

impl LevelState {
    fn load(path: PathBuf) -> Self {
        let persistence = GraphPersistence::new(path);
        let graph = persistence.load();
        Self { graph, persistence, dirty: false }
    }
}

struct Inner {
    user: LevelState,
    /// keyed by canonical project path string; lazily populated on first reference.
    projects: HashMap<String, LevelState>,
    sessions: SessionManager,
}

pub struct GraphStore {
    inner: Mutex<Inner>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    compactor: Compactor,
    pruner: OrphanPruner,
    broadcast: Option<Arc<dyn BroadcastHook>>,
}

impl GraphStore {
    pub fn new(config: StoreConfig, broadcast: Option<Arc<dyn BroadcastHook>>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), broadcast)
    }

    pub fn with_clock(
        config: StoreConfig,
        clock: Arc<dyn Clock>,
        broadcast: Option<Arc<dyn BroadcastHook>>,
    ) -> Self {
        let user = LevelState::load(config.user_path.clone());
        let compactor = Compactor::new(config.grace_period_days, config.max_tokens);
        let pruner = OrphanPruner::new(config.orphan_grace_days);
        let sessions = SessionManager::new(config.session_ttl_secs as f64);
        Self {
            inner: Mutex::new(Inner { user, projects: HashMap::new(), sessions }),
            config,
            clock,
            compactor,
            pruner,
            broadcast,
        }
    }

    fn emit(&self, event: MutationEvent) {
        if let Some(hook) = &self.broadcast {
            hook.on_mutation(event);
        }
    }

    fn ensure_project_loaded<'a>(&self, inner: &'a mut Inner, path: &std::path::Path) -> &'a mut LevelState {
        let key = path.to_string_lossy().into_owned();
        inner
            .projects
            .entry(key)
            .or_insert_with(|| LevelState::load(path.to_path_buf()))
    }

    /// A project-level op requires a live session; the session's registered
    /// `project_path` is used, falling back to the store's configured
    /// default (the single-project variant).
    fn resolve_project_path(&self, sessions: &SessionManager, session_id: Option<&str>) -> StoreResult<PathBuf> {
        let sid = session_id.ok_or(StoreError::UnknownSession)?;
        let session = sessions.get(sid).ok_or(StoreError::UnknownSession)?;
        Ok(session
            .project_path
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.project_path.clone()))
    }

    /// Like [`Self::resolve_project_path`], but for the read path: a
    /// missing or unknown session simply yields no project graph rather
    /// than an error, so `read()` stays usable without a session.
    fn project_path_for_read(&self, sessions: &SessionManager, session_id: Option<&str>) -> Option<PathBuf> {
        let sid = session_id?;
        match sessions.get(sid) {
            Some(session) => Some(
                session
                    .project_path
                    .clone()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.config.project_path.clone()),
            ),
            None => {
                log::warn!("read: unknown session '{sid}', returning empty project graph");
                None
            }
        }
    }

    fn level_state<'a>(
        &self,
        inner: &'a mut Inner,
        level: Level,
        session_id: Option<&str>,
    ) -> StoreResult<&'a mut LevelState> {
        match level {
            Level::User => Ok(&mut inner.user),
            Level::Project => {
                let path = self.resolve_project_path(&inner.sessions, session_id)?;
                Ok(self.ensure_project_loaded(inner, &path))
            }
        }
    }

    fn level_view(graph: &Graph) -> LevelView {
        let active = graph.active_ids();
        let nodes = graph.nodes.values().filter(|n| !n.archived).map(Node::public_view).collect();
        let edges = graph
            .edges
            .values()
            .filter(|e| active.contains(&e.from) || active.contains(&e.to))
            .cloned()
            .collect();
        LevelView { nodes, edges }
    }

    fn level_sync_diff(graph: &Graph, since_ts: f64, session_id: &str, exclude_own: bool) -> LevelView {
        let active = graph.active_ids();
        let is_own = |writer: &Option<String>| exclude_own && writer.as_deref() == Some(session_id);

        let nodes = graph
            .nodes
            .values()
            .filter(|n| !n.archived)
            .filter(|n| {
                graph
                    .versions
                    .get(&VersionKey::Node(n.id.clone()))
                    .is_some_and(|v| v.ts > since_ts && !is_own(&v.session))
            })
            .map(Node::public_view)
            .collect();

        let edges = graph
            .edges
            .values()
            .filter(|e| active.contains(&e.from) || active.contains(&e.to))
            .filter(|e| {
                graph
                    .versions
                    .get(&VersionKey::Edge(e.key()))
                    .is_some_and(|v| v.ts > since_ts && !is_own(&v.session))
            })
            .cloned()
            .collect();

        LevelView { nodes, edges }
    }

    // ------------------------------------------------------------------
    // Public API
    // ------------------------------------------------------------------

    pub fn read(&self, session_id: Option<&str>) -> ReadSnapshot {
        let mut inner = self.inner.lock();
        let user = Self::level_view(&inner.user.graph);
        let project = match self.project_path_for_read(&inner.sessions, session_id) {
            Some(path) => Self::level_view(&self.ensure_project_loaded(&mut inner, &path).graph),
            None => LevelView::default(),
        };
        ReadSnapshot { user, project }
    }

    pub fn register_session(&self, project_path: Option<String>) -> (String, f64) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.sessions.register(now, project_path)
    }

    pub fn sync(&self, session_id: &str, exclude_own: bool) -> StoreResult<SyncResult> {
        let mut inner = self.inner.lock();
        let since_ts = inner.sessions.get(session_id).ok_or(StoreError::UnknownSession)?.start_ts;
        let project_path = self.resolve_project_path(&inner.sessions, Some(session_id));

        let user = Self::level_sync_diff(&inner.user.graph, since_ts, session_id, exclude_own);
        let project = match project_path {
            Ok(path) => {
                let state = self.ensure_project_loaded(&mut inner, &path);
                Self::level_sync_diff(&state.graph, since_ts, session_id, exclude_own)
            }
            Err(_) => LevelView::default(),
        };

        let total_changes = user.nodes.len() + user.edges.len() + project.nodes.len() + project.edges.len();
        Ok(SyncResult { since_ts, user, project, total_changes })
    }

    pub fn put_node(
        &self,
        level: Level,
        id: &str,
        gist: String,
        touches: Option<Vec<String>>,
        notes: Option<Vec<String>>,
        session_id: Option<&str>,
    ) -> StoreResult<PutNodeOutcome> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidArgument("node id must not be empty".into()));
        }
        let now = self.clock.now();
        let level_name = level.as_str();

        let (outcome, event) = {
            let mut inner = self.inner.lock();
            let state = self.level_state(&mut inner, level, session_id)?;
            let existed = state.graph.nodes.contains_key(id);
            let entry = state
                .graph
                .nodes
                .entry(id.to_string())
                .or_insert_with(|| Node::new(id.to_string(), String::new(), None, None));
            entry.gist = gist;
            if let Some(t) = touches {
                entry.touches = Some(t);
            }
            if let Some(n) = notes {
                entry.notes = Some(n);
            }
            // Deliberately does not clear `archived`/`orphaned_since`: an
            // archived node stays archived until an explicit `recall`, so a
            // write never silently revives stale content (open question 1).
            let snapshot = entry.clone();
            state.graph.bump_version(VersionKey::Node(id.to_string()), now, session_id.map(str::to_string));
            state.dirty = true;
            let action = if existed { "updated" } else { "added" };
            (
                PutNodeOutcome { node: snapshot.clone(), action },
                MutationEvent::NodePut { level: level_name, node: snapshot, created: !existed },
            )
        };
        self.emit(event);
        Ok(outcome)
    }

    pub fn put_edge(
        &self,
        level: Level,
        from: &str,
        to: &str,
        rel: &str,
        notes: Option<Vec<String>>,
        session_id: Option<&str>,
    ) -> StoreResult<Edge> {
        if from.trim().is_empty() || to.trim().is_empty() || rel.trim().is_empty() {
            return Err(StoreError::InvalidArgument("from, to and rel must not be empty".into()));
        }
        let now = self.clock.now();
        let level_name = level.as_str();
        let key = (from.to_string(), to.to_string(), rel.to_string());

        let (edge, event) = {
            let mut inner = self.inner.lock();
            let state = self.level_state(&mut inner, level, session_id)?;
            let entry = state.graph.edges.entry(key.clone()).or_insert_with(|| Edge {
                from: from.to_string(),
                to: to.to_string(),
                rel: rel.to_string(),
                notes: None,
            });
            if let Some(n) = notes {
                entry.notes = Some(n);
            }
            let snapshot = entry.clone();
            state.graph.bump_version(VersionKey::Edge(key), now, session_id.map(str::to_string));
            state.dirty = true;
            (snapshot.clone(), MutationEvent::EdgePut { level: level_name, edge: snapshot })
        };
        self.emit(event);
        Ok(edge)
    }

    pub fn delete_node(&self, level: Level, id: &str, session_id: Option<&str>) -> StoreResult<DeleteNodeOutcome> {
        let level_name = level.as_str();
        let (outcome, event) = {
            let mut inner = self.inner.lock();
            let state = self.level_state(&mut inner, level, session_id)?;
            if !state.graph.nodes.contains_key(id) {
                return Err(StoreError::NodeNotFound { level: level_name, id: id.to_string() });
            }
            let edges_deleted = state.graph.cascade_delete_node(id);
            state.dirty = true;
            (
                DeleteNodeOutcome { deleted: id.to_string(), edges_deleted },
                MutationEvent::NodeDeleted { level: level_name, id: id.to_string() },
            )
        };
        self.emit(event);
        Ok(outcome)
    }

    pub fn delete_edge(
        &self,
        level: Level,
        from: &str,
        to: &str,
        rel: &str,
        session_id: Option<&str>,
    ) -> StoreResult<DeleteEdgeOutcome> {
        let level_name = level.as_str();
        let key = (from.to_string(), to.to_string(), rel.to_string());
        let (outcome, event) = {
            let mut inner = self.inner.lock();
            let state = self.level_state(&mut inner, level, session_id)?;
            if state.graph.edges.remove(&key).is_some() {
                state.graph.versions.remove(&VersionKey::Edge(key));
                state.dirty = true;
                (
                    DeleteEdgeOutcome { deleted: true },
                    Some(MutationEvent::EdgeDeleted {
                        level: level_name,
                        from: from.to_string(),
                        to: to.to_string(),
                        rel: rel.to_string(),
                    }),
                )
            } else {
                (DeleteEdgeOutcome { deleted: false }, None)
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
        Ok(outcome)
    }

    pub fn recall(&self, level: Level, id: &str, session_id: Option<&str>) -> StoreResult<Node> {
        let level_name = level.as_str();
        let now = self.clock.now();
        let (snapshot, event) = {
            let mut inner = self.inner.lock();
            let state = self.level_state(&mut inner, level, session_id)?;
            let node = state
                .graph
                .nodes
                .get_mut(id)
                .ok_or_else(|| StoreError::NodeNotFound { level: level_name, id: id.to_string() })?;
            if !node.archived {
                return Err(StoreError::NotArchived { level: level_name, id: id.to_string() });
            }
            node.archived = false;
            node.orphaned_since = None;
            let snapshot = node.clone();
            state.graph.bump_version(VersionKey::Node(id.to_string()), now, session_id.map(str::to_string));
            state.dirty = true;
            (snapshot.clone(), MutationEvent::NodeRecalled { level: level_name, node: snapshot })
        };
        self.emit(event);
        Ok(snapshot)
    }

    pub fn ping(&self, session_id: Option<&str>) -> PingResult {
        let mut inner = self.inner.lock();
        let user_nodes = inner.user.graph.nodes.values().filter(|n| !n.archived).count();
        let user_edges = inner.user.graph.edges.len();
        let (project_nodes, project_edges) = match self.project_path_for_read(&inner.sessions, session_id) {
            Some(path) => {
                let state = self.ensure_project_loaded(&mut inner, &path);
                (
                    state.graph.nodes.values().filter(|n| !n.archived).count(),
                    state.graph.edges.len(),
                )
            }
            None => (0, 0),
        };
        PingResult { user_nodes, user_edges, project_nodes, project_edges, active_sessions: inner.sessions.count() }
    }

    /// One maintenance pass: compact, then prune orphans, then save if
    /// dirty, for every loaded level, followed by session cleanup. Intended
    /// to be called periodically by [`crate::maintenance`].
    pub fn run_maintenance_tick(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        Self::maintain_level(&self.compactor, &self.pruner, &mut inner.user, now);
        let project_keys: Vec<String> = inner.projects.keys().cloned().collect();
        for key in project_keys {
            if let Some(state) = inner.projects.get_mut(&key) {
                Self::maintain_level(&self.compactor, &self.pruner, state, now);
            }
        }

        let expired = inner.sessions.cleanup(now);
        if expired > 0 {
            log::info!("cleaned up {expired} expired session(s)");
        }
    }

    fn maintain_level(compactor: &Compactor, pruner: &OrphanPruner, state: &mut LevelState, now: f64) {
        if !compactor.compact_if_needed(&mut state.graph, now).is_empty() {
            state.dirty = true;
        }
        if !pruner.prune(&mut state.graph, now).is_empty() {
            state.dirty = true;
        }
        if state.dirty {
            if state.persistence.save(&state.graph) {
                state.dirty = false;
                state.persistence.maybe_backup(SystemTime::now());
            }
        }
    }

    /// Flushes every dirty level without running compaction or pruning —
    /// used for the final save on graceful shutdown.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        if inner.user.dirty && inner.user.persistence.save(&inner.user.graph) {
            inner.user.dirty = false;
        }
        for state in inner.projects.values_mut() {
            if state.dirty && state.persistence.save(&state.graph) {
                state.dirty = false;
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}
