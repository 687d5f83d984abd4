//! In-process knowledge-graph memory store: two graph levels (`user`,
//! `project`), each with percentile-scored compaction, orphan pruning,
//! tiered backups and session-scoped sync, behind a single mutex.
//!
//! This crate has no transport of its own — [`memgraphd`](../memgraphd)
//! wires a [`store::GraphStore`] up to a runtime and a maintenance loop.

pub mod backup;
pub mod broadcast;
pub mod clock;
pub mod compactor;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod model;
pub mod orphan;
pub mod persistence;
pub mod scorer;
pub mod session;
pub mod store;
pub mod tokens;

pub use broadcast::{BroadcastHook, MutationEvent, NullHook};
pub use clock::{Clock, SystemClock, TestClock};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use model::{Edge, Node};
pub use store::{
    DeleteEdgeOutcome, DeleteNodeOutcome, GraphStore, Level, LevelView, PingResult, PutNodeOutcome,
    ReadSnapshot, SyncResult,
};
