//! Closed set of error kinds the store can return to a caller.
//!
//! Every mutator and read accessor returns one of these; the store never panics
//! on a caller-supplied value it merely dislikes. Persistence failures are
//! logged and contained (see [`crate::persistence`]), not surfaced here.

use core::fmt;
use std::error::Error as StdError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `level` was not one of `user` or `project`.
    InvalidLevel,
    /// a session id was required but missing, or didn't resolve to a live session.
    UnknownSession,
    /// a node id didn't exist in the target level.
    NodeNotFound { level: &'static str, id: String },
    /// `recall` was called on a node that wasn't archived.
    NotArchived { level: &'static str, id: String },
    /// a required argument was empty or otherwise malformed.
    InvalidArgument(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLevel => write!(f, "level must be 'user' or 'project'"),
            Self::UnknownSession => write!(f, "unknown session"),
            Self::NodeNotFound { level, id } => {
                write!(f, "node '{id}' not found in {level} graph")
            }
            Self::NotArchived { level, id } => {
                write!(f, "node '{id}' is not archived in {level} graph")
            }
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl StdError for StoreError {}

impl StoreError {
    /// The message shown to RPC callers, wrapped as `{"error": ...}` by the transport layer.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
