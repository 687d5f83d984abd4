//! Short-lived session ids that attribute writes and anchor `sync` diffs.
//!
//! Expiry is checked lazily on each maintenance tick, not on a timer of its
//! own: a stale id used between ticks is simply reported as unknown.

use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub start_ts: f64,
    /// Set when this session registered against a specific project path;
    /// absent sessions fall back to the store's configured default project
    /// (the single-project deployment shape).
    pub project_path: Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    ttl_secs: f64,
}

impl SessionManager {
    pub fn new(ttl_secs: f64) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl_secs,
        }
    }

    /// Issues an opaque 8-character session id. Collisions are not checked
    /// for explicitly: at the expected session-table scale the odds of a
    /// UUIDv4 prefix collision are negligible.
    pub fn register(&mut self, now: f64, project_path: Option<String>) -> (String, f64) {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                start_ts: now,
                project_path,
            },
        );
        (id, now)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Discards sessions whose `start_ts` precedes `now - ttl`. Returns the
    /// number removed.
    pub fn cleanup(&mut self, now: f64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.start_ts <= self.ttl_secs);
        before - self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_session_is_retrievable() {
        let mut mgr = SessionManager::new(86_400.0);
        let (id, ts) = mgr.register(1000.0, None);
        assert_eq!(id.len(), 8);
        let session = mgr.get(&id).unwrap();
        assert_eq!(session.start_ts, ts);
    }

    #[test]
    fn expired_sessions_are_cleaned_up() {
        let mut mgr = SessionManager::new(100.0);
        let (id, _) = mgr.register(0.0, None);
        assert!(mgr.get(&id).is_some());
        let removed = mgr.cleanup(50.0);
        assert_eq!(removed, 0);
        let removed = mgr.cleanup(200.0);
        assert_eq!(removed, 1);
        assert!(mgr.get(&id).is_none());
    }
}
