//! Store configuration, read from environment or constructed directly.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_tokens: usize,
    pub grace_period_days: f64,
    pub orphan_grace_days: f64,
    pub save_interval_secs: u64,
    pub session_ttl_secs: u64,
    pub user_path: PathBuf,
    /// Default project graph path, used when a session registers without
    /// an explicit `project_path` (the single-project variant).
    pub project_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_tokens: 5000,
            grace_period_days: 7.0,
            orphan_grace_days: 7.0,
            save_interval_secs: 30,
            session_ttl_secs: 86_400,
            user_path: PathBuf::from("user.json"),
            project_path: PathBuf::from("project.json"),
        }
    }
}

impl StoreConfig {
    /// Overlays values found in the process environment on top of the
    /// defaults. Unset or unparsable variables are left at their default,
    /// distinguishing "absent" from "present but invalid".
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("MEMGRAPH_MAX_TOKENS") {
            if let Ok(v) = v.parse() {
                cfg.max_tokens = v;
            }
        }
        if let Ok(v) = std::env::var("MEMGRAPH_GRACE_PERIOD_DAYS") {
            if let Ok(v) = v.parse() {
                cfg.grace_period_days = v;
            }
        }
        if let Ok(v) = std::env::var("MEMGRAPH_ORPHAN_GRACE_DAYS") {
            if let Ok(v) = v.parse() {
                cfg.orphan_grace_days = v;
            }
        }
        if let Ok(v) = std::env::var("MEMGRAPH_SAVE_INTERVAL_SECS") {
            if let Ok(v) = v.parse() {
                cfg.save_interval_secs = v;
            }
        }
        if let Ok(v) = std::env::var("MEMGRAPH_SESSION_TTL_SECS") {
            if let Ok(v) = v.parse() {
                cfg.session_ttl_secs = v;
            }
        }
        if let Ok(v) = std::env::var("MEMGRAPH_USER_PATH") {
            cfg.user_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEMGRAPH_PROJECT_PATH") {
            cfg.project_path = PathBuf::from(v);
        }
        cfg
    }
}
