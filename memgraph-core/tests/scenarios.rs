//! End-to-end coverage driven through the public `GraphStore` API rather
//! than individual component unit tests.

use memgraph_core::clock::{TestClock, SECONDS_PER_DAY};
use memgraph_core::config::StoreConfig;
use memgraph_core::error::StoreError;
use memgraph_core::store::{GraphStore, Level};

fn store_with(max_tokens: usize, grace_days: f64, orphan_days: f64) -> (GraphStore, std::sync::Arc<TestClock>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new(1_000_000.0);
    let mut cfg = StoreConfig::default();
    cfg.user_path = dir.path().join("user.json");
    cfg.project_path = dir.path().join("project.json");
    cfg.max_tokens = max_tokens;
    cfg.grace_period_days = grace_days;
    cfg.orphan_grace_days = orphan_days;
    let store = GraphStore::with_clock(cfg, clock.clone(), None);
    (store, clock, dir)
}

#[test]
fn archives_lowest_richness_node_under_token_pressure() {
    let (store, clock, _dir) = store_with(80, 7.0, 7.0);

    // A, B, C with gist lengths 40, 80, 40; ts = now-8d, now-8d, now-1d.
    clock.set_secs(1_000_000.0 - 8.0 * SECONDS_PER_DAY);
    store.put_node(Level::User, "a", "g".repeat(40), None, None, None).unwrap();
    store.put_node(Level::User, "b", "g".repeat(80), None, None, None).unwrap();
    clock.set_secs(1_000_000.0 - 1.0 * SECONDS_PER_DAY);
    store.put_node(Level::User, "c", "g".repeat(40), None, None, None).unwrap();
    clock.set_secs(1_000_000.0);

    store.run_maintenance_tick();

    let snapshot = store.read(None);
    let mut ids: Vec<&str> = snapshot.user.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn orphan_deleted_after_grace_expires() {
    // Drive "b" into archival via compaction pressure first (a small
    // max_tokens budget), then drop its only edge, watch it get marked
    // orphaned, then deleted once grace expires.
    let (store, clock, _dir) = store_with(55, 7.0, 7.0);
    // "a" strictly out-scores "b" on every axis (more recent, more touched,
    // richer gist) so the compactor's pick is unambiguous regardless of
    // hash-map iteration order.
    clock.set_secs(1_000_000.0 - 9.0 * SECONDS_PER_DAY);
    store.put_node(Level::User, "b", "g".repeat(4), None, None, None).unwrap();
    clock.set_secs(1_000_000.0 - 8.0 * SECONDS_PER_DAY);
    store
        .put_node(Level::User, "a", "g".repeat(40), Some(vec!["f.rs".into()]), None, None)
        .unwrap();
    clock.set_secs(1_000_000.0);
    store.put_edge(Level::User, "a", "b", "uses", None, None).unwrap();
    store.run_maintenance_tick();
    assert!(!store.read(None).user.nodes.iter().any(|n| n.id == "b"));

    store.delete_edge(Level::User, "a", "b", "uses", None).unwrap();
    store.run_maintenance_tick();

    clock.advance_secs(8.0 * SECONDS_PER_DAY);
    store.run_maintenance_tick();

    let ping = store.ping(None);
    assert_eq!(ping.user_nodes, 1); // only "a" remains active; "b" was pruned.
}

#[test]
fn orphan_reconnection_clears_timer_and_keeps_node_archived() {
    // Drive "b" into archival the same way as the grace-expiry case, then
    // reconnect it with a fresh edge before its orphan grace runs out.
    let (store, clock, _dir) = store_with(55, 7.0, 7.0);
    clock.set_secs(1_000_000.0 - 9.0 * SECONDS_PER_DAY);
    store.put_node(Level::User, "b", "g".repeat(4), None, None, None).unwrap();
    clock.set_secs(1_000_000.0 - 8.0 * SECONDS_PER_DAY);
    store
        .put_node(Level::User, "a", "g".repeat(40), Some(vec!["f.rs".into()]), None, None)
        .unwrap();
    clock.set_secs(1_000_000.0);
    store.put_edge(Level::User, "a", "b", "uses", None, None).unwrap();
    store.run_maintenance_tick();
    assert!(!store.read(None).user.nodes.iter().any(|n| n.id == "b"));

    store.delete_edge(Level::User, "a", "b", "uses", None).unwrap();
    store.run_maintenance_tick(); // "b" is now orphaned.

    clock.advance_secs(6.0 * SECONDS_PER_DAY); // still short of the 7-day grace.
    store.put_edge(Level::User, "a", "b", "uses", None, None).unwrap();
    store.run_maintenance_tick();

    // "b" reconnected before expiry: still archived, no longer an orphan.
    assert!(!store.read(None).user.nodes.iter().any(|n| n.id == "b"));
    clock.advance_secs(2.0 * SECONDS_PER_DAY); // past the original deadline.
    store.run_maintenance_tick();
    let ping = store.ping(None);
    assert_eq!(ping.user_nodes, 1); // "a" active; "b" survived as an archived, reachable node.
}

#[test]
fn sync_excludes_own_writer() {
    let (store, _clock, _dir) = store_with(100_000, 7.0, 7.0);

    let (s1, _) = store.register_session(None);
    let (s2, _) = store.register_session(None);

    store
        .put_node(Level::User, "x", "v1".into(), None, None, Some(&s1))
        .unwrap();

    let sync_s1 = store.sync(&s1, true).unwrap();
    assert_eq!(sync_s1.total_changes, 0);

    let sync_s2 = store.sync(&s2, true).unwrap();
    assert_eq!(sync_s2.user.nodes.len(), 1);
    assert_eq!(sync_s2.user.nodes[0].id, "x");
}

#[test]
fn recalled_node_is_protected_from_immediate_re_archiving() {
    let (store, clock, _dir) = store_with(25, 7.0, 7.0);

    clock.set_secs(1_000_000.0 - 8.0 * SECONDS_PER_DAY);
    store.put_node(Level::User, "n", "g".repeat(40), None, None, None).unwrap();
    clock.set_secs(1_000_000.0);
    store.run_maintenance_tick();
    assert!(!store.read(None).user.nodes.iter().any(|n| n.id == "n"));

    store.recall(Level::User, "n", None).unwrap();
    store.run_maintenance_tick();

    assert!(store.read(None).user.nodes.iter().any(|n| n.id == "n"));
}

#[test]
fn recall_on_non_archived_node_fails() {
    let (store, _clock, _dir) = store_with(100_000, 7.0, 7.0);
    store.put_node(Level::User, "n", "g".into(), None, None, None).unwrap();
    let err = store.recall(Level::User, "n", None).unwrap_err();
    assert_eq!(err, StoreError::NotArchived { level: "user", id: "n".into() });
}

#[test]
fn delete_node_cascades_edges_and_versions() {
    let (store, _clock, _dir) = store_with(100_000, 7.0, 7.0);
    store.put_node(Level::User, "a", "g".into(), None, None, None).unwrap();
    store.put_node(Level::User, "b", "g".into(), None, None, None).unwrap();
    store.put_edge(Level::User, "a", "b", "uses", None, None).unwrap();

    let outcome = store.delete_node(Level::User, "a", None).unwrap();
    assert_eq!(outcome.edges_deleted, 1);

    let snapshot = store.read(None);
    assert!(!snapshot.user.nodes.iter().any(|n| n.id == "a"));
    assert!(snapshot.user.edges.is_empty());
}

#[test]
fn project_level_requires_a_session() {
    let (store, _clock, _dir) = store_with(100_000, 7.0, 7.0);
    let err = store
        .put_node(Level::Project, "p", "g".into(), None, None, None)
        .unwrap_err();
    assert_eq!(err, StoreError::UnknownSession);
}

#[test]
fn read_without_session_yields_empty_project_view() {
    let (store, _clock, _dir) = store_with(100_000, 7.0, 7.0);
    let snapshot = store.read(None);
    assert!(snapshot.project.nodes.is_empty());
    assert!(snapshot.project.edges.is_empty());
}

#[test]
fn atomic_save_survives_interrupted_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let user_path = dir.path().join("user.json");
    let clock = TestClock::new(1_000_000.0);
    let mut cfg = StoreConfig::default();
    cfg.user_path = user_path.clone();
    cfg.project_path = dir.path().join("project.json");

    {
        let store = GraphStore::with_clock(cfg.clone(), clock.clone(), None);
        store.put_node(Level::User, "n", "v0".into(), None, None, None).unwrap();
        store.run_maintenance_tick();
    }
    let v0_bytes = std::fs::read(&user_path).unwrap();

    // Simulate a crash mid-write: a stray temp file is left behind, but the
    // real path was never renamed over, so it must still hold V0.
    std::fs::write(user_path.with_extension("json.tmp"), b"{not valid}").unwrap();

    let store = GraphStore::with_clock(cfg, clock, None);
    let loaded = store.read(None);
    assert_eq!(loaded.user.nodes[0].gist, "v0");
    assert_eq!(std::fs::read(&user_path).unwrap(), v0_bytes);
}
