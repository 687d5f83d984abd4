//! Standalone runtime for the memgraph store: reads configuration from the
//! environment, loads both graph levels, runs the background maintenance
//! loop, and waits for Ctrl+C to shut down cleanly.
//!
//! There is no network listener here — the wire protocol that would sit in
//! front of [`memgraph_core::GraphStore`] is out of scope for this crate;
//! this binary exists to prove the store runs standalone end to end.

use env_logger::Builder;
use memgraph_core::config::StoreConfig;
use memgraph_core::maintenance;
use memgraph_core::store::GraphStore;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    Builder::new()
        .parse_filters(&env::var("MEMGRAPH_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("memgraphd")
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(run());
    log::info!("memgraphd stopped");
}

async fn run() {
    log::info!("memgraphd v{VERSION} starting");
    let config = StoreConfig::from_env();
    let save_interval = Duration::from_secs(config.save_interval_secs);
    let store = Arc::new(GraphStore::new(config, None));

    let handle = maintenance::spawn(store.clone(), save_interval);

    match signal::ctrl_c().await {
        Ok(()) => log::info!("received shutdown signal"),
        Err(e) => log::error!("failed to listen for shutdown signal: {e}"),
    }

    handle.shutdown().await;
}
