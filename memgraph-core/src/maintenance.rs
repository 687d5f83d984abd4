//! Background maintenance loop: on an interval, compacts, prunes and flushes
//! every loaded level, then reaps expired sessions.
//!
//! Runs as a spawned tokio task; `MaintenanceHandle::shutdown` flips a flag,
//! wakes the sleeping loop immediately and waits for a final flush.

use crate::store::GraphStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct MaintenanceHandle {
    stop: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
    join: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signals the loop to stop, wakes it so it doesn't wait out the rest of
    /// its sleep, and waits for it to perform its final flush and exit.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        if let Err(e) = self.join.await {
            log::error!("maintenance task panicked: {e}");
        }
    }
}

pub fn spawn(store: Arc<GraphStore>, interval: Duration) -> MaintenanceHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let notify = Arc::new(tokio::sync::Notify::new());

    let task_stop = stop.clone();
    let task_notify = notify.clone();
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = task_notify.notified() => {}
            }
            if task_stop.load(Ordering::SeqCst) {
                break;
            }
            store.run_maintenance_tick();
        }
        log::info!("maintenance loop shutting down, flushing dirty levels");
        store.flush();
    });

    MaintenanceHandle { stop, notify, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::config::StoreConfig;
    use crate::store::{GraphStore, Level};

    #[tokio::test(start_paused = true)]
    async fn tick_archives_and_shutdown_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = StoreConfig::default();
        cfg.user_path = dir.path().join("user.json");
        cfg.project_path = dir.path().join("project.json");
        cfg.max_tokens = 10_000;

        let clock = TestClock::new(1_000_000.0);
        let store = Arc::new(GraphStore::with_clock(cfg, clock.clone(), None));
        store
            .put_node(Level::User, "n1", "hello".into(), None, None, None)
            .unwrap();

        let handle = spawn(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert!(store.config().user_path.exists());
    }
}
