//! Time source used by the store, injectable so tests can simulate grace
//! periods and backup-interval gating without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Seconds since the Unix epoch, as an `f64` to match the on-disk version
/// record's `ts` field.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

/// A clock that can be advanced manually; used by integration tests that
/// exercise grace periods and orphan expiry without real delays.
#[derive(Debug, Default)]
pub struct TestClock {
    millis: AtomicU64,
}

impl TestClock {
    pub fn new(start_secs: f64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicU64::new((start_secs * 1000.0) as u64),
        })
    }

    pub fn advance_secs(&self, secs: f64) {
        self.millis
            .fetch_add((secs * 1000.0) as u64, Ordering::SeqCst);
    }

    pub fn set_secs(&self, secs: f64) {
        self.millis.store((secs * 1000.0) as u64, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> f64 {
        self.millis.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

pub const SECONDS_PER_DAY: f64 = 86_400.0;
