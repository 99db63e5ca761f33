use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct SyncStatsInner {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    events_written: AtomicU64,
}

/// Job lifecycle counters. Once no job is active,
/// `started == completed + failed + cancelled`.
#[derive(Clone, Default)]
pub struct SyncStats {
    inner: Arc<SyncStatsInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub events_written: u64,
}

impl SyncStatsSnapshot {
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

impl SyncStats {
    pub fn new() -> Self {
        SyncStats::default()
    }

    pub(crate) fn record_started(&self) {
        self.inner.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self, events: usize) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .events_written
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.inner.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            started: self.inner.started.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            cancelled: self.inner.cancelled.load(Ordering::Relaxed),
            events_written: self.inner.events_written.load(Ordering::Relaxed),
        }
    }
}
