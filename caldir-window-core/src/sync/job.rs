//! Fetch jobs and the single-flight registry.

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::date_range::{DateRange, contains};

/// How a fetched range is folded into the cached window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// The fetched range becomes the cached window.
    Replace,
    /// The fetched range is unioned into the cached window.
    Merge,
}

/// Handle to one in-flight synchronization cycle.
///
/// Clones share the cancellation token: the registry keeps one clone and the
/// running task observes the other.
#[derive(Debug, Clone)]
pub struct FetchJob {
    id: Uuid,
    range: DateRange,
    mode: FetchMode,
    cancel: CancellationToken,
}

impl FetchJob {
    pub fn new(range: DateRange, mode: FetchMode) -> Self {
        FetchJob {
            id: Uuid::new_v4(),
            range,
            mode,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether completing this job would also satisfy a request for `range` in `mode`.
    /// A replace request is only covered by a replace job, since a merge keeps stale context.
    pub fn covers(&self, range: &DateRange, mode: FetchMode) -> bool {
        let mode_ok = self.mode == FetchMode::Replace || mode == FetchMode::Merge;
        mode_ok && contains(&self.range, range)
    }
}

/// The registry of the one active job, plus the last visible date the
/// scheduler saw. Lives behind the scheduler's mutex.
pub(crate) struct JobRegistry {
    active: Option<FetchJob>,
    last_date: Option<NaiveDate>,
    activity: watch::Sender<Option<Uuid>>,
}

impl JobRegistry {
    pub(crate) fn new() -> Self {
        let (activity, _) = watch::channel(None);
        JobRegistry {
            active: None,
            last_date: None,
            activity,
        }
    }

    pub(crate) fn active(&self) -> Option<&FetchJob> {
        self.active.as_ref()
    }

    pub(crate) fn is_active(&self, id: Uuid) -> bool {
        self.active.as_ref().is_some_and(|job| job.id == id)
    }

    pub(crate) fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    /// Record `date` as the latest visible date, returning the previous one.
    pub(crate) fn observe_date(&mut self, date: NaiveDate) -> Option<NaiveDate> {
        self.last_date.replace(date)
    }

    pub(crate) fn forget_date(&mut self) {
        self.last_date = None;
    }

    /// Cancel whatever is active and make `job` the active one.
    pub(crate) fn register(&mut self, job: FetchJob) {
        if let Some(previous) = self.active.take() {
            debug!(job = %previous.id, range = %previous.range, superseded_by = %job.id, "cancelling superseded fetch");
            previous.cancel();
        }
        self.activity.send_replace(Some(job.id));
        self.active = Some(job);
    }

    pub(crate) fn cancel_active(&mut self) -> Option<FetchJob> {
        let job = self.active.take()?;
        job.cancel();
        self.activity.send_replace(None);
        Some(job)
    }

    /// Deregister `id` if it is still the active job.
    pub(crate) fn finish(&mut self, id: Uuid) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.active = None;
        self.activity.send_replace(None);
        true
    }

    pub(crate) fn subscribe_activity(&self) -> watch::Receiver<Option<Uuid>> {
        self.activity.subscribe()
    }
}
