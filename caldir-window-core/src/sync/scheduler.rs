//! Decides whether, what and how to fetch when the visible date moves.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use super::executor::SyncExecutor;
use super::job::{FetchJob, FetchMode, JobRegistry};
use super::network_status::NetworkState;
use super::{FetchDecision, SyncShared};
use crate::auth::Auth;
use crate::config::WindowConfig;
use crate::date_range::{DateRange, is_jump, prefetch_delta};
use crate::error::{SyncError, SyncResult};
use crate::store::LocalStore;

/// Single point of decision for fetching. Every decision, cancellation and
/// registration happens under the registry mutex in `SyncShared`.
pub struct FetchScheduler {
    shared: Arc<SyncShared>,
    executor: Arc<SyncExecutor>,
    auth: Arc<dyn Auth>,
    store: Arc<dyn LocalStore>,
    window: WindowConfig,
}

/// Awaitable outcome of a started job. Dropping it leaves the job running.
pub struct RefreshHandle {
    job_id: Uuid,
    range: DateRange,
    outcome: oneshot::Receiver<SyncResult<usize>>,
}

impl RefreshHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Wait for the job to finish. Returns the number of events written, or
    /// `SyncError::Cancelled` if a later request superseded it.
    pub async fn wait(self) -> SyncResult<usize> {
        self.outcome.await.unwrap_or(Err(SyncError::Cancelled))
    }
}

impl FetchScheduler {
    pub(crate) fn new(
        shared: Arc<SyncShared>,
        executor: Arc<SyncExecutor>,
        auth: Arc<dyn Auth>,
        store: Arc<dyn LocalStore>,
        window: WindowConfig,
    ) -> Self {
        FetchScheduler {
            shared,
            executor,
            auth,
            store,
            window,
        }
    }

    pub async fn on_visible_date_changed(&self, date: NaiveDate, force_refresh: bool) -> FetchDecision {
        if !self.auth.current_auth_state().signed_in {
            debug!(%date, "not signed in, skipping fetch");
            return FetchDecision::NotSignedIn;
        }

        let mut registry = self.shared.registry.lock().await;
        let previous = registry.observe_date(date);
        let decision = self.decide(&registry, date, previous, force_refresh);

        match decision {
            FetchDecision::Fetch { range, mode } => {
                debug!(%date, %range, ?mode, force_refresh, "scheduling fetch");
                drop(self.start(&mut registry, range, mode));
            }
            FetchDecision::AlreadyInFlight { range } => {
                debug!(%date, %range, "request already covered by active fetch");
            }
            FetchDecision::NoOp | FetchDecision::NotSignedIn => {}
        }

        decision
    }

    fn decide(
        &self,
        registry: &JobRegistry,
        date: NaiveDate,
        previous: Option<NaiveDate>,
        force_refresh: bool,
    ) -> FetchDecision {
        let w = &self.window;
        let cached = self.shared.range.current();

        if !force_refresh && previous == Some(date) && cached.is_some() {
            return FetchDecision::NoOp;
        }

        let ideal = DateRange::around(date, w.backward_days, w.forward_days);

        if force_refresh {
            return FetchDecision::Fetch {
                range: ideal,
                mode: FetchMode::Replace,
            };
        }

        let Some(cached) = cached else {
            return unless_in_flight(registry, ideal, FetchMode::Replace);
        };

        if is_jump(date, &cached, w.jump_buffer_days) {
            debug!(%date, %cached, "jump outside cached window");
            return unless_in_flight(registry, ideal, FetchMode::Replace);
        }

        match prefetch_delta(date, &cached, w.prefetch_threshold_days, w.prefetch_chunk_days) {
            Some(delta) => unless_in_flight(registry, delta, FetchMode::Merge),
            None => FetchDecision::NoOp,
        }
    }

    /// Cancel the active job, register a new one for `range` and spawn it.
    fn start(&self, registry: &mut JobRegistry, range: DateRange, mode: FetchMode) -> RefreshHandle {
        let job = FetchJob::new(range, mode);
        let job_id = job.id();
        registry.register(job.clone());

        let (tx, outcome) = oneshot::channel();
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let result = executor.run_supervised(job).await;
            let _ = tx.send(result);
        });

        RefreshHandle {
            job_id,
            range,
            outcome,
        }
    }

    /// Cancel whatever is running and reload the window around `center`.
    pub async fn refresh(&self, center: NaiveDate) -> SyncResult<RefreshHandle> {
        self.refresh_with(|_| center).await
    }

    /// Like `refresh`, centered on the last visible date if there is one.
    pub(crate) async fn refresh_visible_or(&self, fallback: NaiveDate) -> SyncResult<RefreshHandle> {
        self.refresh_with(|previous| previous.unwrap_or(fallback)).await
    }

    async fn refresh_with(
        &self,
        pick_center: impl FnOnce(Option<NaiveDate>) -> NaiveDate,
    ) -> SyncResult<RefreshHandle> {
        if !self.auth.current_auth_state().signed_in {
            return Err(SyncError::NotSignedIn);
        }

        let w = &self.window;
        let mut registry = self.shared.registry.lock().await;
        let center = pick_center(registry.last_date());
        registry.observe_date(center);

        let range = DateRange::around(center, w.backward_days, w.forward_days);
        info!(%center, %range, "manual refresh");
        Ok(self.start(&mut registry, range, FetchMode::Replace))
    }

    /// Forget the cached window and wipe the local store.
    pub async fn clear(&self) -> SyncResult<()> {
        let mut registry = self.shared.registry.lock().await;

        if let Some(job) = registry.cancel_active() {
            debug!(job = %job.id(), "cancelled fetch on clear");
        }
        // Nothing is active from here on, so Loading must not outlive the cancel.
        if self.shared.network.current().is_loading() {
            self.shared.network.set(NetworkState::Idle);
        }
        registry.forget_date();
        self.shared.range.clear();

        match self.store.delete_all().await {
            Ok(()) => {
                self.shared.network.set(NetworkState::Idle);
                info!("local cache cleared");
                Ok(())
            }
            Err(e) => {
                self.shared.network.set(NetworkState::Error(e.to_string()));
                Err(e)
            }
        }
    }
}

/// Fetch `range` unless the active job will already satisfy it.
fn unless_in_flight(registry: &JobRegistry, range: DateRange, mode: FetchMode) -> FetchDecision {
    match registry.active() {
        Some(job) if job.covers(&range, mode) => FetchDecision::AlreadyInFlight { range: job.range() },
        _ => FetchDecision::Fetch { range, mode },
    }
}
