//! One fetch-and-store cycle.

use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{FetchJob, FetchMode, JobRegistry};
use super::network_status::NetworkState;
use super::SyncShared;
use crate::auth::{Auth, Token};
use crate::config::AuthConfig;
use crate::error::{SyncError, SyncResult};
use crate::event::EventRecord;
use crate::remote::RemoteSource;
use crate::settings::Settings;
use crate::store::LocalStore;

/// Runs fetch jobs: token, remote fetch, then an atomic store write.
///
/// Cancellation is observed while waiting for a token, during the retry
/// delay, while the remote call is pending, and once more under the registry
/// lock right before the write. A write that has begun always finishes.
pub struct SyncExecutor {
    shared: Arc<SyncShared>,
    auth: Arc<dyn Auth>,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn LocalStore>,
    settings: Arc<dyn Settings>,
    retry: AuthConfig,
}

impl SyncExecutor {
    pub(crate) fn new(
        shared: Arc<SyncShared>,
        auth: Arc<dyn Auth>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn LocalStore>,
        settings: Arc<dyn Settings>,
        retry: AuthConfig,
    ) -> Self {
        SyncExecutor {
            shared,
            auth,
            remote,
            store,
            settings,
            retry,
        }
    }

    /// Run `job` on its own task so that a panic inside the cycle still ends
    /// in a terminal network state.
    pub(crate) async fn run_supervised(self: Arc<Self>, job: FetchJob) -> SyncResult<usize> {
        let runner = Arc::clone(&self);
        let task_job = job.clone();

        match tokio::spawn(async move { runner.run(&task_job).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let outcome = Err(SyncError::Internal(join_err.to_string()));
                let mut registry = self.shared.registry.lock().await;
                self.settle(&mut registry, &job, &outcome);
                outcome
            }
        }
    }

    pub(crate) async fn run(&self, job: &FetchJob) -> SyncResult<usize> {
        self.shared.stats.record_started();
        debug!(job = %job.id(), range = %job.range(), mode = ?job.mode(), "fetch started");

        let outcome = match self.fetch(job).await {
            Ok(records) => return self.commit(job, records).await,
            Err(e) => Err(e),
        };

        let mut registry = self.shared.registry.lock().await;
        self.settle(&mut registry, job, &outcome);
        outcome
    }

    async fn fetch(&self, job: &FetchJob) -> SyncResult<Vec<EventRecord>> {
        self.begin(job).await?;

        let cancel = job.cancellation();
        let token = self.acquire_token(cancel).await?;
        let records = cancellable(cancel, self.remote.fetch_events(&job.range(), &token)).await?;

        debug!(job = %job.id(), events = records.len(), "remote returned events");
        Ok(records)
    }

    /// Flip the signal to Loading, unless the job was superseded before it got to run.
    async fn begin(&self, job: &FetchJob) -> SyncResult<()> {
        let registry = self.shared.registry.lock().await;
        if job.is_cancelled() || !registry.is_active(job.id()) {
            return Err(SyncError::Cancelled);
        }
        self.shared.network.set(NetworkState::Loading);
        Ok(())
    }

    /// Get a token, retrying a bounded number of times with a fixed delay.
    pub(crate) async fn acquire_token(&self, cancel: &CancellationToken) -> SyncResult<Token> {
        let attempts = self.retry.token_retries + 1;

        for attempt in 1..=attempts {
            let token = cancellable(cancel, async { Ok(self.auth.fresh_token().await) }).await?;
            if let Some(token) = token {
                return Ok(token);
            }

            if attempt < attempts {
                warn!(attempt, attempts, delay = ?self.retry.token_retry_delay, "token unavailable, retrying");
                cancellable(cancel, async {
                    sleep(self.retry.token_retry_delay).await;
                    Ok(())
                })
                .await?;
            }
        }

        Err(SyncError::Auth)
    }

    async fn commit(&self, job: &FetchJob, records: Vec<EventRecord>) -> SyncResult<usize> {
        let mut registry = self.shared.registry.lock().await;

        let outcome = if job.is_cancelled() || !registry.is_active(job.id()) {
            Err(SyncError::Cancelled)
        } else {
            self.write(job, records).await
        };

        self.settle(&mut registry, job, &outcome);
        outcome
    }

    async fn write(&self, job: &FetchJob, records: Vec<EventRecord>) -> SyncResult<usize> {
        let count = records.len();
        let range = job.range();
        let (from, to) = range.millis_bounds(self.settings.current_time_zone());

        self.store
            .replace_range(from, to, records)
            .await
            .map_err(|e| match e {
                SyncError::Storage(_) => e,
                other => SyncError::Storage(other.to_string()),
            })?;

        match job.mode() {
            FetchMode::Replace => self.shared.range.replace(range),
            FetchMode::Merge => self.shared.range.expand(range),
        }
        Ok(count)
    }

    /// Record the terminal outcome of `job`. Only the active job may move the
    /// network signal; a superseded job's result is logged and dropped.
    fn settle(&self, registry: &mut JobRegistry, job: &FetchJob, outcome: &SyncResult<usize>) {
        let network = &self.shared.network;
        let stats = &self.shared.stats;
        let was_active = registry.is_active(job.id());

        match outcome {
            Ok(count) => {
                stats.record_completed(*count);
                network.set(NetworkState::Idle);
                info!(
                    job = %job.id(),
                    range = %job.range(),
                    events = count,
                    window = ?self.shared.range.current().map(|w| w.to_string()),
                    "window synced"
                );
            }
            Err(SyncError::Cancelled) => {
                stats.record_cancelled();
                debug!(job = %job.id(), range = %job.range(), "fetch cancelled");
            }
            Err(e) if was_active => {
                stats.record_failed();
                error!(job = %job.id(), range = %job.range(), error = %e, "fetch failed");
                network.set(NetworkState::Error(e.to_string()));
            }
            Err(e) => {
                stats.record_failed();
                warn!(job = %job.id(), error = %e, "superseded fetch failed, ignoring");
            }
        }

        registry.finish(job.id());

        if registry.active().is_none() && network.current().is_loading() {
            warn!(job = %job.id(), "no active fetch but network state is still loading, resetting");
            network.set(NetworkState::Idle);
        }
    }
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}
