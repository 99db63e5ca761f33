//! The facade UI layers talk to.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::{Auth, Token};
use crate::date_range::DateRange;
use crate::error::{SyncError, SyncResult};
use crate::event::EventRecord;
use crate::remote::RemoteSource;
use crate::settings::Settings;
use crate::store::LocalStore;
use crate::sync::{
    FetchDecision, FetchScheduler, NetworkState, RefreshHandle, SyncExecutor, SyncOptions,
    SyncShared, SyncStatsSnapshot,
};

/// The external collaborators the cache is built on.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn Auth>,
    pub remote: Arc<dyn RemoteSource>,
    pub store: Arc<dyn LocalStore>,
    pub settings: Arc<dyn Settings>,
}

/// A local mirror of a sliding window of a remote calendar.
///
/// Cheap to clone; clones share the same cache, job registry and signals.
#[derive(Clone)]
pub struct CalendarMirror {
    shared: Arc<SyncShared>,
    scheduler: Arc<FetchScheduler>,
    executor: Arc<SyncExecutor>,
    collaborators: Collaborators,
}

impl CalendarMirror {
    /// Must be called from within a tokio runtime: fetches run on spawned tasks.
    pub fn new(collaborators: Collaborators, options: SyncOptions) -> Self {
        let shared = Arc::new(SyncShared::new());
        let executor = Arc::new(SyncExecutor::new(
            Arc::clone(&shared),
            Arc::clone(&collaborators.auth),
            Arc::clone(&collaborators.remote),
            Arc::clone(&collaborators.store),
            Arc::clone(&collaborators.settings),
            options.auth,
        ));
        let scheduler = Arc::new(FetchScheduler::new(
            Arc::clone(&shared),
            Arc::clone(&executor),
            Arc::clone(&collaborators.auth),
            Arc::clone(&collaborators.store),
            options.window,
        ));

        CalendarMirror {
            shared,
            scheduler,
            executor,
            collaborators,
        }
    }

    /// Report that the visible date changed. Fire-and-forget: the returned
    /// decision is informational and any fetch runs in the background.
    pub async fn on_visible_date_changed(&self, date: NaiveDate, force_refresh: bool) -> FetchDecision {
        self.scheduler.on_visible_date_changed(date, force_refresh).await
    }

    /// Cancel any active fetch and reload the window around `center`.
    /// Await the handle to block until it completes, or drop it.
    pub async fn refresh(&self, center: NaiveDate) -> SyncResult<RefreshHandle> {
        self.scheduler.refresh(center).await
    }

    pub fn current_network_state(&self) -> NetworkState {
        self.shared.network.current()
    }

    pub fn subscribe_network_state(&self) -> watch::Receiver<NetworkState> {
        self.shared.network.subscribe()
    }

    /// Acknowledge a displayed error so it does not linger.
    pub fn clear_network_error(&self) -> bool {
        self.shared.network.clear_error()
    }

    pub fn current_cached_range(&self) -> Option<DateRange> {
        self.shared.range.current()
    }

    pub fn subscribe_cached_range(&self) -> watch::Receiver<Option<DateRange>> {
        self.shared.range.subscribe()
    }

    /// Store change notifications, for re-querying a visible range.
    pub fn subscribe_events(&self) -> watch::Receiver<u64> {
        self.collaborators.store.subscribe()
    }

    /// Reset the cached window and wipe the local store. Called on sign-out.
    pub async fn clear_on_sign_out(&self) -> SyncResult<()> {
        self.scheduler.clear().await
    }

    /// Mirrored events for `range`, read from the local store only.
    pub async fn events_in_range(&self, range: &DateRange) -> SyncResult<Vec<EventRecord>> {
        let (from, to) = range.millis_bounds(self.collaborators.settings.current_time_zone());
        self.collaborators.store.query_events_in_range(from, to).await
    }

    /// Wait until no fetch is active, then return the network state.
    pub async fn settled(&self) -> NetworkState {
        let mut activity = self.shared.activity();
        let _ = activity.wait_for(|active| active.is_none()).await;
        self.shared.network.current()
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.shared.stats.snapshot()
    }

    // MUTATIONS:

    pub async fn create_event(&self, event: &EventRecord) -> SyncResult<EventRecord> {
        let token = self.mutation_token().await?;
        let created = self.collaborators.remote.create_event(event, &token).await?;
        self.refresh_after_mutation(&created).await?;
        Ok(created)
    }

    pub async fn update_event(&self, event: &EventRecord) -> SyncResult<EventRecord> {
        let token = self.mutation_token().await?;
        let updated = self.collaborators.remote.update_event(event, &token).await?;
        self.refresh_after_mutation(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_event(&self, event: &EventRecord) -> SyncResult<()> {
        let token = self.mutation_token().await?;
        self.collaborators.remote.delete_event(&event.id, &token).await?;
        self.refresh_after_mutation(event).await
    }

    async fn mutation_token(&self) -> SyncResult<Token> {
        if !self.collaborators.auth.current_auth_state().signed_in {
            return Err(SyncError::NotSignedIn);
        }
        self.executor.acquire_token(&CancellationToken::new()).await
    }

    /// Reload the window the user is looking at so the server-side change shows up.
    async fn refresh_after_mutation(&self, event: &EventRecord) -> SyncResult<()> {
        let tz = self.collaborators.settings.current_time_zone();
        let fallback = event.start_date(tz);

        let handle = self.scheduler.refresh_visible_or(fallback).await?;
        match handle.wait().await {
            Ok(_) => Ok(()),
            Err(SyncError::Cancelled) => {
                debug!(event = %event.id, "post-mutation refresh superseded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn time_zone(&self) -> Tz {
        self.collaborators.settings.current_time_zone()
    }

    /// Today's date in the configured time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.time_zone()).date_naive()
    }
}
