//! The range synchronization engine.
//!
//! `FetchScheduler` decides what to fetch, `SyncExecutor` runs one
//! fetch-and-store cycle. Both go through `SyncShared`, whose registry mutex
//! serializes every decision and every commit.

mod executor;
mod job;
mod network_status;
mod range_state;
mod scheduler;
mod stats;

pub use executor::SyncExecutor;
pub use job::{FetchJob, FetchMode};
pub use network_status::{NetworkState, NetworkStatus};
pub use range_state::RangeState;
pub use scheduler::{FetchScheduler, RefreshHandle};
pub use stats::{SyncStats, SyncStatsSnapshot};

use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::config::{AuthConfig, MirrorConfig, WindowConfig};
use crate::date_range::DateRange;
use job::JobRegistry;

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub window: WindowConfig,
    pub auth: AuthConfig,
}

impl From<&MirrorConfig> for SyncOptions {
    fn from(config: &MirrorConfig) -> Self {
        SyncOptions {
            window: config.window,
            auth: config.auth,
        }
    }
}

/// What `on_visible_date_changed` decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    /// Nothing to fetch.
    NoOp,
    NotSignedIn,
    /// An active job already covers the request.
    AlreadyInFlight { range: DateRange },
    /// A job was started for `range`.
    Fetch { range: DateRange, mode: FetchMode },
}

/// State shared by the scheduler and the executor.
pub(crate) struct SyncShared {
    pub(crate) registry: Mutex<JobRegistry>,
    pub(crate) range: RangeState,
    pub(crate) network: NetworkStatus,
    pub(crate) stats: SyncStats,
    activity: watch::Receiver<Option<Uuid>>,
}

impl SyncShared {
    pub(crate) fn new() -> Self {
        let registry = JobRegistry::new();
        let activity = registry.subscribe_activity();
        SyncShared {
            registry: Mutex::new(registry),
            range: RangeState::new(),
            network: NetworkStatus::new(),
            stats: SyncStats::new(),
            activity,
        }
    }

    /// Follows the id of the active job, `None` while nothing runs.
    pub(crate) fn activity(&self) -> watch::Receiver<Option<Uuid>> {
        self.activity.clone()
    }
}
