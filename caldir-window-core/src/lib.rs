//! Range synchronization cache for the caldir ecosystem.
//!
//! Mirrors a sliding window of dates from a remote calendar into a local store:
//! - `date_range` for the inclusive date ranges and the range algebra
//! - `sync` for the scheduler, executor and the state they share
//! - `mirror` for the facade that UI layers talk to
//! - `auth`, `remote`, `store` and `settings` for the collaborators the core consumes

pub mod auth;
pub mod config;
pub mod date_range;
pub mod error;
pub mod event;
pub mod mirror;
pub mod remote;
pub mod settings;
pub mod store;
pub mod sync;

pub use date_range::DateRange;
pub use error::{SyncError, SyncResult};
pub use event::{EventRecord, EventStatus};
pub use mirror::{CalendarMirror, Collaborators};
pub use sync::{FetchDecision, FetchMode, NetworkState, SyncOptions};
