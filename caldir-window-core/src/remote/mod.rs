//! Remote calendar source.

pub mod protocol;
pub mod provider;

use async_trait::async_trait;

use crate::auth::Token;
use crate::date_range::DateRange;
use crate::error::SyncResult;
use crate::event::EventRecord;

pub use provider::{Provider, ProviderAuth, ProviderRemote};

/// The remote calendar service, paginated by date range.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// All events intersecting `range`. An empty list is a valid answer.
    async fn fetch_events(&self, range: &DateRange, token: &Token) -> SyncResult<Vec<EventRecord>>;

    async fn create_event(&self, event: &EventRecord, token: &Token) -> SyncResult<EventRecord>;

    async fn update_event(&self, event: &EventRecord, token: &Token) -> SyncResult<EventRecord>;

    async fn delete_event(&self, event_id: &str, token: &Token) -> SyncResult<()>;
}
