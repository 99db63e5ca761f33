use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use super::{EventTable, LocalStore};
use crate::error::SyncResult;
use crate::event::EventRecord;

/// A store that lives only as long as the process.
pub struct MemoryStore {
    table: RwLock<EventTable>,
    changes: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<EventRecord>) -> Self {
        let (changes, _) = watch::channel(0);
        MemoryStore {
            table: RwLock::new(EventTable::from_records(records)),
            changes,
        }
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn query_events_in_range(&self, from_ms: i64, to_ms: i64) -> SyncResult<Vec<EventRecord>> {
        Ok(self.table.read().await.in_range(from_ms, to_ms))
    }

    async fn replace_range(&self, from_ms: i64, to_ms: i64, records: Vec<EventRecord>) -> SyncResult<()> {
        self.table.write().await.replace_range(from_ms, to_ms, records);
        self.changes.send_modify(|generation| *generation += 1);
        Ok(())
    }

    async fn delete_all(&self) -> SyncResult<()> {
        *self.table.write().await = EventTable::default();
        self.changes.send_modify(|generation| *generation += 1);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
