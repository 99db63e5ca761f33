use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};
use tracing::debug;

use super::{EventTable, LocalStore};
use crate::error::{SyncError, SyncResult};
use crate::event::EventRecord;

/// A store persisted as one JSON file.
///
/// Every write builds the new table, persists it through a temp file and an
/// atomic rename, and only then swaps it in. Readers wait on the lock, so they
/// never see a half-replaced range, and a failed write leaves both the file and
/// the in-memory table untouched.
pub struct JsonFileStore {
    path: PathBuf,
    table: RwLock<EventTable>,
    changes: watch::Sender<u64>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();

        let table = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let records: Vec<EventRecord> = serde_json::from_str(&contents).map_err(|e| {
                    SyncError::Storage(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                EventTable::from_records(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EventTable::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), events = table.len(), "opened event store");

        let (changes, _) = watch::channel(0);
        Ok(JsonFileStore {
            path,
            table: RwLock::new(table),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &EventTable) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create directory", parent, e))?;
        }

        let contents = serde_json::to_string_pretty(&table.records())
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| storage_error("write", &temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| storage_error("rename into", &self.path, e))?;

        Ok(())
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> SyncError {
    SyncError::Storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn query_events_in_range(&self, from_ms: i64, to_ms: i64) -> SyncResult<Vec<EventRecord>> {
        Ok(self.table.read().await.in_range(from_ms, to_ms))
    }

    async fn replace_range(&self, from_ms: i64, to_ms: i64, records: Vec<EventRecord>) -> SyncResult<()> {
        let mut table = self.table.write().await;

        let mut next = table.clone();
        next.replace_range(from_ms, to_ms, records);
        self.persist(&next).await?;
        *table = next;
        drop(table);

        self.changes.send_modify(|generation| *generation += 1);
        Ok(())
    }

    async fn delete_all(&self) -> SyncResult<()> {
        let mut table = self.table.write().await;

        let next = EventTable::default();
        self.persist(&next).await?;
        *table = next;
        drop(table);

        self.changes.send_modify(|generation| *generation += 1);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
