//! Local event store.
//!
//! The store keeps the mirrored events. Replacing a range is the only write
//! the sync engine performs, and it must be atomic: a reader sees either all
//! of the old records for the range or all of the new ones.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::SyncResult;
use crate::event::EventRecord;

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Events intersecting the inclusive millisecond span, ordered by start.
    async fn query_events_in_range(&self, from_ms: i64, to_ms: i64) -> SyncResult<Vec<EventRecord>>;

    /// Drop every record intersecting the span and insert `records`, as one operation.
    async fn replace_range(&self, from_ms: i64, to_ms: i64, records: Vec<EventRecord>) -> SyncResult<()>;

    async fn delete_all(&self) -> SyncResult<()>;

    /// Change notifications: the value is bumped after every committed write.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Events keyed by id; the in-memory model shared by the store implementations.
#[derive(Debug, Clone, Default)]
struct EventTable {
    events: BTreeMap<String, EventRecord>,
}

impl EventTable {
    fn from_records(records: Vec<EventRecord>) -> Self {
        EventTable {
            events: records.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    fn in_range(&self, from_ms: i64, to_ms: i64) -> Vec<EventRecord> {
        let mut found: Vec<EventRecord> = self
            .events
            .values()
            .filter(|e| e.overlaps(from_ms, to_ms))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        found
    }

    fn replace_range(&mut self, from_ms: i64, to_ms: i64, records: Vec<EventRecord>) {
        self.events.retain(|_, e| !e.overlaps(from_ms, to_ms));
        for record in records {
            self.events.insert(record.id.clone(), record);
        }
    }

    fn records(&self) -> Vec<EventRecord> {
        self.events.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn ms(day: u32) -> i64 {
        at(day, 0).timestamp_millis()
    }

    #[test]
    fn test_replace_range_clears_stale_records_only_inside_span() {
        let mut table = EventTable::from_records(vec![
            EventRecord::new("before", "Before", at(1, 9), at(1, 10)),
            EventRecord::new("stale", "Deleted remotely", at(5, 9), at(5, 10)),
            EventRecord::new("after", "After", at(20, 9), at(20, 10)),
        ]);

        table.replace_range(
            ms(3),
            ms(10) - 1,
            vec![EventRecord::new("fresh", "New", at(6, 9), at(6, 10))],
        );

        let ids: Vec<_> = table.records().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["after", "before", "fresh"]);
    }

    #[test]
    fn test_replace_with_empty_result_empties_the_span() {
        let mut table = EventTable::from_records(vec![EventRecord::new(
            "gone",
            "Gone",
            at(5, 9),
            at(5, 10),
        )]);

        table.replace_range(ms(5), ms(6) - 1, vec![]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_in_range_orders_by_start() {
        let table = EventTable::from_records(vec![
            EventRecord::new("b", "Second", at(5, 12), at(5, 13)),
            EventRecord::new("a", "First", at(5, 8), at(5, 9)),
            EventRecord::new("z", "Outside", at(9, 8), at(9, 9)),
        ]);

        let found: Vec<_> = table.in_range(ms(5), ms(6) - 1).into_iter().map(|e| e.id).collect();
        assert_eq!(found, vec!["a", "b"]);
    }
}
