//! Provider-neutral event records.
//!
//! These are the records the remote returns for a range and the local store
//! keeps. The cache only needs their identity and time span; the remaining
//! fields ride along for whoever renders them.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A calendar event (provider-neutral)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Stable identifier assigned by the remote
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    /// Exclusive end instant
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub status: EventStatus,
    /// Last modification timestamp on the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        EventRecord {
            id: id.into(),
            summary: summary.into(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            status: EventStatus::Confirmed,
            updated: None,
        }
    }

    pub fn span_millis(&self) -> (i64, i64) {
        (self.start.timestamp_millis(), self.end.timestamp_millis())
    }

    /// Whether the event intersects the inclusive millisecond span `[from, to]`.
    /// Events are half-open, except zero-length ones which count as a point.
    pub fn overlaps(&self, from: i64, to: i64) -> bool {
        let (start, end) = self.span_millis();
        if start >= end {
            return from <= start && start <= to;
        }
        start <= to && end > from
    }

    /// Calendar date the event starts on in `tz`.
    pub fn start_date(&self, tz: Tz) -> NaiveDate {
        self.start.with_timezone(&tz).date_naive()
    }
}
