//! Inclusive calendar date ranges and the range algebra used by the scheduler.
//!
//! Everything here is pure: the scheduler feeds in the visible date and the
//! cached window and gets back whether to reload, expand, or do nothing.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// An inclusive interval `[start, end]` of calendar dates. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = SyncError;

    fn try_from(raw: RawDateRange) -> SyncResult<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> SyncResult<Self> {
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }
        Ok(DateRange { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        DateRange {
            start: day,
            end: day,
        }
    }

    /// The ideal window around `center`: `[center - backward_days, center + forward_days]`.
    pub fn around(center: NaiveDate, backward_days: u32, forward_days: u32) -> Self {
        DateRange {
            start: shift(center, -i64::from(backward_days)),
            end: shift(center, i64::from(forward_days)),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains_date(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Epoch millisecond bounds of the range in `tz`: the first millisecond of
    /// `start` through the last millisecond of `end`.
    pub fn millis_bounds(&self, tz: Tz) -> (i64, i64) {
        let from = start_of_day_millis(self.start, tz);
        let to = match self.end.succ_opt() {
            Some(next) => start_of_day_millis(next, tz) - 1,
            None => start_of_day_millis(self.end, tz) + TimeDelta::days(1).num_milliseconds() - 1,
        };
        (from, to)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Smallest range covering both `a` and `b`.
pub fn union(a: &DateRange, b: &DateRange) -> DateRange {
    DateRange {
        start: a.start.min(b.start),
        end: a.end.max(b.end),
    }
}

/// True if `outer` fully covers `inner`.
pub fn contains(outer: &DateRange, inner: &DateRange) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// True if `center` lies more than `buffer_days` outside `cached` on either side.
pub fn is_jump(center: NaiveDate, cached: &DateRange, buffer_days: u32) -> bool {
    let buffer = i64::from(buffer_days);
    center < shift(cached.start, -buffer) || center > shift(cached.end, buffer)
}

/// True when `center` is within `threshold_days` of the end of `cached` (or past it).
pub fn needs_forward_prefetch(center: NaiveDate, cached: &DateRange, threshold_days: u32) -> bool {
    shift(center, i64::from(threshold_days)) >= cached.end
}

/// True when `center` is within `threshold_days` of the start of `cached` (or before it).
pub fn needs_backward_prefetch(center: NaiveDate, cached: &DateRange, threshold_days: u32) -> bool {
    shift(center, -i64::from(threshold_days)) <= cached.start
}

/// The part of the desired window that `cached` does not cover yet, if a
/// prefetch threshold is crossed.
///
/// Forward deltas run from the day after `cached.end` to `chunk_days` past
/// whichever is later of `cached.end` and `center`; backward deltas mirror that.
/// When both thresholds are crossed the two deltas are joined into one range.
pub fn prefetch_delta(
    center: NaiveDate,
    cached: &DateRange,
    threshold_days: u32,
    chunk_days: u32,
) -> Option<DateRange> {
    let chunk = i64::from(chunk_days);

    let forward = needs_forward_prefetch(center, cached, threshold_days)
        .then(|| {
            DateRange::new(
                shift(cached.end, 1),
                shift(cached.end.max(center), chunk),
            )
            .ok()
        })
        .flatten()
        .filter(|delta| !contains(cached, delta));

    let backward = needs_backward_prefetch(center, cached, threshold_days)
        .then(|| {
            DateRange::new(
                shift(cached.start.min(center), -chunk),
                shift(cached.start, -1),
            )
            .ok()
        })
        .flatten()
        .filter(|delta| !contains(cached, delta));

    match (backward, forward) {
        (Some(back), Some(fwd)) => Some(union(&back, &fwd)),
        (back, fwd) => back.or(fwd),
    }
}

/// Move `day` by `days`, saturating at the ends of the calendar.
fn shift(day: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        day.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        day.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

/// Local midnight of `day` in `tz` as epoch millis. When midnight falls in a
/// DST gap, the first valid local instant after it is used.
fn start_of_day_millis(day: NaiveDate, tz: Tz) -> i64 {
    let midnight = day.and_time(NaiveTime::MIN);

    (0..=180)
        .find_map(|minutes| {
            tz.from_local_datetime(&(midnight + TimeDelta::minutes(minutes)))
                .earliest()
        })
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}
