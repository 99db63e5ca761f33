//! The currently cached contiguous window.

use tokio::sync::watch;

use crate::date_range::{DateRange, union};

/// Holds the cached window, unset until the first successful load.
///
/// Mutation is crate-private and only happens while the scheduler's registry
/// lock is held, so reads taken under that lock see the latest committed value.
pub struct RangeState {
    window: watch::Sender<Option<DateRange>>,
}

impl RangeState {
    pub fn new() -> Self {
        let (window, _) = watch::channel(None);
        RangeState { window }
    }

    pub fn current(&self) -> Option<DateRange> {
        *self.window.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DateRange>> {
        self.window.subscribe()
    }

    pub(crate) fn replace(&self, range: DateRange) {
        self.window.send_if_modified(|current| {
            let changed = *current != Some(range);
            *current = Some(range);
            changed
        });
    }

    pub(crate) fn expand(&self, range: DateRange) {
        self.window.send_if_modified(|current| {
            let next = match current {
                Some(existing) => union(existing, &range),
                None => range,
            };
            let changed = *current != Some(next);
            *current = Some(next);
            changed
        });
    }

    pub(crate) fn clear(&self) {
        self.window.send_if_modified(|current| current.take().is_some());
    }
}

impl Default for RangeState {
    fn default() -> Self {
        RangeState::new()
    }
}
