//! Settings collaborator: the time zone used to turn dates into instants.

use chrono_tz::Tz;

pub trait Settings: Send + Sync {
    fn current_time_zone(&self) -> Tz;
}

/// Settings with a time zone fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct StaticSettings {
    time_zone: Tz,
}

impl StaticSettings {
    pub fn new(time_zone: Tz) -> Self {
        StaticSettings { time_zone }
    }

    /// Settings following the system time zone, UTC if it cannot be determined.
    pub fn system() -> Self {
        StaticSettings::new(system_time_zone())
    }
}

impl Settings for StaticSettings {
    fn current_time_zone(&self) -> Tz {
        self.time_zone
    }
}

pub fn system_time_zone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC)
}
