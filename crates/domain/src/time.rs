//! Time and timestamp helpers.

use chrono::{DateTime, Duration, Timelike, Utc};

/// UTC timestamp used for sample times, cooldown deadlines, alert times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// `ts` shifted forward by a whole number of minutes.
#[must_use]
pub fn plus_minutes(ts: Timestamp, minutes: u32) -> Timestamp {
    ts + Duration::minutes(i64::from(minutes))
}

/// `ts` with seconds and sub-seconds dropped.
#[must_use]
pub fn floor_to_minute(ts: Timestamp) -> Timestamp {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}
