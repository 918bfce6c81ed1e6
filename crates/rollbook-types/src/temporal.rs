use chrono::{DateTime, SecondsFormat, Timelike, Utc};

use crate::error::TypeError;

/// Current time truncated to whole milliseconds.
///
/// Entry timestamps are hashed and stored in RFC 3339 millisecond form; a
/// finer timestamp would not survive a round trip through the mirror.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drop sub-millisecond precision.
pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond() / 1_000_000 * 1_000_000;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}

/// The exact string form fed into entry digests and stored in the mirror,
/// e.g. `2024-05-01T09:30:00.125Z`.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp back into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidTimestamp(format!("{s}: {e}")))
}
