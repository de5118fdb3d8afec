//! Timestamp parsing and canonical rendering.
//!
//! The source store keeps points in time as `{ "seconds", "nanoseconds" }`
//! wrappers, some exports use `_seconds`/`_nanoseconds`, drivers may hand over
//! epoch milliseconds, and the target store speaks ISO 8601, with or without
//! an offset. Everything is parsed into a `DateTime<Utc>` and rendered back in
//! one canonical form. A datetime without an offset is read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};

/// Parses any accepted timestamp representation.
///
/// Returns `None` for values that are not timestamps.
pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        Value::String(s) => parse_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// ISO 8601 datetimes without an offset, as naive-timestamp backends send them.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Accepts RFC 3339, an ISO 8601 datetime without offset (read as UTC) and
/// `YYYY-MM-DD` (midnight UTC).
fn parse_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Renders the canonical wire form: RFC 3339, UTC, millisecond precision.
#[must_use]
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders the date-only wire form `YYYY-MM-DD`.
#[must_use]
pub fn to_iso_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Renders the source-native wrapper.
#[must_use]
pub fn to_wrapper(dt: &DateTime<Utc>) -> Value {
    json!({
        "seconds": dt.timestamp(),
        "nanoseconds": dt.timestamp_subsec_nanos(),
    })
}

/// Normalizes any accepted representation to ISO text, or ISO date text when
/// `date_only` is set. Non-timestamps come back unchanged.
#[must_use]
pub fn normalize(value: &Value, date_only: bool) -> Value {
    match parse(value) {
        Some(dt) if date_only => Value::String(to_iso_date(&dt)),
        Some(dt) => Value::String(to_iso(&dt)),
        None => value.clone(),
    }
}
