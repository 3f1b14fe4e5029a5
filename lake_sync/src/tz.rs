//! Timestamp helpers.
//!
//! The lake is UTC end-to-end: Bronze rows carry epoch-millis columns, the
//! watermark store persists RFC-3339 UTC text. These helpers convert between
//! the two representations.

use anyhow::Context;
use chrono::{DateTime, Utc};

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2025-08-22T21:00:00-03:00" -> "2025-08-23T00:00:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Canonical RFC-3339 UTC rendering with millisecond precision; the format
/// every state-store timestamp uses.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds for a UTC instant (Bronze `ingested_at` encoding).
pub fn to_epoch_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// UTC instant from epoch milliseconds; `None` when out of chrono's range.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parse_rfc3339_offset_to_utc() {
        let dt = parse_ts_to_utc("2025-08-22T21:00:00-03:00").unwrap();
        assert_eq!(to_rfc3339_millis(dt), "2025-08-23T00:00:00.000Z");
    }

    #[test]
    fn epoch_millis_round_trip() {
        let dt = Utc.with_ymd_and_hms(2025, 8, 22, 19, 30, 0).unwrap();
        assert_eq!(from_epoch_millis(to_epoch_millis(dt)), Some(dt));
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(parse_ts_to_utc("not a timestamp").is_err());
    }
}
