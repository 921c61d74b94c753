//! Timestamp text formats shared by storage and CSV exchange.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Render as RFC 3339 with millisecond precision and a `Z` suffix.
///
/// Fixed width, so lexical order matches chronological order.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the timestamp shapes seen in stored rows and imported CSV files.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC), the same with a
/// `T` separator, and a bare `YYYY-MM-DD` (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn format_is_fixed_width_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().unwrap_or_default();
        assert_eq!(format_timestamp(&ts), "2024-03-09T07:05:01.000Z");
    }

    #[test]
    fn parses_formatted_output_back() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).single().unwrap_or_default();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
    }

    #[test]
    fn parses_sqlite_and_date_only_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single();
        assert_eq!(parse_timestamp("2024-01-02 03:04:05"), expected);
        assert_eq!(parse_timestamp("2024-01-02T03:04:05"), expected);
        assert_eq!(parse_timestamp("2024-01-02T05:04:05+02:00"), expected);
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }
}
