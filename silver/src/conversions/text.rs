//! Parsing of textual column values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a calendar date from `YYYY-MM-DD`, or from the date part of a timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date_naive()))
}

/// Parses an instant from RFC 3339, or from a naive date/time taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Parses the usual spellings of a boolean, case insensitively.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_timestamp_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);

        assert_eq!(parse_date("2024-03-09"), expected);
        assert_eq!(parse_date(" 2024-03-09T22:15:00+00:00 "), expected);
        assert_eq!(parse_date("2024-03-09 08:00:00"), expected);
        assert_eq!(parse_date("09/03/2024"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn timestamps_with_offsets_are_normalized_to_utc() {
        let ts = parse_timestamp("2024-03-09T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-09T08:00:00+00:00");

        let midnight = parse_timestamp("2024-03-09").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2024-03-09T00:00:00+00:00");
    }

    #[test]
    fn parses_booleans() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("n"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
