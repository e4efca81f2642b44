//! Wall-clock timestamp parsing and formatting.
//!
//! The lock controller and the dashboard share a local clock domain, so
//! instants are kept as `NaiveDateTime`. The controller and the browser
//! form inputs produce several textual shapes which are all accepted here.

use crate::{DoorPassError, Result};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the accepted shapes.
///
/// RFC 3339 values carrying an offset are converted to local time.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Local).naive_local());
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| DoorPassError::Timestamp(raw.to_string()))
}

/// Parse an optional timestamp, treating empty strings as absent.
pub fn parse_optional(raw: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value).map(Some),
    }
}

/// Format a timestamp the way the controller stores expiry times.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    if at.second() == 0 && at.nanosecond() == 0 {
        at.format("%Y-%m-%dT%H:%M").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Current local wall-clock time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 12)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_browser_form_value() {
        assert_eq!(parse_timestamp("2025-05-12T14:35").unwrap(), at(14, 35, 0));
    }

    #[test]
    fn test_parse_controller_deletion_stamp() {
        assert_eq!(
            parse_timestamp("2025-05-12 09:17:44").unwrap(),
            at(9, 17, 44)
        );
        assert_eq!(parse_timestamp("2025-05-12 09:17").unwrap(), at(9, 17, 0));
    }

    #[test]
    fn test_parse_isoformat_with_fraction() {
        let parsed = parse_timestamp("2025-05-12T14:35:12.123456").unwrap();
        assert_eq!(parsed.with_nanosecond(0).unwrap(), at(14, 35, 12));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(DoorPassError::Timestamp(_))
        ));
    }

    #[test]
    fn test_parse_optional() {
        assert!(parse_optional(None).unwrap().is_none());
        assert!(parse_optional(Some("  ")).unwrap().is_none());
        assert_eq!(
            parse_optional(Some("2025-05-12T14:35")).unwrap(),
            Some(at(14, 35, 0))
        );
    }

    #[test]
    fn test_format_drops_zero_seconds() {
        assert_eq!(format_timestamp(at(18, 0, 0)), "2025-05-12T18:00");
        assert_eq!(format_timestamp(at(18, 0, 5)), "2025-05-12T18:00:05");
    }
}
