use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::models::CellValue;

const CANONICAL: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%a %b %d %Y",
];

fn dmy_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})(?:\s+\S.*)?$").expect("static regex")
    })
}

/// Canonical `YYYY-MM-DD` for any cell, or "" when it carries no usable date.
pub fn normalize(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) | CellValue::Amount(n) => serial_to_date(*n),
        CellValue::Text(s) => normalize_str(s),
        CellValue::Empty | CellValue::Bool(_) => String::new(),
    }
}

/// Converts a spreadsheet serial day count (epoch 1899-12-30) to a calendar day.
///
/// Zero and non-finite serials are treated as blank. Time-of-day fractions are
/// dropped.
pub fn serial_to_date(serial: f64) -> String {
    if !serial.is_finite() || serial == 0.0 {
        return String::new();
    }
    let days = serial.floor();
    if days.abs() > 3_000_000.0 {
        return String::new();
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|base| base.checked_add_signed(Duration::days(days as i64)))
        .map(|d| d.format(CANONICAL).to_string())
        .unwrap_or_default()
}

/// Spreadsheet serial (1900 date system) for a date-time, fraction included.
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}

pub fn normalize_str(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if let Some(caps) = dmy_prefix().captures(s) {
        let day = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let year = caps[3].parse().ok();
        return match (year, month, day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
                .map(|dt| dt.format(CANONICAL).to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
    }
    parse_general(s)
        .map(|d| d.format(CANONICAL).to_string())
        .unwrap_or_default()
}

fn parse_general(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_inputs() {
        assert_eq!(normalize(&CellValue::Empty), "");
        assert_eq!(normalize(&CellValue::Text("   ".into())), "");
        assert_eq!(normalize(&CellValue::Bool(false)), "");
        assert_eq!(normalize(&CellValue::Number(0.0)), "");
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_date(1.0), "1899-12-31");
        assert_eq!(serial_to_date(45000.0), "2023-03-15");
        assert_eq!(serial_to_date(45292.0), "2024-01-01");
        assert_eq!(serial_to_date(45292.75), "2024-01-01");
        assert_eq!(normalize(&CellValue::Number(45667.0)), "2025-01-10");
    }

    #[test]
    fn test_datetime_to_serial() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(datetime_to_serial(day.and_hms_opt(0, 0, 0).unwrap()), 45292.0);
        let serial = datetime_to_serial(day.and_hms_opt(18, 0, 0).unwrap());
        assert_eq!(serial, 45292.75);
        assert_eq!(serial_to_date(serial), "2024-01-01");
    }

    #[test]
    fn test_serial_dates_never_panic() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::MAX, f64::MIN, -1.0, 1e300] {
            let _ = serial_to_date(n);
        }
        assert_eq!(serial_to_date(f64::NAN), "");
        assert_eq!(serial_to_date(f64::MAX), "");
        assert_eq!(serial_to_date(-1.0), "1899-12-29");
    }

    #[test]
    fn test_day_month_year_strings() {
        assert_eq!(normalize_str("05-06-2024"), "2024-06-05");
        assert_eq!(normalize_str("05-06-2024 13:45:00"), "2024-06-05");
        assert_eq!(normalize_str("5-6-2024"), "2024-06-05");
        assert_eq!(normalize_str("31-02-2024"), "");
    }

    #[test]
    fn test_general_strings() {
        assert_eq!(normalize_str("2024-01-05"), "2024-01-05");
        assert_eq!(normalize_str("2024-01-05T10:30:00"), "2024-01-05");
        assert_eq!(normalize_str("2024-01-05T23:30:00-05:00"), "2024-01-06");
        assert_eq!(normalize_str("2024-01-05 08:00:00"), "2024-01-05");
        assert_eq!(normalize_str("01/15/2025"), "2025-01-15");
        assert_eq!(normalize_str("Jan 15, 2025"), "2025-01-15");
        assert_eq!(normalize_str("15 January 2025"), "2025-01-15");
    }

    #[test]
    fn test_invalid_strings() {
        assert_eq!(normalize_str("not a date"), "");
        assert_eq!(normalize_str("2024-13-45"), "");
        assert_eq!(normalize_str("05-06-2024garbage"), "");
    }
}
