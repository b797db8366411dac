//! Permissive cell parsing. Unparseable values become `None`, never errors.

use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

fn is_blank(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty()
        || t.eq_ignore_ascii_case("nan")
        || t.eq_ignore_ascii_case("nat")
        || t.eq_ignore_ascii_case("null")
        || t.eq_ignore_ascii_case("none")
}

/// Parse a timestamp in any supported date or date-time format.
/// Date-only values land at midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if is_blank(raw) {
        return None;
    }
    let t = raw.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(t, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|t| t.date())
}

/// Numbers may carry thousands separators, a currency sign, or a trailing `%`.
pub fn parse_number(raw: &str) -> Option<f64> {
    if is_blank(raw) {
        return None;
    }
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

pub fn parse_text(raw: &str) -> Option<String> {
    if is_blank(raw) {
        None
    } else {
        Some(raw.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn iso_and_us_dates() {
        assert_eq!(parse_date("2024-03-15"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("2024/03/15"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("03/15/2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15-Mar-2024"), Some(d(2024, 3, 15)));
    }

    #[test]
    fn datetime_keeps_hour() {
        let t = parse_datetime("2024-03-15 14:30:00").unwrap();
        assert_eq!(t.date(), d(2024, 3, 15));
        assert_eq!(t.format("%H").to_string(), "14");
    }

    #[test]
    fn datetime_column_accepts_plain_dates() {
        let t = parse_datetime("2024-03-15").unwrap();
        assert_eq!(t, d(2024, 3, 15).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn unparseable_dates_are_missing() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-45"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("NaT"), None);
    }

    #[test]
    fn numbers_tolerate_formatting() {
        assert_eq!(parse_number("1,234.50"), Some(1234.5));
        assert_eq!(parse_number("$99"), Some(99.0));
        assert_eq!(parse_number("87.5%"), Some(87.5));
        assert_eq!(parse_number(" 42 "), Some(42.0));
    }

    #[test]
    fn bad_numbers_are_missing() {
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
