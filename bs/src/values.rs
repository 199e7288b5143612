//! Parsing helpers shared by the validator and the payload builder

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Field order of slash-separated dates such as `03/04/2025`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

/// Parse a decimal number, accepting thousands separators (`2,000.50`)
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse an integer; `12.0` is accepted, `12.5` is not
pub fn parse_integer(value: &str) -> Option<i64> {
    let n = parse_number(value)?;
    if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// Parse an ISO `YYYY-MM-DD` date, or a slash date in the given order
pub fn parse_date(value: &str, order: DateOrder) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    let parts: Vec<&str> = value.split('/').map(str::trim).collect();
    let [a, b, year] = parts.as_slice() else {
        return None;
    };
    let (a, b): (u32, u32) = (a.parse().ok()?, b.parse().ok()?);
    let year: i32 = year.parse().ok()?;
    let year = if year < 100 { 2000 + year } else { year };
    let (month, day) = match order {
        DateOrder::MonthFirst => (a, b),
        DateOrder::DayFirst => (b, a),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// ISO form of `parse_date`
pub fn normalize_date(value: &str, order: DateOrder) -> Option<String> {
    parse_date(value, order).map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Trimmed, lowercased email address
pub fn clean_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_thousands_separator() {
        assert_eq!(parse_number("2,000"), Some(2000.0));
        assert_eq!(parse_number(" 1,234,567.89 "), Some(1_234_567.89));
        assert_eq!(parse_number("-15.5"), Some(-15.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("1,000"), Some(1000));
        assert_eq!(parse_integer("12.0"), Some(12));
        assert_eq!(parse_integer("12.5"), None);
    }

    #[test]
    fn test_parse_date_iso_and_slash() {
        let expected = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        assert_eq!(parse_date("2025-04-03", DateOrder::DayFirst), Some(expected));
        assert_eq!(parse_date("03/04/2025", DateOrder::DayFirst), Some(expected));
        assert_eq!(parse_date("04/03/2025", DateOrder::MonthFirst), Some(expected));
        assert_eq!(parse_date("4/3/25", DateOrder::MonthFirst), Some(expected));
    }

    #[test]
    fn test_parse_date_rejects_impossible() {
        assert_eq!(parse_date("31/02/2025", DateOrder::DayFirst), None);
        assert_eq!(parse_date("13/31/2025", DateOrder::MonthFirst), None);
        assert_eq!(parse_date("yesterday", DateOrder::DayFirst), None);
        assert_eq!(normalize_date("31/01/2025", DateOrder::DayFirst).as_deref(), Some("2025-01-31"));
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email(" jane.doe@mail.example.co "));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane example@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert_eq!(clean_email("  Jane@Example.COM "), "jane@example.com");
    }
}
