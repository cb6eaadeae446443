use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde_json::Number;

const DATE_DISPLAY_FORMAT: &str = "%-m/%-d/%Y";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn money(value: f64) -> String {
    format!("${value:.2}")
}

pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Render a search distance as a match score (`1 - distance`).
pub fn similarity(distance: f64) -> String {
    fixed(1.0 - distance, 2)
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Whole numbers print without a fractional part, even when the backend
/// serialized them as floats (`2015.0`).
pub fn number(num: &Number) -> String {
    if let Some(value) = num.as_i64() {
        return value.to_string();
    }
    if let Some(value) = num.as_u64() {
        return value.to_string();
    }
    match num.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{value:.0}"),
        Some(value) => value.to_string(),
        None => num.to_string(),
    }
}

/// Local calendar date for a backend timestamp, or `None` when the value
/// cannot be understood. Callers render `None` as an empty cell.
pub fn date(raw: &str) -> Option<String> {
    parse_date(raw).map(|date| date.format(DATE_DISPLAY_FORMAT).to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local).date_naive());
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.with_timezone(&Local).date_naive());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
