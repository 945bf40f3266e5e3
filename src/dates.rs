//! Date normalization to ISO `YYYY-MM-DD`.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const ISO_FORMAT: &str = "%Y-%m-%d";

/// Date layouts accepted as input, tried in order. Ambiguous day/month orders favor US style
/// for slashes and European style for dots.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_any(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive())
}

/// Suggest an ISO date for loosely formatted text, if any known layout matches.
pub fn suggest_iso_date(text: &str) -> Option<String> {
    parse_any(text).map(|date| date.format(ISO_FORMAT).to_string())
}

/// Validate user input as a date and return it in ISO form.
pub fn normalize_to_iso_date(text: &str) -> Result<String> {
    match suggest_iso_date(text) {
        Some(iso) => Ok(iso),
        None => bail!("'{}' is not a recognizable date (expected YYYY-MM-DD)", text.trim()),
    }
}
