//! Fallback parsing for `Date` header values that `mail-parser` rejects.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, IMAP-style `DD-MMM-YYYY`, and a handful of
/// broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Thu, 04 Jan 2024 10:00:00 +0000 (UTC)" → drop comment and weekday
    let no_comment = match trimmed.find('(') {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };
    let no_dow = match no_comment.split_once(',') {
        Some((dow, rest)) if dow.len() <= 4 => rest.trim(),
        _ => no_comment,
    };
    let candidate = normalize_imap_date(no_dow);

    const FORMATS: [&str; 6] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%Y-%m-%d %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let upper = s.to_ascii_uppercase();
    for month in MONTHS {
        let pattern = format!("-{}-", month.to_ascii_uppercase());
        if let Some(pos) = upper.find(&pattern) {
            let mut out = String::with_capacity(s.len());
            out.push_str(&s[..pos]);
            out.push(' ');
            out.push_str(month);
            out.push(' ');
            out.push_str(&s[pos + pattern.len()..]);
            return out;
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dates() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000 (UTC)").unwrap();
        assert_eq!(dt.format("%H").to_string(), "10");
        let dt = parse_date("16-JUL-2025 03:01:03").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("sometime last week").is_none());
    }
}
