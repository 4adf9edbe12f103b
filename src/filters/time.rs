//! Relative durations ("10 days", "2 months") and message date parsing

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex_lite::Regex;
use std::sync::OnceLock;

/// Months are approximated as a fixed number of days
pub const DAYS_PER_MONTH: i64 = 30;

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)(\d+)\s*(days?|months?)").expect("duration pattern is valid")
    })
}

/// Parse a relative duration.
///
/// A bare integer counts days. Otherwise `<n> day(s)` or `<n> month(s)` is
/// accepted case-insensitively at the start of the input. Returns `None` for
/// anything else, including counts too large to represent.
pub fn parse_relative_time(value: &str) -> Option<Duration> {
    let value = value.trim();

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<i64>().ok().and_then(Duration::try_days);
    }

    let captures = duration_pattern().captures(value)?;
    let count: i64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_ascii_lowercase();

    let days = if unit.starts_with("month") {
        count.checked_mul(DAYS_PER_MONTH)?
    } else {
        count
    };

    Duration::try_days(days)
}

/// Parse a raw `Date` header into UTC.
///
/// Strict RFC 2822 first; then a few zone-less layouts read as UTC; then the
/// lenient RFC 822 parser from `mail-parser` for obsolete forms.
pub fn parse_message_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = strip_trailing_comment(raw.trim());
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }

    for layout in ["%a, %d %b %Y %H:%M:%S", "%d %b %Y %H:%M:%S", "%a, %d %b %Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }

    let header = format!("Date: {}\r\n\r\n", raw);
    let parsed = mail_parser::MessageParser::default().parse(header.as_bytes())?;
    let date = parsed.date()?;
    DateTime::from_timestamp(date.to_timestamp(), 0)
}

/// Drop a trailing "(UTC)"-style comment
fn strip_trailing_comment(raw: &str) -> &str {
    match raw.rfind('(') {
        Some(idx) if raw.ends_with(')') => raw[..idx].trim_end(),
        _ => raw,
    }
}
