//! Conversion of scraped time labels ("27s", "5m", "Oct 26", "Oct 26, 2025 · 3:04 PM UTC")
//! into absolute timestamps.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*([smhd])$").expect("valid relative time regex"));

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Resolves `token` against `now`. Returns `None` when no grammar matches.
///
/// Relative forms (`{N}s`, `{N}m`, `{N}h`, `{N}d`) are tried first, then a lenient
/// absolute date. An absolute date that lands after `now` is moved to the previous
/// year, which covers "Dec 31" seen on Jan 1 but is only a heuristic near year
/// boundaries.
pub fn normalize(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(resolved) = parse_relative(token, now) {
        return Some(resolved);
    }

    let parsed = parse_absolute(token, now.year())?;
    if parsed > now {
        return parsed.with_year(now.year() - 1);
    }
    Some(parsed)
}

fn parse_relative(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_REGEX.captures(token)?;
    let amount: i64 = caps[1].parse().ok()?;
    let delta = match &caps[2] {
        "s" => TimeDelta::try_seconds(amount)?,
        "m" => TimeDelta::try_minutes(amount)?,
        "h" => TimeDelta::try_hours(amount)?,
        "d" => TimeDelta::try_days(amount)?,
        _ => return None,
    };
    now.checked_sub_signed(delta)
}

#[derive(Debug, Default)]
struct DateParts {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: u32,
    minute: u32,
    second: u32,
    meridiem: Option<Meridiem>,
}

#[derive(Debug, Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

fn parse_absolute(token: &str, default_year: i32) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(token) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    let parts = scan_parts(token)?;
    let date = NaiveDate::from_ymd_opt(
        parts.year.unwrap_or(default_year),
        parts.month?,
        parts.day?,
    )?;
    let hour = match (parts.meridiem, parts.hour) {
        (Some(Meridiem::Pm), h) if h < 12 => h + 12,
        (Some(Meridiem::Am), 12) => 0,
        (_, h) => h,
    };
    let naive = date.and_hms_opt(hour, parts.minute, parts.second)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Fuzzy scan: picks out month, day, year and clock time, ignoring any other words.
fn scan_parts(token: &str) -> Option<DateParts> {
    let mut parts = DateParts::default();
    let cleaned: String = token
        .chars()
        .map(|c| if c == ',' || c == '·' { ' ' } else { c })
        .collect();

    for word in cleaned.split_whitespace() {
        let word = word.trim_matches('.').to_ascii_lowercase();
        if word.is_empty() {
            continue;
        }

        if word.contains(':') {
            let (clock, meridiem) = split_meridiem(&word);
            // Words like "note:" are not clocks; ignore them like any other word.
            let Some((hour, minute, second)) = parse_clock(clock) else {
                continue;
            };
            parts.hour = hour;
            parts.minute = minute;
            parts.second = second;
            if meridiem.is_some() {
                parts.meridiem = meridiem;
            }
        } else if word == "am" {
            parts.meridiem = Some(Meridiem::Am);
        } else if word == "pm" {
            parts.meridiem = Some(Meridiem::Pm);
        } else if word.chars().all(|c| c.is_ascii_digit()) {
            match word.len() {
                4 if parts.year.is_none() => parts.year = word.parse().ok(),
                1 | 2 if parts.day.is_none() => parts.day = word.parse().ok(),
                _ => {}
            }
        } else if parts.month.is_none() && word.len() >= 3 {
            if let Some(index) = MONTHS.iter().position(|name| name.starts_with(word.as_str())) {
                parts.month = Some(index as u32 + 1);
            }
        }
    }

    Some(parts)
}

fn parse_clock(clock: &str) -> Option<(u32, u32, u32)> {
    let mut fields = clock.split(':');
    let hour = fields.next()?.parse().ok()?;
    let minute = fields.next()?.parse().ok()?;
    let second = match fields.next() {
        Some(field) => field.parse().ok()?,
        None => 0,
    };
    if fields.next().is_some() {
        return None;
    }
    Some((hour, minute, second))
}

fn split_meridiem(word: &str) -> (&str, Option<Meridiem>) {
    if let Some(clock) = word.strip_suffix("pm") {
        (clock, Some(Meridiem::Pm))
    } else if let Some(clock) = word.strip_suffix("am") {
        (clock, Some(Meridiem::Am))
    } else {
        (word, None)
    }
}
