//! Date normalization for free-text dates scraped out of change-log pages.
//!
//! Every input resolves to a [`NaiveDate`]; nothing in here fails. The rules:
//!
//! 1. Absolute dates (with a year) are parsed directly: ISO dates, RFC 3339
//!    timestamps, `October 28, 2025`, `28th October 2025`, `10/28/2025`, and
//!    the same forms embedded in longer text.
//! 2. Relative expressions (`today`, `yesterday`, `3 days ago`) are resolved
//!    against the reference instant.
//! 3. Partial dates (`Nov 25`, `5 January`) get the reference year, unless
//!    that lands more than [`FUTURE_TOLERANCE_DAYS`] in the future, in which
//!    case the previous year is used.
//! 4. Anything else is the reference instant's calendar date.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A partial date may land at most this many days after the reference date
/// before it is assumed to belong to the previous year.
pub const FUTURE_TOLERANCE_DAYS: i64 = 30;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Whole-string formats tried against the cleaned input, in order.
const FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d %Y",
    "%d %B %Y",
    "%A %B %d %Y",
    "%A %d %B %Y",
];

static ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static DAY_OF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+of\s+").unwrap());
static MONTH_PUNCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.").unwrap()
});
static SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").unwrap());

static FULL_DATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{m}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{m}\.?,?\s+\d{{4}}|\d{{4}}-\d{{1,2}}-\d{{1,2}})\b",
        m = MONTH
    ))
    .unwrap()
});

static PARTIAL_DATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?P<m1>{m})\.?\s+(?P<d1>\d{{1,2}})(?:st|nd|rd|th)?|(?P<d2>\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?(?P<m2>{m}))\b",
        m = MONTH
    ))
    .unwrap()
});

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?P<word>today|yesterday|just now)|(?P<n>\d+)\s+(?P<unit>minute|hour|day|week|month)s?\s+ago)$")
        .unwrap()
});

static DATE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*,?\s+)?(?:{m}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{m}\.?(?:,?\s+\d{{4}})?|\d{{4}}-\d{{1,2}}-\d{{1,2}})$",
        m = MONTH
    ))
    .unwrap()
});

/// Resolve a free-text date expression to a calendar date.
///
/// Never fails: input with no usable date information yields the calendar
/// date of `reference` (in UTC).
pub fn normalize(raw: &str, reference: DateTime<Utc>) -> NaiveDate {
    let today = reference.date_naive();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return today;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return ts.with_timezone(&Utc).date_naive();
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return ts.date();
    }

    let cleaned = clean(trimmed);

    if let Some(date) = parse_relative(&cleaned, today) {
        return date;
    }
    if let Some(date) = parse_absolute(&cleaned) {
        return date;
    }
    if let Some(date) = FULL_DATE_TOKEN
        .find(&cleaned)
        .and_then(|m| parse_absolute(&clean(m.as_str())))
    {
        return date;
    }
    if let Some(date) = parse_partial(&cleaned, today) {
        return date;
    }

    debug!(raw = %trimmed, %today, "No date information found; using reference date");
    today
}

/// Find the first full date (one that carries a year) inside `text`.
///
/// Returns the matched slice untouched so it can be fed to [`normalize`].
pub fn find_date_token(text: &str) -> Option<&str> {
    FULL_DATE_TOKEN.find(text).map(|m| m.as_str())
}

/// Whether `text` as a whole reads as a date, with or without a year
/// (`October 28, 2025`, `Tuesday, Nov 4`, `2025-10-28`).
pub fn is_date_heading(text: &str) -> bool {
    DATE_HEADING.is_match(text.trim())
}

/// Strip ordinal suffixes, "of", month-abbreviation dots and commas, then
/// collapse whitespace, so chrono formats see one canonical spelling.
fn clean(s: &str) -> String {
    let s = ORDINAL.replace_all(s, "$1");
    let s = DAY_OF.replace_all(&s, "$1 ");
    let s = MONTH_PUNCT.replace_all(&s, "$1");
    let s = SEPT.replace_all(&s, "Sep");
    crate::utils::collapse_whitespace(&s.replace(',', " "))
}

fn parse_absolute(cleaned: &str) -> Option<NaiveDate> {
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}

fn parse_relative(cleaned: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = RELATIVE.captures(cleaned)?;
    if let Some(word) = caps.name("word") {
        return match word.as_str().to_ascii_lowercase().as_str() {
            "yesterday" => today.pred_opt(),
            _ => Some(today),
        };
    }

    let n: u32 = caps.name("n")?.as_str().parse().ok()?;
    match caps.name("unit")?.as_str().to_ascii_lowercase().as_str() {
        "minute" | "hour" => Some(today),
        "day" => today.checked_sub_signed(Duration::days(i64::from(n))),
        "week" => today.checked_sub_signed(Duration::weeks(i64::from(n))),
        "month" => today.checked_sub_months(Months::new(n)),
        _ => None,
    }
}

fn parse_partial(cleaned: &str, today: NaiveDate) -> Option<NaiveDate> {
    PARTIAL_DATE_TOKEN.captures_iter(cleaned).find_map(|caps| {
        let (month, day) = match (caps.name("m1"), caps.name("d1")) {
            (Some(m), Some(d)) => (m, d),
            _ => (caps.name("m2")?, caps.name("d2")?),
        };
        // Lowercase "may" inside running text is the verb, not the month.
        let whole = caps.get(0)?.as_str().len() == cleaned.len();
        if month.as_str() == "may" && !whole {
            return None;
        }
        let month = month_number(month.as_str())?;
        let day: u32 = day.as_str().parse().ok()?;
        infer_year(month, day, today)
    })
}

/// Pick the year for a month/day pair: the reference year unless that is
/// more than [`FUTURE_TOLERANCE_DAYS`] ahead, otherwise the year before.
fn infer_year(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if (date - today).num_days() <= FUTURE_TOLERANCE_DAYS => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
    }
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| *m == prefix)
        .map(|idx| idx as u32 + 1)
}
