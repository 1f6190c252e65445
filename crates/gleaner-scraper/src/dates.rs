//! Date normalization for scraped post and event dates.
//!
//! Sites print dates in every imaginable shape, usually behind a label such
//! as "Posted on:". [`DateNormalizer`] strips known labels, rewrites a few
//! localized month names and then tries an ordered list of formats. The
//! first format that reads the whole string wins, so ambiguous numeric
//! dates resolve month-first.

use crate::error::DateParseError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gleaner_core::Timestamp;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Labels commonly printed in front of a date.
pub const DEFAULT_PREFIXES: &[&str] = &[
    "Posted on",
    "Posted at",
    "Posted by",
    "Posted date:",
    "Posted -",
    "Posted:",
    "Posted",
    "Published on",
    "Published at",
    "Published by",
    "Published -",
    "Published:",
    "Published",
    "Last updated on",
    "Last updated:",
    "Last updated",
    "Last modified:",
    "Last modified",
    "Updated on",
    "Updated -",
    "Updated:",
    "Updated",
    "Modified on",
    "Modified:",
    "Modified",
    "Created on",
    "Created -",
    "Created:",
    "Created",
    "Added on",
    "Added",
    "Release date:",
    "Release:",
    "Publication date:",
    "Post date:",
    "Article date:",
    "News date:",
    "Event date:",
    "Date -",
    "Date:",
    "Time -",
    "Time:",
    "Post:",
    "Article:",
    "News:",
    "Event:",
    "On",
    "At",
    ":",
    // French
    "Date de publication:",
    "Dernière mise à jour:",
    "Mis à jour:",
    "Publié le",
    "Publié:",
    "Posté:",
    "Créé:",
    "Nouvelles:",
    "Événement:",
    // Arabic
    "تاريخ النشر:",
    "تاريخ:",
    "منشور:",
    "مقالة:",
    "أخبار:",
    "حدث:",
];

/// How a format string is read.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// Carries its own offset
    Zoned(&'static str),
    /// Date and time, read as UTC
    DateTime(&'static str),
    /// Calendar date, midnight UTC
    Date(&'static str),
    /// Month and year, first of the month
    MonthYear(&'static str),
    /// Bare four-digit year, first of January
    Year,
}

// Order matters: month/day before day/month for ambiguous numeric dates.
const PATTERNS: &[Pattern] = &[
    Pattern::Date("%A, %B %d, %Y"),
    Pattern::Date("%B %d, %Y"),
    Pattern::Date("%Y-%m-%d"),
    Pattern::Date("%m/%d/%Y"),
    Pattern::Date("%d/%m/%Y"),
    Pattern::Date("%Y/%m/%d"),
    Pattern::Date("%d-%m-%Y"),
    Pattern::Date("%Y.%m.%d"),
    Pattern::Date("%d %B %Y"),
    Pattern::Date("%A %d %B %Y"),
    Pattern::Date("%Y%m%d"),
    Pattern::Date("%m-%d-%Y"),
    Pattern::Date("%d.%m.%Y"),
    Pattern::Date("%Y-%B-%d"),
    Pattern::Date("%d-%B-%Y"),
    Pattern::Date("%Y %B %d"),
    Pattern::Date("%B %d %Y"),
    Pattern::Date("%Y/%B/%d"),
    Pattern::Date("%d %m %Y"),
    Pattern::Date("%Y %m %d"),
    Pattern::Date("%Y年%m月%d日"),
    Pattern::Date("%Y년 %m월 %d일"),
    Pattern::MonthYear("%B %Y"),
    Pattern::MonthYear("%m/%Y"),
    Pattern::MonthYear("%Y-%m"),
    Pattern::Year,
    Pattern::DateTime("%Y-%m-%d %H:%M"),
    Pattern::DateTime("%Y-%m-%d %H:%M:%S"),
    Pattern::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Pattern::DateTime("%Y-%m-%dT%H:%M:%S"),
    Pattern::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Pattern::Zoned("%Y-%m-%dT%H:%M:%S%.f%z"),
    Pattern::Zoned("%Y-%m-%d %H:%M:%S %z"),
    Pattern::DateTime("%Y/%m/%d %H:%M"),
    Pattern::DateTime("%Y/%m/%d %H:%M:%S"),
    Pattern::DateTime("%d-%m-%Y %H:%M"),
    Pattern::DateTime("%d-%m-%Y %H:%M:%S"),
    Pattern::DateTime("%m/%d/%Y %I:%M %p"),
    Pattern::DateTime("%m/%d/%Y %I:%M:%S %p"),
    Pattern::DateTime("%d/%m/%Y %H:%M"),
    Pattern::DateTime("%d/%m/%Y %H:%M:%S"),
    Pattern::DateTime("%Y%m%d%H%M"),
    Pattern::DateTime("%Y%m%d%H%M%S"),
    Pattern::DateTime("%A, %d %B %Y %H:%M:%S"),
    Pattern::DateTime("%d %B %Y %H:%M:%S"),
    Pattern::DateTime("%d %B %Y %H:%M"),
    Pattern::DateTime("%B %d, %Y %I:%M %p"),
    Pattern::DateTime("%a %b %d %H:%M:%S %Y"),
    Pattern::DateTime("%Y年%m月%d日 %H:%M:%S"),
    Pattern::DateTime("%Y년 %m월 %d일 %H:%M:%S"),
];

/// Localized month names rewritten to English before parsing.
const MONTH_NAMES: &[(&str, &str)] = &[
    ("janvier", "January"),
    ("février", "February"),
    ("fevrier", "February"),
    ("mars", "March"),
    ("avril", "April"),
    ("mai", "May"),
    ("juin", "June"),
    ("juillet", "July"),
    ("août", "August"),
    ("aout", "August"),
    ("septembre", "September"),
    ("octobre", "October"),
    ("novembre", "November"),
    ("décembre", "December"),
    ("decembre", "December"),
    ("enero", "January"),
    ("febrero", "February"),
    ("marzo", "March"),
    ("abril", "April"),
    ("mayo", "May"),
    ("junio", "June"),
    ("julio", "July"),
    ("agosto", "August"),
    ("septiembre", "September"),
    ("setiembre", "September"),
    ("octubre", "October"),
    ("noviembre", "November"),
    ("diciembre", "December"),
];

const WEEKDAY_NAMES: &[(&str, &str)] = &[
    ("lundi", "Monday"),
    ("mardi", "Tuesday"),
    ("mercredi", "Wednesday"),
    ("jeudi", "Thursday"),
    ("vendredi", "Friday"),
    ("samedi", "Saturday"),
    ("dimanche", "Sunday"),
];

fn ordinal_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th|er)\b").expect("valid regex"))
}

impl Pattern {
    fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Self::Zoned(fmt) => DateTime::parse_from_str(s, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt)
                .ok()
                .map(|dt| dt.and_utc()),
            Self::Date(fmt) => NaiveDate::parse_from_str(s, fmt).ok().and_then(midnight),
            Self::MonthYear(fmt) => {
                NaiveDate::parse_from_str(&format!("1 {s}"), &format!("%d {fmt}"))
                    .ok()
                    .and_then(midnight)
            }
            Self::Year => {
                if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse::<i32>()
                    .ok()
                    .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
                    .and_then(midnight)
            }
        }
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Parses heterogeneous date strings into UTC timestamps.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    /// Sorted longest first so "Posted on" beats "Posted".
    prefixes: Vec<String>,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::with_prefixes(DEFAULT_PREFIXES.iter().copied())
    }
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let mut seen = HashSet::new();
        prefixes.retain(|p| seen.insert(p.to_lowercase()));
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        Self { prefixes }
    }

    /// Remove leading labels until none applies.
    pub fn strip_prefixes<'a>(&self, raw: &'a str) -> &'a str {
        let mut rest = raw.trim();
        'outer: loop {
            for prefix in &self.prefixes {
                if let Some(after) = strip_label(rest, prefix) {
                    rest = after.trim_start();
                    continue 'outer;
                }
            }
            return rest;
        }
    }

    /// Parse `raw` into a UTC timestamp.
    ///
    /// Naive values are read as UTC; month-year and year-only values
    /// resolve to the first day of the period.
    pub fn normalize(&self, raw: &str) -> Result<Timestamp, DateParseError> {
        let cleaned = clean(self.strip_prefixes(raw));
        let fail = || DateParseError {
            raw: raw.to_string(),
        };
        if cleaned.is_empty() {
            return Err(fail());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
            return Ok(Timestamp::from_datetime(dt.with_timezone(&Utc)));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
            return Ok(Timestamp::from_datetime(dt.with_timezone(&Utc)));
        }

        PATTERNS
            .iter()
            .find_map(|pattern| pattern.parse(&cleaned))
            .map(Timestamp::from_datetime)
            .ok_or_else(fail)
    }

    /// Whether `text` reads as a date at all.
    pub fn looks_like_date(&self, text: &str) -> bool {
        self.normalize(text).is_ok()
    }
}

/// Case-insensitive label match at the start of `s`. Labels ending in a
/// letter must not run into the following word.
fn strip_label<'a>(s: &'a str, label: &str) -> Option<&'a str> {
    let len = label.len();
    if s.len() < len || !s.is_char_boundary(len) {
        return None;
    }
    let (head, tail) = s.split_at(len);
    if head.to_lowercase() != label.to_lowercase() {
        return None;
    }
    let label_ends_in_word = label.chars().last().is_some_and(char::is_alphanumeric);
    let tail_starts_word = tail.chars().next().is_some_and(char::is_alphanumeric);
    if label_ends_in_word && tail_starts_word {
        return None;
    }
    Some(tail)
}

/// Collapse whitespace, drop ordinal suffixes and translate localized
/// month and weekday names.
fn clean(s: &str) -> String {
    let s = ordinal_suffix().replace_all(s, "$1");
    s.split_whitespace()
        .map(|token| {
            let bare = token.trim_end_matches(['.', ',']);
            let lower = bare.to_lowercase();
            MONTH_NAMES
                .iter()
                .chain(WEEKDAY_NAMES)
                .find(|(local, _)| *local == lower)
                .map_or_else(
                    || token.to_string(),
                    |(_, english)| format!("{english}{}", &token[bare.len()..]),
                )
        })
        .collect::<Vec<_>>()
        .join(" ")
}
