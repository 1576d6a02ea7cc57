//! Loose date/time recovery from listing cells, filenames and report text.
//!
//! DMC writes dates every way imaginable: `2025-12-07`, `2025.12.07`,
//! `7-Dec-2025`, `07/12/2025`, with times as `1200 hrs`, `930 hrs`, `1600hrs` or `3:30 PM`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

static YMD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[.\-/_](\d{1,2})[.\-/_](\d{1,2})\b").unwrap());

static DMY_NAMED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?[\s.\-/]*([A-Za-z]{3,9})[\s.,\-/]*(\d{4})\b").unwrap()
});

static DMY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4})\b").unwrap());

static HRS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})[:.]?(\d{2})\s*hrs?\b").unwrap());

static CLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm|a\.m\.|p\.m\.)?").unwrap());

// "Situation Report on 2025.12.07 at 1200 hrs"
static SITREP_HEADLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)report\s+on\s+([0-9][0-9./\-]+[0-9])\s+at\s+(\d{3,4})\s*hrs?").unwrap()
});

// "at 1600hrs on 2025.01.15"
static ISSUED_AT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)at\s+(\d{3,4})\s*hrs?\s+on\s+([0-9][0-9./\-]+[0-9])").unwrap()
});

// "DATE : 7-Dec-2025" ... "TIME : 3:30 PM"
static DATE_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDATE\s*:\s*([^\n]+)").unwrap());

static TIME_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTIME\s*:\s*([^\n]+)").unwrap());

// Filenames such as "Situation_Report_on_2025.12.07_at_1200hrs.pdf"
static FILENAME_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on_(\d{4}[._\-]\d{1,2}[._\-]\d{1,2})").unwrap());

static FILENAME_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)at_(\d{3,4})\s*hrs?").unwrap());

/// How far into a document to look for a publication date
const HEADER_SCAN_CHARS: usize = 600;

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// First calendar date found anywhere in `text`
pub fn find_date(text: &str) -> Option<NaiveDate> {
    if let Some(cap) = YMD_REGEX.captures(text) {
        let date = NaiveDate::from_ymd_opt(cap[1].parse().ok()?, cap[2].parse().ok()?, cap[3].parse().ok()?);
        if date.is_some() {
            return date;
        }
    }

    for cap in DMY_NAMED_REGEX.captures_iter(text) {
        if let Some(month) = month_number(&cap[2]) {
            let date = NaiveDate::from_ymd_opt(cap[3].parse().ok()?, month, cap[1].parse().ok()?);
            if date.is_some() {
                return date;
            }
        }
    }

    let cap = DMY_REGEX.captures(text)?;
    NaiveDate::from_ymd_opt(cap[3].parse().ok()?, cap[2].parse().ok()?, cap[1].parse().ok()?)
}

/// First time of day found in `text` (`1200 hrs`, `16:00`, `3:30 PM`)
pub fn find_time(text: &str) -> Option<NaiveTime> {
    if let Some(cap) = HRS_REGEX.captures(text) {
        if let Some(time) = NaiveTime::from_hms_opt(cap[1].parse().ok()?, cap[2].parse().ok()?, 0) {
            return Some(time);
        }
    }

    let cap = CLOCK_REGEX.captures(text)?;
    let mut hour: u32 = cap[1].parse().ok()?;
    let minute: u32 = cap[2].parse().ok()?;
    if let Some(meridiem) = cap.get(3) {
        let pm = meridiem.as_str().to_lowercase().starts_with('p');
        hour %= 12;
        if pm {
            hour += 12;
        }
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse a compact `HHMM` or `HMM` time such as `1600` or `930`
fn parse_compact_time(digits: &str) -> Option<NaiveTime> {
    let value: u32 = digits.parse().ok()?;
    NaiveTime::from_hms_opt(value / 100, value % 100, 0)
}

/// Date plus optional time from free text; time defaults to midnight
pub fn find_datetime(text: &str) -> Option<NaiveDateTime> {
    let date = find_date(text)?;
    let time = find_time(text).unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

/// Publication timestamp from the header of a report's own text
pub fn find_report_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Some(cap) = SITREP_HEADLINE_REGEX.captures(text) {
        if let (Some(date), Some(time)) = (find_date(&cap[1]), parse_compact_time(&cap[2])) {
            return Some(date.and_time(time));
        }
    }

    if let Some(cap) = ISSUED_AT_REGEX.captures(text) {
        if let (Some(time), Some(date)) = (parse_compact_time(&cap[1]), find_date(&cap[2])) {
            return Some(date.and_time(time));
        }
    }

    if let Some(cap) = DATE_FIELD_REGEX.captures(text) {
        if let Some(date) = find_date(&cap[1]) {
            let time = TIME_FIELD_REGEX
                .captures(text)
                .and_then(|t| find_time(&t[1]))
                .unwrap_or(NaiveTime::MIN);
            return Some(date.and_time(time));
        }
    }

    let header: String = text.chars().take(HEADER_SCAN_CHARS).collect();
    find_datetime(&header)
}

/// Publication timestamp from a document URL or filename
pub fn datetime_from_filename(name: &str) -> Option<NaiveDateTime> {
    let decoded = name.replace("%20", "_").replace(' ', "_");
    let date = FILENAME_DATE_REGEX
        .captures(&decoded)
        .and_then(|cap| find_date(&cap[1]))
        .or_else(|| find_date(&decoded.replace('_', " ")))?;
    let time = FILENAME_TIME_REGEX
        .captures(&decoded)
        .and_then(|cap| parse_compact_time(&cap[1]))
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}
