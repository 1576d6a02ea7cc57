//! Cell text → `MetricValue`. Parsers return `Err` with a short reason for
//! text that is present but unreadable; callers record it as `Unknown` and warn.

use crate::extractor::{clean_cell, is_dash};
use crate::types::MetricValue;
use regex::Regex;
use std::sync::LazyLock;

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?\d[\d,]*(?:\.\d+)?)\s*(?:[a-zA-Z%]{1,4}\.?)?$").unwrap()
});

static LIST_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:[,;\n]|\band\b)\s*").unwrap());

/// Boilerplate around division names in landslide tables
static DIVISION_NOISE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:DSD|DS\s+Division|D\.S\.?\s*Division|Divisional\s+Secretariat(?:\s+Divisions?)?|Divisions?)\b|\(\s*\)")
        .unwrap()
});

const NOT_AVAILABLE: [&str; 5] = ["n/a", "na", "n.a.", "not available", "not reported"];

fn missing_value(text: &str, dash_as_zero: bool, zero: MetricValue) -> Option<MetricValue> {
    if text.is_empty() || NOT_AVAILABLE.contains(&text.to_lowercase().as_str()) {
        return Some(MetricValue::Unknown);
    }
    if is_dash(text) {
        return Some(if dash_as_zero { zero } else { MetricValue::Unknown });
    }
    if text.eq_ignore_ascii_case("nil") {
        return Some(zero);
    }
    None
}

/// The numeric part of a cell, separators removed
fn number_text(text: &str) -> Result<String, String> {
    let captures = NUMBER_REGEX
        .captures(text)
        .ok_or_else(|| format!("'{text}' is not a number"))?;
    Ok(captures[1].replace(',', ""))
}

fn parse_number(text: &str) -> Result<f64, String> {
    number_text(text)?
        .parse::<f64>()
        .map_err(|e| format!("'{text}': {e}"))
}

/// Counts are read as integers so values past `i64` are refused, never clamped
pub fn parse_count(raw: &str, dash_as_zero: bool) -> Result<MetricValue, String> {
    let text = clean_cell(raw);
    if let Some(value) = missing_value(&text, dash_as_zero, MetricValue::Count(0)) {
        return Ok(value);
    }
    let digits = number_text(&text)?;
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    if fraction.chars().any(|c| c != '0') {
        return Err(format!("'{text}' is not a whole number"));
    }
    whole
        .parse::<i64>()
        .map(MetricValue::Count)
        .map_err(|_| format!("'{text}' is out of range for a count"))
}

pub fn parse_measure(raw: &str, dash_as_zero: bool) -> Result<MetricValue, String> {
    let text = clean_cell(raw);
    if let Some(value) = missing_value(&text, dash_as_zero, MetricValue::Measure(0.0)) {
        return Ok(value);
    }
    parse_number(&text).map(MetricValue::Measure)
}

pub fn parse_category(raw: &str) -> MetricValue {
    let text = clean_cell(raw);
    if text.is_empty() || is_dash(&text) {
        MetricValue::Unknown
    } else {
        MetricValue::Category(text)
    }
}

/// Split a cell of division names; a dash or empty cell is an empty list
pub fn parse_list(raw: &str) -> MetricValue {
    let text = DIVISION_NOISE_REGEX.replace_all(raw, " ");
    let mut items: Vec<String> = Vec::new();
    for part in LIST_SPLIT_REGEX.split(&text) {
        let item = crate::extractor::strip_serial_prefix(&clean_cell(part));
        let item = item.trim_matches(|c: char| c == '.' || c == '-' || c.is_whitespace());
        if item.chars().count() < 3
            || item.chars().all(|c| c.is_ascii_digit())
            || item.eq_ignore_ascii_case("none")
        {
            continue;
        }
        if !items.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            items.push(item.to_string());
        }
    }
    MetricValue::List(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_tolerate_separators_and_units() {
        assert_eq!(parse_count("1,250", false), Ok(MetricValue::Count(1250)));
        assert_eq!(parse_count(" 12 ", false), Ok(MetricValue::Count(12)));
        assert_eq!(parse_count("12.0", false), Ok(MetricValue::Count(12)));
        assert_eq!(parse_count("3*", false), Ok(MetricValue::Count(3)));
        assert!(parse_count("12.5", false).is_err());
        assert!(parse_count("about twelve", false).is_err());
    }

    #[test]
    fn counts_past_i64_are_rejected() {
        assert_eq!(
            parse_count("9,223,372,036,854,775,807", false),
            Ok(MetricValue::Count(i64::MAX))
        );
        assert_eq!(
            parse_count("99999999999999999999", false),
            Err("'99999999999999999999' is out of range for a count".to_string())
        );
        assert!(parse_count("-99999999999999999999.0", false).is_err());
    }

    #[test]
    fn dash_and_empty_are_unknown_unless_configured() {
        assert_eq!(parse_count("-", false), Ok(MetricValue::Unknown));
        assert_eq!(parse_count("–", true), Ok(MetricValue::Count(0)));
        assert_eq!(parse_count("", true), Ok(MetricValue::Unknown));
        assert_eq!(parse_count("N/A", false), Ok(MetricValue::Unknown));
        assert_eq!(parse_count("Nil", false), Ok(MetricValue::Count(0)));
    }

    #[test]
    fn measures_strip_units() {
        assert_eq!(parse_measure("4.35 m", false), Ok(MetricValue::Measure(4.35)));
        assert_eq!(parse_measure("120mm", false), Ok(MetricValue::Measure(120.0)));
        assert_eq!(parse_measure("-", false), Ok(MetricValue::Unknown));
    }

    #[test]
    fn lists_split_and_drop_boilerplate() {
        assert_eq!(
            parse_list("Ella, Haliela DSD and Passara; 12"),
            MetricValue::List(vec!["Ella".into(), "Haliela".into(), "Passara".into()])
        );
        assert_eq!(
            parse_list("Walapane Divisional Secretariat Division,\nwalapane"),
            MetricValue::List(vec!["Walapane".into()])
        );
        assert_eq!(parse_list("-"), MetricValue::List(vec![]));
        assert_eq!(parse_list("None"), MetricValue::List(vec![]));
    }

    #[test]
    fn categories_keep_text() {
        assert_eq!(parse_category(" Rising "), MetricValue::Category("Rising".into()));
        assert_eq!(parse_category("-"), MetricValue::Unknown);
    }
}
