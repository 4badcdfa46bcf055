use agentscore_core::{EvaluationConfig, MatchStrategy, MatchType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::text::render_value;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Result of a typed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub score: f64,
    pub strategy: MatchStrategy,
    /// Why the values did not match, when they did not.
    pub detail: Option<String>,
}

impl MatchOutcome {
    fn matched(strategy: MatchStrategy) -> Self {
        Self {
            score: 1.0,
            strategy,
            detail: None,
        }
    }

    fn mismatched(strategy: MatchStrategy, detail: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            strategy,
            detail: Some(detail.into()),
        }
    }

    pub fn is_match(&self) -> bool {
        self.score >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Decided(MatchOutcome),
    /// Free text: the accuracy decision tree settles it.
    Delegate,
}

/// Type-specific comparator, chosen once per ground-truth record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    Text,
    Number { tolerance: f64 },
    Date,
    Email,
    Json { tolerance: f64, max_depth: usize },
    Exact,
}

impl Comparator {
    pub fn for_match_type(match_type: MatchType, config: &EvaluationConfig) -> Self {
        match match_type {
            MatchType::Text | MatchType::Paragraph => Comparator::Text,
            MatchType::Number => Comparator::Number {
                tolerance: config.numeric_tolerance,
            },
            MatchType::Date => Comparator::Date,
            MatchType::Email => Comparator::Email,
            MatchType::Json => Comparator::Json {
                tolerance: config.numeric_tolerance,
                max_depth: config.max_depth,
            },
            MatchType::Exact => Comparator::Exact,
        }
    }

    pub fn compare(&self, expected: &Value, actual: &Value) -> Comparison {
        let outcome = match *self {
            Comparator::Text => return Comparison::Delegate,
            Comparator::Number { tolerance } => compare_numbers(expected, actual, tolerance),
            Comparator::Date => compare_dates(expected, actual),
            Comparator::Email => compare_emails(expected, actual),
            Comparator::Json {
                tolerance,
                max_depth,
            } => compare_json(expected, actual, tolerance, max_depth),
            Comparator::Exact => {
                let (e, a) = (render_value(expected), render_value(actual));
                if e == a {
                    MatchOutcome::matched(MatchStrategy::Exact)
                } else {
                    MatchOutcome::mismatched(MatchStrategy::Exact, format!("{a:?} != {e:?}"))
                }
            }
        };
        Comparison::Decided(outcome)
    }
}

fn compare_numbers(expected: &Value, actual: &Value, tolerance: f64) -> MatchOutcome {
    let Some(e) = parse_number(expected) else {
        return MatchOutcome::mismatched(
            MatchStrategy::Numeric,
            format!("expected value {expected} is not numeric"),
        );
    };
    let Some(a) = parse_number(actual) else {
        return MatchOutcome::mismatched(
            MatchStrategy::Numeric,
            format!("output {actual} is not numeric"),
        );
    };
    if (a - e).abs() <= tolerance {
        MatchOutcome::matched(MatchStrategy::Numeric)
    } else {
        MatchOutcome::mismatched(
            MatchStrategy::Numeric,
            format!("|{a} - {e}| exceeds tolerance {tolerance}"),
        )
    }
}

fn compare_dates(expected: &Value, actual: &Value) -> MatchOutcome {
    let Some(e) = normalize_date(expected) else {
        return MatchOutcome::mismatched(
            MatchStrategy::Exact,
            format!("expected value {expected} is not a recognised date"),
        );
    };
    let Some(a) = normalize_date(actual) else {
        return MatchOutcome::mismatched(
            MatchStrategy::Exact,
            format!("output {actual} is not a recognised date"),
        );
    };
    if a == e {
        MatchOutcome::matched(MatchStrategy::Exact)
    } else {
        MatchOutcome::mismatched(MatchStrategy::Exact, format!("date {a} != {e}"))
    }
}

fn compare_emails(expected: &Value, actual: &Value) -> MatchOutcome {
    let e = normalize_email(&render_value(expected));
    let a = normalize_email(&render_value(actual));
    if a == e {
        MatchOutcome::matched(MatchStrategy::Exact)
    } else {
        MatchOutcome::mismatched(MatchStrategy::Exact, format!("email {a:?} != {e:?}"))
    }
}

fn compare_json(expected: &Value, actual: &Value, tolerance: f64, max_depth: usize) -> MatchOutcome {
    let expected = match parse_structured(expected) {
        Ok(value) => value,
        Err(reason) => {
            return MatchOutcome::mismatched(
                MatchStrategy::Structural,
                format!("expected value is not valid JSON: {reason}"),
            )
        }
    };
    let actual = match parse_structured(actual) {
        Ok(value) => value,
        Err(reason) => {
            return MatchOutcome::mismatched(
                MatchStrategy::Structural,
                format!("output is not valid JSON: {reason}"),
            )
        }
    };
    match structurally_equal(&expected, &actual, tolerance, max_depth) {
        Ok(true) => MatchOutcome::matched(MatchStrategy::Structural),
        Ok(false) => MatchOutcome::mismatched(MatchStrategy::Structural, "structures differ"),
        Err(reason) => MatchOutcome::mismatched(MatchStrategy::Structural, reason),
    }
}

/// Read a number from a JSON number or a numeric string. `,` and `_`
/// thousands separators are ignored.
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| !matches!(c, ',' | '_')).collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Normalize a date string to a calendar date.
pub fn normalize_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

pub fn normalize_email(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    match lowered.strip_prefix("mailto:") {
        Some(rest) => rest.trim().to_string(),
        None => lowered,
    }
}

/// Stringified JSON is parsed; any other value is taken as-is.
pub fn parse_structured(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
        other => Ok(other.clone()),
    }
}

/// Deep equality: objects compare order-independently, arrays in order,
/// numbers within `tolerance`. Nesting deeper than `max_depth` is an error.
pub fn structurally_equal(
    expected: &Value,
    actual: &Value,
    tolerance: f64,
    max_depth: usize,
) -> Result<bool, String> {
    deep_equal(expected, actual, tolerance, 0, max_depth)
}

fn deep_equal(
    expected: &Value,
    actual: &Value,
    tolerance: f64,
    depth: usize,
    max_depth: usize,
) -> Result<bool, String> {
    if depth > max_depth {
        return Err(format!("nesting exceeds max_depth {max_depth}"));
    }
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => Ok(match (e.as_f64(), a.as_f64()) {
            (Some(e), Some(a)) => (e - a).abs() <= tolerance,
            _ => e == a,
        }),
        (Value::Object(e), Value::Object(a)) => {
            if e.len() != a.len() {
                return Ok(false);
            }
            for (key, e_value) in e {
                let Some(a_value) = a.get(key) else {
                    return Ok(false);
                };
                if !deep_equal(e_value, a_value, tolerance, depth + 1, max_depth)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Ok(false);
            }
            for (e_item, a_item) in e.iter().zip(a) {
                if !deep_equal(e_item, a_item, tolerance, depth + 1, max_depth)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(expected == actual),
    }
}
