//! The comparison operator set shared by condition, filter, and switch.
//!
//! Comparisons are loose and string-biased: configs arrive as text while
//! upstream data arrives typed, so `equals` holds for `42` vs `"42"`.
//! Numeric operators parse both sides and fall back to lexicographic
//! string comparison when either side has no numeric reading.

use regex::Regex;
use serde_json::Value;
use weft_core::value::{coerce_bool, coerce_f64, coerce_string, is_empty};

/// Evaluate `operator` over an optional field value and the config side.
///
/// `actual` is `None` when the field path did not resolve. Returns `None`
/// for an unknown operator — condition treats that as the `false` branch,
/// filter lets all items through.
#[must_use]
pub fn evaluate(actual: Option<&Value>, operator: &str, expected: &Value) -> Option<bool> {
    let result = match operator {
        "exists" => actual.is_some(),
        "notExists" => actual.is_none(),
        "isEmpty" => actual.is_none_or(is_empty),
        "isNotEmpty" => actual.is_some_and(|value| !is_empty(value)),
        "isTrue" => actual.and_then(coerce_bool) == Some(true),
        "isFalse" => actual.and_then(coerce_bool) == Some(false),
        "equals" => loose_eq(actual, expected),
        "notEquals" => !loose_eq(actual, expected),
        "contains" => contains(actual, expected),
        "notContains" => !contains(actual, expected),
        "startsWith" => {
            string_of(actual).starts_with(coerce_string(expected).as_str())
        }
        "endsWith" => string_of(actual).ends_with(coerce_string(expected).as_str()),
        "greaterThan" => numeric_cmp(actual, expected, |ord| ord == std::cmp::Ordering::Greater),
        "lessThan" => numeric_cmp(actual, expected, |ord| ord == std::cmp::Ordering::Less),
        "greaterOrEqual" => numeric_cmp(actual, expected, |ord| ord != std::cmp::Ordering::Less),
        "lessOrEqual" => numeric_cmp(actual, expected, |ord| ord != std::cmp::Ordering::Greater),
        "regex" => regex_match(actual, expected),
        _ => return None,
    };
    Some(result)
}

fn string_of(actual: Option<&Value>) -> String {
    actual.map(coerce_string).unwrap_or_default()
}

fn loose_eq(actual: Option<&Value>, expected: &Value) -> bool {
    string_of(actual) == coerce_string(expected)
}

fn contains(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) => {
            let needle = coerce_string(expected);
            items.iter().any(|item| coerce_string(item) == needle)
        }
        other => string_of(other).contains(coerce_string(expected).as_str()),
    }
}

fn numeric_cmp(
    actual: Option<&Value>,
    expected: &Value,
    check: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let left = actual.and_then(coerce_f64);
    let right = coerce_f64(expected);
    match (left, right) {
        (Some(l), Some(r)) => l.partial_cmp(&r).is_some_and(check),
        // Parse failure on either side: compare as strings.
        _ => check(string_of(actual).cmp(&coerce_string(expected))),
    }
}

fn regex_match(actual: Option<&Value>, expected: &Value) -> bool {
    let pattern = coerce_string(expected);
    match Regex::new(&pattern) {
        Ok(regex) => regex.is_match(&string_of(actual)),
        Err(_) => false,
    }
}
