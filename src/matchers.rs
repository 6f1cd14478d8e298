// src/matchers.rs - Structural assertions over JSON responses

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{ConformanceError, Result};

/// Every key of `expected` is present in `actual` with an equal value
pub fn object_contains(actual: &Value, expected: &Value) -> Result<()> {
    if contains_object(actual, expected) {
        Ok(())
    } else {
        Err(ConformanceError::assertion(format!(
            "Expected object containing {}, got {}",
            expected, actual
        )))
    }
}

/// Negation of [`object_contains`]
pub fn object_not_contains(actual: &Value, unexpected: &Value) -> Result<()> {
    if contains_object(actual, unexpected) {
        Err(ConformanceError::assertion(format!(
            "Expected object not containing {}, got {}",
            unexpected, actual
        )))
    } else {
        Ok(())
    }
}

fn contains_object(actual: &Value, expected: &Value) -> bool {
    match (actual.as_object(), expected.as_object()) {
        (Some(actual), Some(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key) == Some(value)),
        _ => false,
    }
}

/// Each expected item equals some element of `actual`
pub fn array_contains_all(actual: &Value, expected: &[Value]) -> Result<()> {
    let items = as_array(actual)?;
    let missing: Vec<&Value> = expected
        .iter()
        .filter(|wanted| !items.contains(wanted))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConformanceError::assertion(format!(
            "Array of {} items is missing {}",
            items.len(),
            render(&missing)
        )))
    }
}

/// No unexpected item equals any element of `actual`.
///
/// Every item is checked on its own, which is stricter than rejecting only
/// when the whole group is present.
pub fn array_excludes(actual: &Value, unexpected: &[Value]) -> Result<()> {
    let items = as_array(actual)?;
    let present: Vec<&Value> = unexpected
        .iter()
        .filter(|item| items.contains(item))
        .collect();

    if present.is_empty() {
        Ok(())
    } else {
        Err(ConformanceError::assertion(format!(
            "Array unexpectedly contains {}",
            render(&present)
        )))
    }
}

/// Elements sorted by their `id` field
pub fn sorted_by_id(values: &[Value]) -> Vec<Value> {
    let mut sorted = values.to_vec();
    sorted.sort_by(compare_ids);
    sorted
}

/// Same elements as `expected`, ignoring order
pub fn same_members_by_id(actual: &Value, expected: &[Value]) -> Result<()> {
    let items = as_array(actual)?;
    let actual_sorted = sorted_by_id(items);
    let expected_sorted = sorted_by_id(expected);

    if actual_sorted == expected_sorted {
        Ok(())
    } else {
        Err(ConformanceError::assertion(format!(
            "Expected exactly {} (sorted by id), got {}",
            Value::Array(expected_sorted),
            Value::Array(actual_sorted)
        )))
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ConformanceError::assertion(format!("Expected a JSON array, got {}", value)))
}

// numbers sort numerically, strings lexically, anything else last
fn compare_ids(a: &Value, b: &Value) -> Ordering {
    fn rank(id: Option<&Value>) -> u8 {
        match id {
            Some(Value::Number(_)) => 0,
            Some(Value::String(_)) => 1,
            Some(_) => 2,
            None => 3,
        }
    }

    let (a, b) = (a.get("id"), b.get("id"));
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&y.as_f64().unwrap_or_default()),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    })
}

fn render(values: &[&Value]) -> String {
    let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
