//! Condition operators. Conditions never fail: a missing path is "empty".

use crate::schema::{Condition, Operator, RuleValue};
use crate::snapshot::Snapshot;
use serde_json::Value;

pub fn evaluate_condition(condition: &Condition, snapshot: &Snapshot) -> bool {
    let actual = snapshot.get(&condition.field);
    let expected = condition.value.as_ref();
    match condition.operator {
        Operator::Equals => values_equal(actual, expected),
        Operator::NotEquals => !values_equal(actual, expected),
        Operator::Contains => contains(actual, expected).unwrap_or(false),
        Operator::NotContains => contains(actual, expected).map(|hit| !hit).unwrap_or(false),
        Operator::IsEmpty => is_empty(actual),
        Operator::IsNotEmpty => !is_empty(actual),
    }
}

fn values_equal(actual: Option<&Value>, expected: Option<&RuleValue>) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), None) => true,
        (Some(v), Some(e)) => e.matches(v),
        _ => false,
    }
}

/// `Some(hit)` for the value kinds `contains` supports (arrays, strings); `None` otherwise.
fn contains(actual: Option<&Value>, expected: Option<&RuleValue>) -> Option<bool> {
    let expected = expected?;
    match actual? {
        Value::Array(items) => Some(match expected {
            RuleValue::List(wanted) => wanted
                .iter()
                .all(|w| items.iter().any(|i| i.as_str() == Some(w.as_str()))),
            scalar => items.iter().any(|i| scalar.matches(i)),
        }),
        Value::String(s) => {
            let needle = expected.as_text()?;
            Some(s.to_lowercase().contains(&needle.to_lowercase()))
        }
        _ => None,
    }
}

/// Falsy, empty string, or empty array. Empty objects are not empty.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(_)) => false,
    }
}
