//! Render snapshot values as document text.

use crate::schema::{ColumnSpec, Field, FieldOption, FieldType};
use serde_json::Value;

pub const CHECKED: &str = "☑";
pub const UNCHECKED: &str = "☐";

/// Text for a field value, or `None` when there is nothing to write.
pub fn format_field_value(field: &Field, value: &Value) -> Option<String> {
    format_value(field.type_, &field.options, value)
}

pub fn format_column_value(column: &ColumnSpec, value: &Value) -> Option<String> {
    format_value(column.type_, &[], value)
}

pub fn format_value(type_: FieldType, options: &[FieldOption], value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(match (type_, b) {
            (FieldType::Checkbox, true) => CHECKED.to_string(),
            (FieldType::Checkbox, false) => UNCHECKED.to_string(),
            (_, true) => "Yes".to_string(),
            (_, false) => "No".to_string(),
        }),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(option_text(options, s)),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(option_text(options, s)),
                    Value::Null => None,
                    other => format_value(type_, options, other),
                })
                .collect();
            Some(parts.join(", "))
        }
        Value::Object(_) => None,
    }
}

fn option_text(options: &[FieldOption], value: &str) -> String {
    options
        .iter()
        .find(|o| o.value == value)
        .map_or_else(|| value.to_string(), |o| o.label.clone())
}

/// Option labels for the selected values of a choice field.
pub fn selected_labels(field: &Field, value: &Value) -> Vec<String> {
    let values: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .map(|v| option_text(&field.options, v))
        .collect()
}
