//! Submission completeness checks from schema field rules.

use crate::error::ErrorDetail;
use crate::rules::condition::is_empty;
use crate::rules::EvaluatedState;
use crate::schema::{Field, FieldType, FieldValidation, Schema};
use crate::snapshot::Snapshot;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field_id: String,
    pub code: &'static str,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &Field, code: &'static str, message: String) -> Self {
        FieldIssue {
            field_id: field.id.clone(),
            code,
            message,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.code.to_string(),
            message: self.message.clone(),
            entity_id: Some(self.field_id.clone()),
        }
    }
}

pub struct SubmissionValidator;

impl SubmissionValidator {
    /// Check every visible field. Hidden fields are skipped; `required` is the
    /// effective value after rules.
    pub fn validate(schema: &Schema, state: &EvaluatedState, snapshot: &Snapshot) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        for field in schema.fields() {
            if state.is_hidden(&field.id) {
                continue;
            }
            let value = snapshot.get(&field.id).filter(|v| !v.is_null());
            let required = state.field(&field.id).map_or(field.required, |s| s.required);
            if required && is_empty(value) {
                issues.push(FieldIssue::new(field, "required", format!("{} is required", field.label)));
                continue;
            }
            if let Some(v) = value {
                validate_field(field, v, &mut issues);
            }
        }
        issues
    }
}

fn validate_field(field: &Field, v: &Value, issues: &mut Vec<FieldIssue>) {
    let label = &field.label;
    let default_rules = FieldValidation::default();
    let rules = field.validation.as_ref().unwrap_or(&default_rules);

    let format = rules.format.as_deref().or(match field.type_ {
        FieldType::Email => Some("email"),
        FieldType::Phone => Some("phone"),
        FieldType::Date => Some("date"),
        _ => None,
    });
    if let (Some(format), Some(s)) = (format, v.as_str()) {
        if !s.is_empty() && !format_ok(format, s) {
            issues.push(FieldIssue::new(field, "format", format!("{} must be a valid {}", label, format)));
        }
    }

    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rules.max_length {
            if len > max as usize {
                issues.push(FieldIssue::new(
                    field,
                    "max_length",
                    format!("{} must be at most {} characters", label, max),
                ));
            }
        }
        if let Some(min) = rules.min_length {
            if len < min as usize {
                issues.push(FieldIssue::new(
                    field,
                    "min_length",
                    format!("{} must be at least {} characters", label, min),
                ));
            }
        }
        if let Some(pattern) = &rules.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => issues.push(FieldIssue::new(
                    field,
                    "pattern",
                    format!("{} does not match required pattern", label),
                )),
                Ok(_) => {}
                Err(_) => issues.push(FieldIssue::new(field, "pattern", format!("invalid pattern for {}", label))),
            }
        }
    }

    let number = v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()));
    if let Some(n) = number {
        if let Some(min) = rules.minimum {
            if n < min {
                issues.push(FieldIssue::new(field, "minimum", format!("{} must be at least {}", label, min)));
            }
        }
        if let Some(max) = rules.maximum {
            if n > max {
                issues.push(FieldIssue::new(field, "maximum", format!("{} must be at most {}", label, max)));
            }
        }
    }

    if field.type_.has_options() && !field.options.is_empty() {
        let chosen: Vec<&str> = match v {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if let Some(bad) = chosen.iter().find(|c| field.option_label(c).is_none()) {
            issues.push(FieldIssue::new(
                field,
                "option",
                format!(
                    "{} must be one of: {:?}",
                    label,
                    field.options.iter().take(5).map(|o| o.value.as_str()).collect::<Vec<_>>()
                ),
            ));
            tracing::debug!(field_id = %field.id, value = %bad, "unknown option");
        }
    }

    if let (FieldType::Repeatable, Some(config)) = (field.type_, &field.repeatable_config) {
        let rows = v.as_array().map_or(0, Vec::len);
        if rows < config.min_rows as usize {
            issues.push(FieldIssue::new(
                field,
                "min_rows",
                format!("{} needs at least {} rows", label, config.min_rows),
            ));
        }
        if let Some(max) = config.max_rows {
            if rows > max as usize {
                issues.push(FieldIssue::new(field, "max_rows", format!("{} allows at most {} rows", label, max)));
            }
        }
    }
}

fn format_ok(format: &str, s: &str) -> bool {
    match format.to_lowercase().as_str() {
        "email" => match s.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
            None => false,
        },
        "phone" => {
            let digits = s.chars().filter(char::is_ascii_digit).count();
            digits >= 7 && s.chars().all(|c| c.is_ascii_digit() || " +-().".contains(c))
        }
        "date" => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        _ => true,
    }
}
