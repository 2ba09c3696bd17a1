//! Schema validation: id uniqueness, referential integrity, repeatable bounds, rule shape.

use crate::error::{SchemaError, SchemaErrors};
use crate::schema::{Action, ActionKind, AnchorType, FieldType, Rule, SchemaConfig};
use std::collections::HashSet;

/// Validate a raw schema. Collects every problem instead of stopping at the first.
pub fn validate(config: &SchemaConfig) -> Result<(), SchemaErrors> {
    let mut errors = Vec::new();

    let mut section_ids = HashSet::new();
    for s in &config.sections {
        if !section_ids.insert(s.id.as_str()) {
            errors.push(SchemaError::DuplicateId {
                kind: "section",
                id: s.id.clone(),
            });
        }
    }

    let mut field_ids = HashSet::new();
    for f in &config.fields {
        if !field_ids.insert(f.id.as_str()) {
            errors.push(SchemaError::DuplicateId {
                kind: "field",
                id: f.id.clone(),
            });
        }
        if !section_ids.contains(f.section_id.as_str()) {
            errors.push(SchemaError::MissingReference {
                kind: "section",
                id: f.section_id.clone(),
                referenced_by: f.id.clone(),
            });
        }

        match (&f.type_, &f.repeatable_config) {
            (FieldType::Repeatable, None) => {
                errors.push(SchemaError::MissingRepeatableConfig(f.id.clone()));
            }
            (_, Some(rc)) => {
                if let Some(max) = rc.max_rows {
                    if max < rc.min_rows {
                        errors.push(SchemaError::InvalidRepeatableBounds {
                            field_id: f.id.clone(),
                            min_rows: rc.min_rows,
                            max_rows: max,
                        });
                    }
                }
                let mut column_ids = HashSet::new();
                for c in &rc.columns {
                    if !column_ids.insert(c.id.as_str()) {
                        errors.push(SchemaError::DuplicateId {
                            kind: "column",
                            id: format!("{}.{}", f.id, c.id),
                        });
                    }
                }
            }
            _ => {}
        }

        if let Some(anchor) = &f.anchor {
            let is_repeatable = f.type_ == FieldType::Repeatable;
            if (anchor.type_ == AnchorType::Table) != is_repeatable {
                errors.push(SchemaError::AnchorTypeMismatch {
                    field_id: f.id.clone(),
                    anchor: anchor.type_.as_str(),
                    field_type: f.type_.as_str(),
                });
            }
        }
    }

    let mut rule_ids = HashSet::new();
    for r in &config.rules {
        if !rule_ids.insert(r.id.as_str()) {
            errors.push(SchemaError::DuplicateId {
                kind: "rule",
                id: r.id.clone(),
            });
        }
        validate_rule(r, &field_ids, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors(errors))
    }
}

fn validate_rule(rule: &Rule, field_ids: &HashSet<&str>, errors: &mut Vec<SchemaError>) {
    for c in &rule.conditions {
        if !path_names_field(&c.field, field_ids) {
            errors.push(SchemaError::MissingReference {
                kind: "field",
                id: c.field.clone(),
                referenced_by: rule.id.clone(),
            });
        }
        if c.operator.takes_value() && c.value.is_none() {
            errors.push(SchemaError::InvalidRule {
                rule_id: rule.id.clone(),
                detail: format!("condition on '{}' needs a value", c.field),
            });
        }
    }
    let actions = rule
        .then_actions
        .iter()
        .chain(rule.else_actions.iter().flatten());
    for a in actions {
        validate_action(&rule.id, a, field_ids, errors);
    }
}

fn validate_action(rule_id: &str, a: &Action, field_ids: &HashSet<&str>, errors: &mut Vec<SchemaError>) {
    if !field_ids.contains(a.field.as_str()) {
        errors.push(SchemaError::MissingReference {
            kind: "field",
            id: a.field.clone(),
            referenced_by: rule_id.to_string(),
        });
    }
    if a.action == ActionKind::SetValue && a.value.is_none() {
        errors.push(SchemaError::InvalidRule {
            rule_id: rule_id.to_string(),
            detail: format!("set_value on '{}' needs a value", a.field),
        });
    }
}

/// True if `path` is a field id or descends into one (`<field_id>.<rest>`).
pub fn path_names_field(path: &str, field_ids: &HashSet<&str>) -> bool {
    if field_ids.contains(path) {
        return true;
    }
    path.match_indices('.')
        .any(|(i, _)| field_ids.contains(&path[..i]))
}
