mod common;

use common::{schema, snapshot};
use docform_sdk::{ForcedValue, RuleEngine, Schema};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn visibility_schema() -> Schema {
    schema(json!({
        "sections": [{"id": "sec1", "title": "Section One", "order": 0}],
        "fields": [
            {"id": "f1", "type": "text", "label": "First", "section_id": "sec1"},
            {"id": "f2", "type": "text", "label": "Second", "section_id": "sec1", "visible": false}
        ],
        "rules": [{
            "id": "show_f2",
            "conditions": [{"field": "f1", "operator": "equals", "value": "yes"}],
            "then_actions": [{"action": "show", "field": "f2"}],
            "else_actions": [{"action": "hide", "field": "f2"}]
        }]
    }))
}

#[test]
fn rule_shows_and_hides_a_dependent_field() {
    let s = visibility_schema();
    let shown = RuleEngine::evaluate(&s, &snapshot(json!({"f1": "yes"})));
    assert!(!shown.hidden_fields().contains("f2"));
    let hidden = RuleEngine::evaluate(&s, &snapshot(json!({"f1": "no"})));
    assert!(hidden.hidden_fields().contains("f2"));
    let empty = RuleEngine::evaluate(&s, &snapshot(json!({})));
    assert!(empty.is_hidden("f2"));
}

#[test]
fn invisible_field_without_rules_is_always_hidden() {
    let s = schema(json!({
        "sections": [{"id": "s", "title": "S", "order": 0}],
        "fields": [{"id": "x", "type": "text", "label": "X", "section_id": "s", "visible": false}]
    }));
    for data in [json!({}), json!({"x": "value"}), json!({"x": null})] {
        assert!(RuleEngine::evaluate(&s, &snapshot(data)).is_hidden("x"));
    }
}

fn personnel_schema(operator: &str, value: Option<Value>) -> Schema {
    let mut condition = json!({"field": "personnel.has_alt_contact", "operator": operator});
    if let Some(v) = value {
        condition["value"] = v;
    }
    schema(json!({
        "sections": [{"id": "s", "title": "S", "order": 0}],
        "fields": [
            {"id": "personnel", "type": "text", "label": "Personnel", "section_id": "s"},
            {"id": "alt", "type": "text", "label": "Alternate contact", "section_id": "s"}
        ],
        "rules": [{
            "id": "r",
            "conditions": [condition],
            "then_actions": [{"action": "hide", "field": "alt"}]
        }]
    }))
}

#[test]
fn missing_nested_path_is_empty() {
    let s = personnel_schema("is_empty", None);
    assert!(RuleEngine::evaluate(&s, &snapshot(json!({"personnel": {}}))).is_hidden("alt"));
    assert!(RuleEngine::evaluate(&s, &snapshot(json!({}))).is_hidden("alt"));
    assert!(!RuleEngine::evaluate(&s, &snapshot(json!({"personnel": {"has_alt_contact": "yes"}}))).is_hidden("alt"));
}

#[test]
fn equals_is_not_satisfied_by_a_missing_path() {
    let s = personnel_schema("equals", Some(json!("yes")));
    assert!(!RuleEngine::evaluate(&s, &snapshot(json!({"personnel": {}}))).is_hidden("alt"));
    assert!(RuleEngine::evaluate(&s, &snapshot(json!({"personnel": {"has_alt_contact": "yes"}}))).is_hidden("alt"));
}

fn tags_schema(value: &str) -> Schema {
    schema(json!({
        "sections": [{"id": "s", "title": "S", "order": 0}],
        "fields": [
            {"id": "tags", "type": "text", "label": "Tags", "section_id": "s"},
            {"id": "target", "type": "text", "label": "Target", "section_id": "s"}
        ],
        "rules": [{
            "id": "r",
            "conditions": [{"field": "tags", "operator": "contains", "value": value}],
            "then_actions": [{"action": "require", "field": "target"}]
        }]
    }))
}

#[test]
fn contains_checks_lists_and_text() {
    let s = tags_schema("x");
    assert!(RuleEngine::evaluate(&s, &snapshot(json!({"tags": ["x", "y"]}))).is_required("target"));
    assert!(!RuleEngine::evaluate(&s, &snapshot(json!({"tags": ["y"]}))).is_required("target"));
    assert!(!RuleEngine::evaluate(&s, &snapshot(json!({"tags": 4}))).is_required("target"));

    let s = tags_schema("xray");
    assert!(RuleEngine::evaluate(&s, &snapshot(json!({"tags": "Xray"}))).is_required("target"));
}

#[test]
fn last_rule_touching_a_field_wins() {
    let rules = |first: &str, second: &str| {
        schema(json!({
            "sections": [{"id": "s", "title": "S", "order": 0}],
            "fields": [
                {"id": "a", "type": "text", "label": "A", "section_id": "s"},
                {"id": "x", "type": "text", "label": "X", "section_id": "s"}
            ],
            "rules": [
                {"id": "r1", "conditions": [{"field": "a", "operator": "is_empty"}],
                 "then_actions": [{"action": first, "field": "x"}]},
                {"id": "r2", "conditions": [{"field": "a", "operator": "is_empty"}],
                 "then_actions": [{"action": second, "field": "x"}]}
            ]
        }))
    };
    let data = snapshot(json!({}));
    assert!(!RuleEngine::evaluate(&rules("hide", "show"), &data).is_hidden("x"));
    assert!(RuleEngine::evaluate(&rules("show", "hide"), &data).is_hidden("x"));
    assert!(!RuleEngine::evaluate(&rules("require", "optional"), &data).is_required("x"));
    assert!(RuleEngine::evaluate(&rules("optional", "require"), &data).is_required("x"));
}

#[test]
fn chained_rules_settle_only_across_passes() {
    let s = schema(json!({
        "sections": [{"id": "s", "title": "S", "order": 0}],
        "fields": [
            {"id": "a", "type": "text", "label": "A", "section_id": "s"},
            {"id": "b", "type": "text", "label": "B", "section_id": "s"},
            {"id": "c", "type": "text", "label": "C", "section_id": "s"}
        ],
        "rules": [
            {"id": "b_drives_c", "conditions": [{"field": "b", "operator": "equals", "value": "set"}],
             "then_actions": [{"action": "hide", "field": "c"}]},
            {"id": "a_sets_b", "conditions": [{"field": "a", "operator": "equals", "value": "go"}],
             "then_actions": [{"action": "set_value", "field": "b", "value": "set"}]}
        ]
    }));
    let mut data = snapshot(json!({"a": "go"}));
    let first = RuleEngine::evaluate(&s, &data);
    assert_eq!(
        first.field("b").unwrap().forced_value,
        Some(ForcedValue::Set(docform_sdk::schema::RuleValue::String("set".into())))
    );
    assert!(!first.is_hidden("c"));

    for (id, value) in first.derived_edits(&data) {
        data.set(&id, value);
    }
    let second = RuleEngine::evaluate(&s, &data);
    assert!(second.is_hidden("c"));
    assert!(second.derived_edits(&data).is_empty());
}

#[test]
fn hidden_set_is_recomputed_from_scratch() {
    let s = visibility_schema();
    let hidden = |v: Value| -> BTreeSet<String> {
        RuleEngine::evaluate(&s, &snapshot(v))
            .hidden_fields()
            .into_iter()
            .map(String::from)
            .collect()
    };
    assert_eq!(hidden(json!({"f1": "no"})), BTreeSet::from(["f2".to_string()]));
    assert_eq!(hidden(json!({"f1": "yes"})), BTreeSet::new());
    assert_eq!(hidden(json!({"f1": "no"})), BTreeSet::from(["f2".to_string()]));
}

#[test]
fn rule_without_conditions_always_applies_then_actions() {
    let s = schema(json!({
        "sections": [{"id": "s", "title": "S", "order": 0}],
        "fields": [
            {"id": "a", "type": "text", "label": "A", "section_id": "s"},
            {"id": "b", "type": "text", "label": "B", "section_id": "s"}
        ],
        "rules": [{
            "id": "always",
            "conditions": [],
            "then_actions": [{"action": "hide", "field": "a"}],
            "else_actions": [{"action": "hide", "field": "b"}]
        }]
    }));
    let state = RuleEngine::evaluate(&s, &snapshot(json!({})));
    assert_eq!(state.hidden_fields(), BTreeSet::from(["a"]));
}
