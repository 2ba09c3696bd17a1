//! Raw schema types matching the persisted schema JSON (sections, fields, rules).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: i32,
    #[serde(default = "default_true")]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed_by_default: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Checkbox,
    Radio,
    Select,
    Date,
    Email,
    Phone,
    Repeatable,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Select => "select",
            FieldType::Date => "date",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Repeatable => "repeatable",
        }
    }

    /// Field types whose value is picked from `options`.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Radio | FieldType::Select)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// Display hints passed through to the renderer untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutHints {
    #[serde(default)]
    pub indent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorType {
    Label,
    Paragraph,
    TableCell,
    Table,
}

impl AnchorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorType::Label => "label",
            AnchorType::Paragraph => "paragraph",
            AnchorType::TableCell => "table_cell",
            AnchorType::Table => "table",
        }
    }
}

/// Locator for a field's injection target. Which locator keys apply depends on `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorSpec {
    #[serde(rename = "type")]
    pub type_: AnchorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_index: Option<usize>,
    /// Matches a table by the text of its first row; alias `header_text`.
    #[serde(default, alias = "header_text", skip_serializing_if = "Option::is_none")]
    pub table_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<usize>,
    /// 0-based pick among several matches of the same locator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<usize>,
}

impl AnchorSpec {
    pub fn new(type_: AnchorType) -> Self {
        AnchorSpec {
            type_,
            label_text: None,
            paragraph_contains: None,
            paragraph_index: None,
            table_index: None,
            table_header: None,
            row_index: None,
            column_index: None,
            occurrence: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub type_: FieldType,
}

fn default_column_type() -> FieldType {
    FieldType::Text
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatableConfig {
    #[serde(default)]
    pub min_rows: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u32>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    pub label: String,
    pub section_id: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatable_config: Option<RepeatableConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutHints>,
}

impl Field {
    pub fn new(id: impl Into<String>, type_: FieldType, label: impl Into<String>, section_id: impl Into<String>) -> Self {
        Field {
            id: id.into(),
            type_,
            label: label.into(),
            section_id: section_id.into(),
            required: false,
            visible: true,
            order: None,
            placeholder: None,
            help_text: None,
            default_value: None,
            options: Vec::new(),
            validation: None,
            anchor: None,
            repeatable_config: None,
            layout: None,
        }
    }

    /// Display label for an option value, if the field declares one.
    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    IsEmpty,
    #[serde(alias = "not_empty")]
    IsNotEmpty,
}

impl Operator {
    /// Operators that compare against `Condition::value`.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

/// Closed set of literal values a rule may compare against or assign.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl RuleValue {
    pub fn to_json(&self) -> Value {
        match self {
            RuleValue::String(s) => Value::String(s.clone()),
            RuleValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            RuleValue::Bool(b) => Value::Bool(*b),
            RuleValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        }
    }

    /// Strict equality against a snapshot value: same kind, same content.
    pub fn matches(&self, v: &Value) -> bool {
        match (self, v) {
            (RuleValue::String(s), Value::String(t)) => s == t,
            (RuleValue::Number(n), Value::Number(m)) => m.as_f64() == Some(*n),
            (RuleValue::Bool(b), Value::Bool(c)) => b == c,
            (RuleValue::List(items), Value::Array(arr)) => {
                items.len() == arr.len()
                    && items
                        .iter()
                        .zip(arr)
                        .all(|(a, b)| b.as_str() == Some(a.as_str()))
            }
            _ => false,
        }
    }

    /// Text form used for substring matching; lists have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RuleValue::String(s) => Some(s.clone()),
            RuleValue::Number(n) => Some(n.to_string()),
            RuleValue::Bool(b) => Some(b.to_string()),
            RuleValue::List(_) => None,
        }
    }
}

impl Serialize for RuleValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        match v {
            Value::String(s) => Ok(RuleValue::String(s)),
            Value::Bool(b) => Ok(RuleValue::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .map(RuleValue::Number)
                .ok_or_else(|| serde::de::Error::custom("rule value number out of range")),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s),
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "rule value lists may only contain strings; got {}",
                                type_name_of_json(&other)
                            )))
                        }
                    }
                }
                Ok(RuleValue::List(out))
            }
            other => Err(serde::de::Error::custom(format!(
                "rule value must be a string, number, boolean or list of strings; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

pub(crate) fn type_name_of_json(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted data path; its first segments name a field.
    pub field: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Show,
    Hide,
    Require,
    Optional,
    Clear,
    SetValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub conditions: Vec<Condition>,
    pub then_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_actions: Option<Vec<Action>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_value_rejects_objects() {
        let err = serde_json::from_value::<RuleValue>(json!({"a": 1})).unwrap_err();
        assert!(err.to_string().contains("got object"));
        let err = serde_json::from_value::<RuleValue>(json!(["a", 2])).unwrap_err();
        assert!(err.to_string().contains("only contain strings"));
    }

    #[test]
    fn not_empty_is_an_alias() {
        let c: Condition = serde_json::from_value(json!({"field": "a", "operator": "not_empty"})).unwrap();
        assert_eq!(c.operator, Operator::IsNotEmpty);
    }

    #[test]
    fn header_text_alias_and_defaults() {
        let f: Field = serde_json::from_value(json!({
            "id": "people",
            "type": "repeatable",
            "label": "People",
            "section_id": "s",
            "anchor": {"type": "table", "header_text": "Name"},
            "repeatable_config": {"max_rows": 3, "columns": [{"id": "name"}]}
        }))
        .unwrap();
        assert!(f.visible);
        let anchor = f.anchor.unwrap();
        assert_eq!(anchor.table_header.as_deref(), Some("Name"));
        let rc = f.repeatable_config.unwrap();
        assert_eq!(rc.min_rows, 0);
        assert_eq!(rc.columns[0].type_, FieldType::Text);
    }

    #[test]
    fn strict_matching() {
        assert!(RuleValue::String("yes".into()).matches(&json!("yes")));
        assert!(!RuleValue::String("1".into()).matches(&json!(1)));
        assert!(RuleValue::Number(1.0).matches(&json!(1)));
        assert!(RuleValue::List(vec!["a".into()]).matches(&json!(["a"])));
        assert!(!RuleValue::Bool(false).matches(&Value::Null));
    }
}
