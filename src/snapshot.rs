//! Form data snapshot: the full live value-state of one form instance.

use crate::rules::path::resolve_path;
use crate::schema::RepeatableConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Values keyed by field id; nested groups and repeatable row arrays are plain JSON.
/// May hold values for hidden fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    pub fn new() -> Self {
        Snapshot(Map::new())
    }

    /// Resolve a dotted path; `None` for any missing segment.
    pub fn get(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.0, path)
    }

    /// Set a top-level value, returning the previous one.
    pub fn set(&mut self, field_id: &str, value: Value) -> Option<Value> {
        self.0.insert(field_id.to_string(), value)
    }

    pub fn remove(&mut self, field_id: &str) -> Option<Value> {
        self.0.remove(field_id)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rows of a repeatable field; empty when unset or not an array.
    pub fn rows(&self, field_id: &str) -> &[Value] {
        match self.0.get(field_id) {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        }
    }

    /// Append a row. Returns false (no-op) once `max_rows` is reached.
    pub fn push_row(&mut self, field_id: &str, config: &RepeatableConfig, row: Map<String, Value>) -> bool {
        let len = self.rows(field_id).len();
        if config.max_rows.is_some_and(|max| len >= max as usize) {
            return false;
        }
        let entry = self
            .0
            .entry(field_id.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(rows) = entry {
            rows.push(Value::Object(row));
        }
        true
    }

    /// Remove a row. Returns false (no-op) when out of range or at `min_rows`.
    pub fn remove_row(&mut self, field_id: &str, config: &RepeatableConfig, index: usize) -> bool {
        let len = self.rows(field_id).len();
        if index >= len || len <= config.min_rows as usize {
            return false;
        }
        if let Some(Value::Array(rows)) = self.0.get_mut(field_id) {
            rows.remove(index);
            return true;
        }
        false
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(map: Map<String, Value>) -> Self {
        Snapshot(map)
    }
}

impl TryFrom<Value> for Snapshot {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Snapshot(map)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(min: u32, max: Option<u32>) -> RepeatableConfig {
        RepeatableConfig {
            min_rows: min,
            max_rows: max,
            columns: Vec::new(),
        }
    }

    #[test]
    fn push_row_beyond_max_is_a_no_op() {
        let mut s = Snapshot::new();
        let cfg = config(0, Some(2));
        assert!(s.push_row("people", &cfg, Map::new()));
        assert!(s.push_row("people", &cfg, Map::new()));
        assert!(!s.push_row("people", &cfg, Map::new()));
        assert_eq!(s.rows("people").len(), 2);
    }

    #[test]
    fn remove_row_respects_min() {
        let mut s = Snapshot::try_from(json!({"people": [{"n": 1}, {"n": 2}]})).unwrap();
        let cfg = config(1, None);
        assert!(!s.remove_row("people", &cfg, 5));
        assert!(s.remove_row("people", &cfg, 0));
        assert!(!s.remove_row("people", &cfg, 0));
        assert_eq!(s.rows("people"), &[json!({"n": 2})]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let s = Snapshot::try_from(json!({"a": 1})).unwrap();
        assert_eq!(serde_json::to_value(&s).unwrap(), json!({"a": 1}));
        assert!(Snapshot::try_from(json!([1])).is_err());
    }
}
