//! Dotted-path resolution over nested snapshot data.
//!
//! At every level the remaining path is first tried as a literal key, so flat
//! ids such as `personnel.pi_name` resolve as well as nested groups. Array
//! elements are addressed by numeric segments. Missing segments resolve to
//! `None`; resolution never fails.

use serde_json::{Map, Value};

pub fn resolve_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    resolve_in_object(data, path)
}

fn resolve_in_object<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(path) {
        return Some(v);
    }
    for (i, _) in path.match_indices('.') {
        let (head, rest) = (&path[..i], &path[i + 1..]);
        if let Some(child) = map.get(head) {
            if let Some(found) = descend(child, rest) {
                return Some(found);
            }
        }
    }
    None
}

fn descend<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(map) => resolve_in_object(map, path),
        Value::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((h, r)) => (h, r),
                None => (path, ""),
            };
            let idx: usize = head.parse().ok()?;
            descend(items.get(idx)?, rest)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_segments_resolve_to_none() {
        let data = map(json!({"personnel": {}}));
        assert_eq!(resolve_path(&data, "personnel.has_alt_contact"), None);
        assert_eq!(resolve_path(&data, "nothing"), None);
        assert_eq!(resolve_path(&data, ""), None);
    }

    #[test]
    fn flat_dotted_keys_win_over_descent() {
        let data = map(json!({"study.title": "Flat", "study": {"title": "Nested"}}));
        assert_eq!(resolve_path(&data, "study.title"), Some(&json!("Flat")));
    }

    #[test]
    fn nested_objects_and_arrays() {
        let data = map(json!({
            "personnel": {"contacts": [{"name": "Ada"}, {"name": "Grace"}]},
            "group.a": {"b": 1}
        }));
        assert_eq!(resolve_path(&data, "personnel.contacts.1.name"), Some(&json!("Grace")));
        assert_eq!(resolve_path(&data, "personnel.contacts.7.name"), None);
        assert_eq!(resolve_path(&data, "personnel.contacts.x"), None);
        assert_eq!(resolve_path(&data, "group.a.b"), Some(&json!(1)));
    }
}
