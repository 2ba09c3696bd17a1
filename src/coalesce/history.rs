//! Rebuild and compare snapshots from change history.

use crate::coalesce::coalescer::ChangeRecord;
use crate::snapshot::Snapshot;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Apply records in order onto an empty snapshot. A `null` new value removes the field.
pub fn replay<'a>(records: impl IntoIterator<Item = &'a ChangeRecord>) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for r in records {
        if r.new_value.is_null() {
            snapshot.remove(&r.field_id);
        } else {
            snapshot.set(&r.field_id, r.new_value.clone());
        }
    }
    snapshot
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SnapshotDiff {
    Added { field_id: String, value: Value },
    Removed { field_id: String, value: Value },
    Modified { field_id: String, old_value: Value, new_value: Value },
}

impl SnapshotDiff {
    pub fn field_id(&self) -> &str {
        match self {
            SnapshotDiff::Added { field_id, .. }
            | SnapshotDiff::Removed { field_id, .. }
            | SnapshotDiff::Modified { field_id, .. } => field_id,
        }
    }
}

/// Top-level differences, sorted by field id. `null` counts as absent.
pub fn diff_snapshots(from: &Snapshot, to: &Snapshot) -> Vec<SnapshotDiff> {
    let present = |s: &Snapshot, k: &str| s.as_map().get(k).filter(|v| !v.is_null()).cloned();
    let keys: BTreeSet<&String> = from.as_map().keys().chain(to.as_map().keys()).collect();
    keys.into_iter()
        .filter_map(|k| match (present(from, k), present(to, k)) {
            (None, Some(value)) => Some(SnapshotDiff::Added { field_id: k.clone(), value }),
            (Some(value), None) => Some(SnapshotDiff::Removed { field_id: k.clone(), value }),
            (Some(old_value), Some(new_value)) if old_value != new_value => Some(SnapshotDiff::Modified {
                field_id: k.clone(),
                old_value,
                new_value,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn rec(field: &str, old: Value, new: Value) -> ChangeRecord {
        ChangeRecord {
            id: Uuid::new_v4(),
            field_id: field.into(),
            field_label: None,
            old_value: old,
            new_value: new,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn replay_applies_in_order() {
        let records = vec![
            rec("a", json!(null), json!("1")),
            rec("b", json!(null), json!(true)),
            rec("a", json!("1"), json!("2")),
            rec("b", json!(true), json!(null)),
        ];
        let s = replay(&records);
        assert_eq!(s.as_map().clone(), json!({"a": "2"}).as_object().unwrap().clone());
    }

    #[test]
    fn diff_reports_each_kind_sorted() {
        let from = Snapshot::try_from(json!({"a": 1, "b": "x", "c": null, "d": [1]})).unwrap();
        let to = Snapshot::try_from(json!({"a": 1, "b": "y", "c": "new", "e": false})).unwrap();
        let diffs = diff_snapshots(&from, &to);
        assert_eq!(
            diffs,
            vec![
                SnapshotDiff::Modified { field_id: "b".into(), old_value: json!("x"), new_value: json!("y") },
                SnapshotDiff::Added { field_id: "c".into(), value: json!("new") },
                SnapshotDiff::Removed { field_id: "d".into(), value: json!([1]) },
                SnapshotDiff::Added { field_id: "e".into(), value: json!(false) },
            ]
        );
    }
}
