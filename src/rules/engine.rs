//! Single-pass rule evaluation: snapshot in, fresh per-field presentation state out.
//!
//! Conditions always read the snapshot as given, never state produced earlier in
//! the same pass. A `set_value`/`clear` effect therefore only influences other
//! rules once it is committed to the data and a new pass runs.

use crate::rules::condition::evaluate_condition;
use crate::schema::{Action, ActionKind, RuleValue, Schema};
use crate::snapshot::Snapshot;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Value effect a rule imposes on a field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ForcedValue {
    Set(RuleValue),
    Clear,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluatedFieldState {
    pub hidden: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_value: Option<ForcedValue>,
}

/// Derived state for every field of a schema, for one snapshot. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvaluatedState {
    fields: BTreeMap<String, EvaluatedFieldState>,
}

impl EvaluatedState {
    pub fn field(&self, id: &str) -> Option<&EvaluatedFieldState> {
        self.fields.get(id)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &EvaluatedFieldState)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.fields.get(id).is_some_and(|f| f.hidden)
    }

    pub fn is_required(&self, id: &str) -> bool {
        self.fields.get(id).is_some_and(|f| f.required)
    }

    pub fn hidden_fields(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.hidden)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn cleared_fields(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.forced_value == Some(ForcedValue::Clear))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Edits that would commit pending value effects: `(field_id, new value)`,
    /// `Value::Null` for a clear. Effects already reflected in the snapshot are skipped.
    pub fn derived_edits(&self, snapshot: &Snapshot) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for (id, state) in &self.fields {
            let current = snapshot.as_map().get(id);
            match &state.forced_value {
                Some(ForcedValue::Set(v)) => {
                    if !current.is_some_and(|c| v.matches(c)) {
                        out.push((id.clone(), v.to_json()));
                    }
                }
                Some(ForcedValue::Clear) => {
                    if current.is_some_and(|c| !c.is_null()) {
                        out.push((id.clone(), Value::Null));
                    }
                }
                None => {}
            }
        }
        out
    }
}

pub struct RuleEngine;

impl RuleEngine {
    /// Recompute every field's state from scratch for `snapshot`.
    pub fn evaluate(schema: &Schema, snapshot: &Snapshot) -> EvaluatedState {
        let mut work = Working::default();
        for f in schema.fields() {
            if !f.visible {
                work.hidden.insert(f.id.clone());
            }
        }

        for rule in schema.rules() {
            let matched = rule
                .conditions
                .iter()
                .all(|c| evaluate_condition(c, snapshot));
            tracing::trace!(rule_id = %rule.id, matched, "rule evaluated");
            let actions: &[Action] = if matched {
                &rule.then_actions
            } else {
                rule.else_actions.as_deref().unwrap_or(&[])
            };
            for action in actions {
                work.apply(action);
            }
        }

        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                let state = EvaluatedFieldState {
                    hidden: work.hidden.contains(&f.id),
                    required: work.required.get(&f.id).copied().unwrap_or(f.required),
                    forced_value: work.values.remove(&f.id),
                };
                (f.id.clone(), state)
            })
            .collect();
        EvaluatedState { fields }
    }
}

/// Mutable pass state; each map is one last-write-wins dimension.
#[derive(Default)]
struct Working {
    hidden: HashSet<String>,
    required: HashMap<String, bool>,
    values: HashMap<String, ForcedValue>,
}

impl Working {
    fn apply(&mut self, action: &Action) {
        let id = action.field.clone();
        match action.action {
            ActionKind::Show => {
                self.hidden.remove(&id);
            }
            ActionKind::Hide => {
                self.hidden.insert(id);
            }
            ActionKind::Require => {
                self.required.insert(id, true);
            }
            ActionKind::Optional => {
                self.required.insert(id, false);
            }
            ActionKind::Clear => {
                self.values.insert(id, ForcedValue::Clear);
            }
            ActionKind::SetValue => {
                if let Some(v) = &action.value {
                    self.values.insert(id, ForcedValue::Set(v.clone()));
                }
            }
        }
    }
}
