//! One form instance's live state: hydrate, edit, teardown.

use crate::coalesce::{ChangeCoalescer, FieldEdit};
use crate::error::EngineError;
use crate::rules::{EvaluatedState, RuleEngine};
use crate::schema::{Field, RepeatableConfig, Schema};
use crate::snapshot::Snapshot;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Owns the snapshot of one form. Every edit goes to the coalescer and triggers a
/// full re-evaluation; derived state is never patched incrementally.
pub struct FormSession {
    schema: Arc<Schema>,
    snapshot: Snapshot,
    state: EvaluatedState,
    coalescer: Arc<ChangeCoalescer>,
}

impl FormSession {
    /// Start from a persisted snapshot. Fields with a `default_value` and no stored
    /// value get their default; defaults are not recorded as edits.
    pub fn hydrate(schema: Arc<Schema>, persisted: Snapshot, coalescer: Arc<ChangeCoalescer>) -> Self {
        let mut snapshot = persisted;
        for field in schema.fields() {
            if let Some(default) = &field.default_value {
                if !snapshot.as_map().contains_key(&field.id) {
                    snapshot.set(&field.id, default.clone());
                }
            }
        }
        let state = RuleEngine::evaluate(&schema, &snapshot);
        tracing::debug!(fields = snapshot.len(), "form session hydrated");
        FormSession {
            schema,
            snapshot,
            state,
            coalescer,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn state(&self) -> &EvaluatedState {
        &self.state
    }

    fn field(&self, field_id: &str) -> Result<&Field, EngineError> {
        self.schema
            .field(field_id)
            .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))
    }

    pub fn edit(&mut self, field_id: &str, value: Value) -> Result<&EvaluatedState, EngineError> {
        self.apply(field_id, value)?;
        self.reevaluate();
        Ok(&self.state)
    }

    /// Set without re-evaluating; records the edit when the value changed.
    fn apply(&mut self, field_id: &str, value: Value) -> Result<(), EngineError> {
        let label = self.field(field_id)?.label.clone();
        let old = self.snapshot.set(field_id, value.clone()).unwrap_or(Value::Null);
        if old != value {
            self.coalescer
                .record(FieldEdit::new(field_id, old, value).with_label(label));
        }
        Ok(())
    }

    fn reevaluate(&mut self) {
        self.state = RuleEngine::evaluate(&self.schema, &self.snapshot);
    }

    fn repeatable(&self, field_id: &str) -> Result<(String, RepeatableConfig), EngineError> {
        let field = self.field(field_id)?;
        let config = field
            .repeatable_config
            .clone()
            .ok_or_else(|| EngineError::UnknownField(format!("{} (not a repeatable field)", field_id)))?;
        Ok((field.label.clone(), config))
    }

    /// Append a row; a no-op returning false at `max_rows`.
    pub fn add_row(&mut self, field_id: &str, row: Map<String, Value>) -> Result<bool, EngineError> {
        let (label, config) = self.repeatable(field_id)?;
        let old = self.snapshot.as_map().get(field_id).cloned().unwrap_or(Value::Null);
        if !self.snapshot.push_row(field_id, &config, row) {
            return Ok(false);
        }
        self.record_rows(field_id, label, old);
        Ok(true)
    }

    /// Remove a row; a no-op returning false at `min_rows` or for a bad index.
    pub fn remove_row(&mut self, field_id: &str, index: usize) -> Result<bool, EngineError> {
        let (label, config) = self.repeatable(field_id)?;
        let old = self.snapshot.as_map().get(field_id).cloned().unwrap_or(Value::Null);
        if !self.snapshot.remove_row(field_id, &config, index) {
            return Ok(false);
        }
        self.record_rows(field_id, label, old);
        Ok(true)
    }

    fn record_rows(&mut self, field_id: &str, label: String, old: Value) {
        let new = self.snapshot.as_map().get(field_id).cloned().unwrap_or(Value::Null);
        self.coalescer
            .record(FieldEdit::new(field_id, old, new).with_label(label));
        self.reevaluate();
    }

    /// Commit pending `set_value`/`clear` effects as ordinary edits, then run one
    /// new pass. Returns the ids that changed.
    pub fn commit_derived(&mut self) -> Result<Vec<String>, EngineError> {
        let edits = self.state.derived_edits(&self.snapshot);
        let mut changed = Vec::with_capacity(edits.len());
        for (field_id, value) in edits {
            self.apply(&field_id, value)?;
            changed.push(field_id);
        }
        if !changed.is_empty() {
            self.reevaluate();
        }
        Ok(changed)
    }

    /// Teardown: flush pending changes and hand back the final snapshot.
    pub async fn close(self) -> Result<Snapshot, EngineError> {
        self.coalescer.flush().await?;
        Ok(self.snapshot)
    }
}
