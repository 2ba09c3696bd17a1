//! Per-field debounced change coalescing.
//!
//! Each field id owns its own quiet-period timer. An edit reschedules only that
//! field's timer, so a burst on field A never cancels field B's pending record.
//! When a timer fires, the field's burst becomes one [`ChangeRecord`] carrying the
//! value from before the burst and the latest value. Records go through a single
//! writer task, so the sink sees each field's records in edit order.

use crate::error::EngineError;
use crate::settings::EngineSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One field edit as issued by the form.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldEdit {
    pub field_id: String,
    pub field_label: Option<String>,
    pub old_value: Value,
    pub new_value: Value,
}

impl FieldEdit {
    pub fn new(field_id: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        FieldEdit {
            field_id: field_id.into(),
            field_label: None,
            old_value,
            new_value,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.field_label = Some(label.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    pub old_value: Value,
    pub new_value: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence collaborator. A failed batch is kept and offered again later.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn persist(&self, records: &[ChangeRecord]) -> Result<(), EngineError>;
}

struct Pending {
    field_label: Option<String>,
    old_value: Value,
    new_value: Value,
    generation: u64,
    timer: JoinHandle<()>,
}

enum WriterMsg {
    Record(ChangeRecord),
    /// Persist everything received so far and report the outcome.
    Flush(oneshot::Sender<Result<(), String>>),
}

struct Inner {
    quiet_period: Duration,
    pending: Mutex<HashMap<String, Pending>>,
    generation: AtomicU64,
    tx: mpsc::UnboundedSender<WriterMsg>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback. A stale generation means the field was edited again.
    fn fire(&self, field_id: &str, generation: u64) {
        let mut pending = self.pending();
        if pending.get(field_id).is_some_and(|p| p.generation == generation) {
            if let Some(p) = pending.remove(field_id) {
                self.emit(field_id.to_string(), p);
            }
        }
    }

    /// Called with the pending lock held, so a field's records enter the channel in order.
    fn emit(&self, field_id: String, p: Pending) {
        if p.old_value == p.new_value {
            tracing::debug!(field_id = %field_id, "burst reverted to original value; no record");
            return;
        }
        let record = ChangeRecord {
            id: Uuid::new_v4(),
            field_id,
            field_label: p.field_label,
            old_value: p.old_value,
            new_value: p.new_value,
            recorded_at: Utc::now(),
        };
        if self.tx.send(WriterMsg::Record(record)).is_err() {
            tracing::warn!("change writer stopped; record not delivered");
        }
    }
}

pub struct ChangeCoalescer {
    inner: Arc<Inner>,
    writer: Option<JoinHandle<()>>,
}

impl ChangeCoalescer {
    /// Must be called inside a tokio runtime; spawns the writer task.
    pub fn new(sink: Arc<dyn ChangeSink>, settings: &EngineSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(sink, rx, settings.retry_interval));
        ChangeCoalescer {
            inner: Arc::new(Inner {
                quiet_period: settings.quiet_period,
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                tx,
            }),
            writer: Some(writer),
        }
    }

    /// Buffer an edit and (re)start its field's quiet-period timer.
    pub fn record(&self, edit: FieldEdit) {
        let mut pending = self.inner.pending();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let timer = self.schedule(edit.field_id.clone(), generation);
        match pending.get_mut(&edit.field_id) {
            Some(p) => {
                p.timer.abort();
                p.timer = timer;
                p.generation = generation;
                p.new_value = edit.new_value;
                if edit.field_label.is_some() {
                    p.field_label = edit.field_label;
                }
            }
            None => {
                pending.insert(
                    edit.field_id,
                    Pending {
                        field_label: edit.field_label,
                        old_value: edit.old_value,
                        new_value: edit.new_value,
                        generation,
                        timer,
                    },
                );
            }
        }
    }

    fn schedule(&self, field_id: String, generation: u64) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let quiet = self.inner.quiet_period;
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if let Some(inner) = inner.upgrade() {
                inner.fire(&field_id, generation);
            }
        })
    }

    /// Field ids with an unflushed burst, sorted.
    pub fn pending_fields(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.pending().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Emit every pending burst now and wait until the sink accepted all records.
    /// On failure the records stay queued for the next retry.
    pub async fn flush(&self) -> Result<(), EngineError> {
        self.emit_pending();
        let (ack, done) = oneshot::channel();
        self.inner
            .tx
            .send(WriterMsg::Flush(ack))
            .map_err(|_| EngineError::Persistence("change writer stopped".into()))?;
        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EngineError::Persistence(e)),
            Err(_) => Err(EngineError::Persistence("change writer stopped".into())),
        }
    }

    /// Flush, then stop the writer task.
    pub async fn shutdown(mut self) -> Result<(), EngineError> {
        let flushed = self.flush().await;
        let writer = self.writer.take();
        drop(self);
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::warn!(error = %e, "change writer task failed");
            }
        }
        flushed
    }

    /// Cancel every armed timer and hand its burst to the writer, oldest edit first.
    fn emit_pending(&self) -> usize {
        let mut pending = self.inner.pending();
        let mut drained: Vec<(String, Pending)> = pending.drain().collect();
        drained.sort_by_key(|(_, p)| p.generation);
        let count = drained.len();
        for (field_id, p) in drained {
            p.timer.abort();
            self.inner.emit(field_id, p);
        }
        count
    }
}

/// Pending bursts are handed to the writer, which persists its backlog once the
/// channel closes.
impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        let emitted = self.emit_pending();
        if emitted > 0 {
            tracing::debug!(fields = emitted, "coalescer dropped; pending bursts handed to writer");
        }
    }
}

async fn run_writer(sink: Arc<dyn ChangeSink>, mut rx: mpsc::UnboundedReceiver<WriterMsg>, retry_interval: Duration) {
    let mut backlog: Vec<ChangeRecord> = Vec::new();
    loop {
        let msg = if backlog.is_empty() {
            rx.recv().await
        } else {
            tokio::select! {
                msg = rx.recv() => msg,
                _ = tokio::time::sleep(retry_interval) => {
                    let _ = persist(sink.as_ref(), &mut backlog).await;
                    continue;
                }
            }
        };
        let Some(msg) = msg else { break };

        let mut acks = Vec::new();
        absorb(msg, &mut backlog, &mut acks);
        while let Ok(msg) = rx.try_recv() {
            absorb(msg, &mut backlog, &mut acks);
        }
        let result = persist(sink.as_ref(), &mut backlog).await;
        for ack in acks {
            let _ = ack.send(result.clone());
        }
    }

    if !backlog.is_empty() && persist(sink.as_ref(), &mut backlog).await.is_err() {
        tracing::warn!(records = backlog.len(), "change writer stopped with unpersisted records");
    }
}

fn absorb(msg: WriterMsg, backlog: &mut Vec<ChangeRecord>, acks: &mut Vec<oneshot::Sender<Result<(), String>>>) {
    match msg {
        WriterMsg::Record(record) => merge_into(backlog, record),
        WriterMsg::Flush(ack) => acks.push(ack),
    }
}

/// At most one queued record per field: first old value, latest new value. A merge
/// that lands back on the old value drops the record.
fn merge_into(backlog: &mut Vec<ChangeRecord>, record: ChangeRecord) {
    let Some(pos) = backlog.iter().position(|r| r.field_id == record.field_id) else {
        backlog.push(record);
        return;
    };
    let existing = &mut backlog[pos];
    existing.new_value = record.new_value;
    existing.recorded_at = record.recorded_at;
    if record.field_label.is_some() {
        existing.field_label = record.field_label;
    }
    if existing.old_value == existing.new_value {
        tracing::debug!(field_id = %existing.field_id, "queued change reverted; record dropped");
        backlog.remove(pos);
    }
}

async fn persist(sink: &dyn ChangeSink, backlog: &mut Vec<ChangeRecord>) -> Result<(), String> {
    if backlog.is_empty() {
        return Ok(());
    }
    match sink.persist(backlog).await {
        Ok(()) => {
            tracing::debug!(records = backlog.len(), "change batch persisted");
            backlog.clear();
            Ok(())
        }
        Err(e) => {
            tracing::warn!(records = backlog.len(), error = %e, "change batch rejected; keeping for retry");
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(field: &str, old: Value, new: Value) -> ChangeRecord {
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
    fn backlog_merges_per_field() {
        let mut backlog = Vec::new();
        merge_into(&mut backlog, record("a", json!(""), json!("x")));
        merge_into(&mut backlog, record("b", json!(1), json!(2)));
        merge_into(&mut backlog, record("a", json!("x"), json!("xy")));
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].old_value, json!(""));
        assert_eq!(backlog[0].new_value, json!("xy"));
    }

    #[test]
    fn backlog_drops_a_field_merged_back_to_its_old_value() {
        let mut backlog = Vec::new();
        merge_into(&mut backlog, record("a", json!("x"), json!("y")));
        merge_into(&mut backlog, record("b", json!(1), json!(2)));
        merge_into(&mut backlog, record("a", json!("y"), json!("x")));
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].field_id, "b");

        merge_into(&mut backlog, record("a", json!("x"), json!("z")));
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[1].old_value, json!("x"));
    }

    #[test]
    fn change_record_serializes() {
        let r = record("f1", json!(null), json!("yes"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["field_id"], "f1");
        assert!(v.get("field_label").is_none());
        let back: ChangeRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }
}
