mod common;

use async_trait::async_trait;
use common::{schema, snapshot};
use docform_sdk::{ChangeCoalescer, ChangeRecord, ChangeSink, EngineError, EngineSettings, FieldEdit, FormSession};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every accepted batch; rejects the first `failures` calls.
#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<ChangeRecord>>,
    calls: AtomicUsize,
    failures: usize,
}

impl MemorySink {
    fn failing(failures: usize) -> Self {
        MemorySink {
            failures,
            ..Default::default()
        }
    }

    fn records(&self) -> Vec<ChangeRecord> {
        self.records.lock().unwrap().clone()
    }

    fn changes(&self) -> Vec<(String, Value, Value)> {
        let mut out: Vec<_> = self
            .records()
            .into_iter()
            .map(|r| (r.field_id, r.old_value, r.new_value))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[async_trait]
impl ChangeSink for MemorySink {
    async fn persist(&self, records: &[ChangeRecord]) -> Result<(), EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EngineError::Persistence("store unavailable".into()));
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        quiet_period: Duration::from_millis(1000),
        retry_interval: Duration::from_millis(5000),
        ..Default::default()
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn edits_to_two_fields_in_one_window_give_two_records() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("a", json!(null), json!("alpha")));
    sleep_ms(300).await;
    coalescer.record(FieldEdit::new("b", json!("old"), json!("beta")));
    assert_eq!(coalescer.pending_fields(), vec!["a", "b"]);

    sleep_ms(1500).await;
    assert!(coalescer.pending_fields().is_empty());
    coalescer.flush().await.unwrap();
    assert_eq!(
        sink.changes(),
        vec![
            ("a".to_string(), json!(null), json!("alpha")),
            ("b".to_string(), json!("old"), json!("beta")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn burst_keeps_first_old_and_last_new_value() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("title", json!(""), json!("S")).with_label("Study Title"));
    sleep_ms(200).await;
    coalescer.record(FieldEdit::new("title", json!("S"), json!("St")));
    sleep_ms(200).await;
    coalescer.record(FieldEdit::new("title", json!("St"), json!("Study")));

    sleep_ms(1100).await;
    coalescer.flush().await.unwrap();
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].old_value, json!(""));
    assert_eq!(records[0].new_value, json!("Study"));
    assert_eq!(records[0].field_label.as_deref(), Some("Study Title"));
}

#[tokio::test(start_paused = true)]
async fn each_edit_restarts_only_its_own_timer() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("a", json!(1), json!(2)));
    coalescer.record(FieldEdit::new("b", json!(1), json!(2)));
    sleep_ms(900).await;
    coalescer.record(FieldEdit::new("a", json!(2), json!(3)));

    sleep_ms(300).await;
    assert_eq!(coalescer.pending_fields(), vec!["a"]);
    sleep_ms(800).await;
    assert!(coalescer.pending_fields().is_empty());

    coalescer.flush().await.unwrap();
    assert_eq!(
        sink.changes(),
        vec![
            ("a".to_string(), json!(1), json!(3)),
            ("b".to_string(), json!(1), json!(2)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reverted_burst_writes_nothing() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("a", json!("v"), json!("w")));
    coalescer.record(FieldEdit::new("a", json!("w"), json!("v")));
    sleep_ms(1500).await;
    coalescer.flush().await.unwrap();
    assert!(sink.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_emits_pending_bursts_immediately() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("a", json!(null), json!("x")));
    coalescer.flush().await.unwrap();
    assert_eq!(sink.records().len(), 1);
    assert!(coalescer.pending_fields().is_empty());

    // The cancelled timer must not emit a second record.
    sleep_ms(2000).await;
    coalescer.flush().await.unwrap();
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_batch_is_retried_not_dropped() {
    let sink = Arc::new(MemorySink::failing(1));
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());

    coalescer.record(FieldEdit::new("a", json!(null), json!("x")));
    let err = coalescer.flush().await.unwrap_err();
    assert_eq!(err.code(), "persistence_error");
    assert!(sink.records().is_empty());

    sleep_ms(5100).await;
    coalescer.flush().await.unwrap();
    assert_eq!(sink.changes(), vec![("a".to_string(), json!(null), json!("x"))]);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_edits() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());
    coalescer.record(FieldEdit::new("a", json!(null), json!("x")));
    coalescer.shutdown().await.unwrap();
    assert_eq!(sink.records().len(), 1);
}

fn session_schema() -> Arc<docform_sdk::Schema> {
    Arc::new(schema(json!({
        "sections": [{"id": "sec1", "title": "One", "order": 0}],
        "fields": [
            {"id": "f1", "type": "text", "label": "First", "section_id": "sec1"},
            {"id": "f2", "type": "text", "label": "Second", "section_id": "sec1", "visible": false},
            {"id": "country", "type": "text", "label": "Country", "section_id": "sec1", "default_value": "US"},
            {"id": "people", "type": "repeatable", "label": "People", "section_id": "sec1",
             "repeatable_config": {"max_rows": 1, "columns": [{"id": "name"}]}}
        ],
        "rules": [
            {"id": "show_f2",
             "conditions": [{"field": "f1", "operator": "equals", "value": "yes"}],
             "then_actions": [{"action": "show", "field": "f2"}],
             "else_actions": [{"action": "hide", "field": "f2"}, {"action": "clear", "field": "f2"}]}
        ]
    })))
}

#[tokio::test(start_paused = true)]
async fn session_edits_reevaluate_and_persist_on_close() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = Arc::new(ChangeCoalescer::new(sink.clone(), &settings()));
    let mut session = FormSession::hydrate(session_schema(), snapshot(json!({"f2": "kept"})), coalescer);

    assert_eq!(session.snapshot().get("country"), Some(&json!("US")));
    assert!(session.state().is_hidden("f2"));

    assert!(!session.edit("f1", json!("yes")).unwrap().is_hidden("f2"));
    assert!(session.edit("f1", json!("no")).unwrap().is_hidden("f2"));
    assert_eq!(session.commit_derived().unwrap(), vec!["f2".to_string()]);
    assert_eq!(session.snapshot().get("f2"), Some(&json!(null)));
    assert!(session.commit_derived().unwrap().is_empty());

    let mut row = serde_json::Map::new();
    row.insert("name".into(), json!("Ann"));
    assert!(session.add_row("people", row.clone()).unwrap());
    assert!(!session.add_row("people", row).unwrap());
    assert!(session.edit("missing", json!(1)).is_err());

    let final_snapshot = session.close().await.unwrap();
    assert_eq!(final_snapshot.get("f1"), Some(&json!("no")));
    assert_eq!(
        sink.changes(),
        vec![
            ("f1".to_string(), json!(null), json!("no")),
            ("f2".to_string(), json!("kept"), json!(null)),
            ("people".to_string(), json!(null), json!([{"name": "Ann"}])),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_the_coalescer_persists_pending_edits() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = ChangeCoalescer::new(sink.clone(), &settings());
    coalescer.record(FieldEdit::new("a", json!(null), json!("x")));
    coalescer.record(FieldEdit::new("b", json!(1), json!(2)));
    drop(coalescer);

    sleep_ms(10).await;
    assert_eq!(
        sink.changes(),
        vec![
            ("a".to_string(), json!(null), json!("x")),
            ("b".to_string(), json!(1), json!(2)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_session_still_persists_its_edits() {
    let sink = Arc::new(MemorySink::default());
    let coalescer = Arc::new(ChangeCoalescer::new(sink.clone(), &settings()));
    let mut session = FormSession::hydrate(session_schema(), snapshot(json!({})), coalescer);
    session.edit("f1", json!("draft")).unwrap();
    drop(session);

    sleep_ms(10).await;
    assert_eq!(sink.changes(), vec![("f1".to_string(), json!(null), json!("draft"))]);
}
