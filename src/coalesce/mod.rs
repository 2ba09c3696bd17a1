//! Change coalescing for persistence and audit.

pub mod coalescer;
pub mod history;

pub use coalescer::{ChangeCoalescer, ChangeRecord, ChangeSink, FieldEdit};
pub use history::{diff_snapshots, replay, SnapshotDiff};
