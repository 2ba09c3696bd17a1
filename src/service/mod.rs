//! Services around the engine: submission checks and export.

mod export;
mod validation;
pub use export::{export, DocumentConverter, ExportOutput};
pub use validation::{FieldIssue, SubmissionValidator};
