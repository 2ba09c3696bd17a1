//! Docform SDK: schema-driven form filling for DOCX templates.

pub mod anchor;
pub mod coalesce;
pub mod docx;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod rules;
pub mod schema;
pub mod service;
pub mod settings;
pub mod slug;
pub mod snapshot;
pub mod state;

pub use anchor::{resolve_anchors, AnchorMap, Location, Resolution, ResolutionFailure, ResolvedAnchor, UnresolvedAnchor};
pub use coalesce::{diff_snapshots, replay, ChangeCoalescer, ChangeRecord, ChangeSink, FieldEdit, SnapshotDiff};
pub use docx::{Document, DocxPackage, TemplateShape};
pub use error::{DocumentError, EngineError, ErrorBody, ErrorDetail, SchemaError, SchemaErrors};
pub use generate::{generate_document, PublishedTemplate};
pub use ingest::{extract_draft_schema, ingest, Ingestion};
pub use rules::{EvaluatedFieldState, EvaluatedState, ForcedValue, RuleEngine};
pub use schema::{Schema, SchemaConfig};
pub use service::{export, DocumentConverter, ExportOutput, FieldIssue, SubmissionValidator};
pub use settings::EngineSettings;
pub use snapshot::Snapshot;
pub use state::FormSession;
