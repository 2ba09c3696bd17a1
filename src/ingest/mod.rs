//! Template ingestion: package + schema (supplied or drafted) -> published template
//! plus the fields whose anchors need manual correction.

pub mod extract;

pub use extract::extract_draft_schema;

use crate::anchor::{resolve_anchors, UnresolvedAnchor};
use crate::docx::DocxPackage;
use crate::error::{EngineError, ErrorDetail, SchemaErrors};
use crate::generate::PublishedTemplate;
use crate::schema::{self, SchemaConfig};
use crate::settings::EngineSettings;

#[derive(Clone, Debug)]
pub struct Ingestion {
    pub template: PublishedTemplate,
    /// Whether the schema was drafted from the template rather than supplied.
    pub drafted: bool,
    pub unresolved: Vec<UnresolvedAnchor>,
}

impl Ingestion {
    pub fn unresolved_details(&self) -> Vec<ErrorDetail> {
        self.unresolved.iter().map(UnresolvedAnchor::detail).collect()
    }
}

/// Build the schema (drafting one when `schema` is `None`), validate it, and
/// resolve every anchor against the template. Unresolved anchors are reported,
/// not fatal; schema errors are.
pub fn ingest(
    template_bytes: Vec<u8>,
    schema: Option<SchemaConfig>,
    settings: &EngineSettings,
) -> Result<Ingestion, EngineError> {
    let package = DocxPackage::from_bytes(template_bytes)?;
    let doc = package.load_document()?;
    let drafted = schema.is_none();
    let config = match schema {
        Some(config) => config,
        None => extract_draft_schema(&doc, settings).map_err(SchemaErrors::from)?,
    };
    let schema = schema::build(config)?;
    let resolution = resolve_anchors(&doc, &schema);
    tracing::info!(
        fields = schema.fields().len(),
        anchors = resolution.anchors.len(),
        unresolved = resolution.unresolved.len(),
        drafted,
        "template ingested"
    );
    Ok(Ingestion {
        template: PublishedTemplate::new(schema, resolution.anchors, package),
        drafted,
        unresolved: resolution.unresolved,
    })
}
