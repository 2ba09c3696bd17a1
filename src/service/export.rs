//! Export pipeline: generate the DOCX, then hand it to the conversion collaborator once.

use crate::error::EngineError;
use crate::generate::PublishedTemplate;
use crate::snapshot::Snapshot;
use async_trait::async_trait;

/// Renders a generated DOCX into a secondary viewing format (e.g. PDF).
/// May be slow; callers own timeouts and retries.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, docx: &[u8]) -> Result<Vec<u8>, EngineError>;
}

#[derive(Debug)]
pub struct ExportOutput {
    pub docx: Vec<u8>,
    /// Conversion outcome; a failure here never discards `docx`.
    pub converted: Option<Result<Vec<u8>, EngineError>>,
}

/// Generate and, when a converter is given, convert exactly once. Generation
/// errors are fatal; conversion errors are carried in the output.
pub async fn export(
    template: &PublishedTemplate,
    snapshot: &Snapshot,
    converter: Option<&dyn DocumentConverter>,
) -> Result<ExportOutput, EngineError> {
    let docx = template.generate(snapshot)?;
    let converted = match converter {
        Some(c) => {
            let result = c.convert(&docx).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "document conversion failed");
            }
            Some(result)
        }
        None => None,
    };
    Ok(ExportOutput { docx, converted })
}
