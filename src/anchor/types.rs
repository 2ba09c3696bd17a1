//! Anchor map: where each field's value goes inside a template.

use crate::docx::TemplateShape;
use crate::error::ErrorDetail;
use crate::schema::{AnchorSpec, AnchorType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structural location inside the template body. Indexes count body-level
/// paragraphs, top-level tables, and rows/cells within them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Paragraph { paragraph: usize },
    TableCell { table: usize, row: usize, column: usize },
    /// Template row of a repeatable block.
    TableRow { table: usize, template_row: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnchor {
    pub field_id: String,
    pub anchor_type: AnchorType,
    pub location: Location,
    /// Text that precedes the value inside the target; the value is written
    /// after it. `None` when the whole target is the value region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Immutable once published with a template version; persisted next to the schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorMap {
    anchors: Vec<ResolvedAnchor>,
    shape: TemplateShape,
}

impl AnchorMap {
    pub fn new(anchors: Vec<ResolvedAnchor>, shape: TemplateShape) -> Self {
        AnchorMap { anchors, shape }
    }

    pub fn get(&self, field_id: &str) -> Option<&ResolvedAnchor> {
        self.anchors.iter().find(|a| a.field_id == field_id)
    }

    pub fn anchors(&self) -> &[ResolvedAnchor] {
        &self.anchors
    }

    pub fn shape(&self) -> &TemplateShape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ResolutionFailure {
    #[error("locator matched nothing in the template")]
    NotFound,
    #[error("locator matched {matches} locations; set `occurrence` or a narrower locator")]
    Ambiguous { matches: usize },
    #[error("{detail}")]
    OutOfRange { detail: String },
    #[error("anchor has no usable locator for its type")]
    MissingLocator,
}

impl ResolutionFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionFailure::NotFound => "anchor_not_found",
            ResolutionFailure::Ambiguous { .. } => "anchor_ambiguous",
            ResolutionFailure::OutOfRange { .. } => "anchor_out_of_range",
            ResolutionFailure::MissingLocator => "anchor_missing_locator",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnresolvedAnchor {
    pub field_id: String,
    pub anchor: AnchorSpec,
    pub reason: ResolutionFailure,
}

impl UnresolvedAnchor {
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.reason.code().to_string(),
            message: format!("field '{}' ({} anchor): {}", self.field_id, self.anchor.type_.as_str(), self.reason),
            entity_id: Some(self.field_id.clone()),
        }
    }
}

/// Outcome of resolving every anchored field of a schema. Partial success is normal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resolution {
    pub anchors: AnchorMap,
    pub unresolved: Vec<UnresolvedAnchor>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// One report entry per unresolved field.
    pub fn details(&self) -> Vec<ErrorDetail> {
        self.unresolved.iter().map(UnresolvedAnchor::detail).collect()
    }
}
