//! Typed errors and structured per-entity reporting.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("missing reference: {kind} id '{id}' (referenced by {referenced_by})")]
    MissingReference {
        kind: &'static str,
        id: String,
        referenced_by: String,
    },
    #[error("field '{field_id}': max_rows {max_rows} is less than min_rows {min_rows}")]
    InvalidRepeatableBounds {
        field_id: String,
        min_rows: u32,
        max_rows: u32,
    },
    #[error("field '{0}': repeatable field requires repeatable_config")]
    MissingRepeatableConfig(String),
    #[error("field '{field_id}': anchor type '{anchor}' cannot bind a {field_type} field")]
    AnchorTypeMismatch {
        field_id: String,
        anchor: &'static str,
        field_type: &'static str,
    },
    #[error("rule '{rule_id}': {detail}")]
    InvalidRule { rule_id: String, detail: String },
    #[error("schema parse: {0}")]
    Parse(String),
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::DuplicateId { .. } => "duplicate_id",
            SchemaError::MissingReference { .. } => "missing_reference",
            SchemaError::InvalidRepeatableBounds { .. } => "invalid_repeatable_bounds",
            SchemaError::MissingRepeatableConfig(_) => "missing_repeatable_config",
            SchemaError::AnchorTypeMismatch { .. } => "anchor_type_mismatch",
            SchemaError::InvalidRule { .. } => "invalid_rule",
            SchemaError::Parse(_) => "parse_error",
        }
    }

    /// Id of the entity an administrator has to fix.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            SchemaError::DuplicateId { id, .. } => Some(id),
            SchemaError::MissingReference { referenced_by, .. } => Some(referenced_by),
            SchemaError::InvalidRepeatableBounds { field_id, .. } => Some(field_id),
            SchemaError::MissingRepeatableConfig(id) => Some(id),
            SchemaError::AnchorTypeMismatch { field_id, .. } => Some(field_id),
            SchemaError::InvalidRule { rule_id, .. } => Some(rule_id),
            SchemaError::Parse(_) => None,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            entity_id: self.entity_id().map(str::to_string),
        }
    }
}

/// Every validation error found in one schema. Never empty.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("schema invalid: {}", join_messages(.0))]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl SchemaErrors {
    pub fn errors(&self) -> &[SchemaError] {
        &self.0
    }

    pub fn details(&self) -> Vec<ErrorDetail> {
        self.0.iter().map(SchemaError::detail).collect()
    }
}

impl From<SchemaError> for SchemaErrors {
    fn from(e: SchemaError) -> Self {
        SchemaErrors(vec![e])
    }
}

fn join_messages(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("package part missing: {0}")]
    MissingPart(String),
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<quick_xml::events::attributes::AttrError> for DocumentError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        DocumentError::Xml(e.into())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaErrors),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("template no longer matches anchor map for '{field_id}': {detail}; regenerate or re-upload the template")]
    TemplateMismatch { field_id: String, detail: String },
    #[error("template structure changed since ingestion: {0}; regenerate or re-upload the template")]
    TemplateChanged(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("conversion: {0}")]
    Conversion(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Schema(_) => "schema_error",
            EngineError::Document(_) => "document_error",
            EngineError::TemplateMismatch { .. } | EngineError::TemplateChanged(_) => "template_mismatch",
            EngineError::UnknownField(_) => "unknown_field",
            EngineError::Persistence(_) => "persistence_error",
            EngineError::Conversion(_) => "conversion_error",
            EngineError::Io(_) => "io_error",
        }
    }

    /// Structured report: one entry per offending entity for schema errors, one otherwise.
    pub fn details(&self) -> Vec<ErrorDetail> {
        match self {
            EngineError::Schema(errors) => errors.details(),
            EngineError::TemplateMismatch { field_id, .. } | EngineError::UnknownField(field_id) => {
                vec![ErrorDetail {
                    code: self.code().to_string(),
                    message: self.to_string(),
                    entity_id: Some(field_id.clone()),
                }]
            }
            _ => vec![ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                entity_id: None,
            }],
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl From<&EngineError> for ErrorBody {
    fn from(e: &EngineError) -> Self {
        ErrorBody { errors: e.details() }
    }
}
