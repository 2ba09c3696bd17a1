//! Load a schema from JSON text, a JSON value, or a file, then validate and index it.

use crate::error::{SchemaError, SchemaErrors};
use crate::schema::{validate, Schema, SchemaConfig};
use std::path::Path;

/// Build the runtime schema from a raw config (validates first).
pub fn build(config: SchemaConfig) -> Result<Schema, SchemaErrors> {
    validate(&config)?;
    tracing::debug!(
        sections = config.sections.len(),
        fields = config.fields.len(),
        rules = config.rules.len(),
        "schema validated"
    );
    Ok(Schema::from_validated(config))
}

pub fn from_json_str(json: &str) -> Result<Schema, SchemaErrors> {
    let config: SchemaConfig =
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
    build(config)
}

pub fn from_json_value(value: serde_json::Value) -> Result<Schema, SchemaErrors> {
    let config: SchemaConfig =
        serde_json::from_value(value).map_err(|e| SchemaError::Parse(e.to_string()))?;
    build(config)
}

pub fn from_path(path: impl AsRef<Path>) -> Result<Schema, SchemaErrors> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?;
    from_json_str(&text)
}
