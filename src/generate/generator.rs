//! Document generation: template package + anchor map + snapshot in, filled DOCX out.

use crate::anchor::{AnchorMap, Location, ResolvedAnchor};
use crate::docx::{Document, DocxPackage, NodeId, XmlTree};
use crate::error::{EngineError, SchemaError};
use crate::generate::fill::{self, FillOutcome};
use crate::generate::format::{format_column_value, format_field_value, selected_labels};
use crate::rules::{EvaluatedState, RuleEngine};
use crate::schema::{Field, Schema};
use crate::snapshot::Snapshot;
use serde_json::Value;
use std::sync::Arc;

/// A published template version: schema, anchor map and package, all immutable
/// and cheap to share between concurrent generations.
#[derive(Clone, Debug)]
pub struct PublishedTemplate {
    schema: Arc<Schema>,
    anchors: Arc<AnchorMap>,
    package: Arc<DocxPackage>,
}

impl PublishedTemplate {
    pub fn new(schema: Schema, anchors: AnchorMap, package: DocxPackage) -> Self {
        PublishedTemplate {
            schema: Arc::new(schema),
            anchors: Arc::new(anchors),
            package: Arc::new(package),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn anchors(&self) -> &AnchorMap {
        &self.anchors
    }

    pub fn package(&self) -> &DocxPackage {
        &self.package
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> EvaluatedState {
        RuleEngine::evaluate(&self.schema, snapshot)
    }

    pub fn generate(&self, snapshot: &Snapshot) -> Result<Vec<u8>, EngineError> {
        generate_document(&self.package, &self.schema, &self.anchors, snapshot)
    }
}

/// Fill a fresh copy of the template. Every value present in the snapshot is
/// written, whether or not rules currently hide its field. Equal inputs give
/// equal bytes.
pub fn generate_document(
    package: &DocxPackage,
    schema: &Schema,
    anchors: &AnchorMap,
    snapshot: &Snapshot,
) -> Result<Vec<u8>, EngineError> {
    let mut doc = package.load_document()?;
    let shape = doc.shape();
    if &shape != anchors.shape() {
        return Err(EngineError::TemplateChanged(format!(
            "expected {} paragraphs and table rows {:?}, found {} and {:?}",
            anchors.shape().paragraphs,
            anchors.shape().tables,
            shape.paragraphs,
            shape.tables
        )));
    }

    // Node ids are stable across edits, so every target is looked up before any mutation.
    let paragraphs = doc.paragraphs();
    let table_rows: Vec<Vec<NodeId>> = doc.tables().into_iter().map(|t| doc.rows(t)).collect();

    let (mut fields_written, mut rows_written) = (0usize, 0usize);
    for anchor in anchors.anchors() {
        let field = schema
            .field(&anchor.field_id)
            .ok_or_else(|| EngineError::UnknownField(anchor.field_id.clone()))?;
        match anchor.location {
            Location::TableRow { table, template_row } => {
                let template = table_rows
                    .get(table)
                    .and_then(|rows| rows.get(template_row))
                    .copied()
                    .ok_or_else(|| mismatch(anchor, "template row no longer exists"))?;
                rows_written += expand_rows(&mut doc, field, template, snapshot)?;
            }
            Location::Paragraph { paragraph } => {
                let node = paragraphs
                    .get(paragraph)
                    .copied()
                    .ok_or_else(|| mismatch(anchor, "paragraph no longer exists"))?;
                if write_value(doc.tree_mut(), field, anchor, Target::Paragraph(node), snapshot)? {
                    fields_written += 1;
                }
            }
            Location::TableCell { table, row, column } => {
                let node = table_rows
                    .get(table)
                    .and_then(|rows| rows.get(row))
                    .and_then(|&r| doc.cells(r).get(column).copied())
                    .ok_or_else(|| mismatch(anchor, "table cell no longer exists"))?;
                if write_value(doc.tree_mut(), field, anchor, Target::Cell(node), snapshot)? {
                    fields_written += 1;
                }
            }
        }
    }

    let bytes = package.repackage(&doc.to_xml())?;
    tracing::info!(fields_written, rows_written, bytes = bytes.len(), "document generated");
    Ok(bytes)
}

fn mismatch(anchor: &ResolvedAnchor, detail: &str) -> EngineError {
    EngineError::TemplateMismatch {
        field_id: anchor.field_id.clone(),
        detail: detail.to_string(),
    }
}

#[derive(Clone, Copy)]
enum Target {
    Paragraph(NodeId),
    Cell(NodeId),
}

impl Target {
    fn paragraphs(self, tree: &XmlTree) -> Vec<NodeId> {
        match self {
            Target::Paragraph(p) => vec![p],
            Target::Cell(c) => tree.children_named(c, "w:p").collect(),
        }
    }
}

/// Returns whether anything was written.
fn write_value(
    tree: &mut XmlTree,
    field: &Field,
    anchor: &ResolvedAnchor,
    target: Target,
    snapshot: &Snapshot,
) -> Result<bool, EngineError> {
    let Some(value) = snapshot.get(&field.id).filter(|v| !v.is_null()) else {
        return Ok(false);
    };

    if field.type_.has_options() && tick_glyphs(tree, field, target, value)? {
        tracing::debug!(field_id = %field.id, "checkbox glyphs ticked");
        return Ok(true);
    }

    let Some(text) = format_field_value(field, value) else {
        return Ok(false);
    };
    let label = anchor.label.as_deref();
    let outcome = match target {
        Target::Paragraph(p) => fill::fill_paragraph(tree, p, label, &text)?,
        Target::Cell(c) => fill::fill_cell(tree, c, label, &text)?,
    };
    if outcome == FillOutcome::LabelMissing {
        return Err(mismatch(
            anchor,
            &format!("label '{}' not found at its anchored location", label.unwrap_or_default()),
        ));
    }
    tracing::debug!(field_id = %field.id, "value written");
    Ok(true)
}

/// Tick option glyphs when the target carries them. False means fall back to text.
fn tick_glyphs(tree: &mut XmlTree, field: &Field, target: Target, value: &Value) -> Result<bool, EngineError> {
    let glyph_paragraphs: Vec<NodeId> = target
        .paragraphs(tree)
        .into_iter()
        .filter(|&p| fill::has_empty_boxes(tree, p))
        .collect();
    if glyph_paragraphs.is_empty() {
        return Ok(false);
    }

    if let Value::Bool(checked) = value {
        if *checked {
            fill::tick_first_box(tree, glyph_paragraphs[0])?;
        }
        return Ok(true);
    }

    let labels = selected_labels(field, value);
    if labels.is_empty() {
        return Ok(false);
    }
    let mut ticked = 0;
    for p in glyph_paragraphs {
        ticked += fill::tick_options(tree, p, &labels)?;
    }
    Ok(ticked > 0)
}

/// Replace the template row with one clone per data row, clamped to `max_rows` and
/// padded with blank rows up to `min_rows`. Returns the number of rows emitted.
fn expand_rows(doc: &mut Document, field: &Field, template: NodeId, snapshot: &Snapshot) -> Result<usize, EngineError> {
    let config = field
        .repeatable_config
        .as_ref()
        .ok_or_else(|| SchemaError::MissingRepeatableConfig(field.id.clone()))
        .map_err(|e| EngineError::Schema(e.into()))?;
    let rows = snapshot.rows(&field.id);
    let max = config.max_rows.map_or(usize::MAX, |m| m as usize);
    let data = &rows[..rows.len().min(max)];
    if data.len() < rows.len() {
        tracing::debug!(field_id = %field.id, dropped = rows.len() - data.len(), "rows beyond max_rows dropped");
    }
    let total = data.len().max(config.min_rows as usize);

    let tree = doc.tree_mut();
    let mut previous = template;
    for i in 0..total {
        let row = tree.clone_subtree(template);
        tree.insert_after(previous, row)?;
        previous = row;

        let record = data.get(i).and_then(Value::as_object);
        let cells: Vec<NodeId> = tree.children_named(row, "w:tc").collect();
        for (j, cell) in cells.into_iter().enumerate() {
            let text = match (record, config.columns.get(j)) {
                (Some(record), Some(column)) => record
                    .get(&column.id)
                    .and_then(|v| format_column_value(column, v))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            fill::set_cell_text(tree, cell, &text)?;
        }
    }
    tree.detach(template);
    Ok(total)
}
