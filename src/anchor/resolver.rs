//! Resolve each field's anchor locator against a template body.

use crate::anchor::types::{AnchorMap, Location, ResolutionFailure, ResolvedAnchor, Resolution, UnresolvedAnchor};
use crate::docx::{Block, Document};
use crate::docx::text::find_ci;
use crate::schema::{AnchorSpec, AnchorType, Field, Schema};

/// Resolve every anchored field. Fields without an anchor are helper fields and are skipped.
pub fn resolve_anchors(doc: &Document, schema: &Schema) -> Resolution {
    let index = DocIndex::build(doc);
    let mut anchors = Vec::new();
    let mut unresolved = Vec::new();

    for field in schema.fields() {
        let Some(spec) = &field.anchor else { continue };
        match resolve_with(&index, field, spec) {
            Ok(anchor) => {
                tracing::debug!(field_id = %field.id, location = ?anchor.location, "anchor resolved");
                anchors.push(anchor);
            }
            Err(reason) => {
                tracing::warn!(field_id = %field.id, anchor = spec.type_.as_str(), %reason, "anchor unresolved");
                unresolved.push(UnresolvedAnchor {
                    field_id: field.id.clone(),
                    anchor: spec.clone(),
                    reason,
                });
            }
        }
    }

    tracing::info!(
        resolved = anchors.len(),
        unresolved = unresolved.len(),
        "anchor resolution finished"
    );
    Resolution {
        anchors: AnchorMap::new(anchors, doc.shape()),
        unresolved,
    }
}

/// Resolve a single field's anchor.
pub fn resolve_field(doc: &Document, field: &Field) -> Result<ResolvedAnchor, ResolutionFailure> {
    let spec = field.anchor.as_ref().ok_or(ResolutionFailure::MissingLocator)?;
    resolve_with(&DocIndex::build(doc), field, spec)
}

fn resolve_with(index: &DocIndex, field: &Field, spec: &AnchorSpec) -> Result<ResolvedAnchor, ResolutionFailure> {
    let (location, label) = match spec.type_ {
        AnchorType::Label => resolve_label(index, spec)?,
        AnchorType::Paragraph => resolve_paragraph(index, spec)?,
        AnchorType::TableCell => resolve_table_cell(index, spec)?,
        AnchorType::Table => resolve_table(index, spec)?,
    };
    Ok(ResolvedAnchor {
        field_id: field.id.clone(),
        anchor_type: spec.type_,
        location,
        label,
    })
}

/// Text snapshot of the body, taken once per resolution.
struct DocIndex {
    blocks: Vec<IndexedBlock>,
}

enum IndexedBlock {
    Paragraph { index: usize, text: String },
    Table { index: usize, rows: Vec<Vec<String>> },
}

impl DocIndex {
    fn build(doc: &Document) -> Self {
        let blocks = doc
            .blocks()
            .into_iter()
            .map(|b| match b {
                Block::Paragraph { index, node } => IndexedBlock::Paragraph {
                    index,
                    text: doc.paragraph_text(node),
                },
                Block::Table { index, node } => IndexedBlock::Table {
                    index,
                    rows: doc.rows(node).into_iter().map(|r| doc.row_texts(r)).collect(),
                },
            })
            .collect();
        DocIndex { blocks }
    }

    fn paragraphs(&self) -> impl Iterator<Item = (usize, &str)> {
        self.blocks.iter().filter_map(|b| match b {
            IndexedBlock::Paragraph { index, text } => Some((*index, text.as_str())),
            IndexedBlock::Table { .. } => None,
        })
    }

    fn tables(&self) -> impl Iterator<Item = (usize, &[Vec<String>])> {
        self.blocks.iter().filter_map(|b| match b {
            IndexedBlock::Table { index, rows } => Some((*index, rows.as_slice())),
            IndexedBlock::Paragraph { .. } => None,
        })
    }

    fn table(&self, index: usize) -> Option<&[Vec<String>]> {
        self.tables().find(|(i, _)| *i == index).map(|(_, rows)| rows)
    }

    /// The paragraph directly following body paragraph `index`, if the next block is one.
    fn next_paragraph(&self, index: usize) -> Option<(usize, &str)> {
        let pos = self
            .blocks
            .iter()
            .position(|b| matches!(b, IndexedBlock::Paragraph { index: i, .. } if *i == index))?;
        match self.blocks.get(pos + 1)? {
            IndexedBlock::Paragraph { index, text } => Some((*index, text.as_str())),
            IndexedBlock::Table { .. } => None,
        }
    }

    fn table_count(&self) -> usize {
        self.tables().count()
    }

    fn paragraph_count(&self) -> usize {
        self.paragraphs().count()
    }
}

/// Lower-cased text with surrounding whitespace, trailing placeholder underscores
/// and a trailing colon removed.
fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| c == '_' || c.is_whitespace())
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
}

fn contains_ci(text: &str, needle: &str) -> bool {
    let hay: Vec<char> = text.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    find_ci(&hay, &needle, 0).is_some()
}

/// Text after the first occurrence of `label`, with the separating colon removed.
fn remainder_after<'a>(text: &'a str, label: &str) -> &'a str {
    let hay: Vec<char> = text.chars().collect();
    let needle: Vec<char> = label.chars().collect();
    match find_ci(&hay, &needle, 0) {
        Some(pos) => {
            let byte = text.char_indices().nth(pos + needle.len()).map_or(text.len(), |(b, _)| b);
            text[byte..].trim_start().trim_start_matches(':').trim()
        }
        None => "",
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == '_' || c.is_whitespace())
}

/// Exact matches win over substring matches; `occurrence` picks among several.
fn pick<T: Copy>(exact: &[T], partial: &[T], occurrence: Option<usize>) -> Result<T, ResolutionFailure> {
    let pool = if exact.is_empty() { partial } else { exact };
    match (pool.len(), occurrence) {
        (0, _) => Err(ResolutionFailure::NotFound),
        (n, Some(k)) => pool.get(k).copied().ok_or_else(|| ResolutionFailure::OutOfRange {
            detail: format!("occurrence {} requested but only {} matches", k, n),
        }),
        (1, None) => Ok(pool[0]),
        (n, None) => Err(ResolutionFailure::Ambiguous { matches: n }),
    }
}

#[derive(Clone, Copy)]
enum Site {
    Body(usize),
    Cell { table: usize, row: usize, column: usize },
}

fn resolve_label(index: &DocIndex, spec: &AnchorSpec) -> Result<(Location, Option<String>), ResolutionFailure> {
    let label = spec
        .label_text
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .ok_or(ResolutionFailure::MissingLocator)?;
    let wanted = normalize(label);

    let (mut exact, mut partial) = (Vec::new(), Vec::new());
    let mut consider = |site: Site, text: &str| {
        if normalize(text) == wanted {
            exact.push(site);
        } else if contains_ci(text, label) {
            partial.push(site);
        }
    };
    for block in &index.blocks {
        match block {
            IndexedBlock::Paragraph { index, text } => consider(Site::Body(*index), text),
            IndexedBlock::Table { index: table, rows } => {
                for (row, cells) in rows.iter().enumerate() {
                    for (column, text) in cells.iter().enumerate() {
                        consider(Site::Cell { table: *table, row, column }, text);
                    }
                }
            }
        }
    }

    match pick(&exact, &partial, spec.occurrence)? {
        Site::Body(p) => {
            let text = index.paragraphs().find(|(i, _)| *i == p).map_or("", |(_, t)| t);
            if remainder_after(text, label).is_empty() {
                if let Some((next, next_text)) = index.next_paragraph(p) {
                    if is_blank(next_text) {
                        return Ok((Location::Paragraph { paragraph: next }, None));
                    }
                }
            }
            Ok((Location::Paragraph { paragraph: p }, Some(label.to_string())))
        }
        Site::Cell { table, row, column } => {
            let cells = index.table(table).and_then(|rows| rows.get(row));
            let text = cells.and_then(|c| c.get(column)).map_or("", String::as_str);
            let has_next = cells.is_some_and(|c| column + 1 < c.len());
            if has_next && remainder_after(text, label).is_empty() {
                Ok((Location::TableCell { table, row, column: column + 1 }, None))
            } else {
                Ok((Location::TableCell { table, row, column }, Some(label.to_string())))
            }
        }
    }
}

fn resolve_paragraph(index: &DocIndex, spec: &AnchorSpec) -> Result<(Location, Option<String>), ResolutionFailure> {
    let contains = spec.paragraph_contains.as_deref().filter(|s| !s.trim().is_empty());
    match (spec.paragraph_index, contains) {
        (None, None) => Err(ResolutionFailure::MissingLocator),
        (Some(i), needle) => {
            let text = index
                .paragraphs()
                .find(|(p, _)| *p == i)
                .map(|(_, t)| t)
                .ok_or_else(|| ResolutionFailure::OutOfRange {
                    detail: format!("paragraph {} of {}", i, index.paragraph_count()),
                })?;
            match needle {
                Some(n) if !contains_ci(text, n) => Err(ResolutionFailure::NotFound),
                _ => Ok((Location::Paragraph { paragraph: i }, needle.map(str::to_string))),
            }
        }
        (None, Some(needle)) => {
            let wanted = normalize(needle);
            let (mut exact, mut partial) = (Vec::new(), Vec::new());
            for (i, text) in index.paragraphs() {
                if normalize(text) == wanted {
                    exact.push(i);
                } else if contains_ci(text, needle) {
                    partial.push(i);
                }
            }
            let p = pick(&exact, &partial, spec.occurrence)?;
            Ok((Location::Paragraph { paragraph: p }, Some(needle.to_string())))
        }
    }
}

/// Candidate tables for a locator: explicit index, header text, or every table.
fn candidate_tables(index: &DocIndex, spec: &AnchorSpec) -> Result<Vec<usize>, ResolutionFailure> {
    if let Some(t) = spec.table_index {
        if index.table(t).is_none() {
            return Err(ResolutionFailure::OutOfRange {
                detail: format!("table {} of {}", t, index.table_count()),
            });
        }
        return Ok(vec![t]);
    }
    if let Some(header) = spec.table_header.as_deref().filter(|h| !h.trim().is_empty()) {
        return Ok(index
            .tables()
            .filter(|(_, rows)| rows.first().is_some_and(|cells| cells.iter().any(|c| contains_ci(c, header))))
            .map(|(i, _)| i)
            .collect());
    }
    Ok(index.tables().map(|(i, _)| i).collect())
}

fn resolve_table_cell(index: &DocIndex, spec: &AnchorSpec) -> Result<(Location, Option<String>), ResolutionFailure> {
    let label = spec.label_text.as_deref().filter(|l| !l.trim().is_empty());
    if spec.row_index.is_none() && label.is_none() {
        return Err(ResolutionFailure::MissingLocator);
    }
    let tables = candidate_tables(index, spec)?;
    let column = spec.column_index.unwrap_or(1);

    let (mut exact, mut partial) = (Vec::new(), Vec::new());
    for t in tables {
        let rows = index.table(t).unwrap_or(&[]);
        match (spec.row_index, label) {
            (Some(r), _) => {
                if r >= rows.len() {
                    if spec.table_index.is_some() {
                        return Err(ResolutionFailure::OutOfRange {
                            detail: format!("row {} of {} in table {}", r, rows.len(), t),
                        });
                    }
                    continue;
                }
                exact.push((t, r));
            }
            (None, Some(l)) => {
                let wanted = normalize(l);
                for (r, cells) in rows.iter().enumerate() {
                    let first = cells.first().map_or("", String::as_str);
                    if normalize(first) == wanted {
                        exact.push((t, r));
                    } else if contains_ci(first, l) {
                        partial.push((t, r));
                    }
                }
            }
            (None, None) => {}
        }
    }

    let (table, row) = pick(&exact, &partial, spec.occurrence)?;
    let width = index.table(table).and_then(|rows| rows.get(row)).map_or(0, Vec::len);
    if column >= width {
        return Err(ResolutionFailure::OutOfRange {
            detail: format!("column {} of {} in table {} row {}", column, width, table, row),
        });
    }
    Ok((Location::TableCell { table, row, column }, None))
}

fn resolve_table(index: &DocIndex, spec: &AnchorSpec) -> Result<(Location, Option<String>), ResolutionFailure> {
    let mut spec = spec.clone();
    if spec.table_index.is_none() && spec.table_header.is_none() {
        spec.table_header = spec.label_text.clone();
    }
    if spec.table_index.is_none() && spec.table_header.is_none() {
        return Err(ResolutionFailure::MissingLocator);
    }
    let tables = candidate_tables(index, &spec)?;
    let table = pick(&tables, &[], spec.occurrence)?;
    let rows = index.table(table).map_or(0, <[Vec<String>]>::len);
    let template_row = match spec.row_index {
        Some(r) if r < rows => r,
        Some(r) => {
            return Err(ResolutionFailure::OutOfRange {
                detail: format!("template row {} of {} in table {}", r, rows, table),
            })
        }
        None if rows == 0 => {
            return Err(ResolutionFailure::OutOfRange {
                detail: format!("table {} has no rows", table),
            })
        }
        None => rows - 1,
    };
    Ok((Location::TableRow { table, template_row }, None))
}
