//! Draft schema extraction from a template's visible structure.
//!
//! The draft is a starting point for an administrator: roman-numeral headings
//! become sections, `Label: ____` lines become text fields, glyph lines become
//! checkbox fields, and tables become repeatable groups or label/value cells.

use crate::docx::{Block, Document, NodeId};
use crate::error::SchemaError;
use crate::schema::{
    Action, ActionKind, AnchorSpec, AnchorType, ColumnSpec, Condition, Field, FieldOption, FieldType, Operator,
    RepeatableConfig, Rule, RuleValue, SchemaConfig, Section,
};
use crate::settings::EngineSettings;
use crate::slug::{slugify, unique_id};
use regex::Regex;
use std::collections::HashSet;

pub const CHECKBOX_GLYPHS: &[char] = &['☐', '☑', '✓', '□', '■', '◻', '◼'];

/// Header words that mark a table as a repeatable data-entry block.
const DATA_HEADERS: &[&str] = &["name", "title", "role", "date", "email", "phone"];

const GENERAL_SECTION: &str = "sec_general";
const DRAFT_MIN_ROWS: u32 = 1;
const DRAFT_MAX_ROWS: u32 = 20;
const CHECKBOX_CONTEXT_CHARS: usize = 50;

pub fn extract_draft_schema(doc: &Document, settings: &EngineSettings) -> Result<SchemaConfig, SchemaError> {
    let section_re = Regex::new(r"(?i)^([IVXLC]+)\.\s+(.+)$").map_err(|e| SchemaError::Parse(e.to_string()))?;
    let label_re = Regex::new(r"^(.+?):\s*(_+|$)").map_err(|e| SchemaError::Parse(e.to_string()))?;

    let mut draft = Draft::new(settings.max_field_id_len);
    for block in doc.blocks() {
        match block {
            Block::Paragraph { index, node } => {
                let full = doc.paragraph_text(node);
                let text = full.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(caps) = section_re.captures(text) {
                    draft.open_section(&caps[1].to_uppercase(), text);
                    continue;
                }
                if let Some(caps) = label_re.captures(text) {
                    let label = caps[1].trim();
                    if !label.is_empty() && !label.contains(CHECKBOX_GLYPHS) {
                        let mut anchor = AnchorSpec::new(AnchorType::Paragraph);
                        anchor.paragraph_index = Some(index);
                        anchor.paragraph_contains = Some(label.to_string());
                        draft.push_field(FieldType::Text, label, anchor, |_| {});
                    }
                }
                if text.contains(CHECKBOX_GLYPHS) {
                    let options = checkbox_options(text);
                    if !options.is_empty() {
                        let label = checkbox_label(text);
                        let mut anchor = AnchorSpec::new(AnchorType::Paragraph);
                        anchor.paragraph_index = Some(index);
                        anchor.paragraph_contains = Some(text.chars().take(CHECKBOX_CONTEXT_CHARS).collect());
                        draft.push_field(FieldType::Checkbox, &label, anchor, |f| f.options = options);
                    }
                }
            }
            Block::Table { index, node } => draft.table(doc, index, node),
        }
    }
    draft.add_other_rules();
    tracing::info!(
        sections = draft.config.sections.len(),
        fields = draft.config.fields.len(),
        rules = draft.config.rules.len(),
        "draft schema extracted"
    );
    Ok(draft.config)
}

struct Draft {
    config: SchemaConfig,
    current: Option<String>,
    field_ids: HashSet<String>,
    section_ids: HashSet<String>,
    max_len: usize,
}

impl Draft {
    fn new(max_len: usize) -> Self {
        Draft {
            config: SchemaConfig::default(),
            current: None,
            field_ids: HashSet::new(),
            section_ids: HashSet::new(),
            max_len,
        }
    }

    fn open_section(&mut self, numeral: &str, title: &str) {
        let id = unique_id(format!("sec_{}", numeral), &mut self.section_ids);
        self.add_section(id.clone(), title);
        self.current = Some(id);
    }

    fn add_section(&mut self, id: String, title: &str) {
        let order = self.config.sections.len() as i32;
        self.config.sections.push(Section {
            id,
            title: title.to_string(),
            description: None,
            order,
            collapsible: true,
            collapsed_by_default: false,
        });
    }

    /// Current section id, opening the general section for content before any heading.
    fn section(&mut self) -> String {
        if let Some(id) = &self.current {
            return id.clone();
        }
        let id = unique_id(GENERAL_SECTION.to_string(), &mut self.section_ids);
        self.add_section(id.clone(), "General");
        self.current = Some(id.clone());
        id
    }

    fn push_field(&mut self, type_: FieldType, label: &str, anchor: AnchorSpec, customize: impl FnOnce(&mut Field)) {
        let section = self.section();
        let id = unique_id(format!("{}.{}", section, slugify(label, self.max_len)), &mut self.field_ids);
        self.push_with_id(id, type_, label, section, anchor, customize);
    }

    fn push_with_id(
        &mut self,
        id: String,
        type_: FieldType,
        label: &str,
        section: String,
        anchor: AnchorSpec,
        customize: impl FnOnce(&mut Field),
    ) {
        let mut field = Field::new(id, type_, label, section);
        field.order = Some(self.config.fields.len() as i32);
        field.anchor = Some(anchor);
        customize(&mut field);
        self.config.fields.push(field);
    }

    fn table(&mut self, doc: &Document, index: usize, node: NodeId) {
        let rows = doc.rows(node);
        if rows.len() < 2 {
            return;
        }
        let headers: Vec<String> = doc.row_texts(rows[0]).iter().map(|h| h.trim().to_string()).collect();
        let is_data_table = headers.iter().any(|h| {
            let h = h.to_lowercase();
            DATA_HEADERS.iter().any(|d| h.contains(d))
        });

        if is_data_table {
            let section = self.section();
            let id = unique_id(format!("{}.table_{}", section, index), &mut self.field_ids);
            let mut anchor = AnchorSpec::new(AnchorType::Table);
            anchor.table_index = Some(index);
            anchor.table_header = headers.first().filter(|h| !h.is_empty()).cloned();
            let columns = headers
                .iter()
                .enumerate()
                .map(|(i, h)| ColumnSpec {
                    id: format!("col_{}", i),
                    label: if h.is_empty() { format!("Column {}", i + 1) } else { h.clone() },
                    type_: FieldType::Text,
                })
                .collect();
            let label = format!("Table {}", index + 1);
            self.push_with_id(id, FieldType::Repeatable, &label, section, anchor, |f| {
                f.repeatable_config = Some(RepeatableConfig {
                    min_rows: DRAFT_MIN_ROWS,
                    max_rows: Some(DRAFT_MAX_ROWS),
                    columns,
                });
            });
            return;
        }

        for (row_index, row) in rows.into_iter().enumerate() {
            let cells = doc.row_texts(row);
            if cells.len() < 2 {
                continue;
            }
            let label = cells[0].trim().trim_end_matches(':').trim().to_string();
            if label.is_empty() {
                continue;
            }
            let mut anchor = AnchorSpec::new(AnchorType::TableCell);
            anchor.table_index = Some(index);
            anchor.row_index = Some(row_index);
            anchor.column_index = Some(1);
            anchor.label_text = Some(label.clone());
            self.push_field(FieldType::Text, &label, anchor, |_| {});
        }
    }

    /// A choice field offering "Other", directly followed by a specify/other field,
    /// shows that field only while "Other" is selected.
    fn add_other_rules(&mut self) {
        let mut rules = Vec::new();
        for pair in self.config.fields.windows(2) {
            let (choice, follow_up) = (&pair[0], &pair[1]);
            if !choice.type_.has_options() {
                continue;
            }
            let Some(other) = choice.options.iter().find(|o| o.label.to_lowercase().contains("other")) else {
                continue;
            };
            let follow_label = follow_up.label.to_lowercase();
            if !(follow_label.contains("specify") || follow_label.contains("other")) {
                continue;
            }
            let action = |kind| Action {
                action: kind,
                field: follow_up.id.clone(),
                value: None,
            };
            rules.push(Rule {
                id: format!("rule_{}_other", choice.id),
                conditions: vec![Condition {
                    field: choice.id.clone(),
                    operator: Operator::Contains,
                    value: Some(RuleValue::String(other.value.clone())),
                }],
                then_actions: vec![action(ActionKind::Show)],
                else_actions: Some(vec![action(ActionKind::Hide), action(ActionKind::Clear)]),
            });
        }
        self.config.rules.extend(rules);
    }
}

/// Options following each glyph: values `option_1..`, labels are the first line of
/// the text after the glyph with whitespace collapsed.
pub fn checkbox_options(text: &str) -> Vec<FieldOption> {
    text.split(CHECKBOX_GLYPHS)
        .enumerate()
        .skip(1)
        .filter_map(|(i, part)| {
            let first_line = part.lines().next().unwrap_or("");
            let label = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
            (!label.is_empty()).then(|| FieldOption {
                value: format!("option_{}", i),
                label,
            })
        })
        .collect()
}

fn checkbox_label(text: &str) -> String {
    let before = text.split(CHECKBOX_GLYPHS).next().unwrap_or("");
    let label = before.trim().trim_end_matches(':').trim();
    if label.is_empty() {
        "Options".to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_glyphs() {
        let options = checkbox_options("Type: ☐ Drug  ☐ Device ☐ Other");
        let labels: Vec<_> = options.iter().map(|o| (o.value.as_str(), o.label.as_str())).collect();
        assert_eq!(labels, vec![("option_1", "Drug"), ("option_2", "Device"), ("option_3", "Other")]);
        assert_eq!(checkbox_label("Type: ☐ Drug"), "Type");
        assert_eq!(checkbox_label("☐ Yes ☐ No"), "Options");
    }
}
