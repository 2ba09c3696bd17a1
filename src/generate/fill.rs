//! Fill strategies: where inside a paragraph or cell the value text lands.

use crate::docx::text::{self, find_ci, EMPTY_BOXES};
use crate::docx::{NodeId, XmlTree};
use crate::error::DocumentError;

#[derive(Debug, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    /// The label the value should follow is no longer in the target.
    LabelMissing,
}

/// Write `value` into a paragraph, after `label` when given:
/// the first `__` placeholder wins, then a trailing colon, then an empty paragraph;
/// otherwise the value is appended.
pub fn fill_paragraph(
    tree: &mut XmlTree,
    paragraph: NodeId,
    label: Option<&str>,
    value: &str,
) -> Result<FillOutcome, DocumentError> {
    let chars: Vec<char> = text::paragraph_text(tree, paragraph).chars().collect();
    let start = match label {
        Some(l) => {
            let needle: Vec<char> = l.chars().collect();
            match find_ci(&chars, &needle, 0) {
                Some(pos) => pos + needle.len(),
                None => return Ok(FillOutcome::LabelMissing),
            }
        }
        None => 0,
    };

    if let Some((from, to)) = placeholder_span(&chars, start) {
        text::replace_range(tree, paragraph, from, to, value)?;
        return Ok(FillOutcome::Filled);
    }

    let trimmed_len = chars.iter().rposition(|c| !c.is_whitespace()).map_or(0, |i| i + 1);
    if trimmed_len == 0 {
        text::set_paragraph_text(tree, paragraph, value)?;
    } else if chars[trimmed_len - 1] == ':' {
        text::replace_range(tree, paragraph, trimmed_len, chars.len(), &format!(" {}", value))?;
    } else {
        text::replace_range(tree, paragraph, chars.len(), chars.len(), &format!(" {}", value))?;
    }
    Ok(FillOutcome::Filled)
}

/// First run of two or more underscores at or after `start`.
fn placeholder_span(chars: &[char], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '_' && chars[i + 1] == '_' {
            let end = chars[i..].iter().position(|&c| c != '_').map_or(chars.len(), |n| i + n);
            return Some((i, end));
        }
        i += 1;
    }
    None
}

fn cell_paragraphs(tree: &mut XmlTree, cell: NodeId) -> Vec<NodeId> {
    let paragraphs: Vec<NodeId> = tree.children_named(cell, "w:p").collect();
    if !paragraphs.is_empty() {
        return paragraphs;
    }
    let p = tree.create_element("w:p");
    tree.append_child(cell, p);
    vec![p]
}

/// Fill a cell: the paragraph holding `label` (or the first paragraph) takes the value.
pub fn fill_cell(
    tree: &mut XmlTree,
    cell: NodeId,
    label: Option<&str>,
    value: &str,
) -> Result<FillOutcome, DocumentError> {
    let paragraphs = cell_paragraphs(tree, cell);
    let target = match label {
        Some(l) => {
            let needle: Vec<char> = l.chars().collect();
            let hit = paragraphs.iter().copied().find(|&p| {
                let hay: Vec<char> = text::paragraph_text(tree, p).chars().collect();
                find_ci(&hay, &needle, 0).is_some()
            });
            match hit {
                Some(p) => p,
                None => return Ok(FillOutcome::LabelMissing),
            }
        }
        None => paragraphs[0],
    };
    fill_paragraph(tree, target, label, value)
}

/// Replace the whole cell text; extra paragraphs are emptied but keep their properties.
pub fn set_cell_text(tree: &mut XmlTree, cell: NodeId, value: &str) -> Result<(), DocumentError> {
    let paragraphs = cell_paragraphs(tree, cell);
    for (i, p) in paragraphs.into_iter().enumerate() {
        text::set_paragraph_text(tree, p, if i == 0 { value } else { "" })?;
    }
    Ok(())
}

pub fn has_empty_boxes(tree: &XmlTree, paragraph: NodeId) -> bool {
    text::paragraph_text(tree, paragraph).chars().any(|c| EMPTY_BOXES.contains(&c))
}

/// Tick the first empty glyph of the paragraph.
pub fn tick_first_box(tree: &mut XmlTree, paragraph: NodeId) -> Result<bool, DocumentError> {
    let pos = text::paragraph_text(tree, paragraph)
        .chars()
        .position(|c| EMPTY_BOXES.contains(&c));
    match pos {
        Some(i) => {
            text::replace_range(tree, paragraph, i, i + 1, text::CHECKED_BOX)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Tick the glyph before each label. Returns how many were ticked.
pub fn tick_options(tree: &mut XmlTree, paragraph: NodeId, labels: &[String]) -> Result<usize, DocumentError> {
    let mut ticked = 0;
    for label in labels {
        if text::tick_box_before(tree, paragraph, label)? {
            ticked += 1;
        }
    }
    Ok(ticked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::ROOT;

    fn para(text: &str) -> (XmlTree, NodeId) {
        let xml = if text.is_empty() {
            "<w:p/>".to_string()
        } else {
            format!(r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
        };
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let p = tree.find_descendant(ROOT, "w:p").unwrap();
        (tree, p)
    }

    fn filled(text: &str, label: Option<&str>, value: &str) -> String {
        let (mut tree, p) = para(text);
        assert_eq!(fill_paragraph(&mut tree, p, label, value).unwrap(), FillOutcome::Filled);
        text::paragraph_text(&tree, p)
    }

    #[test]
    fn placeholder_strategies_in_order() {
        assert_eq!(filled("Name: ____ Date: ____", Some("Date"), "today"), "Name: ____ Date: today");
        assert_eq!(filled("Name:  ", Some("Name"), "Ada"), "Name: Ada");
        assert_eq!(filled("", None, "Ada"), "Ada");
        assert_eq!(filled("Signed by", None, "Ada"), "Signed by Ada");
        assert_eq!(filled("____", None, "a\nb"), "a\nb");
    }

    #[test]
    fn missing_label_is_reported() {
        let (mut tree, p) = para("Other text");
        assert_eq!(fill_paragraph(&mut tree, p, Some("Name"), "x").unwrap(), FillOutcome::LabelMissing);
    }

    #[test]
    fn placeholder_keeps_run_properties() {
        let (mut tree, p) = para("Title: ___");
        fill_paragraph(&mut tree, p, Some("Title"), "Trial").unwrap();
        assert!(tree.to_xml().contains(r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Title: Trial</w:t>"#));
    }

    #[test]
    fn cells_get_a_paragraph_when_empty() {
        let mut tree = XmlTree::parse(b"<w:tc><w:tcPr/></w:tc>").unwrap();
        let cell = tree.find_descendant(ROOT, "w:tc").unwrap();
        set_cell_text(&mut tree, cell, "v").unwrap();
        assert_eq!(
            tree.to_xml(),
            r#"<w:tc><w:tcPr/><w:p><w:r><w:t xml:space="preserve">v</w:t></w:r></w:p></w:tc>"#
        );
    }
}
