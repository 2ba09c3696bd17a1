//! Run-level text editing inside WordprocessingML paragraphs.
//!
//! Edits rewrite only the text children of the runs they touch, so each run keeps
//! its `w:rPr` (font, size, bold, ...) and the paragraph keeps its `w:pPr`.

use crate::docx::xml::{NodeId, XmlTree};
use crate::error::DocumentError;

/// Inline containers whose runs belong to the enclosing paragraph.
const RUN_CONTAINERS: &[&str] = &[
    "w:hyperlink",
    "w:ins",
    "w:smartTag",
    "w:fldSimple",
    "w:customXml",
    "w:sdt",
    "w:sdtContent",
];

const RUN_TEXT_PARTS: &[&str] = &["w:t", "w:tab", "w:br", "w:cr", "w:noBreakHyphen"];

pub const EMPTY_BOXES: &[char] = &['☐', '□', '◻'];
pub const CHECKED_BOX: &str = "☑";

pub fn runs(tree: &XmlTree, paragraph: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_runs(tree, paragraph, &mut out);
    out
}

fn collect_runs(tree: &XmlTree, id: NodeId, out: &mut Vec<NodeId>) {
    for &c in tree.children(id) {
        match tree.name(c) {
            Some("w:r") => out.push(c),
            Some(n) if RUN_CONTAINERS.contains(&n) => collect_runs(tree, c, out),
            _ => {}
        }
    }
}

pub fn run_text(tree: &XmlTree, run: NodeId) -> String {
    let mut out = String::new();
    for &c in tree.children(run) {
        match tree.name(c) {
            Some("w:t") => out.push_str(&tree.text(c)),
            Some("w:tab") => out.push('\t'),
            Some("w:br") | Some("w:cr") => out.push('\n'),
            Some("w:noBreakHyphen") => out.push('-'),
            _ => {}
        }
    }
    out
}

pub fn paragraph_text(tree: &XmlTree, paragraph: NodeId) -> String {
    runs(tree, paragraph)
        .into_iter()
        .map(|r| run_text(tree, r))
        .collect()
}

/// Replace the run's text content, keeping its properties and non-text children.
/// Existing `w:br`/`w:cr` nodes are reused in order for the new line breaks, so a
/// break keeps its `w:type`.
pub fn set_run_text(tree: &mut XmlTree, run: NodeId, text: &str) {
    let mut breaks: std::collections::VecDeque<NodeId> = tree
        .children(run)
        .iter()
        .copied()
        .filter(|&c| matches!(tree.name(c), Some("w:br") | Some("w:cr")))
        .collect();
    tree.remove_children_named(run, RUN_TEXT_PARTS);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            let br = match breaks.pop_front() {
                Some(original) => original,
                None => tree.create_element("w:br"),
            };
            tree.append_child(run, br);
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                let tab = tree.create_element("w:tab");
                tree.append_child(run, tab);
            }
            if !segment.is_empty() {
                let t = tree.create_element("w:t");
                tree.set_attr(t, "xml:space", "preserve");
                let node = tree.create_text(segment);
                tree.append_child(t, node);
                tree.append_child(run, t);
            }
        }
    }
}

/// Append a new run to the paragraph, inheriting the paragraph-mark run properties.
pub fn new_run(tree: &mut XmlTree, paragraph: NodeId) -> NodeId {
    let run = tree.create_element("w:r");
    let mark_props = tree
        .first_child_named(paragraph, "w:pPr")
        .and_then(|ppr| tree.first_child_named(ppr, "w:rPr"));
    if let Some(rpr) = mark_props {
        let copy = tree.clone_subtree(rpr);
        tree.append_child(run, copy);
    }
    tree.append_child(paragraph, run);
    run
}

/// Replace characters `start..end` of the paragraph text with `replacement`.
///
/// The replacement lands in the run holding `start`; other runs overlapping the
/// range lose only their overlapping characters.
pub fn replace_range(
    tree: &mut XmlTree,
    paragraph: NodeId,
    start: usize,
    end: usize,
    replacement: &str,
) -> Result<(), DocumentError> {
    let runs = runs(tree, paragraph);
    let texts: Vec<Vec<char>> = runs.iter().map(|&r| run_text(tree, r).chars().collect()).collect();
    let total: usize = texts.iter().map(Vec::len).sum();
    if start > end || end > total {
        return Err(DocumentError::Malformed(format!(
            "text range {}..{} outside paragraph of length {}",
            start, end, total
        )));
    }
    if runs.is_empty() {
        if !replacement.is_empty() {
            let run = new_run(tree, paragraph);
            set_run_text(tree, run, replacement);
        }
        return Ok(());
    }

    let target = locate_run(&texts, start);
    let mut offset = 0;
    for (i, &run) in runs.iter().enumerate() {
        let chars = &texts[i];
        let (rs, re) = (offset, offset + chars.len());
        offset = re;
        let lo = start.max(rs);
        let hi = end.min(re);
        let overlaps = lo < hi;
        if i != target && !overlaps {
            continue;
        }
        let cut_lo = lo.min(re) - rs;
        let cut_hi = if overlaps { hi - rs } else { cut_lo };
        let mut new_text: String = chars[..cut_lo].iter().collect();
        if i == target {
            new_text.push_str(replacement);
        }
        new_text.extend(&chars[cut_hi..]);
        set_run_text(tree, run, &new_text);
    }
    Ok(())
}

/// Index of the run that receives an edit at character `pos`.
fn locate_run(texts: &[Vec<char>], pos: usize) -> usize {
    let mut offset = 0;
    let mut last_non_empty = None;
    for (i, t) in texts.iter().enumerate() {
        if !t.is_empty() {
            if pos >= offset && pos < offset + t.len() {
                return i;
            }
            last_non_empty = Some(i);
        }
        offset += t.len();
    }
    last_non_empty.unwrap_or(0)
}

/// Replace the whole paragraph text; the first text-bearing run keeps its formatting.
pub fn set_paragraph_text(tree: &mut XmlTree, paragraph: NodeId, text: &str) -> Result<(), DocumentError> {
    let len = paragraph_text(tree, paragraph).chars().count();
    replace_range(tree, paragraph, 0, len, text)
}

/// Case-insensitive search for `needle` in `hay`, starting at char `from`.
pub fn find_ci(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| {
        hay[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

/// Tick the empty checkbox glyph directly before `label` (whitespace allowed in between).
/// The label must end at a word boundary, so "No" never matches "Not sure".
/// Returns false when the label or its glyph is absent.
pub fn tick_box_before(tree: &mut XmlTree, paragraph: NodeId, label: &str) -> Result<bool, DocumentError> {
    let text: Vec<char> = paragraph_text(tree, paragraph).chars().collect();
    let needle: Vec<char> = label.chars().collect();
    let mut from = 0;
    while let Some(pos) = find_ci(&text, &needle, from) {
        let bounded = text
            .get(pos + needle.len())
            .map_or(true, |c| !c.is_alphanumeric());
        if !bounded {
            from = pos + 1;
            continue;
        }
        let mut i = pos;
        while i > 0 && text[i - 1].is_whitespace() {
            i -= 1;
        }
        if i > 0 && EMPTY_BOXES.contains(&text[i - 1]) {
            replace_range(tree, paragraph, i - 1, i, CHECKED_BOX)?;
            return Ok(true);
        }
        from = pos + 1;
    }
    Ok(false)
}
