//! Structural view of a WordprocessingML body: paragraphs, tables, rows and cells.

use crate::docx::text;
use crate::docx::xml::{NodeId, XmlTree, ROOT};
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// Coarse structure of a template body, stored with the anchor map to detect
/// templates edited after ingestion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateShape {
    /// Body-level paragraph count.
    pub paragraphs: usize,
    /// Row count of each top-level table, in document order.
    pub tables: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    Paragraph { index: usize, node: NodeId },
    Table { index: usize, node: NodeId },
}

#[derive(Clone, Debug)]
pub struct Document {
    tree: XmlTree,
    body: NodeId,
}

impl Document {
    pub fn parse(xml: &[u8]) -> Result<Self, DocumentError> {
        let tree = XmlTree::parse(xml)?;
        let root = tree
            .first_child_named(ROOT, "w:document")
            .ok_or_else(|| DocumentError::Malformed("missing w:document".into()))?;
        let body = tree
            .first_child_named(root, "w:body")
            .ok_or_else(|| DocumentError::Malformed("missing w:body".into()))?;
        Ok(Document { tree, body })
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut XmlTree {
        &mut self.tree
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Body-level paragraphs and tables in document order, each with its index
    /// among blocks of the same kind.
    pub fn blocks(&self) -> Vec<Block> {
        let (mut p, mut t) = (0, 0);
        let mut out = Vec::new();
        for &c in self.tree.children(self.body) {
            match self.tree.name(c) {
                Some("w:p") => {
                    out.push(Block::Paragraph { index: p, node: c });
                    p += 1;
                }
                Some("w:tbl") => {
                    out.push(Block::Table { index: t, node: c });
                    t += 1;
                }
                _ => {}
            }
        }
        out
    }

    pub fn paragraphs(&self) -> Vec<NodeId> {
        self.tree.children_named(self.body, "w:p").collect()
    }

    pub fn tables(&self) -> Vec<NodeId> {
        self.tree.children_named(self.body, "w:tbl").collect()
    }

    pub fn rows(&self, table: NodeId) -> Vec<NodeId> {
        self.tree.children_named(table, "w:tr").collect()
    }

    pub fn cells(&self, row: NodeId) -> Vec<NodeId> {
        self.tree.children_named(row, "w:tc").collect()
    }

    pub fn cell_paragraphs(&self, cell: NodeId) -> Vec<NodeId> {
        self.tree.children_named(cell, "w:p").collect()
    }

    pub fn cell(&self, table: usize, row: usize, column: usize) -> Option<NodeId> {
        let table = *self.tables().get(table)?;
        let row = *self.rows(table).get(row)?;
        self.cells(row).get(column).copied()
    }

    pub fn paragraph_text(&self, paragraph: NodeId) -> String {
        text::paragraph_text(&self.tree, paragraph)
    }

    /// Cell text with paragraphs joined by newlines.
    pub fn cell_text(&self, cell: NodeId) -> String {
        self.cell_paragraphs(cell)
            .into_iter()
            .map(|p| self.paragraph_text(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn row_texts(&self, row: NodeId) -> Vec<String> {
        self.cells(row).into_iter().map(|c| self.cell_text(c)).collect()
    }

    pub fn shape(&self) -> TemplateShape {
        TemplateShape {
            paragraphs: self.paragraphs().len(),
            tables: self.tables().into_iter().map(|t| self.rows(t).len()).collect(),
        }
    }

    pub fn to_xml(&self) -> String {
        self.tree.to_xml()
    }
}
