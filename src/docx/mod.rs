//! DOCX template substrate: zip package, owned XML tree, structural view and
//! formatting-preserving text edits.

pub mod body;
pub mod package;
pub mod text;
pub mod xml;

pub use body::{Block, Document, TemplateShape};
pub use package::{DocxPackage, DOCUMENT_PART};
pub use xml::{NodeId, XmlTree};
