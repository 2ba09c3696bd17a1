//! DOCX package access: the zip container around `word/document.xml`.

use crate::docx::body::Document;
use crate::error::DocumentError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// An immutable template package. Every load parses a fresh tree, so callers never
/// share mutable document structure.
#[derive(Clone, Debug)]
pub struct DocxPackage {
    bytes: Vec<u8>,
}

impl DocxPackage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let has_document = ZipArchive::new(Cursor::new(bytes.as_slice()))?
            .index_for_name(DOCUMENT_PART)
            .is_some();
        if !has_document {
            return Err(DocumentError::MissingPart(DOCUMENT_PART.into()));
        }
        Ok(DocxPackage { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn document_xml(&self) -> Result<Vec<u8>, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut part = archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| DocumentError::MissingPart(DOCUMENT_PART.into()))?;
        let mut xml = Vec::new();
        part.read_to_end(&mut xml)?;
        Ok(xml)
    }

    pub fn load_document(&self) -> Result<Document, DocumentError> {
        Document::parse(&self.document_xml()?)
    }

    /// Build a new package with `document_xml` as the main part. Other parts are
    /// copied without recompression and entry order is kept; the rewritten part gets
    /// a fixed timestamp so equal inputs give equal bytes.
    pub fn repackage(&self, document_xml: &str) -> Result<Vec<u8>, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                writer.start_file(DOCUMENT_PART, options)?;
                writer.write_all(document_xml.as_bytes())?;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }
}
