#![allow(dead_code)]

use docform_sdk::docx::DOCUMENT_PART;
use docform_sdk::{Document, DocxPackage, Schema, Snapshot};
use serde_json::Value;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#;

/// Wrap body markup in a minimal but complete DOCX package.
pub fn docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );
    let mut w = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, part) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        (DOCUMENT_PART, document.as_str()),
        ("word/styles.xml", STYLES),
    ] {
        w.start_file(name, SimpleFileOptions::default()).unwrap();
        w.write_all(part.as_bytes()).unwrap();
    }
    w.finish().unwrap().into_inner()
}

pub fn p(text: &str) -> String {
    if text.is_empty() {
        return "<w:p/>".into();
    }
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text)
}

pub fn row(cells: &[&str]) -> String {
    let cells: String = cells.iter().map(|c| format!("<w:tc>{}</w:tc>", p(c))).collect();
    format!("<w:tr>{}</w:tr>", cells)
}

pub fn table(rows: &[&[&str]]) -> String {
    let rows: String = rows.iter().map(|r| row(r)).collect();
    format!("<w:tbl>{}</w:tbl>", rows)
}

pub fn document_xml(bytes: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(DOCUMENT_PART).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

pub fn part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut text = String::new();
    part.read_to_string(&mut text).unwrap();
    text
}

pub fn load(bytes: &[u8]) -> Document {
    DocxPackage::from_bytes(bytes.to_vec())
        .unwrap()
        .load_document()
        .unwrap()
}

/// Text of every row of table `t`, cell by cell.
pub fn table_texts(doc: &Document, t: usize) -> Vec<Vec<String>> {
    let table = doc.tables()[t];
    doc.rows(table).into_iter().map(|r| doc.row_texts(r)).collect()
}

pub fn schema(v: Value) -> Schema {
    docform_sdk::schema::from_json_value(v).unwrap()
}

pub fn snapshot(v: Value) -> Snapshot {
    Snapshot::try_from(v).unwrap()
}
