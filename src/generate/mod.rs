//! Document generation from a published template and a data snapshot.

pub mod fill;
pub mod format;
pub mod generator;

pub use generator::{generate_document, PublishedTemplate};
