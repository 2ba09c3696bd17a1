//! Validated schema with read-only lookups for runtime use.

use crate::schema::{Field, Rule, SchemaConfig, Section};
use std::collections::HashMap;

/// A validated, immutable form definition. Build with [`crate::schema::build`].
#[derive(Clone, Debug)]
pub struct Schema {
    config: SchemaConfig,
    /// Section positions sorted by `order`, ties in declaration order.
    section_order: Vec<usize>,
    field_by_id: HashMap<String, usize>,
    /// Field positions per section, sorted by `order` then declaration.
    fields_by_section: HashMap<String, Vec<usize>>,
}

impl Schema {
    pub(crate) fn from_validated(config: SchemaConfig) -> Self {
        let mut section_order: Vec<usize> = (0..config.sections.len()).collect();
        section_order.sort_by_key(|&i| config.sections[i].order);

        let field_by_id = config
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();

        let mut fields_by_section: HashMap<String, Vec<usize>> =
            config
                .fields
                .iter()
                .enumerate()
                .fold(HashMap::new(), |mut m, (i, f)| {
                    m.entry(f.section_id.clone()).or_default().push(i);
                    m
                });
        for positions in fields_by_section.values_mut() {
            positions.sort_by_key(|&i| config.fields[i].order.unwrap_or(i32::MAX));
        }

        Schema {
            config,
            section_order,
            field_by_id,
            fields_by_section,
        }
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Sections in display order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.section_order.iter().map(|&i| &self.config.sections[i])
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.config.fields
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.field_by_id.get(id).map(|&i| &self.config.fields[i])
    }

    /// Fields of one section in display order; empty for an unknown section.
    pub fn fields_in_section<'a>(&'a self, section_id: &str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields_by_section
            .get(section_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.config.fields[i])
    }

    /// Rules in declared order.
    pub fn rules(&self) -> &[Rule] {
        &self.config.rules
    }
}
