//! In-memory object tree handed to [`OArchive::write_archive`](super::OArchive::write_archive).

use crate::core::MetaData;

use super::property::OProperty;

#[derive(Clone, Debug, Default)]
pub struct OObject {
    pub name: String,
    pub meta_data: MetaData,
    pub children: Vec<OObject>,
    pub properties: Vec<OProperty>,
}

impl OObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Top-level property by name.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut OProperty> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Add `prop`, merging into a same-named compound or replacing a
    /// same-named simple property.
    pub fn add_property(&mut self, prop: OProperty) -> &mut OProperty {
        let idx = match self.properties.iter().position(|p| p.name == prop.name) {
            Some(idx) => {
                self.properties[idx].merge(prop);
                idx
            }
            None => {
                self.properties.push(prop);
                self.properties.len() - 1
            }
        };
        &mut self.properties[idx]
    }
}
