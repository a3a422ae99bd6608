//! In-memory property tree for the writer.

use crate::core::MetaData;
use crate::util::DataType;

/// One array sample: element bytes and its dimensions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArraySample {
    pub data: Vec<u8>,
    pub dims: Vec<u64>,
}

impl ArraySample {
    pub fn new(data: Vec<u8>, dims: Vec<u64>) -> Self {
        Self { data, dims }
    }

    /// Element count (product of dimensions).
    pub fn num_elements(&self) -> u64 {
        self.dims.iter().product()
    }
}

#[derive(Clone, Debug)]
pub enum OPropertyData {
    Scalar(Vec<Vec<u8>>),
    Array(Vec<ArraySample>),
    Compound(Vec<OProperty>),
}

#[derive(Clone, Debug)]
pub struct OProperty {
    pub name: String,
    pub data_type: DataType,
    pub meta_data: MetaData,
    pub time_sampling_index: u32,
    pub data: OPropertyData,
}

impl OProperty {
    fn with_data(name: impl Into<String>, data_type: DataType, data: OPropertyData) -> Self {
        Self {
            name: name.into(),
            data_type,
            meta_data: MetaData::new(),
            time_sampling_index: 0,
            data,
        }
    }

    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_data(name, data_type, OPropertyData::Scalar(Vec::new()))
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_data(name, data_type, OPropertyData::Array(Vec::new()))
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self::with_data(name, DataType::UNKNOWN, OPropertyData::Compound(Vec::new()))
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.data, OPropertyData::Compound(_))
    }

    /// Append a scalar sample; ignored on other kinds.
    pub fn push_scalar(&mut self, bytes: Vec<u8>) {
        if let OPropertyData::Scalar(samples) = &mut self.data {
            samples.push(bytes);
        }
    }

    /// Append an array sample; ignored on other kinds.
    pub fn push_array(&mut self, sample: ArraySample) {
        if let OPropertyData::Array(samples) = &mut self.data {
            samples.push(sample);
        }
    }

    pub fn num_samples(&self) -> usize {
        match &self.data {
            OPropertyData::Scalar(s) => s.len(),
            OPropertyData::Array(s) => s.len(),
            OPropertyData::Compound(_) => 0,
        }
    }

    pub fn children(&self) -> &[OProperty] {
        match &self.data {
            OPropertyData::Compound(children) => children,
            _ => &[],
        }
    }

    /// Child by name, for compounds.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut OProperty> {
        match &mut self.data {
            OPropertyData::Compound(children) => children.iter_mut().find(|p| p.name == name),
            _ => None,
        }
    }

    /// Add a child to a compound, merging by name. Returns `None` on simple properties.
    pub fn add_child(&mut self, prop: OProperty) -> Option<&mut OProperty> {
        let OPropertyData::Compound(children) = &mut self.data else {
            return None;
        };
        let idx = match children.iter().position(|p| p.name == prop.name) {
            Some(idx) => {
                children[idx].merge(prop);
                idx
            }
            None => {
                children.push(prop);
                children.len() - 1
            }
        };
        children.get_mut(idx)
    }

    /// Consume a compound into its children; simple properties have none.
    pub fn into_children(self) -> Vec<OProperty> {
        match self.data {
            OPropertyData::Compound(children) => children,
            _ => Vec::new(),
        }
    }

    /// Fold `other` into `self`: compounds merge children and metadata,
    /// anything else is replaced.
    pub fn merge(&mut self, other: OProperty) {
        match (self.is_compound(), other.data) {
            (true, OPropertyData::Compound(children)) => {
                self.meta_data.extend_from(&other.meta_data);
                for child in children {
                    self.add_child(child);
                }
            }
            (_, data) => {
                *self = OProperty {
                    name: other.name,
                    data_type: other.data_type,
                    meta_data: other.meta_data,
                    time_sampling_index: other.time_sampling_index,
                    data,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_merge() {
        let mut geom = OProperty::compound(".geom");
        geom.add_child(OProperty::scalar("a", DataType::FLOAT32));
        let mut other = OProperty::compound(".geom");
        other.add_child(OProperty::scalar("b", DataType::FLOAT32));
        other.add_child(OProperty::array("a", DataType::VEC3F));
        geom.merge(other);

        let names: Vec<&str> = geom.children().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(geom.children()[0].data, OPropertyData::Array(_)));
    }

    #[test]
    fn test_push_ignored_on_wrong_kind() {
        let mut p = OProperty::compound("c");
        p.push_scalar(vec![1]);
        assert_eq!(p.num_samples(), 0);
        assert!(OProperty::scalar("s", DataType::BOOL).children().is_empty());
    }

    #[test]
    fn test_into_children() {
        let mut xform = OProperty::compound(".xform");
        xform.add_child(OProperty::compound(".userProperties"));
        xform.add_child(OProperty::scalar(".inherits", DataType::BOOL));
        let names: Vec<String> = xform.into_children().into_iter().map(|p| p.name).collect();
        assert_eq!(names, [".userProperties", ".inherits"]);
        assert!(OProperty::array("P", DataType::VEC3F).into_children().is_empty());
    }
}
