//! Headers for objects and properties as stored in an archive.

use super::MetaData;
use crate::util::DataType;

/// Header of one child object.
#[derive(Clone, Debug, Default)]
pub struct ObjectHeader {
    /// Name of this object (not full path).
    pub name: String,
    /// Full path from root (e.g., "/parent/child").
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, meta_data: MetaData) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data,
        }
    }
}

/// Storage class of a property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Container for other properties.
    Compound,
    /// One element per sample.
    #[default]
    Scalar,
    /// A variable-length run of elements per sample.
    Array,
}

impl PropertyType {
    /// Two-bit code in the header info word.
    pub const fn code(self, scalar_like: bool) -> u32 {
        match self {
            Self::Compound => 0,
            Self::Scalar => 1,
            Self::Array if scalar_like => 3,
            Self::Array => 2,
        }
    }
}

/// Header of one property, including the sample bookkeeping needed to map
/// a logical sample index onto the stored (deduplicated) samples.
#[derive(Clone, Debug, Default)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    pub data_type: DataType,
    /// Archive-wide time sampling index (0 = identity).
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
    /// Logical sample count.
    pub num_samples: u32,
    /// First logical index whose sample differs from sample 0.
    pub first_changed_index: u32,
    /// Last logical index that was stored.
    pub last_changed_index: u32,
    pub is_homogenous: bool,
    /// Array property whose samples all hold exactly one element.
    pub is_scalar_like: bool,
}

impl PropertyHeader {
    pub fn compound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Compound,
            data_type: DataType::UNKNOWN,
            ..Default::default()
        }
    }

    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar,
            data_type,
            ..Default::default()
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Array,
            data_type,
            ..Default::default()
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }

    /// Every logical sample shares sample 0.
    pub fn is_constant(&self) -> bool {
        self.first_changed_index == 0 && self.last_changed_index == 0
    }

    /// Number of samples physically stored.
    pub fn num_stored_samples(&self) -> u32 {
        if self.num_samples == 0 {
            0
        } else if self.is_constant() {
            1
        } else {
            self.last_changed_index - self.first_changed_index + 2
        }
    }

    /// Map a logical sample index to the stored sample slot.
    pub fn stored_index(&self, index: u32) -> u32 {
        if self.is_constant() || index < self.first_changed_index {
            0
        } else if index > self.last_changed_index {
            self.last_changed_index - self.first_changed_index + 1
        } else {
            index - self.first_changed_index + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_header_kinds() {
        let header = PropertyHeader::scalar("P", DataType::VEC3F).with_time_sampling(1);
        assert!(header.is_scalar());
        assert_eq!(header.time_sampling_index, 1);
        assert!(PropertyHeader::compound(".geom").is_compound());
        assert!(PropertyHeader::array("P", DataType::VEC3F).is_array());
    }

    #[test]
    fn test_stored_index_mapping() {
        // samples: a a b c c  -> stored a, b, c
        let header = PropertyHeader {
            num_samples: 5,
            first_changed_index: 2,
            last_changed_index: 3,
            ..PropertyHeader::scalar("x", DataType::FLOAT32)
        };
        let mapped: Vec<u32> = (0..5).map(|i| header.stored_index(i)).collect();
        assert_eq!(mapped, vec![0, 0, 1, 2, 2]);
        assert_eq!(header.num_stored_samples(), 3);
        assert!(!header.is_constant());
    }

    #[test]
    fn test_constant_header() {
        let header = PropertyHeader {
            num_samples: 4,
            ..PropertyHeader::scalar("x", DataType::FLOAT32)
        };
        assert!(header.is_constant());
        assert_eq!(header.stored_index(3), 0);
        assert_eq!(header.num_stored_samples(), 1);
    }
}
