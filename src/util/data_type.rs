//! Element type of a property: component kind plus component count.

use std::fmt;

use super::PlainOldDataType as Pod;

/// How one element of a sample is laid out, e.g. `float32_t[3]` for a
/// 3-vector of floats.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    pub pod: Pod,
    /// Components per element.
    pub extent: u8,
}

impl DataType {
    pub const UNKNOWN: Self = Self::new(Pod::Unknown, 0);

    pub const BOOL: Self = Self::scalar(Pod::Boolean);
    pub const UINT8: Self = Self::scalar(Pod::Uint8);
    pub const INT32: Self = Self::scalar(Pod::Int32);
    pub const FLOAT32: Self = Self::scalar(Pod::Float32);
    pub const FLOAT64: Self = Self::scalar(Pod::Float64);
    pub const STRING: Self = Self::scalar(Pod::String);
    pub const VEC2F: Self = Self::new(Pod::Float32, 2);
    pub const VEC3F: Self = Self::new(Pod::Float32, 3);
    pub const VEC3D: Self = Self::new(Pod::Float64, 3);
    pub const BOX3D: Self = Self::new(Pod::Float64, 6);
    pub const MAT44D: Self = Self::new(Pod::Float64, 16);

    #[inline]
    pub const fn new(pod: Pod, extent: u8) -> Self {
        Self { pod, extent }
    }

    #[inline]
    pub const fn scalar(pod: Pod) -> Self {
        Self::new(pod, 1)
    }

    /// Bytes per element; 0 for strings.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.pod.num_bytes() * self.extent as usize
    }

    /// Known kind with at least one component.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.pod, Pod::Unknown) && self.extent > 0
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extent {
            1 => f.write_str(self.pod.name()),
            n => write!(f, "{}[{n}]", self.pod.name()),
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::BOOL.num_bytes(), 1);
        assert_eq!(DataType::VEC3F.num_bytes(), 12);
        assert_eq!(DataType::BOX3D.num_bytes(), 48);
        assert_eq!(DataType::STRING.num_bytes(), 0);
    }

    #[test]
    fn test_display_and_validity() {
        assert_eq!(DataType::FLOAT32.to_string(), "float32_t");
        assert_eq!(DataType::MAT44D.to_string(), "float64_t[16]");
        assert!(!DataType::UNKNOWN.is_valid());
        assert!(!DataType::new(Pod::Float32, 0).is_valid());
    }
}
