//! Element kinds a property can store.

use std::fmt;
use std::str::FromStr;

/// Component type of a property sample.
///
/// Discriminants are the codes stored in bits 4-7 of a property header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    /// Stored as one byte, non-zero is true.
    Boolean = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    /// NUL-terminated UTF-8.
    String = 12,
    /// Wide string; decoded as UTF-8.
    Wstring = 13,
    #[default]
    Unknown = 127,
}

use PlainOldDataType as Pod;

/// (kind, name, component size) for every storable kind, in code order.
const TABLE: [(Pod, &str, usize); 14] = [
    (Pod::Boolean, "bool_t", 1),
    (Pod::Uint8, "uint8_t", 1),
    (Pod::Int8, "int8_t", 1),
    (Pod::Uint16, "uint16_t", 2),
    (Pod::Int16, "int16_t", 2),
    (Pod::Uint32, "uint32_t", 4),
    (Pod::Int32, "int32_t", 4),
    (Pod::Uint64, "uint64_t", 8),
    (Pod::Int64, "int64_t", 8),
    (Pod::Float16, "float16_t", 2),
    (Pod::Float32, "float32_t", 4),
    (Pod::Float64, "float64_t", 8),
    (Pod::String, "string", 0),
    (Pod::Wstring, "wstring", 0),
];

impl PlainOldDataType {
    /// Bytes per component; 0 for strings and `Unknown`.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Pod::Unknown => 0,
            known => TABLE[known as usize].2,
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Pod::Unknown => "UNKNOWN",
            known => TABLE[known as usize].1,
        }
    }

    /// Kind for an on-disk code; out-of-range codes are `Unknown`.
    pub const fn from_u8(code: u8) -> Self {
        if (code as usize) < TABLE.len() {
            TABLE[code as usize].0
        } else {
            Pod::Unknown
        }
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Pod::String | Pod::Wstring)
    }
}

impl FromStr for PlainOldDataType {
    type Err = std::convert::Infallible;

    /// Unrecognized names parse as `Unknown`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map_or(Pod::Unknown, |(pod, _, _)| *pod))
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
