//! Error types for the cask library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive, object and property operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Archive path given to `Archive::open` does not exist
    #[error("Nonexistent file: {0}")]
    NonexistentFile(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid Alembic file: expected Ogawa magic bytes")]
    InvalidMagic,

    /// Unsupported file format or library version
    #[error("Unsupported Alembic version: {0}")]
    UnsupportedVersion(i32),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Value access on a compound property
    #[error("Compound properties cannot have values: {0}")]
    CompoundValue(String),

    /// Sub-property added to a property that already holds values
    #[error("Properties with values cannot have sub-properties: {0}")]
    ValueSubProperty(String),

    /// POD/extent could not be inferred from a value
    #[error("Unknown datatype for {name}: {value}")]
    UnknownDataType { name: String, value: String },

    /// Value does not fit the property's data type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// The root object has a fixed name
    #[error("Can not set name on Top object")]
    RootRename,

    /// Sample kind not accepted by the object variant
    #[error("Can not set {sample} sample on {variant} object")]
    SampleMismatch { sample: String, variant: String },

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Node or archive used after close
    #[error("{0} is closed")]
    Closed(String),

    /// Archive is frozen (finalized)
    #[error("Archive is frozen and cannot be modified")]
    Frozen,

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// Settings could not be parsed or written
    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// Invalid regular expression in a find query
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a closed-node error.
    pub fn closed(what: impl Into<String>) -> Self {
        Self::Closed(what.into())
    }
}

/// Result type alias for cask operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::SampleOutOfBounds { index: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::NonexistentFile(PathBuf::from("/no/such.abc"));
        assert_eq!(e.to_string(), "Nonexistent file: /no/such.abc");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_value_errors() {
        let e = Error::ValueSubProperty("width".into());
        assert!(e.to_string().contains("cannot have sub-properties"));
        let e = Error::CompoundValue(".geom".into());
        assert!(e.to_string().contains(".geom"));
    }
}
