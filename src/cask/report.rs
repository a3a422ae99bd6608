//! Per-item failures collected while saving.

use std::fmt;

/// One value or sample that could not be written.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveFailure {
    /// Object or property path.
    pub path: String,
    /// Value index, when the failure concerns a single value.
    pub index: Option<usize>,
    pub message: String,
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]: {}", self.path, i, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Outcome of [`Archive::write_to_file`](super::Archive::write_to_file).
///
/// Saving continues past failures on individual values and samples; each
/// one is logged and recorded here.
#[derive(Clone, Debug, Default)]
pub struct SaveReport {
    failures: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, path: impl Into<String>, index: Option<usize>, message: impl fmt::Display) {
        let failure = SaveFailure {
            path: path.into(),
            index,
            message: message.to_string(),
        };
        tracing::warn!(path = %failure.path, index = ?failure.index, "failed to write: {}", failure.message);
        self.failures.push(failure);
    }

    /// True when everything was written.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[SaveFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}
