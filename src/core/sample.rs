//! Sample selection for property values.

use crate::util::Chrono;

/// Chooses one sample of a property: directly by index, or by the sample
/// nearest to a time in seconds or a frame number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    Index(usize),
    /// Nearest sample to a time in seconds.
    Time(Chrono),
    /// Nearest sample to a frame, converted with the archive fps.
    Frame(f64),
}

impl SampleSelector {
    /// The first (or static) sample.
    pub const fn first() -> Self {
        Self::Index(0)
    }

    /// Time in seconds for time and frame selectors.
    pub fn time(&self, fps: f64) -> Option<Chrono> {
        match *self {
            Self::Index(_) => None,
            Self::Time(t) => Some(t),
            Self::Frame(f) => Some(f / fps),
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::first()
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Chrono> for SampleSelector {
    fn from(time: Chrono) -> Self {
        Self::Time(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_time() {
        assert_eq!(SampleSelector::from(3usize).time(24.0), None);
        assert_eq!(SampleSelector::from(0.5).time(24.0), Some(0.5));
        assert_eq!(SampleSelector::Frame(12.0).time(24.0), Some(0.5));
        assert_eq!(SampleSelector::default(), SampleSelector::Index(0));
    }
}
