//! Core types shared by the storage backend and the scene layer.
//!
//! - [`TimeSampling`] - Sample index to time mapping
//! - [`MetaData`] - Key-value metadata storage
//! - [`ObjectHeader`] / [`PropertyHeader`] - Headers for objects and properties
//! - [`SampleSelector`] - Index, time or frame selection of a sample

mod time_sampling;
mod metadata;
mod header;
mod sample;

pub use time_sampling::{TimeSampling, TimeSamplingType, ACYCLIC_TIME_PER_CYCLE};
pub use metadata::MetaData;
pub use header::{ObjectHeader, PropertyHeader, PropertyType};
pub use sample::SampleSelector;
