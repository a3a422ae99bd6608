//! Utility types shared by the backend and the scene layer.
//!
//! - [`PlainOldDataType`] - Enum of basic data types
//! - [`DataType`] - POD + extent
//! - [`Error`] / [`Result`] - Error handling
//! - [`init_tracing`] - Optional log output

mod pod;
mod data_type;
mod error;
mod logging;

pub use pod::*;
pub use data_type::*;
pub use error::*;
pub use logging::*;

/// Time value in seconds.
pub type Chrono = f64;
