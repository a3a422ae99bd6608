//! Alembic archives in the Ogawa container format.
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! | Version          |  2 bytes (u16 BE)
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | groups and data  |
//! +------------------+
//! ```
//!
//! [`OgawaArchiveReader`] reads the Alembic layout lazily; [`OArchive`]
//! writes a complete object tree in one pass.

mod format;
mod reader;
mod read_util;
mod abc_impl;
mod key;
pub mod writer;

pub use format::*;
pub use reader::{IArchive, IData, IGroup, IStreams};
pub use abc_impl::{OgawaArchiveReader, OgawaObjectReader, OgawaPropertyReader, RawSample};
pub use key::{hash128, SampleKey};
pub use writer::{ArraySample, OArchive, OObject, OProperty, OPropertyData};
