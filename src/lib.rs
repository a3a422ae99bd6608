//! # Cask
//!
//! Read, edit and write Alembic (.abc) archives as an in-memory tree.
//!
//! Objects and properties of an opened archive are wrapped lazily. They can
//! be renamed, reparented, copied or replaced, new ones can be added, and the
//! whole tree is written back out in one pass.
//!
//! ## Modules
//!
//! - [`util`] - POD and data types, errors, tracing setup
//! - [`core`] - Metadata, time sampling, sample selection
//! - [`ogawa`] - Ogawa container reading and writing
//! - [`cask`] - Archive, objects, properties, queries
//! - [`settings`] - Configuration
//!
//! ## Example
//!
//! ```ignore
//! use cask::prelude::*;
//!
//! let mut archive = Archive::open("scene.abc")?;
//! for id in archive.find(".*Shape", Some(&[Variant::PolyMesh]))? {
//!     println!("{}", archive.obj(id).path());
//! }
//!
//! let xform = archive.new_object("locator", Variant::Xform);
//! archive.obj(xform).set_scale(2.0, 2.0, 2.0)?;
//! let top = archive.top();
//! archive.obj(top).add_child(xform)?;
//! archive.write_to_file("edited.abc", "")?;
//! ```

pub mod util;
pub mod core;
pub mod ogawa;
pub mod cask;
pub mod settings;

pub use util::{DataType, PlainOldDataType, Error, Result, init_tracing};
pub use cask::{Archive, Object, ObjectId, Property, PropertyId, Value, Variant, is_valid};
pub use settings::Settings;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DataType, PlainOldDataType, Error, Result};
    pub use crate::core::{MetaData, SampleSelector, TimeSampling};
    pub use crate::cask::{
        Archive, CameraSample, DeepContainer, Object, ObjectId, Property, PropertyId,
        PropertyParent, Sample, SaveReport, Value, Variant, XformOp, XformSample,
    };
    pub use crate::settings::Settings;
}
