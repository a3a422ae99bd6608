//! Editable scene layer over Alembic archives.
//!
//! An [`Archive`] owns every object and property as arena nodes. Read-derived
//! nodes wrap their read handles and decode lazily; new nodes hold values and
//! samples in memory until [`Archive::write_to_file`].
//!
//! - [`coerce`] - Host values and their POD/extent mapping
//! - [`container`] - Named child storage with path splitting
//! - [`variant`] - Object variants and schema writers
//! - [`samples`] - Schema sample types
//! - [`object`] / [`property`] - Views over arena nodes
//! - [`query`] - Find and copy
//! - [`report`] - Partial save failures

pub mod archive;
pub mod coerce;
pub mod container;
pub mod object;
pub mod property;
pub mod query;
pub mod report;
pub mod samples;
pub mod variant;

pub use archive::{Archive, ObjectId, PropertyId, PropertyParent};
pub use coerce::Value;
pub use container::DeepContainer;
pub use object::Object;
pub use property::Property;
pub use query::FindIter;
pub use report::{SaveFailure, SaveReport};
pub use samples::{
    CameraSample, CurvesSample, FaceSetSample, MeshSample, NuPatchSample, Sample, XformOp,
    XformOpType, XformSample,
};
pub use variant::Variant;

/// True if `path` opens as an archive.
pub fn is_valid(path: impl AsRef<std::path::Path>) -> bool {
    Archive::is_valid(path)
}
