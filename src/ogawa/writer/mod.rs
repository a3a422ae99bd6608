//! Alembic writer over the Ogawa container.
//!
//! Build an [`OObject`] tree in memory, then hand it to
//! [`OArchive::write_archive`].

mod archive;
mod object;
mod property;
mod stream;

pub use archive::OArchive;
pub use object::OObject;
pub use property::{ArraySample, OProperty, OPropertyData};

#[cfg(test)]
mod tests;
