//! Alembic archive layout read on top of the Ogawa container.
//!
//! Handles are cheap to clone: they share the open streams and the
//! indexed metadata table, and hold parsed headers behind `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use super::format::{MIN_ALEMBIC_VERSION, SAMPLE_KEY_SIZE};
use super::read_util::{
    read_indexed_metadata, read_object_headers, read_property_headers, read_time_samplings,
};
use super::{IArchive, IGroup};
use crate::core::{MetaData, ObjectHeader, PropertyHeader, TimeSampling};
use crate::util::{DataType, Error, Result};

/// Bytes of one stored sample plus its dimensions when they were stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSample {
    pub bytes: Vec<u8>,
    pub dims: Option<Vec<u64>>,
}

/// Read side of an archive.
pub struct OgawaArchiveReader {
    path: PathBuf,
    file_version: i32,
    library_version: i32,
    time_samplings: Vec<TimeSampling>,
    max_samples: Vec<u32>,
    archive_metadata: MetaData,
    top: OgawaObjectReader,
}

impl OgawaArchiveReader {
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let archive = IArchive::open(path, use_mmap)?;
        let root = archive.root();

        if root.num_children() < 6 {
            return Err(Error::invalid("archive root has fewer than 6 children"));
        }
        let layout_ok = root.is_child_data(0)?
            && root.is_child_data(1)?
            && root.is_child_group(2)?
            && root.is_child_data(3)?
            && root.is_child_data(4)?
            && root.is_child_data(5)?;
        if !layout_ok {
            return Err(Error::invalid("unexpected archive root layout"));
        }

        let file_version = root.data(0)?.read_i32()?;
        let library_version = root.data(1)?.read_i32()?;
        if library_version < MIN_ALEMBIC_VERSION {
            return Err(Error::UnsupportedVersion(library_version));
        }

        let archive_metadata = MetaData::parse(&root.data(3)?.read_string()?);
        let (time_samplings, max_samples) = read_time_samplings(&root.data(4)?)?;
        let indexed = Arc::new(read_indexed_metadata(&root.data(5)?)?);

        let top = OgawaObjectReader {
            header: Arc::new(ObjectHeader::new("ABC", "/", archive_metadata.clone())),
            group: root.group(2)?,
            indexed,
        };

        tracing::debug!(
            path = %path.display(),
            library_version,
            samplings = time_samplings.len(),
            "opened archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_version,
            library_version,
            time_samplings,
            max_samples,
            archive_metadata,
            top,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_version(&self) -> i32 {
        self.file_version
    }

    /// Writing library version, e.g. `10810` for 1.8.10.
    pub fn library_version(&self) -> i32 {
        self.library_version
    }

    pub fn time_samplings(&self) -> &[TimeSampling] {
        &self.time_samplings
    }

    /// Largest sample count recorded for time sampling `index`.
    pub fn max_samples(&self, index: usize) -> Option<u32> {
        self.max_samples.get(index).copied()
    }

    pub fn archive_metadata(&self) -> &MetaData {
        &self.archive_metadata
    }

    /// The root object, named `ABC`.
    pub fn top(&self) -> &OgawaObjectReader {
        &self.top
    }
}

/// Read handle for one object.
#[derive(Clone)]
pub struct OgawaObjectReader {
    header: Arc<ObjectHeader>,
    group: IGroup,
    indexed: Arc<Vec<MetaData>>,
}

impl OgawaObjectReader {
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn full_name(&self) -> &str {
        &self.header.full_name
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.header.meta_data
    }

    /// Child objects in stored order.
    pub fn children(&self) -> Result<Vec<OgawaObjectReader>> {
        let n = self.group.num_children();
        if n < 2 || !self.group.is_child_data(n - 1)? {
            return Ok(Vec::new());
        }
        let headers =
            read_object_headers(&self.group.data(n - 1)?, &self.header.full_name, &self.indexed)?;
        if headers.len() as u64 != n - 2 {
            return Err(Error::invalid(format!(
                "{}: {} child headers for {} child groups",
                self.header.full_name,
                headers.len(),
                n - 2
            )));
        }
        headers
            .into_iter()
            .enumerate()
            .map(|(i, header)| {
                Ok(OgawaObjectReader {
                    header: Arc::new(header),
                    group: self.group.group(i as u64 + 1)?,
                    indexed: self.indexed.clone(),
                })
            })
            .collect()
    }

    /// Top-level properties in stored order.
    pub fn properties(&self) -> Result<Vec<OgawaPropertyReader>> {
        if self.group.is_empty() || !self.group.is_child_group(0)? {
            return Ok(Vec::new());
        }
        read_compound(&self.group.group(0)?, &self.indexed)
    }
}

fn read_compound(group: &IGroup, indexed: &Arc<Vec<MetaData>>) -> Result<Vec<OgawaPropertyReader>> {
    let n = group.num_children();
    if n == 0 || !group.is_child_data(n - 1)? {
        return Ok(Vec::new());
    }
    let headers = read_property_headers(&group.data(n - 1)?, indexed)?;
    if headers.len() as u64 != n - 1 {
        return Err(Error::invalid(format!(
            "{} property headers for {} property groups",
            headers.len(),
            n - 1
        )));
    }
    headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| {
            Ok(OgawaPropertyReader {
                header: Arc::new(header),
                group: group.group(i as u64)?,
                indexed: indexed.clone(),
            })
        })
        .collect()
}

/// Read handle for one property.
#[derive(Clone)]
pub struct OgawaPropertyReader {
    header: Arc<PropertyHeader>,
    group: IGroup,
    indexed: Arc<Vec<MetaData>>,
}

impl OgawaPropertyReader {
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.header.meta_data
    }

    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    pub fn is_compound(&self) -> bool {
        self.header.is_compound()
    }

    pub fn is_scalar(&self) -> bool {
        self.header.is_scalar()
    }

    pub fn is_array(&self) -> bool {
        self.header.is_array()
    }

    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    pub fn is_constant(&self) -> bool {
        self.header.is_constant()
    }

    pub fn time_sampling_index(&self) -> u32 {
        self.header.time_sampling_index
    }

    /// Sub-properties of a compound; empty for simple properties.
    pub fn sub_properties(&self) -> Result<Vec<OgawaPropertyReader>> {
        if !self.is_compound() {
            return Ok(Vec::new());
        }
        read_compound(&self.group, &self.indexed)
    }

    /// Raw bytes of logical sample `index`.
    pub fn sample(&self, index: usize) -> Result<RawSample> {
        if self.is_compound() {
            return Err(Error::CompoundValue(self.header.name.clone()));
        }
        if index >= self.num_samples() {
            return Err(Error::SampleOutOfBounds {
                index,
                count: self.num_samples(),
            });
        }
        let stored = self.header.stored_index(index as u32) as u64;

        if self.is_scalar() {
            return Ok(RawSample {
                bytes: self.keyed_payload(stored)?,
                dims: None,
            });
        }

        let bytes = self.keyed_payload(stored * 2)?;
        let dims_data = self.group.data(stored * 2 + 1)?;
        let dims = if dims_data.is_empty() {
            None
        } else {
            Some(dims_data.read_all()?.chunks_exact(8).map(LittleEndian::read_u64).collect())
        };
        Ok(RawSample { bytes, dims })
    }

    fn keyed_payload(&self, child: u64) -> Result<Vec<u8>> {
        let data = self.group.data(child)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let mut bytes = data.read_all()?;
        if bytes.len() < SAMPLE_KEY_SIZE {
            return Err(Error::invalid(format!(
                "{}: sample block shorter than its key",
                self.header.name
            )));
        }
        bytes.drain(..SAMPLE_KEY_SIZE);
        Ok(bytes)
    }
}
