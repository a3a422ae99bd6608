//! Archive writer: lays out objects, properties and samples in Ogawa form.
//!
//! Groups are written bottom-up: every child is on disk before the group
//! that points at it. Sample payloads are prefixed by their content key and
//! written once per distinct content.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::object::OObject;
use super::property::{ArraySample, OProperty, OPropertyData};
use super::stream::OStream;
use crate::core::{MetaData, TimeSampling, ACYCLIC_TIME_PER_CYCLE};
use crate::ogawa::format::*;
use crate::ogawa::key::SampleKey;
use crate::util::{Error, Result};

/// Running digest for the object header trailer.
#[derive(Default)]
struct Digest(Vec<u8>);

impl Digest {
    fn update(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn finish(&self) -> [u8; 16] {
        SampleKey::of(&self.0).0
    }
}

/// Sample bookkeeping gathered while writing one simple property.
#[derive(Default)]
struct SampleState {
    children: Vec<u64>,
    num_samples: u32,
    first_changed: u32,
    last_changed: u32,
    is_homogenous: bool,
    is_scalar_like: bool,
}

impl SampleState {
    /// Apply the changed-index rule to sample `index`. `stored_width` is the
    /// number of group children one stored sample occupies. Returns true when
    /// the sample must be stored.
    fn observe(&mut self, index: u32, changed: bool, stored_width: usize) -> bool {
        if index == 0 {
            return true;
        }
        if !changed {
            return false;
        }
        if self.first_changed == 0 {
            self.first_changed = index;
        } else {
            // Re-point the repeats between the last change and this one.
            let prev = self.children[self.children.len() - stored_width..].to_vec();
            for _ in (self.last_changed + 1)..index {
                self.children.extend_from_slice(&prev);
            }
        }
        self.last_changed = index;
        true
    }

    fn max_samples(&self) -> u32 {
        if self.last_changed == 0 && self.num_samples > 0 {
            1
        } else {
            self.num_samples
        }
    }
}

/// Alembic archive writer.
pub struct OArchive {
    path: PathBuf,
    stream: OStream,
    frozen: bool,
    time_samplings: Vec<TimeSampling>,
    max_samples: Vec<u32>,
    indexed_metadata: Vec<String>,
    metadata_map: HashMap<String, u8>,
    archive_metadata: MetaData,
    library_version: i32,
    written: HashMap<(SampleKey, usize), u64>,
}

impl OArchive {
    /// Create `path` and write a provisional (not frozen) header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut stream = OStream::create(&path)?;
        stream.write_bytes(OGAWA_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_bytes(&CURRENT_VERSION.to_be_bytes())?;
        stream.write_u64(0)?;

        Ok(Self {
            path,
            stream,
            frozen: false,
            time_samplings: vec![TimeSampling::identity()],
            max_samples: vec![0],
            indexed_metadata: vec![String::new()],
            metadata_map: HashMap::new(),
            archive_metadata: MetaData::new(),
            library_version: ALEMBIC_LIBRARY_VERSION,
            written: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_archive_metadata(&mut self, meta_data: MetaData) {
        self.archive_metadata = meta_data;
    }

    pub fn archive_metadata(&self) -> &MetaData {
        &self.archive_metadata
    }

    /// Register a time sampling, reusing an equivalent entry.
    pub fn add_time_sampling(&mut self, ts: TimeSampling) -> u32 {
        if let Some(i) = self.time_samplings.iter().position(|t| t.is_equivalent(&ts)) {
            return i as u32;
        }
        self.time_samplings.push(ts);
        self.max_samples.push(0);
        (self.time_samplings.len() - 1) as u32
    }

    pub fn time_samplings(&self) -> &[TimeSampling] {
        &self.time_samplings
    }

    /// Number of distinct sample payloads written so far.
    pub fn num_stored_payloads(&self) -> usize {
        self.written.len()
    }

    /// Write `top` (its name is ignored; it is always the root) and freeze the file.
    pub fn write_archive(&mut self, top: &OObject) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }

        let version_pos = self.write_data(&ALEMBIC_FILE_VERSION.to_le_bytes())?;
        let library_pos = self.write_data(&self.library_version.to_le_bytes())?;
        let (top_pos, _) = self.write_object(top, "")?;

        let mut meta = self.archive_metadata.clone();
        if !meta.contains("_ai_AlembicVersion") {
            let v = self.library_version;
            meta.set(
                "_ai_AlembicVersion",
                format!("Alembic {}.{}.{}", v / 10000, (v / 100) % 100, v % 100),
            );
        }
        let meta_pos = self.write_data(meta.serialize().as_bytes())?;
        let ts_pos = self.write_data(&self.serialize_time_samplings())?;
        let indexed_pos = self.write_data(&self.serialize_indexed_metadata())?;

        let root_pos = self.write_group(&[
            make_data_offset(version_pos),
            make_data_offset(library_pos),
            make_group_offset(top_pos),
            make_data_offset(meta_pos),
            make_data_offset(ts_pos),
            make_data_offset(indexed_pos),
        ])?;

        self.stream.seek(FROZEN_OFFSET as u64)?;
        self.stream.write_u8(FROZEN_FLAG)?;
        self.stream.seek(ROOT_POS_OFFSET as u64)?;
        self.stream.write_u64(root_pos)?;
        self.stream.flush()?;
        self.frozen = true;

        tracing::debug!(
            path = %self.path.display(),
            payloads = self.written.len(),
            "archive written"
        );
        Ok(())
    }

    /// Freeze with an empty tree if nothing was written, then flush.
    pub fn close(mut self) -> Result<()> {
        if !self.frozen {
            self.write_archive(&OObject::new("ABC"))?;
        }
        self.stream.flush()
    }

    fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if data.is_empty() {
            return Ok(0);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(data.len() as u64)?;
        self.stream.write_bytes(data)?;
        Ok(pos)
    }

    /// Write a keyed sample payload once per distinct content.
    fn write_keyed(&mut self, key: SampleKey, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        if let Some(&pos) = self.written.get(&(key, data.len())) {
            return Ok(pos);
        }
        let pos = self.stream.pos();
        self.stream.write_u64((SAMPLE_KEY_SIZE + data.len()) as u64)?;
        self.stream.write_bytes(key.as_bytes())?;
        self.stream.write_bytes(data)?;
        self.written.insert((key, data.len()), pos);
        Ok(pos)
    }

    fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if children.is_empty() {
            return Ok(EMPTY_GROUP);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(children.len() as u64)?;
        for &child in children {
            self.stream.write_u64(child)?;
        }
        Ok(pos)
    }

    fn write_object(&mut self, obj: &OObject, parent_path: &str) -> Result<(u64, [u8; 16])> {
        let path = format!("{}/{}", parent_path, obj.name);

        let mut child_positions = Vec::with_capacity(obj.children.len());
        let mut child_digest = Digest::default();
        for child in &obj.children {
            let (pos, hash) = self.write_object(child, &path)?;
            child_positions.push(pos);
            child_digest.update(&hash);
        }

        let (props_pos, data_hash) = self.write_compound(&obj.properties)?;
        let child_hash = if obj.children.is_empty() {
            [0u8; 16]
        } else {
            child_digest.finish()
        };

        let mut headers = Vec::new();
        for child in &obj.children {
            headers.extend_from_slice(&(child.name.len() as u32).to_le_bytes());
            headers.extend_from_slice(child.name.as_bytes());
            let index = self.metadata_index(&child.meta_data);
            headers.push(index);
            if index == INLINE_METADATA {
                let meta = child.meta_data.serialize();
                headers.extend_from_slice(&(meta.len() as u32).to_le_bytes());
                headers.extend_from_slice(meta.as_bytes());
            }
        }
        headers.extend_from_slice(&data_hash);
        headers.extend_from_slice(&child_hash);
        let headers_pos = self.write_data(&headers)?;

        let mut group = Vec::with_capacity(child_positions.len() + 2);
        group.push(make_group_offset(props_pos));
        group.extend(child_positions.into_iter().map(make_group_offset));
        group.push(make_data_offset(headers_pos));
        let pos = self.write_group(&group)?;

        let mut digest = Digest::default();
        digest.update(&child_hash);
        digest.update(&data_hash);
        digest.update(obj.meta_data.serialize().as_bytes());
        digest.update(obj.name.as_bytes());
        Ok((pos, digest.finish()))
    }

    fn write_compound(&mut self, props: &[OProperty]) -> Result<(u64, [u8; 16])> {
        if props.is_empty() {
            return Ok((EMPTY_GROUP, [0u8; 16]));
        }

        let mut digest = Digest::default();
        let mut group = Vec::with_capacity(props.len() + 1);
        let mut states = Vec::with_capacity(props.len());
        for prop in props {
            let (pos, hash, state) = self.write_property(prop)?;
            digest.update(&hash);
            group.push(make_group_offset(pos));
            states.push(state);
        }

        let mut headers = Vec::new();
        for (prop, state) in props.iter().zip(&states) {
            self.serialize_property_header(&mut headers, prop, state);
        }
        group.push(make_data_offset(self.write_data(&headers)?));
        Ok((self.write_group(&group)?, digest.finish()))
    }

    fn write_property(&mut self, prop: &OProperty) -> Result<(u64, [u8; 16], SampleState)> {
        let mut digest = Digest::default();
        digest.update(prop.name.as_bytes());
        digest.update(&[prop.data_type.pod.to_u8(), prop.data_type.extent]);
        digest.update(&prop.time_sampling_index.to_le_bytes());
        digest.update(prop.meta_data.serialize().as_bytes());

        let state = match &prop.data {
            OPropertyData::Compound(children) => {
                let (pos, hash) = self.write_compound(children)?;
                digest.update(&hash);
                return Ok((pos, digest.finish(), SampleState::default()));
            }
            OPropertyData::Scalar(samples) => self.write_scalar_samples(samples, &mut digest)?,
            OPropertyData::Array(samples) => self.write_array_samples(prop, samples, &mut digest)?,
        };

        if let Some(max) = self.max_samples.get_mut(prop.time_sampling_index as usize) {
            *max = (*max).max(state.max_samples());
        }
        let pos = self.write_group(&state.children)?;
        Ok((pos, digest.finish(), state))
    }

    fn write_scalar_samples(&mut self, samples: &[Vec<u8>], digest: &mut Digest) -> Result<SampleState> {
        let mut state = SampleState {
            num_samples: samples.len() as u32,
            is_homogenous: true,
            ..Default::default()
        };
        let mut prev: Option<SampleKey> = None;
        for (i, bytes) in samples.iter().enumerate() {
            let key = SampleKey::of(bytes);
            digest.update(key.as_bytes());
            if state.observe(i as u32, prev != Some(key), 1) {
                let pos = self.write_keyed(key, bytes)?;
                state.children.push(make_data_offset(pos));
            }
            prev = Some(key);
        }
        Ok(state)
    }

    fn write_array_samples(
        &mut self,
        prop: &OProperty,
        samples: &[ArraySample],
        digest: &mut Digest,
    ) -> Result<SampleState> {
        let is_string = prop.data_type.pod.is_string();
        let mut state = SampleState {
            num_samples: samples.len() as u32,
            is_homogenous: true,
            is_scalar_like: true,
            ..Default::default()
        };
        let mut prev: Option<(SampleKey, &[u64])> = None;
        let mut prev_count: Option<u64> = None;

        for (i, sample) in samples.iter().enumerate() {
            let key = SampleKey::of(&sample.data);
            digest.update(key.as_bytes());
            let count = sample.num_elements();
            state.is_scalar_like &= count == 1;
            if prev_count.is_some_and(|c| c != count) {
                state.is_homogenous = false;
            }
            prev_count = Some(count);

            let changed = prev.map_or(true, |(k, d)| k != key || d != sample.dims.as_slice());
            if state.observe(i as u32, changed, 2) {
                let data_pos = self.write_keyed(key, &sample.data)?;
                let dims_offset = if sample.dims.len() <= 1 && !is_string {
                    EMPTY_DATA
                } else {
                    let dims: Vec<u8> = sample.dims.iter().flat_map(|d| d.to_le_bytes()).collect();
                    make_data_offset(self.write_data(&dims)?)
                };
                state.children.push(make_data_offset(data_pos));
                state.children.push(dims_offset);
            }
            prev = Some((key, sample.dims.as_slice()));
        }
        Ok(state)
    }

    fn serialize_property_header(&mut self, buf: &mut Vec<u8>, prop: &OProperty, state: &SampleState) {
        let meta = prop.meta_data.serialize();
        let meta_index = self.metadata_index(&prop.meta_data);
        let largest = (prop.name.len() as u32)
            .max(meta.len() as u32)
            .max(state.num_samples)
            .max(prop.time_sampling_index);
        let hint: u32 = match largest {
            0..=255 => 0,
            256..=65535 => 1,
            _ => 2,
        };

        let mut info = hint << 2 | (meta_index as u32) << 20;
        let simple = !prop.is_compound();
        if simple {
            info |= match prop.data {
                OPropertyData::Scalar(_) => 1,
                _ if state.is_scalar_like => 3,
                _ => 2,
            };
            info |= (prop.data_type.pod.to_u8() as u32 & 0xf) << 4;
            info |= (prop.data_type.extent as u32) << 12;
            if state.is_homogenous {
                info |= 0x400;
            }
            if prop.time_sampling_index != 0 {
                info |= 0x100;
            }
            if state.first_changed == 0 && state.last_changed == 0 {
                info |= 0x800;
            } else if state.first_changed != 1
                || state.last_changed != state.num_samples.saturating_sub(1)
            {
                info |= 0x200;
            }
        }
        buf.extend_from_slice(&info.to_le_bytes());

        if simple {
            push_hinted(buf, state.num_samples, hint);
            if info & 0x200 != 0 {
                push_hinted(buf, state.first_changed, hint);
                push_hinted(buf, state.last_changed, hint);
            }
            if info & 0x100 != 0 {
                push_hinted(buf, prop.time_sampling_index, hint);
            }
        }
        push_hinted(buf, prop.name.len() as u32, hint);
        buf.extend_from_slice(prop.name.as_bytes());
        if meta_index == INLINE_METADATA {
            push_hinted(buf, meta.len() as u32, hint);
            buf.extend_from_slice(meta.as_bytes());
        }
    }

    /// Index into the metadata table, or [`INLINE_METADATA`] when it does not fit.
    fn metadata_index(&mut self, meta_data: &MetaData) -> u8 {
        let serialized = meta_data.serialize();
        if serialized.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.metadata_map.get(&serialized) {
            return idx;
        }
        if self.indexed_metadata.len() > MAX_INDEXED_METADATA
            || serialized.len() > MAX_INDEXED_METADATA_LEN
        {
            return INLINE_METADATA;
        }
        let idx = self.indexed_metadata.len() as u8;
        self.indexed_metadata.push(serialized.clone());
        self.metadata_map.insert(serialized, idx);
        idx
    }

    fn serialize_time_samplings(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (ts, max) in self.time_samplings.iter().zip(&self.max_samples) {
            let tpc = if ts.is_acyclic() {
                ACYCLIC_TIME_PER_CYCLE
            } else {
                ts.time_per_cycle()
            };
            let times: &[f64] = if ts.stored_times().is_empty() {
                &[0.0]
            } else {
                ts.stored_times()
            };
            buf.extend_from_slice(&max.to_le_bytes());
            buf.extend_from_slice(&tpc.to_le_bytes());
            buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
            for t in times {
                buf.extend_from_slice(&t.to_le_bytes());
            }
        }
        buf
    }

    fn serialize_indexed_metadata(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for meta in self.indexed_metadata.iter().skip(1) {
            buf.push(meta.len() as u8);
            buf.extend_from_slice(meta.as_bytes());
        }
        buf
    }
}

fn push_hinted(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}
