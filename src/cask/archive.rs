//! The archive: owner of the object/property arena, the time samplings and
//! the read handle.
//!
//! Objects and properties live in two arenas addressed by [`ObjectId`] and
//! [`PropertyId`]. Parent links are plain ids; the [`DeepContainer`]s on each
//! node own the child relationship. Reading is lazy: a node's children and
//! properties are wrapped from its read handle the first time they are asked
//! for, then never refreshed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{MetaData, TimeSampling};
use crate::ogawa::{
    ArraySample, OArchive, OObject, OProperty, OgawaArchiveReader, OgawaObjectReader,
    OgawaPropertyReader, ALEMBIC_LIBRARY_VERSION,
};
use crate::settings::Settings;
use crate::util::{DataType, Error, PlainOldDataType, Result};

use super::coerce::{self, Value};
use super::container::DeepContainer;
use super::object::Object;
use super::property::Property;
use super::report::SaveReport;
use super::samples::Sample;
use super::variant::Variant;

/// Handle to an object in an [`Archive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

/// Handle to a property in an [`Archive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) usize);

/// Owner of a property: an object, or a compound property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyParent {
    Object(ObjectId),
    Property(PropertyId),
}

pub(crate) struct ObjectNode {
    pub name: String,
    pub parent: Option<ObjectId>,
    pub variant: Variant,
    /// Memoized metadata; filled from the reader on first access.
    pub meta: Option<MetaData>,
    /// Explicit time sampling id; `None` inherits from the parent.
    pub tsid: Option<u32>,
    pub reader: Option<OgawaObjectReader>,
    pub children: DeepContainer<ObjectId>,
    pub properties: DeepContainer<PropertyId>,
    /// Samples set in memory, written on save.
    pub samples: Vec<Sample>,
    /// Memoized samples decoded from the reader.
    pub read_samples: Option<Vec<Sample>>,
    pub closed: bool,
}

impl ObjectNode {
    fn new(name: String, variant: Variant) -> Self {
        Self {
            name,
            parent: None,
            variant,
            meta: None,
            tsid: None,
            reader: None,
            children: DeepContainer::new(),
            properties: DeepContainer::new(),
            samples: Vec::new(),
            read_samples: None,
            closed: false,
        }
    }
}

pub(crate) struct PropertyNode {
    pub name: String,
    pub parent: Option<PropertyParent>,
    pub meta: Option<MetaData>,
    pub data_type: Option<DataType>,
    /// `None` until set or materialized from the reader.
    pub values: Option<Vec<Value>>,
    pub tsid: Option<u32>,
    pub reader: Option<OgawaPropertyReader>,
    pub properties: DeepContainer<PropertyId>,
    pub closed: bool,
}

impl PropertyNode {
    fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            meta: None,
            data_type: None,
            values: None,
            tsid: None,
            reader: None,
            properties: DeepContainer::new(),
            closed: false,
        }
    }
}

const APPLICATION_KEY: &str = "_ai_Application";
const DESCRIPTION_KEY: &str = "_ai_Description";
const DCC_FPS_KEY: &str = "_ai_DCC_FPS";
const DATE_WRITTEN_KEY: &str = "_ai_DateWritten";
const ALEMBIC_VERSION_KEY: &str = "_ai_AlembicVersion";

/// Properties a new object keeps inside its schema compound.
const SCHEMA_CHILDREN: [&str; 3] = [".childBnds", ".userProperties", ".arbGeomParams"];

/// An archive: a tree of objects rooted at Top.
///
/// All access goes through `&mut Archive`, via the [`Object`] and
/// [`Property`] views returned by [`obj`](Self::obj) and [`prop`](Self::prop).
///
/// ```ignore
/// let mut archive = Archive::open("scene.abc")?;
/// let top = archive.top();
/// for id in archive.find(".*Shape", None)? {
///     println!("{}", archive.obj(id).path());
/// }
/// archive.write_to_file("copy.abc", "round trip")?;
/// ```
pub struct Archive {
    path: Option<PathBuf>,
    settings: Settings,
    reader: Option<OgawaArchiveReader>,
    pub(crate) objects: Vec<ObjectNode>,
    pub(crate) properties: Vec<PropertyNode>,
    top: ObjectId,
    timesamplings: Vec<TimeSampling>,
    time_sampling_id: u32,
    time_range: Option<(f64, f64)>,
    closed: bool,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// An empty archive, not backed by a file.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut top = ObjectNode::new("ABC".into(), Variant::Top);
        top.meta = Some(MetaData::new());
        Self {
            path: None,
            settings,
            reader: None,
            objects: vec![top],
            properties: Vec::new(),
            top: ObjectId(0),
            timesamplings: vec![TimeSampling::identity()],
            time_sampling_id: 0,
            time_range: None,
            closed: false,
        }
    }

    /// Open an existing archive with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Settings::default())
    }

    pub fn open_with(path: impl AsRef<Path>, settings: Settings) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NonexistentFile(path.to_path_buf()));
        }
        let reader = OgawaArchiveReader::open(path, settings.use_mmap)?;

        let mut timesamplings = reader.time_samplings().to_vec();
        if timesamplings.is_empty() {
            timesamplings.push(TimeSampling::identity());
        }
        let time_sampling_id = (timesamplings.len() - 1) as u32;

        let mut archive = Self {
            path: Some(path.to_path_buf()),
            settings,
            reader: None,
            objects: Vec::new(),
            properties: Vec::new(),
            top: ObjectId(0),
            timesamplings,
            time_sampling_id,
            time_range: None,
            closed: false,
        };
        archive.top = archive.wrap_object(reader.top(), None, time_sampling_id);
        archive.reader = Some(reader);

        tracing::debug!(path = %path.display(), "opened archive");
        Ok(archive)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fps(&self) -> f64 {
        self.settings.fps
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.settings.fps = fps;
        self.time_range = None;
    }

    /// Source file path, `None` for new archives.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Basename of the source file.
    pub fn name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The root object.
    pub fn top(&self) -> ObjectId {
        self.top
    }

    /// View of an object.
    ///
    /// # Panics
    ///
    /// Ids are only meaningful for the archive that issued them; an id
    /// beyond this archive's arena panics. Check foreign ids with
    /// [`Archive::contains_object`].
    pub fn obj(&mut self, id: ObjectId) -> Object<'_> {
        Object::new(self, id)
    }

    /// View of a property. Panics like [`Archive::obj`] on a foreign id.
    pub fn prop(&mut self, id: PropertyId) -> Property<'_> {
        Property::new(self, id)
    }

    /// True if `id` names an object in this archive's arena.
    pub fn contains_object(&self, id: ObjectId) -> bool {
        id.0 < self.objects.len()
    }

    pub fn contains_property(&self, id: PropertyId) -> bool {
        id.0 < self.properties.len()
    }

    pub(crate) fn check_object(&self, id: ObjectId) -> Result<()> {
        if self.contains_object(id) {
            Ok(())
        } else {
            Err(Error::invalid(format!("object id {} is not in this archive", id.0)))
        }
    }

    pub(crate) fn check_property(&self, id: PropertyId) -> Result<()> {
        if self.contains_property(id) {
            Ok(())
        } else {
            Err(Error::invalid(format!("property id {} is not in this archive", id.0)))
        }
    }

    /// Create a detached object. Attach it with
    /// [`Object::set_parent`], [`Object::add_child`] or [`Object::set_child`].
    pub fn new_object(&mut self, name: impl Into<String>, variant: Variant) -> ObjectId {
        let variant = if variant == Variant::Top { Variant::Object } else { variant };
        let mut node = ObjectNode::new(name.into(), variant);
        node.meta = Some(MetaData::new());
        node.children.mark_visited();
        node.properties.mark_visited();
        self.objects.push(node);
        ObjectId(self.objects.len() - 1)
    }

    /// Create a detached property.
    pub fn new_property(&mut self, name: impl Into<String>) -> PropertyId {
        let mut node = PropertyNode::new(name.into());
        node.meta = Some(MetaData::new());
        node.properties.mark_visited();
        self.properties.push(node);
        PropertyId(self.properties.len() - 1)
    }

    /// Archive info from the stored metadata.
    ///
    /// Keys: `appName`, `libraryVersionString`, `libraryVersion`,
    /// `whenWritten`, `userDescription`, `dccFPS`, plus any non-`_ai_` keys.
    pub fn info(&self) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        let Some(reader) = &self.reader else {
            return info;
        };
        let meta = reader.archive_metadata();
        for (key, from) in [
            ("appName", APPLICATION_KEY),
            ("libraryVersionString", ALEMBIC_VERSION_KEY),
            ("whenWritten", DATE_WRITTEN_KEY),
            ("userDescription", DESCRIPTION_KEY),
            ("dccFPS", DCC_FPS_KEY),
        ] {
            if let Some(v) = meta.get(from) {
                info.insert(key.to_string(), v.to_string());
            }
        }
        info.insert("libraryVersion".into(), reader.library_version().to_string());
        for (k, v) in meta.iter().filter(|(k, _)| !k.starts_with("_ai_")) {
            info.insert(k.to_string(), v.to_string());
        }
        info
    }

    /// `"x.y.z"` version of the library that wrote this archive.
    pub fn alembic_version(&self) -> Option<String> {
        let info = self.info();
        let version = info.get("libraryVersionString")?;
        let re = regex::Regex::new(r"\d+\.\d+\.\d+").ok()?;
        re.find(version).map(|m| m.as_str().to_string())
    }

    /// `"x.y.z"` version of the format library this crate writes.
    pub fn using_version() -> String {
        let v = ALEMBIC_LIBRARY_VERSION;
        format!("{}.{}.{}", v / 10000, (v / 100) % 100, v % 100)
    }

    pub fn timesamplings(&self) -> &[TimeSampling] {
        &self.timesamplings
    }

    /// Register a time sampling, reusing an equivalent one. Returns its index.
    pub fn add_timesampling(&mut self, ts: TimeSampling) -> u32 {
        if let Some(i) = self.timesamplings.iter().position(|t| t.is_equivalent(&ts)) {
            return i as u32;
        }
        self.timesamplings.push(ts);
        self.time_range = None;
        (self.timesamplings.len() - 1) as u32
    }

    /// Time sampling inherited by Top and every object without its own.
    pub fn time_sampling_id(&self) -> u32 {
        self.time_sampling_id
    }

    pub fn set_time_sampling_id(&mut self, id: u32) {
        self.time_sampling_id = id;
    }

    pub(crate) fn time_sampling(&self, id: u32) -> &TimeSampling {
        self.timesamplings
            .get(id as usize)
            .unwrap_or(&self.timesamplings[0])
    }

    fn max_samples(&self, index: usize) -> Option<u32> {
        self.reader.as_ref().and_then(|r| r.max_samples(index))
    }

    /// Global (start, end) time in seconds. The last time sampling decides.
    pub fn time_range(&mut self) -> (f64, f64) {
        if let Some(range) = self.time_range {
            return range;
        }
        let fps = self.fps();
        let (mut start, mut end) = (None, None);
        for (index, ts) in self.timesamplings.iter().enumerate() {
            if ts.is_acyclic() {
                let n = ts.stored_times().len();
                if n > 0 {
                    start = Some(ts.sample_time(0));
                    end = Some(ts.sample_time(n - 1));
                }
            } else {
                let first = ts.start_time();
                let spc = ts.samples_per_cycle().max(1);
                start = Some(first);
                end = Some(match self.max_samples(index) {
                    Some(max) if max > 0 => first + ((max as usize / spc) as f64 - 1.0) / fps,
                    _ => first,
                });
            }
        }
        let range = (start.unwrap_or(0.0), end.unwrap_or(0.0));
        self.time_range = Some(range);
        range
    }

    pub fn start_time(&mut self) -> f64 {
        self.time_range().0
    }

    /// Set the start time. The end time moves up if it would precede it.
    pub fn set_start_time(&mut self, start: f64) {
        let (_, end) = self.time_range();
        self.time_range = Some((start, end.max(start)));
    }

    pub fn end_time(&mut self) -> f64 {
        self.time_range().1
    }

    pub fn start_frame(&mut self) -> i64 {
        (self.start_time() * self.fps()).round() as i64
    }

    pub fn set_start_frame(&mut self, frame: f64) {
        self.set_start_time(frame / self.fps());
    }

    pub fn end_frame(&mut self) -> i64 {
        (self.end_time() * self.fps()).round() as i64
    }

    pub fn frame_range(&mut self) -> (i64, i64) {
        (self.start_frame(), self.end_frame())
    }

    // -- arena internals ---------------------------------------------------

    pub(crate) fn onode(&self, id: ObjectId) -> &ObjectNode {
        &self.objects[id.0]
    }

    pub(crate) fn onode_mut(&mut self, id: ObjectId) -> &mut ObjectNode {
        &mut self.objects[id.0]
    }

    pub(crate) fn pnode(&self, id: PropertyId) -> &PropertyNode {
        &self.properties[id.0]
    }

    pub(crate) fn pnode_mut(&mut self, id: PropertyId) -> &mut PropertyNode {
        &mut self.properties[id.0]
    }

    /// Wrap a read handle. The node named `ABC` without a parent is Top.
    pub(crate) fn wrap_object(
        &mut self,
        reader: &OgawaObjectReader,
        parent: Option<ObjectId>,
        tsid: u32,
    ) -> ObjectId {
        let variant = if parent.is_none() && reader.name() == "ABC" {
            Variant::Top
        } else {
            Variant::resolve(reader.meta_data())
        };
        let mut node = ObjectNode::new(reader.name().to_string(), variant);
        node.parent = parent;
        node.tsid = Some(tsid);
        node.reader = Some(reader.clone());
        self.objects.push(node);
        ObjectId(self.objects.len() - 1)
    }

    fn wrap_property(&mut self, reader: &OgawaPropertyReader, parent: PropertyParent) -> PropertyId {
        let mut node = PropertyNode::new(reader.name().to_string());
        node.parent = Some(parent);
        node.tsid = Some(reader.time_sampling_index());
        node.reader = Some(reader.clone());
        self.properties.push(node);
        PropertyId(self.properties.len() - 1)
    }

    /// Wrap the reader's children once.
    pub(crate) fn populate_children(&mut self, id: ObjectId) -> Result<()> {
        let node = self.onode(id);
        if node.closed || node.children.is_visited() {
            return Ok(());
        }
        let Some(reader) = node.reader.clone() else {
            self.onode_mut(id).children.mark_visited();
            return Ok(());
        };
        let tsid = self.object_tsid(id);
        let readers = reader.children()?;
        tracing::trace!(object = %reader.full_name(), count = readers.len(), "wrapping children");

        let wrapped: Vec<(String, ObjectId)> = readers
            .iter()
            .map(|r| (r.name().to_string(), self.wrap_object(r, Some(id), tsid)))
            .collect();
        let node = self.onode_mut(id);
        for (name, child) in wrapped {
            node.children.insert(name, child);
        }
        node.children.mark_visited();
        Ok(())
    }

    /// Wrap the reader's top-level properties once.
    pub(crate) fn populate_properties(&mut self, id: ObjectId) -> Result<()> {
        let node = self.onode(id);
        if node.closed || node.properties.is_visited() {
            return Ok(());
        }
        let Some(reader) = node.reader.clone() else {
            self.onode_mut(id).properties.mark_visited();
            return Ok(());
        };
        let readers = reader.properties()?;
        tracing::trace!(object = %reader.full_name(), count = readers.len(), "wrapping properties");

        let wrapped: Vec<(String, PropertyId)> = readers
            .iter()
            .map(|r| (r.name().to_string(), self.wrap_property(r, PropertyParent::Object(id))))
            .collect();
        let node = self.onode_mut(id);
        for (name, prop) in wrapped {
            node.properties.insert(name, prop);
        }
        node.properties.mark_visited();
        Ok(())
    }

    /// Wrap a compound reader's sub-properties once.
    pub(crate) fn populate_sub_properties(&mut self, id: PropertyId) -> Result<()> {
        let node = self.pnode(id);
        if node.closed || node.properties.is_visited() {
            return Ok(());
        }
        let reader = match &node.reader {
            Some(r) if r.is_compound() => r.clone(),
            _ => {
                self.pnode_mut(id).properties.mark_visited();
                return Ok(());
            }
        };
        let readers = reader.sub_properties()?;
        tracing::trace!(property = %reader.name(), count = readers.len(), "wrapping sub-properties");

        let wrapped: Vec<(String, PropertyId)> = readers
            .iter()
            .map(|r| (r.name().to_string(), self.wrap_property(r, PropertyParent::Property(id))))
            .collect();
        let node = self.pnode_mut(id);
        for (name, prop) in wrapped {
            node.properties.insert(name, prop);
        }
        node.properties.mark_visited();
        Ok(())
    }

    /// Own time sampling id, else the nearest ancestor's, else the archive's.
    pub(crate) fn object_tsid(&self, mut id: ObjectId) -> u32 {
        loop {
            let node = self.onode(id);
            if let Some(tsid) = node.tsid {
                return tsid;
            }
            match node.parent {
                Some(parent) if node.variant != Variant::Top => id = parent,
                _ => return self.time_sampling_id,
            }
        }
    }

    pub(crate) fn property_tsid(&self, mut id: PropertyId) -> u32 {
        loop {
            let node = self.pnode(id);
            if let Some(tsid) = node.tsid {
                return tsid;
            }
            match node.parent {
                Some(PropertyParent::Property(parent)) => id = parent,
                Some(PropertyParent::Object(object)) => return self.object_tsid(object),
                None => return self.time_sampling_id,
            }
        }
    }

    // -- save --------------------------------------------------------------

    /// Write the whole tree to `path`, then close the archive.
    ///
    /// The tree is built in memory before the output file is created, so
    /// `path` may be the archive's own source file. Values and samples that
    /// fail to encode are skipped and listed in the returned report.
    pub fn write_to_file(&mut self, path: impl AsRef<Path>, description: &str) -> Result<SaveReport> {
        if self.closed {
            return Err(Error::closed("archive"));
        }
        let path = path.as_ref();

        if self.reader.is_none() && self.timesamplings.len() == 1 {
            let ts = TimeSampling::uniform(1.0 / self.fps(), self.start_time());
            self.timesamplings.push(ts);
            self.time_sampling_id = (self.timesamplings.len() - 1) as u32;
        }

        // mirror OArchive's dedup so ids are known before the file exists
        let mut unique = vec![TimeSampling::identity()];
        let tsmap: Vec<u32> = self
            .timesamplings
            .iter()
            .map(|ts| match unique.iter().position(|u| u.is_equivalent(ts)) {
                Some(i) => i as u32,
                None => {
                    unique.push(ts.clone());
                    (unique.len() - 1) as u32
                }
            })
            .collect();

        let mut report = SaveReport::new();
        let top = self.build_object(self.top, &tsmap, &mut report)?;

        let mut meta = self.object_metadata(self.top);
        meta.remove(ALEMBIC_VERSION_KEY);
        meta.set(APPLICATION_KEY, self.settings.application.as_str());
        let description = if description.is_empty() {
            self.settings.description.as_str()
        } else {
            description
        };
        meta.set(DESCRIPTION_KEY, description);
        meta.set(DCC_FPS_KEY, self.fps().to_string());

        // release every read handle before the output file is truncated
        self.close();

        let mut out = OArchive::create(path)?;
        for ts in unique.into_iter().skip(1) {
            out.add_time_sampling(ts);
        }
        out.set_archive_metadata(meta);
        out.write_archive(&top)?;
        out.close()?;

        tracing::debug!(path = %path.display(), failures = report.len(), "archive saved");
        Ok(report)
    }

    fn build_object(&mut self, id: ObjectId, tsmap: &[u32], report: &mut SaveReport) -> Result<OObject> {
        self.populate_children(id)?;
        self.populate_properties(id)?;

        let path = self.object_path(id);
        let tsid = remap(tsmap, self.object_tsid(id));
        let node = self.onode(id);
        let is_new = node.reader.is_none();
        let variant = node.variant;
        let mut samples = node.samples.clone();
        let prop_ids: Vec<(String, PropertyId)> =
            node.properties.iter().map(|(n, p)| (n.to_string(), p)).collect();
        let child_ids: Vec<ObjectId> = node.children.values().collect();
        let name = node.name.clone();

        let meta = if is_new {
            let mut meta = variant.object_metadata();
            meta.extend_from(&self.object_metadata(id));
            meta
        } else {
            self.object_metadata(id)
        };
        let mut out = OObject::new(name).with_meta_data(meta);

        if samples.is_empty() && is_new {
            samples.extend(variant.default_sample());
        }
        let mut schema = if samples.is_empty() && !is_new {
            None
        } else {
            match variant.write_schema(&samples, tsid) {
                Ok(schema) => schema,
                Err(e) => {
                    report.push(path.as_str(), None, e);
                    None
                }
            }
        };
        for (prop_name, pid) in prop_ids {
            let Some(prop) = self.build_property(pid, tsmap, report)? else {
                continue;
            };
            match schema.as_mut() {
                Some(s) if is_new && SCHEMA_CHILDREN.contains(&prop_name.as_str()) => {
                    s.add_child(prop);
                }
                Some(s) if is_new && prop.name == s.name => s.merge(prop),
                // pending samples replace the stored schema compound; only
                // its user-facing children carry over
                Some(s) if prop.name == s.name => {
                    for child in prop.into_children() {
                        if SCHEMA_CHILDREN.contains(&child.name.as_str()) {
                            s.add_child(child);
                        }
                    }
                }
                _ => {
                    out.add_property(prop);
                }
            }
        }
        if let Some(schema) = schema {
            out.properties.insert(0, schema);
        }

        for child in child_ids {
            if self.onode(child).closed {
                continue;
            }
            out.children.push(self.build_object(child, tsmap, report)?);
        }
        Ok(out)
    }

    fn build_property(
        &mut self,
        id: PropertyId,
        tsmap: &[u32],
        report: &mut SaveReport,
    ) -> Result<Option<OProperty>> {
        self.populate_sub_properties(id)?;
        let node = self.pnode(id);
        if node.closed {
            return Ok(None);
        }
        let path = self.property_path(id);
        let tsid = remap(tsmap, self.property_tsid(id));
        let mut meta = self.property_metadata(id);
        let node = self.pnode(id);
        let name = node.name.clone();
        if name == ".selfBnds" || name == ".childBnds" {
            meta.set(MetaData::INTERPRETATION_KEY, "box");
        }

        if self.property_is_compound(id) {
            let node = self.pnode(id);
            let subs: Vec<PropertyId> = node.properties.values().collect();
            let mut compound = OProperty::compound(name).with_meta_data(meta);
            for sub in subs {
                if let Some(child) = self.build_property(sub, tsmap, report)? {
                    compound.add_child(child);
                }
            }
            return Ok(Some(compound));
        }

        let reader = node.reader.clone();
        let values_empty = match &node.values {
            // untouched read property: copy what is stored
            None => return Ok(reader.map(|r| copy_raw(&r, name, meta, tsid, &path, report))),
            Some(values) => values.is_empty(),
        };
        if values_empty && reader.is_none() {
            return Ok(None);
        }

        let data_type = match self.property_datatype(id) {
            Ok(dt) => dt,
            Err(e) => {
                report.push(path.as_str(), None, e);
                return Ok(None);
            }
        };
        let array = self.property_is_array(id);
        let mut prop = if array {
            OProperty::array(name, data_type)
        } else {
            OProperty::scalar(name, data_type)
        }
        .with_meta_data(meta)
        .with_time_sampling(tsid);

        let values = self.pnode(id).values.as_deref().unwrap_or_default();
        for (index, value) in values.iter().enumerate() {
            match coerce::encode(value, data_type, array) {
                Ok(sample) if array => prop.push_array(ArraySample::new(sample.bytes, sample.dims)),
                Ok(sample) => prop.push_scalar(sample.bytes),
                Err(e) => report.push(path.as_str(), Some(index), e),
            }
        }
        Ok(Some(prop))
    }

    // -- close -------------------------------------------------------------

    /// Close the archive and every object and property in it. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for node in &mut self.objects {
            close_object_node(node);
        }
        for node in &mut self.properties {
            close_property_node(node);
        }
        self.reader = None;
        self.closed = true;
        tracing::debug!(path = ?self.path, "archive closed");
    }
}

fn remap(tsmap: &[u32], tsid: u32) -> u32 {
    tsmap.get(tsid as usize).copied().unwrap_or(0)
}

/// Copy every stored sample of an untouched read property.
fn copy_raw(
    reader: &OgawaPropertyReader,
    name: String,
    meta: MetaData,
    tsid: u32,
    path: &str,
    report: &mut SaveReport,
) -> OProperty {
    let data_type = reader.data_type();
    let mut prop = if reader.is_array() {
        OProperty::array(name, data_type)
    } else {
        OProperty::scalar(name, data_type)
    }
    .with_meta_data(meta)
    .with_time_sampling(tsid);

    for index in 0..reader.num_samples() {
        let raw = match reader.sample(index) {
            Ok(raw) => raw,
            Err(e) => {
                report.push(path, Some(index), e);
                continue;
            }
        };
        if reader.is_array() {
            let dims = raw.dims.unwrap_or_else(|| vec![element_count(&raw.bytes, data_type)]);
            prop.push_array(ArraySample::new(raw.bytes, dims));
        } else {
            prop.push_scalar(raw.bytes);
        }
    }
    prop
}

fn element_count(bytes: &[u8], data_type: DataType) -> u64 {
    match data_type.pod {
        PlainOldDataType::String | PlainOldDataType::Wstring => {
            let nuls = bytes.iter().filter(|b| **b == 0).count();
            (nuls / data_type.extent.max(1) as usize) as u64
        }
        _ => match data_type.num_bytes() {
            0 => 0,
            n => (bytes.len() / n) as u64,
        },
    }
}

pub(crate) fn close_object_node(node: &mut ObjectNode) {
    node.closed = true;
    node.parent = None;
    node.reader = None;
    node.children.clear();
    node.properties.clear();
    node.samples.clear();
    node.read_samples = None;
}

pub(crate) fn close_property_node(node: &mut PropertyNode) {
    node.closed = true;
    node.parent = None;
    node.reader = None;
    node.values = None;
    node.properties.clear();
}
