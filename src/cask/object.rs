//! Object view: scene-graph node operations.

use glam::DMat4;

use crate::core::MetaData;
use crate::util::{Error, Result};

use super::archive::{close_object_node, Archive, ObjectId, PropertyId, PropertyParent};
use super::container::{split_path, DeepContainer};
use super::samples::{read_camera_samples, read_xform_samples, Sample, XformOp, XformSample};
use super::variant::Variant;

/// A mutable view of one object in an [`Archive`].
pub struct Object<'a> {
    archive: &'a mut Archive,
    id: ObjectId,
}

impl<'a> Object<'a> {
    pub(crate) fn new(archive: &'a mut Archive, id: ObjectId) -> Self {
        Self { archive, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn archive(&mut self) -> &mut Archive {
        self.archive
    }

    pub fn is_closed(&self) -> bool {
        self.archive.onode(self.id).closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed(format!("object {}", self.name())));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.archive.onode(self.id).name
    }

    /// Rename, moving the entry in the parent's children. A sibling with
    /// the same name is displaced.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let node = self.archive.onode(self.id);
        if node.variant == Variant::Top {
            return Err(Error::RootRename);
        }
        if let Some(parent) = node.parent {
            let old = node.name.clone();
            if let Some(displaced) = self.archive.onode_mut(parent).children.rename(&old, &name) {
                if displaced != self.id {
                    self.archive.onode_mut(displaced).parent = None;
                }
            }
        }
        self.archive.onode_mut(self.id).name = name;
        Ok(())
    }

    pub fn variant(&self) -> Variant {
        self.archive.onode(self.id).variant
    }

    pub fn type_name(&self) -> &'static str {
        self.variant().name()
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.archive.onode(self.id).parent
    }

    /// Attach under `parent`, keeping the current name.
    pub fn set_parent(&mut self, parent: ObjectId) -> Result<()> {
        let name = self.name().to_string();
        self.archive.attach_child(parent, &name, self.id)
    }

    /// Slash-separated path from Top; `/` for Top itself.
    pub fn path(&self) -> String {
        self.archive.object_path(self.id)
    }

    /// Metadata, read from the handle once and kept.
    pub fn metadata(&mut self) -> &MetaData {
        if self.archive.onode(self.id).meta.is_none() {
            let meta = self.archive.object_metadata(self.id);
            self.archive.onode_mut(self.id).meta = Some(meta);
        }
        self.archive.onode_mut(self.id).meta.get_or_insert_with(MetaData::new)
    }

    pub fn set_metadata(&mut self, meta: MetaData) -> Result<()> {
        self.ensure_open()?;
        self.archive.onode_mut(self.id).meta = Some(meta);
        Ok(())
    }

    /// Own time sampling id, or the inherited one.
    pub fn time_sampling_id(&self) -> u32 {
        self.archive.object_tsid(self.id)
    }

    pub fn set_time_sampling_id(&mut self, id: u32) -> Result<()> {
        self.ensure_open()?;
        self.archive.onode_mut(self.id).tsid = Some(id);
        Ok(())
    }

    /// Child objects, wrapped from the read handle on first access.
    pub fn children(&mut self) -> Result<&DeepContainer<ObjectId>> {
        self.archive.populate_children(self.id)?;
        Ok(&self.archive.onode(self.id).children)
    }

    /// Child at a slash-separated path.
    pub fn child(&mut self, path: &str) -> Result<Option<ObjectId>> {
        self.archive.child_at(self.id, path)
    }

    /// Place `child` at a slash-separated path, creating missing
    /// intermediates as Xforms. The child takes the last path segment as
    /// its name.
    pub fn set_child(&mut self, path: &str, child: ObjectId) -> Result<()> {
        self.archive.set_child_at(self.id, path, child)
    }

    /// Attach `child` under its own name.
    pub fn add_child(&mut self, child: ObjectId) -> Result<ObjectId> {
        let name = self.archive.onode(child).name.clone();
        self.archive.attach_child(self.id, &name, child)?;
        Ok(child)
    }

    pub fn properties(&mut self) -> Result<&DeepContainer<PropertyId>> {
        self.archive.populate_properties(self.id)?;
        Ok(&self.archive.onode(self.id).properties)
    }

    /// Property at a slash-separated path, e.g. `.geom/P`.
    pub fn property(&mut self, path: &str) -> Result<Option<PropertyId>> {
        let (head, rest) = split_path(path);
        self.archive.populate_properties(self.id)?;
        match self.archive.onode(self.id).properties.get(head) {
            Some(pid) => match rest {
                Some(rest) => self.archive.prop(pid).property(rest),
                None => Ok(Some(pid)),
            },
            None => Ok(None),
        }
    }

    /// Place `prop` at a slash-separated path, creating missing compound
    /// properties on the way.
    pub fn set_property(&mut self, path: &str, prop: PropertyId) -> Result<()> {
        self.ensure_open()?;
        let (head, rest) = split_path(path);
        let parent = PropertyParent::Object(self.id);
        match rest {
            None => self.archive.attach_property(parent, head, prop),
            Some(rest) => {
                self.archive.populate_properties(self.id)?;
                let compound = match self.archive.onode(self.id).properties.get(head) {
                    Some(pid) => pid,
                    None => {
                        let pid = self.archive.new_property(head);
                        self.archive.attach_property(parent, head, pid)?;
                        pid
                    }
                };
                self.archive.prop(compound).set_property(rest, prop)
            }
        }
    }

    pub fn add_property(&mut self, prop: PropertyId) -> Result<PropertyId> {
        let name = self.archive.pnode(prop).name.clone();
        self.archive
            .attach_property(PropertyParent::Object(self.id), &name, prop)?;
        Ok(prop)
    }

    /// Schema samples: the ones set in memory, else those decoded from the
    /// read handle (Xform, Camera and Light).
    pub fn samples(&mut self) -> Result<Vec<Sample>> {
        self.archive.object_samples(self.id)
    }

    /// Set a schema sample at `index`, or append. An index past the end
    /// appends.
    pub fn set_sample(&mut self, sample: impl Into<Sample>, index: Option<usize>) -> Result<()> {
        self.ensure_open()?;
        let sample = sample.into();
        let variant = self.variant();
        if !variant.accepts(&sample) {
            return Err(Error::SampleMismatch {
                sample: sample.kind().to_string(),
                variant: variant.name().to_string(),
            });
        }
        // editing a read object starts from its stored samples
        if self.archive.onode(self.id).samples.is_empty() {
            let stored = self.archive.object_samples(self.id)?;
            self.archive.onode_mut(self.id).samples = stored;
        }
        let samples = &mut self.archive.onode_mut(self.id).samples;
        match index {
            Some(i) if i < samples.len() => samples[i] = sample,
            _ => samples.push(sample),
        }
        Ok(())
    }

    pub fn is_leaf(&mut self) -> Result<bool> {
        Ok(self.children()?.is_empty())
    }

    /// True if any simple property below this object has changing stored
    /// samples.
    pub fn is_animated(&mut self) -> Result<bool> {
        let roots: Vec<PropertyId> = self.properties()?.values().collect();
        let mut stack = roots;
        while let Some(pid) = stack.pop() {
            self.archive.populate_sub_properties(pid)?;
            let node = self.archive.pnode(pid);
            match &node.reader {
                Some(r) if r.is_compound() => stack.extend(node.properties.values()),
                Some(r) if !r.is_constant() => return Ok(true),
                Some(_) => {}
                None => stack.extend(node.properties.values()),
            }
        }
        Ok(false)
    }

    /// True if `.geom/P` exists and its stored samples change.
    pub fn is_deforming(&mut self) -> Result<bool> {
        let Some(pid) = self.property(".geom/P")? else {
            return Ok(false);
        };
        Ok(self
            .archive
            .pnode(pid)
            .reader
            .as_ref()
            .is_some_and(|r| !r.is_compound() && !r.is_constant()))
    }

    /// Local matrix of an Xform at `index`, clamped to the last sample.
    pub fn matrix(&mut self, index: usize) -> Result<DMat4> {
        if self.variant() != Variant::Xform {
            return Err(Error::TypeMismatch {
                expected: Variant::Xform.name().into(),
                actual: self.type_name().into(),
            });
        }
        let samples = self.samples()?;
        let sample = match samples.len() {
            0 => return Ok(DMat4::IDENTITY),
            n => &samples[index.min(n - 1)],
        };
        Ok(sample.as_xform().map_or(DMat4::IDENTITY, XformSample::matrix))
    }

    /// Replace the Xform's samples with a single scale.
    pub fn set_scale(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        if self.variant() != Variant::Xform {
            return Err(Error::TypeMismatch {
                expected: Variant::Xform.name().into(),
                actual: self.type_name().into(),
            });
        }
        self.ensure_open()?;
        let sample = XformSample::from_ops(vec![XformOp::scale(x, y, z)]);
        self.archive.onode_mut(self.id).samples = vec![sample.into()];
        Ok(())
    }

    /// World matrix: this object's and every ancestor Xform's matrix at
    /// `index`. Stops above an Xform that does not inherit.
    pub fn global_matrix(&mut self, index: usize) -> Result<DMat4> {
        let mut acc = DMat4::IDENTITY;
        let mut current = Some(self.id);
        while let Some(id) = current {
            let mut obj = self.archive.obj(id);
            if obj.variant() == Variant::Xform {
                acc = obj.matrix(index)? * acc;
                let inherits = obj
                    .samples()?
                    .first()
                    .and_then(Sample::as_xform)
                    .map_or(true, |s| s.inherits);
                if !inherits {
                    break;
                }
            }
            current = obj.parent();
        }
        Ok(acc)
    }

    pub fn start_frame(&mut self) -> Result<i64> {
        self.frame(false)
    }

    pub fn end_frame(&mut self) -> Result<i64> {
        self.frame(true)
    }

    fn frame(&mut self, end: bool) -> Result<i64> {
        let mut current = Some(self.id);
        while let Some(id) = current {
            if self.archive.onode(id).variant == Variant::Top {
                break;
            }
            if let Some((tsid, count)) = self.archive.frame_source(id)? {
                let ts = self.archive.time_sampling(tsid);
                let index = if end { count.saturating_sub(1) } else { 0 };
                return Ok((ts.sample_time(index) * self.archive.fps()).round() as i64);
            }
            current = self.archive.onode(id).parent;
        }
        Ok(if end {
            self.archive.end_frame()
        } else {
            self.archive.start_frame()
        })
    }

    /// Detach and drop every property.
    pub fn clear_properties(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.archive.populate_properties(self.id)?;
        let ids: Vec<PropertyId> = self.archive.onode(self.id).properties.values().collect();
        for pid in ids {
            self.archive.pnode_mut(pid).parent = None;
        }
        self.archive.onode_mut(self.id).properties.clear();
        Ok(())
    }

    /// Drop samples set in memory.
    pub fn clear_samples(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.archive.onode_mut(self.id).samples.clear();
        Ok(())
    }

    pub fn clear_children(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.archive.populate_children(self.id)?;
        let ids: Vec<ObjectId> = self.archive.onode(self.id).children.values().collect();
        for child in ids {
            self.archive.onode_mut(child).parent = None;
        }
        self.archive.onode_mut(self.id).children.clear();
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.clear_properties()?;
        self.clear_samples()?;
        self.clear_children()
    }

    /// Detach from the parent and close this subtree. Closing twice is a
    /// no-op.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Some(parent) = self.parent() {
            self.archive.onode_mut(parent).children.remove_id(self.id);
        }
        self.archive.close_object(self.id);
    }
}

impl Archive {
    pub(crate) fn object_metadata(&self, id: ObjectId) -> MetaData {
        let node = self.onode(id);
        match (&node.meta, &node.reader) {
            (Some(meta), _) => meta.clone(),
            (None, Some(reader)) => reader.meta_data().clone(),
            (None, None) => MetaData::new(),
        }
    }

    pub(crate) fn object_path(&self, id: ObjectId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.onode(id);
            if node.variant == Variant::Top {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    fn is_ancestor(&self, candidate: ObjectId, mut of: ObjectId) -> bool {
        loop {
            if of == candidate {
                return true;
            }
            match self.onode(of).parent {
                Some(parent) => of = parent,
                None => return false,
            }
        }
    }

    /// Put `child` into `parent`'s children under `name`.
    pub(crate) fn attach_child(&mut self, parent: ObjectId, name: &str, child: ObjectId) -> Result<()> {
        if self.onode(parent).closed || self.onode(child).closed {
            return Err(Error::closed(format!("object {name}")));
        }
        if self.onode(child).variant == Variant::Top {
            return Err(Error::other("Top can not be a child"));
        }
        if self.is_ancestor(child, parent) {
            return Err(Error::other(format!("{name} can not be its own ancestor")));
        }
        self.populate_children(parent)?;

        if let Some(old) = self.onode(child).parent {
            self.onode_mut(old).children.remove_id(child);
        }
        let node = self.onode_mut(child);
        node.name = name.to_string();
        node.parent = Some(parent);
        if let Some(displaced) = self.onode_mut(parent).children.insert(name, child) {
            if displaced != child {
                self.onode_mut(displaced).parent = None;
            }
        }
        Ok(())
    }

    pub(crate) fn child_at(&mut self, id: ObjectId, path: &str) -> Result<Option<ObjectId>> {
        let (head, rest) = split_path(path);
        self.populate_children(id)?;
        match (self.onode(id).children.get(head), rest) {
            (Some(child), Some(rest)) => self.child_at(child, rest),
            (found, None) => Ok(found),
            (None, Some(_)) => Ok(None),
        }
    }

    pub(crate) fn set_child_at(&mut self, id: ObjectId, path: &str, child: ObjectId) -> Result<()> {
        let (head, rest) = split_path(path);
        let Some(rest) = rest else {
            return self.attach_child(id, head, child);
        };
        self.populate_children(id)?;
        let next = match self.onode(id).children.get(head) {
            Some(existing) => existing,
            None => {
                let xform = self.new_object(head, Variant::Xform);
                self.attach_child(id, head, xform)?;
                xform
            }
        };
        self.set_child_at(next, rest, child)
    }

    pub(crate) fn object_samples(&mut self, id: ObjectId) -> Result<Vec<Sample>> {
        let node = self.onode(id);
        if !node.samples.is_empty() {
            return Ok(node.samples.clone());
        }
        if let Some(samples) = &node.read_samples {
            return Ok(samples.clone());
        }
        let Some(reader) = node.reader.clone() else {
            return Ok(Vec::new());
        };
        let decoded: Result<Vec<Sample>> = match node.variant {
            Variant::Xform => read_xform_samples(&reader).map(|s| s.into_iter().map(Sample::from).collect()),
            Variant::Camera | Variant::Light => read_camera_samples(&reader, node.variant == Variant::Light)
                .map(|s| s.into_iter().map(Sample::from).collect()),
            _ => Ok(Vec::new()),
        };
        let decoded = decoded.unwrap_or_else(|e| {
            tracing::warn!(object = %reader.full_name(), "failed to decode samples: {e}");
            Vec::new()
        });
        self.onode_mut(id).read_samples = Some(decoded.clone());
        Ok(decoded)
    }

    /// Time sampling and sample count that give an object its own frame
    /// range, if it has one.
    pub(crate) fn frame_source(&mut self, id: ObjectId) -> Result<Option<(u32, usize)>> {
        let node = self.onode(id);
        if let (Some(reader), Some(schema)) = (&node.reader, node.variant.schema_compound()) {
            let reader = reader.clone();
            if let Some(compound) = reader.properties()?.into_iter().find(|p| p.name() == schema) {
                let best = compound
                    .sub_properties()?
                    .into_iter()
                    .filter(|p| !p.is_compound())
                    .max_by_key(|p| p.num_samples());
                if let Some(p) = best {
                    return Ok(Some((p.time_sampling_index(), p.num_samples())));
                }
            }
        }
        let node = self.onode(id);
        if !node.samples.is_empty() {
            return Ok(Some((self.object_tsid(id), node.samples.len())));
        }
        Ok(None)
    }

    pub(crate) fn close_object(&mut self, id: ObjectId) {
        let node = self.onode(id);
        let children: Vec<ObjectId> = node.children.values().collect();
        let props: Vec<PropertyId> = node.properties.values().collect();
        for child in children {
            self.close_object(child);
        }
        for prop in props {
            self.close_property(prop);
        }
        close_object_node(self.onode_mut(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cask::samples::CameraSample;
    use glam::DVec3;

    #[test]
    fn test_top_rename_fails() {
        let mut archive = Archive::new();
        let top = archive.top();
        assert!(matches!(archive.obj(top).set_name("x"), Err(Error::RootRename)));
        assert_eq!(archive.obj(top).path(), "/");
    }

    #[test]
    fn test_deep_set_child_creates_xforms() {
        let mut archive = Archive::new();
        let top = archive.top();
        let mesh = archive.new_object("temp", Variant::PolyMesh);
        archive.obj(top).set_child("a/b/mesh", mesh).unwrap();

        let obj = archive.obj(mesh);
        assert_eq!(obj.name(), "mesh");
        assert_eq!(obj.path(), "/a/b/mesh");
        let a = archive.obj(top).child("a").unwrap().unwrap();
        assert_eq!(archive.obj(a).variant(), Variant::Xform);
        assert_eq!(archive.obj(top).child("/a/b/mesh/").unwrap(), Some(mesh));
    }

    #[test]
    fn test_rename_displaces_sibling() {
        let mut archive = Archive::new();
        let top = archive.top();
        let x = archive.new_object("x", Variant::Xform);
        let y = archive.new_object("y", Variant::Xform);
        archive.obj(top).add_child(x).unwrap();
        archive.obj(top).add_child(y).unwrap();
        archive.obj(x).set_name("y").unwrap();

        let mut top_obj = archive.obj(top);
        let children = top_obj.children().unwrap();
        assert_eq!(children.keys().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(children.get("y"), Some(x));
        assert_eq!(archive.obj(y).parent(), None);
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut archive = Archive::new();
        let top = archive.top();
        let a = archive.new_object("a", Variant::Xform);
        let b = archive.new_object("b", Variant::Xform);
        let c = archive.new_object("c", Variant::Object);
        archive.obj(top).add_child(a).unwrap();
        archive.obj(top).add_child(b).unwrap();
        archive.obj(c).set_parent(a).unwrap();
        archive.obj(c).set_parent(b).unwrap();
        assert!(archive.obj(a).is_leaf().unwrap());
        assert_eq!(archive.obj(c).path(), "/b/c");
        assert!(archive.obj(a).set_parent(c).is_ok());
        assert!(archive.obj(b).set_parent(a).is_err());
    }

    #[test]
    fn test_set_sample_checks_variant() {
        let mut archive = Archive::new();
        let x = archive.new_object("x", Variant::Xform);
        let err = archive.obj(x).set_sample(CameraSample::default(), None).unwrap_err();
        assert!(matches!(err, Error::SampleMismatch { .. }));

        let mut obj = archive.obj(x);
        obj.set_sample(XformSample::identity(), None).unwrap();
        obj.set_sample(XformSample::from_ops(vec![XformOp::translate(1.0, 0.0, 0.0)]), Some(5))
            .unwrap();
        assert_eq!(obj.samples().unwrap().len(), 2);
    }

    #[test]
    fn test_global_matrix() {
        let mut archive = Archive::new();
        let top = archive.top();
        let parent = archive.new_object("parent", Variant::Xform);
        let child = archive.new_object("child", Variant::Xform);
        archive.obj(top).add_child(parent).unwrap();
        archive.obj(parent).add_child(child).unwrap();
        archive
            .obj(parent)
            .set_sample(XformSample::from_ops(vec![XformOp::translate(10.0, 0.0, 0.0)]), None)
            .unwrap();
        archive.obj(child).set_scale(2.0, 2.0, 2.0).unwrap();

        let world = archive.obj(child).global_matrix(0).unwrap();
        assert_eq!(world.transform_point3(DVec3::ONE), DVec3::new(12.0, 2.0, 2.0));
        assert!(archive.obj(top).matrix(0).is_err());
    }

    #[test]
    fn test_close_detaches() {
        let mut archive = Archive::new();
        let top = archive.top();
        let x = archive.new_object("x", Variant::Xform);
        let p = archive.new_property("p");
        archive.obj(top).add_child(x).unwrap();
        archive.obj(x).add_property(p).unwrap();

        archive.obj(x).close();
        archive.obj(x).close();
        assert!(archive.obj(top).is_leaf().unwrap());
        assert!(archive.obj(x).children().unwrap().is_empty());
        assert!(archive.obj(x).properties().unwrap().is_empty());
        assert!(archive.prop(p).is_closed());
        assert!(archive.obj(x).set_name("z").is_err());
    }
}
