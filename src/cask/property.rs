//! Property view: compound and simple property operations.
//!
//! A property is either compound (holds sub-properties) or simple (holds a
//! sequence of values, one per sample). Values of a read-derived property
//! are decoded from the file the first time they are asked for; a sample
//! that fails to decode becomes a [`Value::Error`] placeholder.

use crate::core::{MetaData, SampleSelector};
use crate::util::{DataType, Error, PlainOldDataType, Result};

use super::archive::{close_property_node, Archive, ObjectId, PropertyId, PropertyParent};
use super::coerce::{self, Value};
use super::container::{split_path, DeepContainer};

/// A mutable view of one property in an [`Archive`].
pub struct Property<'a> {
    archive: &'a mut Archive,
    id: PropertyId,
}

impl<'a> Property<'a> {
    pub(crate) fn new(archive: &'a mut Archive, id: PropertyId) -> Self {
        Self { archive, id }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn archive(&mut self) -> &mut Archive {
        self.archive
    }

    pub fn is_closed(&self) -> bool {
        self.archive.pnode(self.id).closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed(format!("property {}", self.name())));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.archive.pnode(self.id).name
    }

    /// Rename, moving the entry in the parent's container. A sibling with
    /// the same name is displaced.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let node = self.archive.pnode(self.id);
        let old = node.name.clone();
        let parent = node.parent;
        let displaced = match parent {
            Some(PropertyParent::Object(o)) => self.archive.onode_mut(o).properties.rename(&old, &name),
            Some(PropertyParent::Property(p)) => self.archive.pnode_mut(p).properties.rename(&old, &name),
            None => None,
        };
        if let Some(displaced) = displaced.filter(|d| *d != self.id) {
            self.archive.pnode_mut(displaced).parent = None;
        }
        self.archive.pnode_mut(self.id).name = name;
        Ok(())
    }

    pub fn parent(&self) -> Option<PropertyParent> {
        self.archive.pnode(self.id).parent
    }

    /// The object this property belongs to, through any compound parents.
    pub fn object(&self) -> Option<ObjectId> {
        self.archive.property_object(self.id)
    }

    pub fn path(&self) -> String {
        self.archive.property_path(self.id)
    }

    pub fn type_name(&self) -> &'static str {
        if self.is_compound() {
            "Compound Property"
        } else {
            "Property"
        }
    }

    /// Metadata, read from the handle once and kept.
    pub fn metadata(&mut self) -> &MetaData {
        if self.archive.pnode(self.id).meta.is_none() {
            let meta = self.archive.property_metadata(self.id);
            self.archive.pnode_mut(self.id).meta = Some(meta);
        }
        self.archive.pnode_mut(self.id).meta.get_or_insert_with(MetaData::new)
    }

    pub fn set_metadata(&mut self, meta: MetaData) -> Result<()> {
        self.ensure_open()?;
        self.archive.pnode_mut(self.id).meta = Some(meta);
        Ok(())
    }

    /// Element type: the stored one for read properties, else inferred
    /// from the first value.
    pub fn datatype(&mut self) -> Result<DataType> {
        self.archive.property_datatype(self.id)
    }

    pub fn set_datatype(&mut self, data_type: DataType) -> Result<()> {
        self.ensure_open()?;
        self.archive.pnode_mut(self.id).data_type = Some(data_type);
        Ok(())
    }

    pub fn pod(&mut self) -> Result<PlainOldDataType> {
        Ok(self.datatype()?.pod)
    }

    pub fn extent(&mut self) -> Result<u8> {
        Ok(self.datatype()?.extent)
    }

    /// A stored compound, or a new property with sub-properties.
    pub fn is_compound(&self) -> bool {
        self.archive.property_is_compound(self.id)
    }

    pub fn is_array(&self) -> bool {
        !self.is_compound() && self.archive.property_is_array(self.id)
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_compound() && !self.archive.property_is_array(self.id)
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_compound()
    }

    pub fn time_sampling_id(&self) -> u32 {
        self.archive.property_tsid(self.id)
    }

    pub fn set_time_sampling_id(&mut self, id: u32) -> Result<()> {
        self.ensure_open()?;
        self.archive.pnode_mut(self.id).tsid = Some(id);
        Ok(())
    }

    pub fn properties(&mut self) -> Result<&DeepContainer<PropertyId>> {
        self.archive.populate_sub_properties(self.id)?;
        Ok(&self.archive.pnode(self.id).properties)
    }

    pub fn property(&mut self, path: &str) -> Result<Option<PropertyId>> {
        let (head, rest) = split_path(path);
        self.archive.populate_sub_properties(self.id)?;
        match (self.archive.pnode(self.id).properties.get(head), rest) {
            (Some(pid), Some(rest)) => self.archive.prop(pid).property(rest),
            (found, None) => Ok(found),
            (None, Some(_)) => Ok(None),
        }
    }

    /// Place `prop` at a slash-separated path below this property, creating
    /// missing compounds on the way.
    pub fn set_property(&mut self, path: &str, prop: PropertyId) -> Result<()> {
        self.ensure_open()?;
        let (head, rest) = split_path(path);
        let parent = PropertyParent::Property(self.id);
        match rest {
            None => self.archive.attach_property(parent, head, prop),
            Some(rest) => {
                self.archive.populate_sub_properties(self.id)?;
                let compound = match self.archive.pnode(self.id).properties.get(head) {
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

    /// Attach `prop` under its own name. Fails if this property holds values.
    pub fn add_property(&mut self, prop: PropertyId) -> Result<PropertyId> {
        let name = self.archive.pnode(prop).name.clone();
        self.archive
            .attach_property(PropertyParent::Property(self.id), &name, prop)?;
        Ok(prop)
    }

    /// All values, decoding every stored sample on first access.
    pub fn values(&mut self) -> Result<&[Value]> {
        Ok(self.archive.property_values(self.id)?.as_slice())
    }

    /// Index a selector resolves to. Times and frames map to the nearest
    /// stored sample.
    pub fn sample_index(&mut self, selector: SampleSelector) -> Result<usize> {
        let fps = self.archive.fps();
        let Some(time) = selector.time(fps) else {
            return Ok(match selector {
                SampleSelector::Index(i) => i,
                _ => 0,
            });
        };
        let count = self.archive.property_values(self.id)?.len();
        let ts = self.archive.time_sampling(self.archive.property_tsid(self.id));
        Ok(ts.near_index(time, count).0)
    }

    /// Value at the selected sample, the first one by default.
    pub fn get_value(&mut self, selector: Option<SampleSelector>) -> Result<Value> {
        let index = self.sample_index(selector.unwrap_or_default())?;
        let values = self.archive.property_values(self.id)?;
        values.get(index).cloned().ok_or(Error::SampleOutOfBounds {
            index,
            count: values.len(),
        })
    }

    /// Set the value at the selected sample, or append when no selector is
    /// given. An index at or past the end appends.
    pub fn set_value(&mut self, value: impl Into<Value>, selector: Option<SampleSelector>) -> Result<()> {
        self.ensure_open()?;
        let value = value.into();
        let index = match selector {
            Some(selector) => Some(self.sample_index(selector)?),
            None => None,
        };
        let values = self.archive.property_values(self.id)?;
        match index {
            Some(i) if i < values.len() => values[i] = value,
            _ => values.push(value),
        }
        Ok(())
    }

    /// Detach and drop every sub-property.
    pub fn clear_properties(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.archive.populate_sub_properties(self.id)?;
        let ids: Vec<PropertyId> = self.archive.pnode(self.id).properties.values().collect();
        for pid in ids {
            self.archive.pnode_mut(pid).parent = None;
        }
        self.archive.pnode_mut(self.id).properties.clear();
        Ok(())
    }

    /// Drop all values, stored ones included.
    pub fn clear_values(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.archive.pnode_mut(self.id).values = Some(Vec::new());
        Ok(())
    }

    /// Detach from the parent and close the subtree. Closing twice is a
    /// no-op.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        match self.parent() {
            Some(PropertyParent::Object(o)) => {
                self.archive.onode_mut(o).properties.remove_id(self.id);
            }
            Some(PropertyParent::Property(p)) => {
                self.archive.pnode_mut(p).properties.remove_id(self.id);
            }
            None => {}
        }
        self.archive.close_property(self.id);
    }
}

impl Archive {
    pub(crate) fn property_metadata(&self, id: PropertyId) -> MetaData {
        let node = self.pnode(id);
        match (&node.meta, &node.reader) {
            (Some(meta), _) => meta.clone(),
            (None, Some(reader)) => reader.meta_data().clone(),
            (None, None) => MetaData::new(),
        }
    }

    pub(crate) fn property_object(&self, mut id: PropertyId) -> Option<ObjectId> {
        loop {
            match self.pnode(id).parent? {
                PropertyParent::Object(o) => return Some(o),
                PropertyParent::Property(p) => id = p,
            }
        }
    }

    pub(crate) fn property_path(&self, mut id: PropertyId) -> String {
        let mut names = vec![self.pnode(id).name.as_str()];
        let object = loop {
            match self.pnode(id).parent {
                Some(PropertyParent::Property(p)) => {
                    names.push(self.pnode(p).name.as_str());
                    id = p;
                }
                Some(PropertyParent::Object(o)) => break Some(o),
                None => break None,
            }
        };
        names.reverse();
        let tail = names.join("/");
        match object.map(|o| self.object_path(o)) {
            Some(base) if base == "/" => format!("/{tail}"),
            Some(base) => format!("{base}/{tail}"),
            None => tail,
        }
    }

    pub(crate) fn property_is_compound(&self, id: PropertyId) -> bool {
        let node = self.pnode(id);
        match &node.reader {
            Some(reader) => reader.is_compound(),
            None => !node.properties.is_empty() && node.values.as_ref().map_or(true, Vec::is_empty),
        }
    }

    pub(crate) fn property_is_array(&self, id: PropertyId) -> bool {
        let node = self.pnode(id);
        match (&node.reader, &node.values) {
            (Some(reader), _) => reader.is_array(),
            (None, Some(values)) => values.first().is_some_and(coerce::is_array_value),
            (None, None) => false,
        }
    }

    /// True if the property holds, or has stored, at least one value.
    fn property_has_values(&self, id: PropertyId) -> bool {
        let node = self.pnode(id);
        match (&node.values, &node.reader) {
            (Some(values), _) => !values.is_empty(),
            (None, Some(reader)) => !reader.is_compound() && reader.num_samples() > 0,
            (None, None) => false,
        }
    }

    pub(crate) fn property_datatype(&mut self, id: PropertyId) -> Result<DataType> {
        let node = self.pnode(id);
        if let Some(dt) = node.data_type {
            return Ok(dt);
        }
        if let Some(reader) = &node.reader {
            let dt = reader.data_type();
            self.pnode_mut(id).data_type = Some(dt);
            return Ok(dt);
        }
        let array = self.property_is_array(id);
        let node = self.pnode(id);
        let Some(first) = node.values.as_ref().and_then(|v| v.first()) else {
            return Ok(DataType::UNKNOWN);
        };
        let dt = coerce::infer_data_type(first, !array).map_err(|e| match e {
            Error::UnknownDataType { value, .. } => Error::UnknownDataType {
                name: node.name.clone(),
                value,
            },
            other => other,
        })?;
        self.pnode_mut(id).data_type = Some(dt);
        Ok(dt)
    }

    /// Values of a simple property, decoded from the reader once.
    pub(crate) fn property_values(&mut self, id: PropertyId) -> Result<&mut Vec<Value>> {
        let node = self.pnode(id);
        if node.closed {
            return Err(Error::closed(format!("property {}", node.name)));
        }
        if self.property_is_compound(id) {
            return Err(Error::CompoundValue(node.name.clone()));
        }
        if node.values.is_none() {
            let decoded = match &node.reader {
                Some(reader) => {
                    let data_type = reader.data_type();
                    let array = reader.is_array();
                    (0..reader.num_samples())
                        .map(|index| {
                            reader
                                .sample(index)
                                .and_then(|raw| coerce::decode(&raw.bytes, data_type, array))
                                .unwrap_or_else(|e| {
                                    tracing::warn!(property = %reader.name(), index, "failed to decode sample: {e}");
                                    Value::Error(e.to_string())
                                })
                        })
                        .collect()
                }
                None => Vec::new(),
            };
            self.pnode_mut(id).values = Some(decoded);
        }
        Ok(self.pnode_mut(id).values.get_or_insert_with(Vec::new))
    }

    /// Put `prop` into `parent`'s properties under `name`.
    pub(crate) fn attach_property(&mut self, parent: PropertyParent, name: &str, prop: PropertyId) -> Result<()> {
        if self.pnode(prop).closed {
            return Err(Error::closed(format!("property {name}")));
        }
        match parent {
            PropertyParent::Object(o) => {
                if self.onode(o).closed {
                    return Err(Error::closed(format!("object {}", self.onode(o).name)));
                }
                self.populate_properties(o)?;
            }
            PropertyParent::Property(p) => {
                if self.pnode(p).closed {
                    return Err(Error::closed(format!("property {}", self.pnode(p).name)));
                }
                if self.property_has_values(p) {
                    return Err(Error::ValueSubProperty(self.pnode(p).name.clone()));
                }
                let mut ancestor = Some(p);
                while let Some(a) = ancestor {
                    if a == prop {
                        return Err(Error::other(format!("{name} can not contain itself")));
                    }
                    ancestor = match self.pnode(a).parent {
                        Some(PropertyParent::Property(next)) => Some(next),
                        _ => None,
                    };
                }
                self.populate_sub_properties(p)?;
            }
        }

        match self.pnode(prop).parent {
            Some(PropertyParent::Object(o)) => {
                self.onode_mut(o).properties.remove_id(prop);
            }
            Some(PropertyParent::Property(p)) => {
                self.pnode_mut(p).properties.remove_id(prop);
            }
            None => {}
        }
        let node = self.pnode_mut(prop);
        node.name = name.to_string();
        node.parent = Some(parent);
        let displaced = match parent {
            PropertyParent::Object(o) => self.onode_mut(o).properties.insert(name, prop),
            PropertyParent::Property(p) => self.pnode_mut(p).properties.insert(name, prop),
        };
        if let Some(displaced) = displaced.filter(|d| *d != prop) {
            self.pnode_mut(displaced).parent = None;
        }
        Ok(())
    }

    pub(crate) fn close_property(&mut self, id: PropertyId) {
        let subs: Vec<PropertyId> = self.pnode(id).properties.values().collect();
        for sub in subs {
            self.close_property(sub);
        }
        close_property_node(self.pnode_mut(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cask::variant::Variant;

    fn attached(archive: &mut Archive, name: &str) -> PropertyId {
        let x = archive.new_object("x", Variant::Xform);
        let top = archive.top();
        archive.obj(top).add_child(x).unwrap();
        let p = archive.new_property(name);
        archive.obj(x).add_property(p).unwrap();
        p
    }

    #[test]
    fn test_append_past_end() {
        let mut archive = Archive::new();
        let p = attached(&mut archive, "width");
        let mut prop = archive.prop(p);
        prop.set_value(1.0f32, None).unwrap();
        prop.set_value(2.0f32, None).unwrap();
        prop.set_value(3.0f32, Some(SampleSelector::Index(5))).unwrap();
        prop.set_value(9.0f32, Some(SampleSelector::Index(0))).unwrap();
        assert_eq!(
            prop.values().unwrap(),
            &[Value::Float32(9.0), Value::Float32(2.0), Value::Float32(3.0)]
        );
        assert_eq!(prop.get_value(None).unwrap(), Value::Float32(9.0));
        assert!(matches!(
            prop.get_value(Some(SampleSelector::Index(7))),
            Err(Error::SampleOutOfBounds { index: 7, count: 3 })
        ));
    }

    #[test]
    fn test_compound_value_exclusive() {
        let mut archive = Archive::new();
        let parent = attached(&mut archive, "parent");
        let child = archive.new_property("child");
        archive.prop(parent).add_property(child).unwrap();
        assert!(archive.prop(parent).is_compound());
        assert_eq!(archive.prop(parent).type_name(), "Compound Property");
        assert!(matches!(
            archive.prop(parent).set_value(1, None),
            Err(Error::CompoundValue(_))
        ));

        let valued = archive.new_property("valued");
        archive.prop(valued).set_value("a", None).unwrap();
        let extra = archive.new_property("extra");
        assert!(matches!(
            archive.prop(valued).add_property(extra),
            Err(Error::ValueSubProperty(_))
        ));
    }

    #[test]
    fn test_deep_set_property() {
        let mut archive = Archive::new();
        let x = archive.new_object("x", Variant::Xform);
        let top = archive.top();
        archive.obj(top).add_child(x).unwrap();
        let p = archive.new_property("tmp");
        archive.obj(x).set_property(".arbGeomParams/color", p).unwrap();

        assert_eq!(archive.prop(p).name(), "color");
        assert_eq!(archive.prop(p).path(), "/x/.arbGeomParams/color");
        assert_eq!(archive.prop(p).object(), Some(x));
        let found = archive.obj(x).property(".arbGeomParams/color").unwrap();
        assert_eq!(found, Some(p));
    }

    #[test]
    fn test_datatype_inferred_and_named() {
        let mut archive = Archive::new();
        let p = attached(&mut archive, "bad");
        assert_eq!(archive.prop(p).datatype().unwrap(), DataType::UNKNOWN);
        archive.prop(p).set_value(Value::List(vec![]), None).unwrap();
        match archive.prop(p).datatype() {
            Err(Error::UnknownDataType { name, .. }) => assert_eq!(name, "bad"),
            other => panic!("unexpected {other:?}"),
        }

        let v = attached(&mut archive, "v");
        archive.prop(v).set_value(glam::Vec3::ONE, None).unwrap();
        assert_eq!(archive.prop(v).datatype().unwrap(), DataType::VEC3F);
        assert!(archive.prop(v).is_scalar());
    }

    #[test]
    fn test_rename_property() {
        let mut archive = Archive::new();
        let a = attached(&mut archive, "a");
        archive.prop(a).set_name("b").unwrap();
        let x = archive.prop(a).object().unwrap();
        let mut obj = archive.obj(x);
        let keys: Vec<&str> = obj.properties().unwrap().keys().collect();
        assert_eq!(keys, vec!["b"]);
    }
}
