//! Tree queries and subtree copies.

use std::path::Path;

use regex::Regex;

use crate::core::MetaData;
use crate::ogawa::{OgawaArchiveReader, OgawaObjectReader, OgawaPropertyReader};
use crate::util::{DataType, Result};

use super::archive::{Archive, ObjectId, PropertyId, PropertyParent};
use super::coerce::Value;
use super::samples::Sample;
use super::variant::Variant;

/// Depth-first, pre-order iterator over objects whose name matches a
/// pattern. Children are wrapped lazily as the walk reaches them.
pub struct FindIter<'a> {
    archive: &'a mut Archive,
    stack: Vec<ObjectId>,
    pattern: Regex,
    types: Option<Vec<Variant>>,
}

impl Iterator for FindIter<'_> {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Err(e) = self.archive.populate_children(id) {
                return Some(Err(e));
            }
            let node = self.archive.onode(id);
            self.stack.extend(node.children.values().collect::<Vec<_>>().into_iter().rev());

            let type_ok = self.types.as_ref().map_or(true, |t| t.contains(&node.variant));
            if type_ok && self.pattern.is_match(&node.name) {
                return Some(Ok(id));
            }
        }
        None
    }
}

struct ObjectSnapshot {
    name: String,
    variant: Variant,
    meta: MetaData,
    tsid: Option<u32>,
    reader: Option<OgawaObjectReader>,
    samples: Vec<Sample>,
    read_samples: Option<Vec<Sample>>,
    children: Vec<ObjectSnapshot>,
    properties: Vec<PropertySnapshot>,
}

struct PropertySnapshot {
    name: String,
    meta: MetaData,
    data_type: Option<DataType>,
    values: Option<Vec<Value>>,
    tsid: Option<u32>,
    reader: Option<OgawaPropertyReader>,
    properties: Vec<PropertySnapshot>,
}

impl Archive {
    /// Objects at or below `root` whose whole name matches `pattern`,
    /// optionally restricted to some variants. Lazy and unsorted.
    pub fn find_iter(
        &mut self,
        root: ObjectId,
        pattern: &str,
        types: Option<&[Variant]>,
    ) -> Result<FindIter<'_>> {
        let pattern = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(FindIter {
            archive: self,
            stack: vec![root],
            pattern,
            types: types.map(<[Variant]>::to_vec),
        })
    }

    /// Like [`find_iter`](Self::find_iter) from Top, collected and sorted
    /// by name.
    pub fn find(&mut self, pattern: &str, types: Option<&[Variant]>) -> Result<Vec<ObjectId>> {
        let top = self.top();
        let mut found = self.find_iter(top, pattern, types)?.collect::<Result<Vec<_>>>()?;
        found.sort_by(|a, b| self.onode(*a).name.cmp(&self.onode(*b).name));
        Ok(found)
    }

    /// True if `path` opens as an archive.
    pub fn is_valid(path: impl AsRef<Path>) -> bool {
        OgawaArchiveReader::open(path, false).is_ok()
    }

    /// Wrap a read handle as a detached object with the variant its
    /// metadata matches.
    pub fn wrap(&mut self, reader: &OgawaObjectReader, tsid: Option<u32>) -> ObjectId {
        let tsid = tsid.unwrap_or(self.time_sampling_id());
        self.wrap_object(reader, None, tsid)
    }

    /// Deep copy of an object subtree, detached, optionally renamed.
    ///
    /// The copy shares read handles with the original but owns its values,
    /// samples and containers.
    pub fn copy_object(&mut self, id: ObjectId, name: Option<&str>) -> Result<ObjectId> {
        self.check_object(id)?;
        let mut snapshot = self.snapshot_object(id)?;
        snapshot.tsid = Some(self.object_tsid(id));
        if let Some(name) = name {
            snapshot.name = name.to_string();
        }
        Ok(self.restore_object(snapshot, None))
    }

    /// Deep copy of a property subtree, detached, optionally renamed.
    pub fn copy_property(&mut self, id: PropertyId, name: Option<&str>) -> Result<PropertyId> {
        self.check_property(id)?;
        let mut snapshot = self.snapshot_property(id)?;
        snapshot.tsid = Some(self.property_tsid(id));
        if let Some(name) = name {
            snapshot.name = name.to_string();
        }
        Ok(self.restore_property(snapshot, None))
    }

    /// Deep copy of an object subtree from another archive. Time samplings
    /// the subtree uses are added to this archive.
    pub fn import_object(&mut self, source: &mut Archive, id: ObjectId, name: Option<&str>) -> Result<ObjectId> {
        source.check_object(id)?;
        let mut snapshot = source.snapshot_object(id)?;
        snapshot.tsid = Some(source.object_tsid(id));
        if let Some(name) = name {
            snapshot.name = name.to_string();
        }
        let tsmap: Vec<u32> = source
            .timesamplings()
            .iter()
            .map(|ts| self.add_timesampling(ts.clone()))
            .collect();
        Ok(self.restore_object(snapshot, Some(&tsmap)))
    }

    fn snapshot_object(&mut self, id: ObjectId) -> Result<ObjectSnapshot> {
        self.populate_children(id)?;
        self.populate_properties(id)?;
        let node = self.onode(id);
        let child_ids: Vec<ObjectId> = node.children.values().collect();
        let prop_ids: Vec<PropertyId> = node.properties.values().collect();
        let mut snapshot = ObjectSnapshot {
            name: node.name.clone(),
            variant: node.variant,
            meta: self.object_metadata(id),
            tsid: node.tsid,
            reader: node.reader.clone(),
            samples: node.samples.clone(),
            read_samples: node.read_samples.clone(),
            children: Vec::with_capacity(child_ids.len()),
            properties: Vec::with_capacity(prop_ids.len()),
        };
        for child in child_ids {
            snapshot.children.push(self.snapshot_object(child)?);
        }
        for prop in prop_ids {
            snapshot.properties.push(self.snapshot_property(prop)?);
        }
        Ok(snapshot)
    }

    fn snapshot_property(&mut self, id: PropertyId) -> Result<PropertySnapshot> {
        self.populate_sub_properties(id)?;
        let node = self.pnode(id);
        let sub_ids: Vec<PropertyId> = node.properties.values().collect();
        let mut snapshot = PropertySnapshot {
            name: node.name.clone(),
            meta: self.property_metadata(id),
            data_type: node.data_type,
            values: node.values.clone(),
            tsid: node.tsid,
            reader: node.reader.clone(),
            properties: Vec::with_capacity(sub_ids.len()),
        };
        for sub in sub_ids {
            snapshot.properties.push(self.snapshot_property(sub)?);
        }
        Ok(snapshot)
    }

    fn restore_object(&mut self, snapshot: ObjectSnapshot, tsmap: Option<&[u32]>) -> ObjectId {
        let variant = match snapshot.variant {
            Variant::Top => Variant::Object,
            v => v,
        };
        let id = self.new_object(snapshot.name, variant);
        let node = self.onode_mut(id);
        node.meta = Some(snapshot.meta);
        node.tsid = snapshot.tsid.map(|t| remap_tsid(tsmap, t));
        node.reader = snapshot.reader;
        node.samples = snapshot.samples;
        node.read_samples = snapshot.read_samples;

        for child in snapshot.children {
            let name = child.name.clone();
            let child_id = self.restore_object(child, tsmap);
            self.onode_mut(child_id).parent = Some(id);
            self.onode_mut(id).children.insert(name, child_id);
        }
        for prop in snapshot.properties {
            let name = prop.name.clone();
            let prop_id = self.restore_property(prop, tsmap);
            self.pnode_mut(prop_id).parent = Some(PropertyParent::Object(id));
            self.onode_mut(id).properties.insert(name, prop_id);
        }
        id
    }

    fn restore_property(&mut self, snapshot: PropertySnapshot, tsmap: Option<&[u32]>) -> PropertyId {
        let id = self.new_property(snapshot.name);
        let node = self.pnode_mut(id);
        node.meta = Some(snapshot.meta);
        node.data_type = snapshot.data_type;
        node.values = snapshot.values;
        node.tsid = snapshot.tsid.map(|t| remap_tsid(tsmap, t));
        node.reader = snapshot.reader;

        for sub in snapshot.properties {
            let name = sub.name.clone();
            let sub_id = self.restore_property(sub, tsmap);
            self.pnode_mut(sub_id).parent = Some(PropertyParent::Property(id));
            self.pnode_mut(id).properties.insert(name, sub_id);
        }
        id
    }
}

fn remap_tsid(tsmap: Option<&[u32]>, tsid: u32) -> u32 {
    match tsmap {
        Some(map) => map.get(tsid as usize).copied().unwrap_or(0),
        None => tsid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Archive {
        let mut archive = Archive::new();
        let top = archive.top();
        for (path, variant) in [
            ("cube1/cube1Shape", Variant::PolyMesh),
            ("cube2/cube2Shape", Variant::PolyMesh),
            ("light1/lightShape1", Variant::Light),
        ] {
            let id = archive.new_object("tmp", variant);
            archive.obj(top).set_child(path, id).unwrap();
        }
        archive
    }

    #[test]
    fn test_find_full_match_sorted() {
        let mut archive = scene();
        let found = archive.find(".*Shape", None).unwrap();
        let names: Vec<&str> = found.iter().map(|id| archive.onode(*id).name.as_str()).collect();
        assert_eq!(names, vec!["cube1Shape", "cube2Shape"]);

        let lights = archive.find(".*", Some(&[Variant::Light])).unwrap();
        assert_eq!(lights.len(), 1);
        assert!(archive.find("(", None).is_err());
    }

    #[test]
    fn test_find_iter_preorder() {
        let mut archive = scene();
        let top = archive.top();
        let ids: Vec<ObjectId> = archive
            .find_iter(top, ".*", None)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let order: Vec<String> = ids.iter().map(|id| archive.onode(*id).name.clone()).collect();
        assert_eq!(order[0], "ABC");
        assert_eq!(order[1..3], ["cube1".to_string(), "cube1Shape".to_string()]);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut archive = scene();
        let cube = archive.obj(archive.top()).child("cube1").unwrap().unwrap();
        let p = archive.new_property("weight");
        archive.obj(cube).add_property(p).unwrap();
        archive.prop(p).set_value(1.0, None).unwrap();

        let copy = archive.copy_object(cube, Some("cube3")).unwrap();
        assert_eq!(archive.obj(copy).name(), "cube3");
        assert_eq!(archive.obj(copy).parent(), None);
        assert!(archive.obj(copy).child("cube1Shape").unwrap().is_some());

        let copied = archive.obj(copy).property("weight").unwrap().unwrap();
        assert_ne!(copied, p);
        archive.prop(copied).set_value(2.0, Some(0usize.into())).unwrap();
        assert_eq!(archive.prop(p).get_value(None).unwrap(), Value::Float(1.0));
        assert_eq!(archive.prop(copied).get_value(None).unwrap(), Value::Float(2.0));
        assert_eq!(
            archive.obj(copy).time_sampling_id(),
            archive.obj(cube).time_sampling_id()
        );
    }
}
