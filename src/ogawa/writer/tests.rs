use super::*;
use crate::core::{MetaData, TimeSampling};
use crate::ogawa::format::*;
use crate::ogawa::OgawaArchiveReader;
use crate::util::DataType;
use std::fs::File;
use std::io::Read;
use tempfile::NamedTempFile;

#[test]
fn test_write_empty_archive() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    OArchive::create(temp.path())?.close()?;

    let mut header = [0u8; HEADER_SIZE];
    File::open(temp.path())?.read_exact(&mut header)?;
    assert_eq!(&header[0..5], OGAWA_MAGIC);
    assert_eq!(header[FROZEN_OFFSET], FROZEN_FLAG);
    assert_eq!(&header[VERSION_OFFSET..VERSION_OFFSET + 2], &[0, 1]);

    let reader = OgawaArchiveReader::open(temp.path(), false)?;
    assert_eq!(reader.library_version(), ALEMBIC_LIBRARY_VERSION);
    assert!(reader.top().children()?.is_empty());
    Ok(())
}

#[test]
fn test_scalar_changed_indices() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let mut archive = OArchive::create(temp.path())?;
    let ts = archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0));
    assert_eq!(ts, 1);

    let mut prop = OProperty::scalar("width", DataType::FLOAT32).with_time_sampling(ts);
    for v in [1.0f32, 1.0, 2.0, 3.0, 3.0] {
        prop.push_scalar(v.to_le_bytes().to_vec());
    }
    let mut top = OObject::new("ABC");
    let mut child = OObject::new("node");
    child.add_property(prop);
    top.children.push(child);
    archive.write_archive(&top)?;

    let reader = OgawaArchiveReader::open(temp.path(), true)?;
    assert_eq!(reader.max_samples(1), Some(5));
    let node = &reader.top().children()?[0];
    assert_eq!(node.name(), "node");
    assert_eq!(node.full_name(), "/node");
    let width = &node.properties()?[0];
    assert_eq!(width.num_samples(), 5);
    assert_eq!(width.header().first_changed_index, 2);
    assert_eq!(width.header().last_changed_index, 3);
    assert_eq!(width.time_sampling_index(), 1);

    let values: Vec<f32> = (0..5)
        .map(|i| {
            let raw = width.sample(i).expect("sample");
            f32::from_le_bytes([raw.bytes[0], raw.bytes[1], raw.bytes[2], raw.bytes[3]])
        })
        .collect();
    assert_eq!(values, vec![1.0, 1.0, 2.0, 3.0, 3.0]);
    Ok(())
}

#[test]
fn test_constant_property_and_metadata() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let mut archive = OArchive::create(temp.path())?;

    let mut meta = MetaData::new();
    meta.set("interpretation", "box");
    let mut prop = OProperty::scalar(".childBnds", DataType::BOX3D).with_meta_data(meta);
    let bytes: Vec<u8> = [0.0f64; 6].iter().flat_map(|v| v.to_le_bytes()).collect();
    prop.push_scalar(bytes.clone());
    prop.push_scalar(bytes);

    let mut xform = OProperty::compound(".xform");
    xform.add_child(prop);
    let mut top = OObject::new("ABC");
    let mut node = OObject::new("xf");
    node.add_property(xform);
    top.children.push(node);
    archive.write_archive(&top)?;

    let reader = OgawaArchiveReader::open(temp.path(), false)?;
    let xf = &reader.top().children()?[0];
    let compound = &xf.properties()?[0];
    assert!(compound.is_compound());
    let bnds = &compound.sub_properties()?[0];
    assert!(bnds.is_constant());
    assert_eq!(bnds.num_samples(), 2);
    assert_eq!(bnds.meta_data().interpretation(), Some("box"));
    assert_eq!(bnds.sample(1)?.bytes.len(), 48);
    Ok(())
}

#[test]
fn test_array_dims_and_dedup() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let mut archive = OArchive::create(temp.path())?;

    let points: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let mut p = OProperty::array("P", DataType::VEC3F);
    p.push_array(ArraySample::new(points.clone(), vec![2]));
    let mut q = OProperty::array("Q", DataType::VEC3F);
    q.push_array(ArraySample::new(points, vec![2]));
    let mut names = OProperty::array("names", DataType::STRING);
    names.push_array(ArraySample::new(b"a\0bc\0".to_vec(), vec![2]));

    let mut top = OObject::new("ABC");
    top.add_property(p);
    top.add_property(q);
    top.add_property(names);
    archive.write_archive(&top)?;
    assert_eq!(archive.num_stored_payloads(), 2);

    let reader = OgawaArchiveReader::open(temp.path(), false)?;
    let props = reader.top().properties()?;
    assert_eq!(props.len(), 3);
    let raw = props[0].sample(0)?;
    assert_eq!(raw.bytes.len(), 24);
    assert_eq!(raw.dims, None);
    assert!(!props[0].header().is_scalar_like);
    let raw = props[2].sample(0)?;
    assert_eq!(raw.dims, Some(vec![2]));
    assert_eq!(raw.bytes, b"a\0bc\0".to_vec());
    Ok(())
}
