//! Write archives through the scene layer and read them back.

use cask::cask::{CameraSample, MeshSample, Sample, XformOp, XformSample};
use cask::core::SampleSelector;
use cask::util::PlainOldDataType as Pod;
use cask::{Archive, DataType, ObjectId, Value, Variant};
use glam::{DMat3, DMat4, DVec2, DVec3, Mat3, Mat4, Vec2, Vec3, Vec4};
use half::f16;
use tempfile::tempdir;

fn attach(archive: &mut Archive, path: &str, variant: Variant) -> ObjectId {
    let id = archive.new_object("tmp", variant);
    let top = archive.top();
    archive.obj(top).set_child(path, id).unwrap();
    id
}

#[test]
fn test_value_table_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("values.abc");

    let table: Vec<(&str, Value, DataType)> = vec![
        ("bool", Value::Bool(true), DataType::BOOL),
        ("int8", Value::int8(-7), DataType::new(Pod::Int8, 1)),
        ("uint8", Value::uint8(200), DataType::UINT8),
        ("int16", Value::int16(-300), DataType::new(Pod::Int16, 1)),
        ("uint16", Value::uint16(60000), DataType::new(Pod::Uint16, 1)),
        ("int32", Value::Int(-123456), DataType::INT32),
        ("uint32", Value::uint32(4_000_000_000), DataType::new(Pod::Uint32, 1)),
        ("int64", Value::int64(-1 << 40), DataType::new(Pod::Int64, 1)),
        ("uint64", Value::uint64(1 << 63), DataType::new(Pod::Uint64, 1)),
        ("half", Value::Float16(f16::from_f32(1.5)), DataType::new(Pod::Float16, 1)),
        ("float", Value::Float32(0.25), DataType::FLOAT32),
        ("double", Value::Float(-2.5), DataType::FLOAT64),
        ("string", Value::Str("hello".into()), DataType::STRING),
        ("v2f", Value::V2f(Vec2::new(1.0, 2.0)), DataType::VEC2F),
        ("v2d", Value::V2d(DVec2::new(-1.0, 0.5)), DataType::new(Pod::Float64, 2)),
        ("v3f", Value::V3f(Vec3::new(1.0, 2.0, 3.0)), DataType::VEC3F),
        ("v3d", Value::V3d(DVec3::new(1.0, 2.0, 3.0)), DataType::VEC3D),
        ("c3c", Value::Color3c([1, 2, 3]), DataType::new(Pod::Uint8, 3)),
        ("c4c", Value::Color4c([10, 20, 30, 255]), DataType::new(Pod::Uint8, 4)),
        ("c4f", Value::Color4f(Vec4::new(0.1, 0.2, 0.3, 1.0)), DataType::new(Pod::Float32, 4)),
        ("box3f", Value::Box3f(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)), DataType::new(Pod::Float32, 6)),
        ("box3d", Value::Box3d(DVec3::splat(-1.0), DVec3::ONE), DataType::BOX3D),
        ("m33f", Value::M33f(Mat3::from_diagonal(Vec3::new(1.0, 2.0, 3.0))), DataType::new(Pod::Float32, 9)),
        (
            "m33d",
            Value::M33d(DMat3::from_cols_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0])),
            DataType::new(Pod::Float64, 9),
        ),
        ("m44f", Value::M44f(Mat4::from_translation(Vec3::X)), DataType::new(Pod::Float32, 16)),
        ("m44d", Value::M44d(DMat4::from_scale(DVec3::splat(2.0))), DataType::MAT44D),
        ("ints", vec![1i32, 2, 3].into(), DataType::INT32),
        ("points", vec![Vec3::X, Vec3::Y].into(), DataType::VEC3F),
        ("names", vec!["a", "bb", ""].into(), DataType::STRING),
    ];

    {
        let mut archive = Archive::new();
        let node = attach(&mut archive, "node", Variant::Object);
        for (name, value, _) in &table {
            let p = archive.new_property(*name);
            archive.obj(node).set_property(&format!(".userProperties/{name}"), p).unwrap();
            archive.prop(p).set_value(value.clone(), None).unwrap();
        }
        let report = archive.write_to_file(&path, "value table").unwrap();
        assert!(report.is_clean(), "{:?}", report.failures());
    }

    let mut archive = Archive::open(&path).unwrap();
    let node = archive.obj(archive.top()).child("node").unwrap().unwrap();
    for (name, value, data_type) in table {
        let p = archive
            .obj(node)
            .property(&format!(".userProperties/{name}"))
            .unwrap()
            .unwrap_or_else(|| panic!("missing {name}"));
        let mut prop = archive.prop(p);
        assert_eq!(prop.datatype().unwrap(), data_type, "{name}");
        assert_eq!(prop.get_value(None).unwrap(), value, "{name}");
    }
}

#[test]
fn test_time_range_from_xform_samples() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anim.abc");
    {
        let mut archive = Archive::new();
        let x = attach(&mut archive, "mover", Variant::Xform);
        for i in 0..3 {
            let op = XformOp::translate(i as f64, 0.0, 0.0);
            archive.obj(x).set_sample(XformSample::from_ops(vec![op]), None).unwrap();
        }
        archive.write_to_file(&path, "").unwrap();
    }

    let mut archive = Archive::open(&path).unwrap();
    let (start, end) = archive.time_range();
    assert_eq!(start, 0.0);
    assert!((end - 2.0 / 24.0).abs() < 1e-12);
    assert_eq!(archive.frame_range(), (0, 2));

    let x = archive.obj(archive.top()).child("mover").unwrap().unwrap();
    let mut mover = archive.obj(x);
    assert_eq!(mover.start_frame().unwrap(), 0);
    assert_eq!(mover.end_frame().unwrap(), 2);
    assert_eq!(mover.samples().unwrap().len(), 3);
    let m = mover.matrix(2).unwrap();
    assert_eq!(m.transform_point3(DVec3::ZERO), DVec3::new(2.0, 0.0, 0.0));
    assert!(mover.is_animated().unwrap());

    let info = archive.info();
    assert_eq!(info.get("dccFPS").map(String::as_str), Some("24"));
    assert!(info["appName"].starts_with("cask "));
}

#[test]
fn test_global_matrix_after_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("xforms.abc");
    {
        let mut archive = Archive::new();
        let parent = attach(&mut archive, "parent", Variant::Xform);
        let child = attach(&mut archive, "parent/child", Variant::Xform);
        archive
            .obj(parent)
            .set_sample(XformSample::from_ops(vec![XformOp::translate(10.0, 0.0, 0.0)]), None)
            .unwrap();
        archive.obj(child).set_scale(2.0, 2.0, 2.0).unwrap();
        archive.write_to_file(&path, "").unwrap();
    }

    let mut archive = Archive::open(&path).unwrap();
    let child = archive.obj(archive.top()).child("parent/child").unwrap().unwrap();
    assert_eq!(archive.obj(child).variant(), Variant::Xform);
    let world = archive.obj(child).global_matrix(0).unwrap();
    assert_eq!(world.transform_point3(DVec3::ONE), DVec3::new(12.0, 2.0, 2.0));
}

#[test]
fn test_camera_gets_default_sample() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("camera.abc");
    {
        let mut archive = Archive::new();
        attach(&mut archive, "cam/camShape", Variant::Camera);
        archive.write_to_file(&path, "").unwrap();
    }

    let mut archive = Archive::open(&path).unwrap();
    let cam = archive.find("camShape", None).unwrap()[0];
    assert_eq!(archive.obj(cam).variant(), Variant::Camera);
    let samples = archive.obj(cam).samples().unwrap();
    assert_eq!(samples.len(), 1);
    let sample = samples[0].as_camera().unwrap();
    assert_eq!(sample, &CameraSample::default());
    assert_eq!(sample.focal_length, 35.0);
}

#[test]
fn test_mesh_positions_and_bounds() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mesh.abc");
    {
        let mut archive = Archive::new();
        let mesh = attach(&mut archive, "tri/triShape", Variant::PolyMesh);
        let sample = MeshSample::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(0.5, 1.0, 0.0)],
            vec![3],
            vec![0, 1, 2],
        );
        archive.obj(mesh).set_sample(sample, None).unwrap();
        assert!(archive.obj(mesh).set_sample(Sample::Camera(CameraSample::default()), None).is_err());
        archive.write_to_file(&path, "").unwrap();
    }

    let mut archive = Archive::open(&path).unwrap();
    let mesh = archive.find(".*Shape", Some(&[Variant::PolyMesh])).unwrap()[0];
    let p = archive.obj(mesh).property(".geom/P").unwrap().unwrap();
    let positions = archive.prop(p).get_value(None).unwrap();
    assert_eq!(positions.as_list().map(<[Value]>::len), Some(3));

    let bounds = archive.obj(mesh).property(".geom/.selfBnds").unwrap().unwrap();
    assert_eq!(archive.prop(bounds).metadata().interpretation(), Some("box"));
    assert_eq!(
        archive.prop(bounds).get_value(None).unwrap(),
        Value::Box3d(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0))
    );
    assert!(!archive.obj(mesh).is_deforming().unwrap());
}

#[test]
fn test_sample_selector_by_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("timed.abc");
    {
        let mut archive = Archive::new();
        let node = attach(&mut archive, "node", Variant::Object);
        let p = archive.new_property("width");
        archive.obj(node).add_property(p).unwrap();
        for v in [1.0f32, 2.0, 3.0] {
            archive.prop(p).set_value(v, None).unwrap();
        }
        archive.write_to_file(&path, "").unwrap();
    }

    let mut archive = Archive::open(&path).unwrap();
    let node = archive.obj(archive.top()).child("node").unwrap().unwrap();
    let p = archive.obj(node).property("width").unwrap().unwrap();
    let mut prop = archive.prop(p);
    assert_eq!(prop.get_value(Some(SampleSelector::Frame(1.0))).unwrap(), Value::Float32(2.0));
    assert_eq!(prop.get_value(Some(SampleSelector::Time(10.0))).unwrap(), Value::Float32(3.0));
    assert_eq!(prop.get_value(Some(SampleSelector::Index(0))).unwrap(), Value::Float32(1.0));
}
