//! Object variants: schema matching and schema writers.
//!
//! Every object in an archive is one [`Variant`]. Read-derived objects are
//! classified from their metadata by trying each schema in dispatch order;
//! new objects carry the variant they were created with. On save a variant
//! turns its pending [`Sample`]s into a schema compound property.

use std::fmt;

use glam::{DVec3, Vec3};

use crate::core::MetaData;
use crate::ogawa::{ArraySample, OProperty};
use crate::util::{DataType, Error, PlainOldDataType, Result};

use super::samples::{
    CameraSample, CurvesSample, FaceSetSample, MeshSample, NuPatchSample, Sample, XformSample,
};

const GEOM_BASE: &str = "AbcGeom_GeomBase_v1";

/// The closed set of object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Top,
    Xform,
    PolyMesh,
    SubD,
    FaceSet,
    Curve,
    Camera,
    NuPatch,
    Material,
    Light,
    Points,
    Collections,
    /// Any object no schema matches.
    Object,
}

impl Variant {
    /// Variants tried, in order, when classifying a read-derived object.
    pub const DISPATCH: [Variant; 11] = [
        Variant::Xform,
        Variant::PolyMesh,
        Variant::SubD,
        Variant::FaceSet,
        Variant::Curve,
        Variant::Camera,
        Variant::NuPatch,
        Variant::Material,
        Variant::Light,
        Variant::Points,
        Variant::Collections,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Top => "Top",
            Variant::Xform => "Xform",
            Variant::PolyMesh => "PolyMesh",
            Variant::SubD => "SubD",
            Variant::FaceSet => "FaceSet",
            Variant::Curve => "Curve",
            Variant::Camera => "Camera",
            Variant::NuPatch => "NuPatch",
            Variant::Material => "Material",
            Variant::Light => "Light",
            Variant::Points => "Points",
            Variant::Collections => "Collections",
            Variant::Object => "Object",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::DISPATCH
            .into_iter()
            .chain([Variant::Top, Variant::Object])
            .find(|v| v.name() == name)
    }

    /// Schema name, `None` for Top and generic objects.
    pub fn schema(self) -> Option<&'static str> {
        Some(match self {
            Variant::Xform => "AbcGeom_Xform_v3",
            Variant::PolyMesh => "AbcGeom_PolyMesh_v1",
            Variant::SubD => "AbcGeom_SubD_v1",
            Variant::FaceSet => "AbcGeom_FaceSet_v1",
            Variant::Curve => "AbcGeom_Curve_v2",
            Variant::Camera => "AbcGeom_Camera_v1",
            Variant::NuPatch => "AbcGeom_NuPatch_v2",
            Variant::Material => "AbcMaterial_Material_v1",
            Variant::Light => "AbcGeom_Light_v1",
            Variant::Points => "AbcGeom_Points_v1",
            Variant::Collections => "AbcCollection_Collection_v1",
            Variant::Top | Variant::Object => return None,
        })
    }

    /// Name of the compound property holding the schema data.
    pub fn schema_compound(self) -> Option<&'static str> {
        Some(match self {
            Variant::Xform => ".xform",
            Variant::FaceSet => ".faceset",
            Variant::Material => ".material",
            Variant::Collections => ".collection",
            Variant::Top | Variant::Object => return None,
            _ => ".geom",
        })
    }

    pub fn schema_base(self) -> Option<&'static str> {
        match self {
            Variant::PolyMesh
            | Variant::SubD
            | Variant::FaceSet
            | Variant::Curve
            | Variant::NuPatch
            | Variant::Points => Some(GEOM_BASE),
            _ => None,
        }
    }

    /// `"<schema>:<compound>"`.
    pub fn schema_title(self) -> Option<String> {
        Some(format!("{}:{}", self.schema()?, self.schema_compound()?))
    }

    /// True if the metadata describes an object of this variant.
    pub fn matches(self, meta: &MetaData) -> bool {
        let Some(schema) = self.schema() else {
            return false;
        };
        meta.schema_obj_title() == self.schema_title().as_deref() || meta.schema() == Some(schema)
    }

    /// Classify an object from its metadata.
    pub fn resolve(meta: &MetaData) -> Variant {
        Self::DISPATCH
            .into_iter()
            .find(|v| v.matches(meta))
            .unwrap_or(Variant::Object)
    }

    /// True if objects of this variant take samples of this kind.
    pub fn accepts(self, sample: &Sample) -> bool {
        matches!(
            (self, sample),
            (Variant::Xform, Sample::Xform(_))
                | (Variant::PolyMesh | Variant::SubD, Sample::Mesh(_))
                | (Variant::FaceSet, Sample::FaceSet(_))
                | (Variant::Curve, Sample::Curves(_))
                | (Variant::Camera | Variant::Light, Sample::Camera(_))
                | (Variant::NuPatch, Sample::NuPatch(_))
        )
    }

    /// Metadata written on new objects of this variant.
    pub fn object_metadata(self) -> MetaData {
        let mut meta = self.compound_metadata();
        if let Some(title) = self.schema_title() {
            meta.set(MetaData::SCHEMA_OBJ_TITLE_KEY, title);
        }
        meta
    }

    /// Metadata written on the schema compound.
    pub fn compound_metadata(self) -> MetaData {
        let mut meta = MetaData::new();
        if let Some(schema) = self.schema() {
            meta.set_schema(schema);
        }
        if let Some(base) = self.schema_base() {
            meta.set(MetaData::SCHEMA_BASE_KEY, base);
        }
        meta
    }

    /// Sample written when a new object of this variant is saved empty.
    pub fn default_sample(self) -> Option<Sample> {
        match self {
            Variant::Xform => Some(XformSample::identity().into()),
            Variant::Camera => Some(CameraSample::default().into()),
            _ => None,
        }
    }

    /// Build the schema compound from `samples`.
    ///
    /// Returns `None` for variants without a schema compound.
    pub fn write_schema(self, samples: &[Sample], tsid: u32) -> Result<Option<OProperty>> {
        let Some(name) = self.schema_compound() else {
            return Ok(None);
        };
        let mut compound = OProperty::compound(name).with_meta_data(self.compound_metadata());

        match self {
            Variant::Xform => {
                let xs: Vec<&XformSample> = samples.iter().filter_map(Sample::as_xform).collect();
                write_xform(&mut compound, &xs, tsid)?;
            }
            Variant::PolyMesh | Variant::SubD => {
                let ms: Vec<&MeshSample> = samples
                    .iter()
                    .filter_map(|s| match s {
                        Sample::Mesh(m) => Some(m),
                        _ => None,
                    })
                    .collect();
                write_mesh(&mut compound, &ms, tsid);
            }
            Variant::Curve => {
                let cs: Vec<&CurvesSample> = samples
                    .iter()
                    .filter_map(|s| match s {
                        Sample::Curves(c) => Some(c),
                        _ => None,
                    })
                    .collect();
                write_curves(&mut compound, &cs, tsid);
            }
            Variant::FaceSet => {
                let fs: Vec<&FaceSetSample> = samples
                    .iter()
                    .filter_map(|s| match s {
                        Sample::FaceSet(f) => Some(f),
                        _ => None,
                    })
                    .collect();
                if !fs.is_empty() {
                    compound.add_child(array_prop(".faces", DataType::INT32, tsid, fs.iter().map(|f| &f.faces[..])));
                }
            }
            Variant::NuPatch => {
                let ns: Vec<&NuPatchSample> = samples
                    .iter()
                    .filter_map(|s| match s {
                        Sample::NuPatch(n) => Some(n),
                        _ => None,
                    })
                    .collect();
                write_nupatch(&mut compound, &ns, tsid);
            }
            Variant::Camera | Variant::Light => {
                let cams: Vec<&CameraSample> = samples.iter().filter_map(Sample::as_camera).collect();
                if !cams.is_empty() {
                    let core = scalar_prop(
                        ".core",
                        DataType::new(PlainOldDataType::Float64, 16),
                        tsid,
                        cams.iter().map(|c| c.to_core().to_vec()),
                    );
                    if self == Variant::Light {
                        let mut camera = OProperty::compound(".camera")
                            .with_meta_data(Variant::Camera.compound_metadata());
                        camera.add_child(core);
                        compound.add_child(camera);
                    } else {
                        compound.add_child(core);
                    }
                }
            }
            _ => {}
        }
        Ok(Some(compound))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn meta(pairs: &[(&str, &str)]) -> MetaData {
    let mut m = MetaData::new();
    for (k, v) in pairs {
        m.set(*k, *v);
    }
    m
}

fn box_meta() -> MetaData {
    meta(&[(MetaData::INTERPRETATION_KEY, "box")])
}

fn point_meta() -> MetaData {
    meta(&[("geoScope", "vtx"), (MetaData::INTERPRETATION_KEY, "point")])
}

/// Scalar property with one sample per row.
fn scalar_prop<T: bytemuck::Pod>(
    name: &str,
    data_type: DataType,
    tsid: u32,
    rows: impl Iterator<Item = Vec<T>>,
) -> OProperty {
    let mut prop = OProperty::scalar(name, data_type).with_time_sampling(tsid);
    for row in rows {
        prop.push_scalar(bytemuck::cast_slice(&row).to_vec());
    }
    prop
}

/// Array property with one rank-1 sample per row.
fn array_prop<'a, T: bytemuck::Pod>(
    name: &str,
    data_type: DataType,
    tsid: u32,
    rows: impl Iterator<Item = &'a [T]>,
) -> OProperty {
    let mut prop = OProperty::array(name, data_type).with_time_sampling(tsid);
    for row in rows {
        prop.push_array(ArraySample::new(
            bytemuck::cast_slice(row).to_vec(),
            vec![row.len() as u64],
        ));
    }
    prop
}

fn compute_bounds(positions: &[Vec3]) -> [f64; 6] {
    if positions.is_empty() {
        return [0.0; 6];
    }
    let (min, max) = positions.iter().fold(
        (DVec3::splat(f64::MAX), DVec3::splat(f64::MIN)),
        |(lo, hi), p| {
            let p = p.as_dvec3();
            (lo.min(p), hi.max(p))
        },
    );
    [min.x, min.y, min.z, max.x, max.y, max.z]
}

fn bounds_prop<'a>(tsid: u32, positions: impl Iterator<Item = &'a [Vec3]>) -> OProperty {
    scalar_prop(".selfBnds", DataType::BOX3D, tsid, positions.map(|p| compute_bounds(p).to_vec()))
        .with_meta_data(box_meta())
}

fn positions_prop<'a>(tsid: u32, positions: impl Iterator<Item = &'a [Vec3]>) -> OProperty {
    array_prop("P", DataType::VEC3F, tsid, positions).with_meta_data(point_meta())
}

fn write_xform(compound: &mut OProperty, samples: &[&XformSample], tsid: u32) -> Result<()> {
    let Some(first) = samples.first() else {
        return Ok(());
    };
    if samples.iter().all(|s| s.is_identity() && s.inherits) {
        return Ok(());
    }

    let codes = first.op_codes();
    if let Some(i) = samples.iter().position(|s| s.op_codes() != codes) {
        return Err(Error::invalid(format!(
            "xform sample {i} has a different op layout than sample 0"
        )));
    }
    let num_values = first.values().len();
    let ops_extent = u8::try_from(codes.len())
        .map_err(|_| Error::invalid(format!("{} xform ops exceed the storable count", codes.len())))?;

    compound.add_child(scalar_prop(
        ".inherits",
        DataType::BOOL,
        tsid,
        samples.iter().map(|s| vec![s.inherits as u8]),
    ));
    if !codes.is_empty() {
        compound.add_child(scalar_prop(
            ".ops",
            DataType::new(PlainOldDataType::Uint8, ops_extent),
            0,
            std::iter::once(codes),
        ));
        let rows: Vec<Vec<f64>> = samples.iter().map(|s| s.values()).collect();
        match u8::try_from(num_values) {
            Ok(extent) => compound.add_child(scalar_prop(
                ".vals",
                DataType::new(PlainOldDataType::Float64, extent),
                tsid,
                rows.into_iter(),
            )),
            Err(_) => compound.add_child(array_prop(
                ".vals",
                DataType::FLOAT64,
                tsid,
                rows.iter().map(|r| &r[..]),
            )),
        };
    }
    compound.add_child(scalar_prop(
        "isNotConstantIdentity",
        DataType::BOOL,
        0,
        std::iter::once(vec![1u8]),
    ));
    Ok(())
}

fn write_mesh(compound: &mut OProperty, samples: &[&MeshSample], tsid: u32) {
    if samples.is_empty() {
        return;
    }
    compound.add_child(bounds_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    compound.add_child(positions_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    compound.add_child(array_prop(
        ".faceIndices",
        DataType::INT32,
        tsid,
        samples.iter().map(|s| &s.face_indices[..]),
    ));
    compound.add_child(array_prop(
        ".faceCounts",
        DataType::INT32,
        tsid,
        samples.iter().map(|s| &s.face_counts[..]),
    ));
    if samples.iter().any(|s| s.velocities.is_some()) {
        compound.add_child(array_prop(
            ".velocities",
            DataType::VEC3F,
            tsid,
            samples.iter().map(|s| s.velocities.as_deref().unwrap_or(&[])),
        ));
    }
    if samples.iter().any(|s| s.uvs.is_some()) {
        let mut uv = OProperty::compound("uv").with_meta_data(meta(&[
            ("geoScope", "fvr"),
            (MetaData::INTERPRETATION_KEY, "vector"),
            ("isGeomParam", "true"),
            ("podName", "float32_t"),
            ("podExtent", "2"),
        ]));
        uv.add_child(array_prop(
            ".vals",
            DataType::VEC2F,
            tsid,
            samples.iter().map(|s| s.uvs.as_deref().unwrap_or(&[])),
        ));
        compound.add_child(uv);
    }
}

fn write_curves(compound: &mut OProperty, samples: &[&CurvesSample], tsid: u32) {
    if samples.is_empty() {
        return;
    }
    compound.add_child(bounds_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    compound.add_child(positions_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    compound.add_child(array_prop(
        "nVertices",
        DataType::INT32,
        tsid,
        samples.iter().map(|s| &s.num_vertices[..]),
    ));
    compound.add_child(scalar_prop(
        "curveBasisAndType",
        DataType::new(PlainOldDataType::Uint8, 4),
        tsid,
        samples.iter().map(|s| vec![s.curve_type, s.wrap, s.basis, s.basis]),
    ));
    if samples.iter().any(|s| s.widths.is_some()) {
        compound.add_child(array_prop(
            "width",
            DataType::FLOAT32,
            tsid,
            samples.iter().map(|s| s.widths.as_deref().unwrap_or(&[])),
        ));
    }
}

fn write_nupatch(compound: &mut OProperty, samples: &[&NuPatchSample], tsid: u32) {
    if samples.is_empty() {
        return;
    }
    compound.add_child(bounds_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    compound.add_child(positions_prop(tsid, samples.iter().map(|s| &s.positions[..])));
    let ints: [(&str, fn(&NuPatchSample) -> i32); 4] = [
        ("nu", |s| s.num_u),
        ("nv", |s| s.num_v),
        ("uOrder", |s| s.u_order),
        ("vOrder", |s| s.v_order),
    ];
    for (name, field) in ints {
        compound.add_child(scalar_prop(name, DataType::INT32, tsid, samples.iter().map(|s| vec![field(s)])));
    }
    compound.add_child(array_prop("uKnot", DataType::FLOAT32, tsid, samples.iter().map(|s| &s.u_knot[..])));
    compound.add_child(array_prop("vKnot", DataType::FLOAT32, tsid, samples.iter().map(|s| &s.v_knot[..])));
    if samples.iter().any(|s| s.position_weights.is_some()) {
        compound.add_child(array_prop(
            "w",
            DataType::FLOAT32,
            tsid,
            samples.iter().map(|s| s.position_weights.as_deref().unwrap_or(&[])),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cask::samples::XformOp;
    use crate::ogawa::OPropertyData;

    #[test]
    fn test_resolve_from_title_or_schema() {
        let mut meta = MetaData::new();
        meta.set("schemaObjTitle", "AbcGeom_PolyMesh_v1:.geom");
        assert_eq!(Variant::resolve(&meta), Variant::PolyMesh);

        let mut meta = MetaData::new();
        meta.set_schema("AbcGeom_Light_v1");
        assert_eq!(Variant::resolve(&meta), Variant::Light);

        assert_eq!(Variant::resolve(&MetaData::new()), Variant::Object);
    }

    #[test]
    fn test_object_metadata() {
        let meta = Variant::Curve.object_metadata();
        assert_eq!(meta.schema(), Some("AbcGeom_Curve_v2"));
        assert_eq!(meta.schema_base(), Some(GEOM_BASE));
        assert_eq!(meta.schema_obj_title(), Some("AbcGeom_Curve_v2:.geom"));
        assert!(Variant::Object.object_metadata().is_empty());
        assert_eq!(Variant::from_name("NuPatch"), Some(Variant::NuPatch));
    }

    #[test]
    fn test_accepts() {
        let cam: Sample = CameraSample::default().into();
        assert!(Variant::Camera.accepts(&cam));
        assert!(Variant::Light.accepts(&cam));
        assert!(!Variant::Xform.accepts(&cam));
        assert!(!Variant::Points.accepts(&cam));
    }

    #[test]
    fn test_light_nests_camera() {
        let samples = vec![Sample::from(CameraSample::default())];
        let geom = Variant::Light.write_schema(&samples, 1).unwrap().unwrap();
        assert_eq!(geom.children()[0].name, ".camera");
        let core = &geom.children()[0].children()[0];
        assert_eq!(core.name, ".core");
        assert_eq!(core.time_sampling_index, 1);
        assert_eq!(core.num_samples(), 1);
    }

    #[test]
    fn test_xform_layout() {
        let samples: Vec<Sample> = (0..3)
            .map(|i| XformSample::from_ops(vec![XformOp::translate(i as f64, 0.0, 0.0)]).into())
            .collect();
        let xform = Variant::Xform.write_schema(&samples, 1).unwrap().unwrap();
        let names: Vec<&str> = xform.children().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![".inherits", ".ops", ".vals", "isNotConstantIdentity"]);
        assert_eq!(xform.children()[2].num_samples(), 3);
        assert_eq!(xform.children()[2].data_type.extent, 3);

        let identity = Variant::Xform
            .write_schema(&[XformSample::identity().into()], 0)
            .unwrap()
            .unwrap();
        assert!(identity.children().is_empty());
    }

    #[test]
    fn test_xform_layout_mismatch() {
        let samples: Vec<Sample> = vec![
            XformSample::from_ops(vec![XformOp::translate(1.0, 0.0, 0.0)]).into(),
            XformSample::from_ops(vec![XformOp::scale(1.0, 2.0, 1.0)]).into(),
        ];
        assert!(Variant::Xform.write_schema(&samples, 0).is_err());
    }

    #[test]
    fn test_mesh_bounds() {
        let mesh = MeshSample::new(
            vec![Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 3.0, -2.0), Vec3::ZERO],
            vec![3],
            vec![0, 1, 2],
        );
        let geom = Variant::PolyMesh.write_schema(&[mesh.into()], 0).unwrap().unwrap();
        let bnds = &geom.children()[0];
        assert_eq!(bnds.meta_data.interpretation(), Some("box"));
        let OPropertyData::Scalar(samples) = &bnds.data else {
            panic!("bounds are scalar");
        };
        let values: Vec<f64> = bytemuck::pod_collect_to_vec(&samples[0]);
        assert_eq!(values, vec![-1.0, 0.0, -2.0, 1.0, 3.0, 2.0]);
    }
}
