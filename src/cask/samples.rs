//! Schema samples: the typed per-time data an object variant writes
//! through its schema compound.
//!
//! Xform and camera samples can also be decoded back from a read-derived
//! object, see [`read_xform_samples`] and [`read_camera_samples`].

use glam::{DMat4, DVec3, Vec2, Vec3};

use crate::ogawa::OgawaPropertyReader;
use crate::ogawa::OgawaObjectReader;
use crate::util::{Error, Result};

/// Transform operation type. The discriminant is the high nibble of the
/// stored op code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XformOpType {
    Scale = 0,
    Translate = 1,
    /// Axis (x, y, z) plus angle in degrees.
    Rotate = 2,
    Matrix = 3,
    RotateX = 4,
    RotateY = 5,
    RotateZ = 6,
}

impl XformOpType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code >> 4 {
            0 => Self::Scale,
            1 => Self::Translate,
            2 => Self::Rotate,
            3 => Self::Matrix,
            4 => Self::RotateX,
            5 => Self::RotateY,
            6 => Self::RotateZ,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        (self as u8) << 4
    }

    /// Number of doubles the op stores.
    pub fn num_values(self) -> usize {
        match self {
            Self::Scale | Self::Translate => 3,
            Self::Rotate => 4,
            Self::Matrix => 16,
            Self::RotateX | Self::RotateY | Self::RotateZ => 1,
        }
    }
}

/// A single transform operation.
#[derive(Clone, Debug, PartialEq)]
pub struct XformOp {
    pub op_type: XformOpType,
    pub values: Vec<f64>,
}

impl XformOp {
    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        Self { op_type: XformOpType::Scale, values: vec![x, y, z] }
    }

    pub fn translate(x: f64, y: f64, z: f64) -> Self {
        Self { op_type: XformOpType::Translate, values: vec![x, y, z] }
    }

    /// Rotation about `axis` by `degrees`.
    pub fn rotate(axis: DVec3, degrees: f64) -> Self {
        Self {
            op_type: XformOpType::Rotate,
            values: vec![axis.x, axis.y, axis.z, degrees],
        }
    }

    pub fn rotate_x(degrees: f64) -> Self {
        Self { op_type: XformOpType::RotateX, values: vec![degrees] }
    }

    pub fn rotate_y(degrees: f64) -> Self {
        Self { op_type: XformOpType::RotateY, values: vec![degrees] }
    }

    pub fn rotate_z(degrees: f64) -> Self {
        Self { op_type: XformOpType::RotateZ, values: vec![degrees] }
    }

    pub fn matrix(m: DMat4) -> Self {
        Self { op_type: XformOpType::Matrix, values: m.to_cols_array().to_vec() }
    }

    fn to_matrix(&self) -> DMat4 {
        let v = &self.values;
        match self.op_type {
            XformOpType::Scale => DMat4::from_scale(DVec3::new(v[0], v[1], v[2])),
            XformOpType::Translate => DMat4::from_translation(DVec3::new(v[0], v[1], v[2])),
            XformOpType::RotateX => DMat4::from_rotation_x(v[0].to_radians()),
            XformOpType::RotateY => DMat4::from_rotation_y(v[0].to_radians()),
            XformOpType::RotateZ => DMat4::from_rotation_z(v[0].to_radians()),
            XformOpType::Rotate => {
                let axis = DVec3::new(v[0], v[1], v[2]).normalize_or_zero();
                if axis == DVec3::ZERO {
                    DMat4::IDENTITY
                } else {
                    DMat4::from_axis_angle(axis, v[3].to_radians())
                }
            }
            // stored layout is row-vector (translation in 12..15), which is
            // the same flat order as glam's columns
            XformOpType::Matrix => DMat4::from_cols_slice(v),
        }
    }
}

/// Transform sample: ordered ops, outermost first.
#[derive(Clone, Debug, PartialEq)]
pub struct XformSample {
    pub ops: Vec<XformOp>,
    /// Whether the parent transform applies.
    pub inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self { ops: Vec::new(), inherits: true }
    }
}

impl XformSample {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<XformOp>) -> Self {
        Self { ops, inherits: true }
    }

    pub fn from_matrix(matrix: DMat4) -> Self {
        Self::from_ops(vec![XformOp::matrix(matrix)])
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Local matrix. The last op applies first.
    pub fn matrix(&self) -> DMat4 {
        self.ops
            .iter()
            .fold(DMat4::IDENTITY, |acc, op| acc * op.to_matrix())
    }

    /// All op values in stored order.
    pub fn values(&self) -> Vec<f64> {
        self.ops.iter().flat_map(|op| op.values.iter().copied()).collect()
    }

    /// Op codes in stored order.
    pub fn op_codes(&self) -> Vec<u8> {
        self.ops.iter().map(|op| op.op_type.code()).collect()
    }
}

/// Camera parameters. Lights store the same block.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSample {
    /// Focal length in millimeters.
    pub focal_length: f64,
    /// Film width in centimeters.
    pub horizontal_aperture: f64,
    pub horizontal_film_offset: f64,
    /// Film height in centimeters.
    pub vertical_aperture: f64,
    pub vertical_film_offset: f64,
    pub lens_squeeze_ratio: f64,
    pub overscan_left: f64,
    pub overscan_right: f64,
    pub overscan_top: f64,
    pub overscan_bottom: f64,
    pub f_stop: f64,
    pub focus_distance: f64,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub near_clipping_plane: f64,
    pub far_clipping_plane: f64,
}

impl Default for CameraSample {
    fn default() -> Self {
        Self {
            focal_length: 35.0,
            horizontal_aperture: 3.6,
            horizontal_film_offset: 0.0,
            vertical_aperture: 2.4,
            vertical_film_offset: 0.0,
            lens_squeeze_ratio: 1.0,
            overscan_left: 0.0,
            overscan_right: 0.0,
            overscan_top: 0.0,
            overscan_bottom: 0.0,
            f_stop: 5.6,
            focus_distance: 5.0,
            shutter_open: 0.0,
            shutter_close: 0.0,
            near_clipping_plane: 0.1,
            far_clipping_plane: 100000.0,
        }
    }
}

impl CameraSample {
    /// The 16 doubles of the `.core` property, in stored order.
    pub fn to_core(&self) -> [f64; 16] {
        [
            self.focal_length,
            self.horizontal_aperture,
            self.horizontal_film_offset,
            self.vertical_aperture,
            self.vertical_film_offset,
            self.lens_squeeze_ratio,
            self.overscan_left,
            self.overscan_right,
            self.overscan_top,
            self.overscan_bottom,
            self.f_stop,
            self.focus_distance,
            self.shutter_open,
            self.shutter_close,
            self.near_clipping_plane,
            self.far_clipping_plane,
        ]
    }

    pub fn from_core(c: &[f64; 16]) -> Self {
        Self {
            focal_length: c[0],
            horizontal_aperture: c[1],
            horizontal_film_offset: c[2],
            vertical_aperture: c[3],
            vertical_film_offset: c[4],
            lens_squeeze_ratio: c[5],
            overscan_left: c[6],
            overscan_right: c[7],
            overscan_top: c[8],
            overscan_bottom: c[9],
            f_stop: c[10],
            focus_distance: c[11],
            shutter_open: c[12],
            shutter_close: c[13],
            near_clipping_plane: c[14],
            far_clipping_plane: c[15],
        }
    }

    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (self.horizontal_aperture / (2.0 * self.focal_length / 10.0)).atan()
    }
}

/// Polygon or subdivision mesh sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshSample {
    pub positions: Vec<Vec3>,
    pub face_counts: Vec<i32>,
    pub face_indices: Vec<i32>,
    pub velocities: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
}

impl MeshSample {
    pub fn new(positions: Vec<Vec3>, face_counts: Vec<i32>, face_indices: Vec<i32>) -> Self {
        Self { positions, face_counts, face_indices, ..Default::default() }
    }
}

/// Curves sample. `curve_type`, `wrap` and `basis` are the stored codes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurvesSample {
    pub positions: Vec<Vec3>,
    pub num_vertices: Vec<i32>,
    /// 0 cubic, 1 linear.
    pub curve_type: u8,
    /// 0 non-periodic, 1 periodic.
    pub wrap: u8,
    pub basis: u8,
    pub widths: Option<Vec<f32>>,
}

impl CurvesSample {
    /// Linear, non-periodic curves.
    pub fn linear(positions: Vec<Vec3>, num_vertices: Vec<i32>) -> Self {
        Self { positions, num_vertices, curve_type: 1, ..Default::default() }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceSetSample {
    pub faces: Vec<i32>,
}

/// NURBS patch sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NuPatchSample {
    pub positions: Vec<Vec3>,
    pub num_u: i32,
    pub num_v: i32,
    pub u_order: i32,
    pub v_order: i32,
    pub u_knot: Vec<f32>,
    pub v_knot: Vec<f32>,
    pub position_weights: Option<Vec<f32>>,
}

/// A schema sample of any kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    Xform(XformSample),
    Camera(CameraSample),
    Mesh(MeshSample),
    Curves(CurvesSample),
    FaceSet(FaceSetSample),
    NuPatch(NuPatchSample),
}

impl Sample {
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Xform(_) => "XformSample",
            Sample::Camera(_) => "CameraSample",
            Sample::Mesh(_) => "MeshSample",
            Sample::Curves(_) => "CurvesSample",
            Sample::FaceSet(_) => "FaceSetSample",
            Sample::NuPatch(_) => "NuPatchSample",
        }
    }

    pub fn as_xform(&self) -> Option<&XformSample> {
        match self {
            Sample::Xform(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&CameraSample> {
        match self {
            Sample::Camera(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_sample_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Sample {
            fn from(s: $ty) -> Self {
                Sample::$variant(s)
            }
        })*
    };
}

impl_sample_from! {
    XformSample => Xform,
    CameraSample => Camera,
    MeshSample => Mesh,
    CurvesSample => Curves,
    FaceSetSample => FaceSet,
    NuPatchSample => NuPatch,
}

fn find(props: Vec<OgawaPropertyReader>, name: &str) -> Option<OgawaPropertyReader> {
    props.into_iter().find(|p| p.name() == name)
}

/// Sample `index` clamped to the property's own sample count.
fn clamped_sample(prop: &OgawaPropertyReader, index: usize) -> Result<Option<Vec<u8>>> {
    match prop.num_samples() {
        0 => Ok(None),
        n => Ok(Some(prop.sample(index.min(n - 1))?.bytes)),
    }
}

/// Decode the samples of an object carrying a `.xform` compound.
pub(crate) fn read_xform_samples(object: &OgawaObjectReader) -> Result<Vec<XformSample>> {
    let Some(xform) = find(object.properties()?, ".xform") else {
        return Ok(Vec::new());
    };
    let props = xform.sub_properties()?;
    let inherits = props.iter().find(|p| p.name() == ".inherits");
    let vals = props.iter().find(|p| p.name() == ".vals");
    let codes = match props.iter().find(|p| p.name() == ".ops") {
        Some(ops) => clamped_sample(ops, 0)?.unwrap_or_default(),
        None => Vec::new(),
    };

    let count = [inherits, vals]
        .iter()
        .flatten()
        .map(|p| p.num_samples())
        .max()
        .unwrap_or(0);
    if count == 0 {
        return Ok(vec![XformSample::identity()]);
    }

    let mut samples = Vec::new();
    for index in 0..count {
        let inherits = match inherits {
            Some(p) => clamped_sample(p, index)?.map_or(true, |b| b.first() != Some(&0)),
            None => true,
        };
        let values: Vec<f64> = match vals {
            Some(p) => clamped_sample(p, index)?
                .map(|b| bytemuck::pod_collect_to_vec(&b))
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let mut ops = Vec::with_capacity(codes.len());
        let mut rest = values.as_slice();
        for &code in &codes {
            let op_type = XformOpType::from_code(code)
                .ok_or_else(|| Error::invalid(format!("unknown xform op code {code:#04x}")))?;
            let n = op_type.num_values();
            if rest.len() < n {
                return Err(Error::invalid(format!(
                    "{}: xform sample {index} is short of values",
                    object.full_name()
                )));
            }
            let (head, tail) = rest.split_at(n);
            ops.push(XformOp { op_type, values: head.to_vec() });
            rest = tail;
        }
        samples.push(XformSample { ops, inherits });
    }
    Ok(samples)
}

/// Decode `.geom/.core` (cameras) or `.geom/.camera/.core` (lights).
pub(crate) fn read_camera_samples(object: &OgawaObjectReader, light: bool) -> Result<Vec<CameraSample>> {
    let Some(mut compound) = find(object.properties()?, ".geom") else {
        return Ok(Vec::new());
    };
    if light {
        match find(compound.sub_properties()?, ".camera") {
            Some(camera) => compound = camera,
            None => return Ok(Vec::new()),
        }
    }
    let Some(core) = find(compound.sub_properties()?, ".core") else {
        return Ok(Vec::new());
    };

    (0..core.num_samples())
        .map(|i| {
            let raw = core.sample(i)?.bytes;
            let values: Vec<f64> = bytemuck::pod_collect_to_vec(&raw);
            let block: [f64; 16] = values.as_slice().try_into().map_err(|_| {
                Error::invalid(format!("{}: camera core has {} values", object.full_name(), values.len()))
            })?;
            Ok(CameraSample::from_core(&block))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_codes() {
        for op in [XformOpType::Scale, XformOpType::Matrix, XformOpType::RotateZ] {
            assert_eq!(XformOpType::from_code(op.code()), Some(op));
        }
        assert_eq!(XformOpType::Translate.code(), 0x10);
        assert_eq!(XformOpType::from_code(0x70), None);
    }

    #[test]
    fn test_xform_matrix_order() {
        let sample = XformSample::from_ops(vec![
            XformOp::translate(1.0, 2.0, 3.0),
            XformOp::scale(2.0, 2.0, 2.0),
        ]);
        let p = sample.matrix().transform_point3(DVec3::ONE);
        assert_eq!(p, DVec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_matrix_op_roundtrip() {
        let m = DMat4::from_translation(DVec3::new(5.0, 0.0, -1.0));
        let sample = XformSample::from_matrix(m);
        assert_eq!(sample.values()[12], 5.0);
        assert_eq!(sample.matrix(), m);
    }

    #[test]
    fn test_camera_core_layout() {
        let cam = CameraSample::default();
        let core = cam.to_core();
        assert_eq!(core[0], 35.0);
        assert_eq!(core[10], 5.6);
        assert_eq!(core[15], 100000.0);
        assert_eq!(CameraSample::from_core(&core), cam);
    }
}
