//! Conversion between host values and typed sample bytes.
//!
//! A [`Value`] is what callers put into and get out of a property. Before
//! writing, the property's [`DataType`] is inferred from its first value
//! (POD kind plus extent) and every value is flattened into little-endian
//! components of that POD. Decoding reverses this and rebuilds the
//! aggregate (vector, color, box, matrix) the extent describes.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use glam::{DMat3, DMat4, DVec2, DVec3, Mat3, Mat4, Vec2, Vec3, Vec4};
use half::f16;

use crate::util::{DataType, Error, PlainOldDataType as Pod, Result};

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    /// Host integer, stored as `int32_t`.
    Int(i64),
    Float16(f16),
    Float32(f32),
    /// Host float, stored as `float64_t`.
    Float(f64),
    Str(String),
    V2f(Vec2),
    V2d(DVec2),
    V3f(Vec3),
    V3d(DVec3),
    Color3c([u8; 3]),
    Color4c([u8; 4]),
    Color4f(Vec4),
    /// Box as (min, max).
    Box3f(Vec3, Vec3),
    Box3d(DVec3, DVec3),
    M33f(Mat3),
    M33d(DMat3),
    M44f(Mat4),
    M44d(DMat4),
    /// Host sequence. A list with more than one element is written as an
    /// array sample.
    List(Vec<Value>),
    /// Placeholder for a sample that failed to decode.
    Error(String),
}

impl Value {
    pub fn int8(n: i64) -> Self {
        Value::Int8((n & 0xff) as u8 as i8)
    }

    pub fn int16(n: i64) -> Self {
        Value::Int16((n & 0xffff) as u16 as i16)
    }

    /// 32-bit signed integer; same storage as a host [`Value::Int`].
    pub fn int32(n: i64) -> Self {
        Value::Int((n & 0xffff_ffff) as u32 as i32 as i64)
    }

    pub fn int64(n: i64) -> Self {
        Value::Int64(n)
    }

    pub fn uint8(n: i64) -> Self {
        Value::Uint8((n & 0xff) as u8)
    }

    pub fn uint16(n: i64) -> Self {
        Value::Uint16((n & 0xffff) as u16)
    }

    pub fn uint32(n: i64) -> Self {
        Value::Uint32((n & 0xffff_ffff) as u32)
    }

    pub fn uint64(n: u64) -> Self {
        Value::Uint64(n)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value of a scalar, widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::Bool(b) => b as u8 as f64,
            Value::Int8(v) => v as f64,
            Value::Uint8(v) => v as f64,
            Value::Int16(v) => v as f64,
            Value::Uint16(v) => v as f64,
            Value::Uint32(v) => v as f64,
            Value::Int64(v) => v as f64,
            Value::Uint64(v) => v as f64,
            Value::Int(v) => v as f64,
            Value::Float16(v) => v.to_f64(),
            Value::Float32(v) => v as f64,
            Value::Float(v) => v,
            _ => return None,
        })
    }

    /// Integer value of an integral scalar.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::Bool(b) => b as i64,
            Value::Int8(v) => v as i64,
            Value::Uint8(v) => v as i64,
            Value::Int16(v) => v as i64,
            Value::Uint16(v) => v as i64,
            Value::Uint32(v) => v as i64,
            Value::Int64(v) | Value::Int(v) => v,
            Value::Uint64(v) => v as i64,
            _ => return None,
        })
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int8(_) => "int8",
            Value::Uint8(_) => "uint8",
            Value::Int16(_) => "int16",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::Uint64(_) => "uint64",
            Value::Int(_) => "int",
            Value::Float16(_) => "float16",
            Value::Float32(_) => "float32",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::V2f(_) => "V2f",
            Value::V2d(_) => "V2d",
            Value::V3f(_) => "V3f",
            Value::V3d(_) => "V3d",
            Value::Color3c(_) => "C3c",
            Value::Color4c(_) => "C4c",
            Value::Color4f(_) => "C4f",
            Value::Box3f(..) => "Box3f",
            Value::Box3d(..) => "Box3d",
            Value::M33f(_) => "M33f",
            Value::M33d(_) => "M33d",
            Value::M44f(_) => "M44f",
            Value::M44d(_) => "M44d",
            Value::List(_) => "list",
            Value::Error(_) => "error",
        }
    }

    /// Component count for aggregates whose table extent is open.
    fn open_extent(&self) -> usize {
        match self {
            Value::Color3c(_) => 3,
            Value::Color4c(_) | Value::Color4f(_) => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Error(e) => write!(f, "<error: {e}>"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Bool(b) => write!(f, "{b}"),
            other => match other.as_f64() {
                Some(v) => write!(f, "{v}"),
                None => write!(f, "{other:?}"),
            },
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Bool,
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float,
    String => Str,
    Vec2 => V2f,
    DVec2 => V2d,
    Vec3 => V3f,
    DVec3 => V3d,
    Vec4 => Color4f,
    Mat3 => M33f,
    DMat3 => M33d,
    Mat4 => M44f,
    DMat4 => M44d,
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Collapse a one-element list to its element.
pub fn delist(value: Value) -> Value {
    match value {
        Value::List(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn delisted(value: &Value) -> &Value {
    match value {
        Value::List(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

/// POD and extent for a single value. An extent of `-1` means the extent
/// follows the value's own length, or 1.
pub fn pod_extent(value: &Value) -> Option<(Pod, i32)> {
    Some(match value {
        Value::Bool(_) => (Pod::Boolean, -1),
        Value::Uint8(_) => (Pod::Uint8, -1),
        Value::Int8(_) => (Pod::Int8, -1),
        Value::Uint16(_) => (Pod::Uint16, -1),
        Value::Int16(_) => (Pod::Int16, -1),
        Value::Uint32(_) => (Pod::Uint32, -1),
        Value::Int(_) => (Pod::Int32, -1),
        Value::Uint64(_) => (Pod::Uint64, -1),
        Value::Int64(_) => (Pod::Int64, -1),
        Value::Float16(_) => (Pod::Float16, -1),
        Value::Float32(_) => (Pod::Float32, -1),
        Value::Float(_) => (Pod::Float64, -1),
        Value::Str(_) => (Pod::String, -1),
        Value::V2f(_) => (Pod::Float32, 2),
        Value::V2d(_) => (Pod::Float64, 2),
        Value::V3f(_) => (Pod::Float32, 3),
        Value::V3d(_) => (Pod::Float64, 3),
        Value::Color3c(_) | Value::Color4c(_) => (Pod::Uint8, -1),
        Value::Color4f(_) => (Pod::Float32, -1),
        Value::Box3f(..) => (Pod::Float32, 6),
        Value::Box3d(..) => (Pod::Float64, 6),
        Value::M33f(_) => (Pod::Float32, 9),
        Value::M33d(_) => (Pod::Float64, 9),
        Value::M44f(_) => (Pod::Float32, 16),
        Value::M44d(_) => (Pod::Float64, 16),
        Value::List(_) | Value::Error(_) => return None,
    })
}

/// True if `value` is written as an array sample.
pub fn is_array_value(value: &Value) -> bool {
    matches!(delisted(value), Value::List(items) if items.len() > 1)
}

/// Infer the data type of a property from one of its values.
///
/// For a sequence the first element decides the POD; a nested sequence
/// element contributes its length as the extent. A scalar property holding
/// a flat sequence stores the whole sequence as one element.
pub fn infer_data_type(value: &Value, scalar: bool) -> Result<DataType> {
    let unknown = || Error::UnknownDataType {
        name: String::new(),
        value: value.to_string(),
    };
    let value = delisted(value);
    let first = match value {
        Value::List(items) => items.first().ok_or_else(unknown)?,
        other => other,
    };

    let (pod, extent) = match first {
        Value::List(inner) => {
            let (pod, _) = inner.first().and_then(pod_extent).ok_or_else(unknown)?;
            (pod, inner.len())
        }
        element => {
            let (pod, extent) = pod_extent(element).ok_or_else(unknown)?;
            if extent > 0 {
                (pod, extent as usize)
            } else {
                (pod, element.open_extent())
            }
        }
    };

    let extent = match value {
        Value::List(items) if scalar && extent == 1 && !matches!(first, Value::List(_)) => items.len(),
        _ => extent,
    };
    let extent = u8::try_from(extent).map_err(|_| unknown())?;
    Ok(DataType::new(pod, extent))
}

/// Bytes and dimensions ready for the writer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedSample {
    pub bytes: Vec<u8>,
    /// Element count for array samples; empty for scalars.
    pub dims: Vec<u64>,
}

enum Component<'a> {
    Int(i128),
    Float(f64),
    Str(&'a str),
}

fn push_components<'a>(value: &'a Value, out: &mut Vec<Component<'a>>) -> Result<()> {
    let floats = |out: &mut Vec<Component<'a>>, vals: &[f32]| {
        out.extend(vals.iter().map(|&v| Component::Float(v as f64)))
    };
    let doubles = |out: &mut Vec<Component<'a>>, vals: &[f64]| {
        out.extend(vals.iter().map(|&v| Component::Float(v)))
    };
    match value {
        Value::Bool(v) => out.push(Component::Int(*v as i128)),
        Value::Int8(v) => out.push(Component::Int(*v as i128)),
        Value::Uint8(v) => out.push(Component::Int(*v as i128)),
        Value::Int16(v) => out.push(Component::Int(*v as i128)),
        Value::Uint16(v) => out.push(Component::Int(*v as i128)),
        Value::Uint32(v) => out.push(Component::Int(*v as i128)),
        Value::Int64(v) | Value::Int(v) => out.push(Component::Int(*v as i128)),
        Value::Uint64(v) => out.push(Component::Int(*v as i128)),
        Value::Float16(v) => out.push(Component::Float(v.to_f64())),
        Value::Float32(v) => out.push(Component::Float(*v as f64)),
        Value::Float(v) => out.push(Component::Float(*v)),
        Value::Str(s) => out.push(Component::Str(s)),
        Value::V2f(v) => floats(out, &v.to_array()),
        Value::V2d(v) => doubles(out, &v.to_array()),
        Value::V3f(v) => floats(out, &v.to_array()),
        Value::V3d(v) => doubles(out, &v.to_array()),
        Value::Color3c(c) => out.extend(c.iter().map(|&v| Component::Int(v as i128))),
        Value::Color4c(c) => out.extend(c.iter().map(|&v| Component::Int(v as i128))),
        Value::Color4f(v) => floats(out, &v.to_array()),
        Value::Box3f(min, max) => {
            floats(out, &min.to_array());
            floats(out, &max.to_array());
        }
        Value::Box3d(min, max) => {
            doubles(out, &min.to_array());
            doubles(out, &max.to_array());
        }
        Value::M33f(m) => floats(out, &m.to_cols_array()),
        Value::M33d(m) => doubles(out, &m.to_cols_array()),
        Value::M44f(m) => floats(out, &m.to_cols_array()),
        Value::M44d(m) => doubles(out, &m.to_cols_array()),
        Value::List(items) => {
            for item in items {
                push_components(item, out)?;
            }
        }
        Value::Error(e) => {
            return Err(Error::TypeMismatch {
                expected: "value".into(),
                actual: format!("decode error placeholder ({e})"),
            })
        }
    }
    Ok(())
}

fn write_component(pod: Pod, component: &Component<'_>, out: &mut Vec<u8>) -> Result<()> {
    let mismatch = |actual: &str| Error::TypeMismatch {
        expected: pod.name().to_string(),
        actual: actual.to_string(),
    };
    match (pod, component) {
        (Pod::String | Pod::Wstring, Component::Str(s)) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        (Pod::String | Pod::Wstring, _) => return Err(mismatch("number")),
        (_, Component::Str(_)) => return Err(mismatch("string")),
        (pod, &Component::Int(v)) => write_number(pod, v, v as f64, out),
        (pod, &Component::Float(v)) => write_number(pod, v as i128, v, out),
    }
    Ok(())
}

/// Integer targets take `int` (wrapping), float targets take `float`.
fn write_number(pod: Pod, int: i128, float: f64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 8];
    match pod {
        Pod::Boolean => out.push((int != 0) as u8),
        Pod::Uint8 | Pod::Int8 => out.push(int as u8),
        Pod::Uint16 | Pod::Int16 => {
            LittleEndian::write_u16(&mut buf, int as u16);
            out.extend_from_slice(&buf[..2]);
        }
        Pod::Uint32 | Pod::Int32 => {
            LittleEndian::write_u32(&mut buf, int as u32);
            out.extend_from_slice(&buf[..4]);
        }
        Pod::Uint64 | Pod::Int64 => {
            LittleEndian::write_u64(&mut buf, int as u64);
            out.extend_from_slice(&buf);
        }
        Pod::Float16 => out.extend_from_slice(&f16::from_f64(float).to_le_bytes()),
        Pod::Float32 => {
            LittleEndian::write_f32(&mut buf, float as f32);
            out.extend_from_slice(&buf[..4]);
        }
        Pod::Float64 => {
            LittleEndian::write_f64(&mut buf, float);
            out.extend_from_slice(&buf);
        }
        Pod::String | Pod::Wstring | Pod::Unknown => {}
    }
}

/// Encode `value` as one sample of `data_type`.
///
/// Array samples take a list of elements (a bare value is a one-element
/// array); scalar samples take exactly one element.
pub fn encode(value: &Value, data_type: DataType, array: bool) -> Result<EncodedSample> {
    if !data_type.is_valid() {
        return Err(Error::TypeMismatch {
            expected: "known datatype".into(),
            actual: data_type.to_string(),
        });
    }
    let extent = data_type.extent as usize;

    let mut components = Vec::new();
    push_components(value, &mut components)?;
    if components.len() % extent != 0 || (!array && components.len() != extent) {
        return Err(Error::TypeMismatch {
            expected: data_type.to_string(),
            actual: format!("{} with {} components", value.kind(), components.len()),
        });
    }

    let mut bytes = Vec::with_capacity(components.len() * data_type.pod.num_bytes().max(1));
    for component in &components {
        write_component(data_type.pod, component, &mut bytes)?;
    }
    let dims = if array {
        vec![(components.len() / extent) as u64]
    } else {
        Vec::new()
    };
    Ok(EncodedSample { bytes, dims })
}

fn scalar_component(pod: Pod, c: &[u8]) -> Value {
    match pod {
        Pod::Boolean => Value::Bool(c[0] != 0),
        Pod::Uint8 => Value::Uint8(c[0]),
        Pod::Int8 => Value::Int8(c[0] as i8),
        Pod::Uint16 => Value::Uint16(LittleEndian::read_u16(c)),
        Pod::Int16 => Value::Int16(LittleEndian::read_i16(c)),
        Pod::Uint32 => Value::Uint32(LittleEndian::read_u32(c)),
        Pod::Int32 => Value::Int(LittleEndian::read_i32(c) as i64),
        Pod::Uint64 => Value::Uint64(LittleEndian::read_u64(c)),
        Pod::Int64 => Value::Int64(LittleEndian::read_i64(c)),
        Pod::Float16 => Value::Float16(f16::from_le_bytes([c[0], c[1]])),
        Pod::Float32 => Value::Float32(LittleEndian::read_f32(c)),
        Pod::Float64 => Value::Float(LittleEndian::read_f64(c)),
        Pod::String | Pod::Wstring | Pod::Unknown => Value::Error(format!("no scalar for {pod}")),
    }
}

fn element(pod: Pod, extent: usize, chunk: &[u8]) -> Value {
    match (pod, extent) {
        (Pod::Float32, 2 | 3 | 4 | 6 | 9 | 16) => {
            let f: Vec<f32> = bytemuck::pod_collect_to_vec(chunk);
            match extent {
                2 => Value::V2f(Vec2::from_slice(&f)),
                3 => Value::V3f(Vec3::from_slice(&f)),
                4 => Value::Color4f(Vec4::from_slice(&f)),
                6 => Value::Box3f(Vec3::from_slice(&f[..3]), Vec3::from_slice(&f[3..])),
                9 => Value::M33f(Mat3::from_cols_slice(&f)),
                _ => Value::M44f(Mat4::from_cols_slice(&f)),
            }
        }
        (Pod::Float64, 2 | 3 | 6 | 9 | 16) => {
            let d: Vec<f64> = bytemuck::pod_collect_to_vec(chunk);
            match extent {
                2 => Value::V2d(DVec2::from_slice(&d)),
                3 => Value::V3d(DVec3::from_slice(&d)),
                6 => Value::Box3d(DVec3::from_slice(&d[..3]), DVec3::from_slice(&d[3..])),
                9 => Value::M33d(DMat3::from_cols_slice(&d)),
                _ => Value::M44d(DMat4::from_cols_slice(&d)),
            }
        }
        (Pod::Uint8, 3) => Value::Color3c([chunk[0], chunk[1], chunk[2]]),
        (Pod::Uint8, 4) => Value::Color4c([chunk[0], chunk[1], chunk[2], chunk[3]]),
        (_, 1) => scalar_component(pod, chunk),
        _ => Value::List(
            chunk
                .chunks_exact(pod.num_bytes())
                .map(|c| scalar_component(pod, c))
                .collect(),
        ),
    }
}

/// Decode one stored sample of `data_type`.
pub fn decode(bytes: &[u8], data_type: DataType, array: bool) -> Result<Value> {
    if !data_type.is_valid() {
        return Err(Error::invalid(format!("cannot decode {data_type}")));
    }
    let extent = data_type.extent as usize;

    let elements: Vec<Value> = if data_type.pod.is_string() {
        let mut strings = Vec::new();
        for raw in bytes.split_inclusive(|&b| b == 0) {
            let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
            strings.push(Value::Str(String::from_utf8(raw.to_vec())?));
        }
        if strings.len() % extent != 0 {
            return Err(Error::invalid(format!(
                "{} strings do not fill {data_type} elements",
                strings.len()
            )));
        }
        if extent == 1 {
            strings
        } else {
            strings.chunks(extent).map(|c| Value::List(c.to_vec())).collect()
        }
    } else {
        let size = data_type.num_bytes();
        if bytes.len() % size != 0 {
            return Err(Error::invalid(format!(
                "{} bytes do not fill {data_type} elements",
                bytes.len()
            )));
        }
        bytes
            .chunks_exact(size)
            .map(|chunk| element(data_type.pod, extent, chunk))
            .collect()
    };

    if array {
        return Ok(Value::List(elements));
    }
    let count = elements.len();
    let mut elements = elements.into_iter();
    match (elements.next(), count) {
        (Some(value), 1) => Ok(value),
        // empty scalar string payload
        (None, 0) if data_type.pod.is_string() => Ok(Value::Str(String::new())),
        _ => Err(Error::invalid(format!(
            "scalar {data_type} sample holds {count} elements"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) -> Value {
        let array = is_array_value(&value);
        let dt = infer_data_type(&value, !array).expect("infer");
        let enc = encode(&value, dt, array).expect("encode");
        decode(&enc.bytes, dt, array).expect("decode")
    }

    #[test]
    fn test_tagged_wrapping() {
        assert_eq!(Value::int8(255), Value::Int8(-1));
        assert_eq!(Value::int8(0x1_05), Value::Int8(5));
        assert_eq!(Value::uint8(-1), Value::Uint8(255));
        assert_eq!(Value::int16(0x1_8000), Value::Int16(i16::MIN));
        assert_eq!(Value::int32(0x1_0000_0002), Value::Int(2));
        assert_eq!(Value::uint32(-1), Value::Uint32(u32::MAX));
    }

    #[test]
    fn test_pod_extent_table() {
        assert_eq!(pod_extent(&Value::Int(3)), Some((Pod::Int32, -1)));
        assert_eq!(pod_extent(&Value::Float(3.0)), Some((Pod::Float64, -1)));
        assert_eq!(pod_extent(&Value::V3f(Vec3::ONE)), Some((Pod::Float32, 3)));
        assert_eq!(pod_extent(&Value::M44d(DMat4::IDENTITY)), Some((Pod::Float64, 16)));
        assert_eq!(pod_extent(&Value::List(vec![])), None);
    }

    #[test]
    fn test_infer_data_type() {
        assert_eq!(infer_data_type(&Value::Int(1), true).unwrap(), DataType::INT32);
        assert_eq!(
            infer_data_type(&Value::Color3c([1, 2, 3]), true).unwrap(),
            DataType::new(Pod::Uint8, 3)
        );
        let list: Value = vec![Vec3::ZERO, Vec3::ONE].into();
        assert_eq!(infer_data_type(&list, false).unwrap(), DataType::VEC3F);

        let nested = Value::List(vec![vec![1.0f64, 2.0].into(), vec![3.0f64, 4.0].into()]);
        assert_eq!(infer_data_type(&nested, false).unwrap(), DataType::new(Pod::Float64, 2));

        let flat: Value = vec![1.0f32, 2.0, 3.0].into();
        assert_eq!(infer_data_type(&flat, true).unwrap(), DataType::VEC3F);
        assert_eq!(infer_data_type(&flat, false).unwrap(), DataType::FLOAT32);

        let err = infer_data_type(&Value::List(vec![]), true).unwrap_err();
        assert!(matches!(err, Error::UnknownDataType { .. }));
    }

    #[test]
    fn test_delist_collapses_single() {
        assert_eq!(delist(Value::List(vec![Value::Int(4)])), Value::Int(4));
        assert!(!is_array_value(&Value::List(vec![Value::Int(4)])));
        assert!(is_array_value(&vec![1i32, 2].into()));
    }

    #[test]
    fn test_scalar_roundtrips() {
        for value in [
            Value::Bool(true),
            Value::Int8(-3),
            Value::Uint16(65000),
            Value::Int(-42),
            Value::Uint64(u64::MAX),
            Value::Float16(f16::from_f32(0.5)),
            Value::Float32(1.25),
            Value::Float(std::f64::consts::PI),
            Value::Str("hello".into()),
            Value::V2d(DVec2::new(1.0, -2.0)),
            Value::Color4c([1, 2, 3, 4]),
            Value::Box3d(DVec3::splat(-1.0), DVec3::splat(1.0)),
            Value::M33f(Mat3::from_cols_array(&[1., 2., 3., 4., 5., 6., 7., 8., 9.])),
        ] {
            assert_eq!(roundtrip(value.clone()), value);
        }
    }

    #[test]
    fn test_array_roundtrips() {
        let strings: Value = vec!["a", "", "ccc"].into();
        assert_eq!(roundtrip(strings.clone()), strings);

        let points: Value = vec![Vec3::X, Vec3::Y, Vec3::Z].into();
        let dt = infer_data_type(&points, false).unwrap();
        let enc = encode(&points, dt, true).unwrap();
        assert_eq!(enc.dims, vec![3]);
        assert_eq!(enc.bytes.len(), 36);
        assert_eq!(decode(&enc.bytes, dt, true).unwrap(), points);
    }

    #[test]
    fn test_encode_mismatch() {
        let err = encode(&Value::Str("x".into()), DataType::FLOAT32, false).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        let err = encode(&Value::V3f(Vec3::ONE), DataType::FLOAT32, false).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(encode(&Value::Error("bad".into()), DataType::INT32, false).is_err());
    }

    #[test]
    fn test_numeric_conversion_on_encode() {
        let enc = encode(&Value::Int(3), DataType::FLOAT64, false).unwrap();
        assert_eq!(decode(&enc.bytes, DataType::FLOAT64, false).unwrap(), Value::Float(3.0));
        let enc = encode(&Value::Int(300), DataType::UINT8, false).unwrap();
        assert_eq!(enc.bytes, vec![44]);
    }
}
