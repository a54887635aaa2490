//! Scalar Codec Table
//!
//! Per-primitive read and write rules shared by the compiled plans:
//! little-endian fixed-width access, the fixed-point angle transform,
//! domain value wrapping and absent-value defaults. An absent value always
//! encodes as the zero pattern of the field's width.

use crate::codec::buffer::{ByteReader, ByteWriter, CodecResult};
use crate::schema::types::ScalarType;
use crate::types::{Customize, SkillId, Vec3};
use crate::value::FieldValue;

/// Radians per angle unit: the i16 range maps onto [-pi, pi).
pub const ANGLE_TO_RAD: f64 = std::f64::consts::PI / 32768.0;

/// Angle units per radian.
pub const RAD_TO_ANGLE: f64 = 32768.0 / std::f64::consts::PI;

/// Decode one scalar at an absolute offset.
pub(crate) fn read_scalar(r: &ByteReader, at: usize, ty: ScalarType) -> CodecResult<FieldValue> {
    Ok(match ty {
        ScalarType::Bool => FieldValue::Bool(r.get_u8(at)? != 0),
        ScalarType::Byte => FieldValue::UInt(r.get_u8(at)? as u64),
        ScalarType::I16 => FieldValue::Int(r.get_i16(at)? as i64),
        ScalarType::U16 => FieldValue::UInt(r.get_u16(at)? as u64),
        ScalarType::I32 => FieldValue::Int(r.get_i32(at)? as i64),
        ScalarType::U32 => FieldValue::UInt(r.get_u32(at)? as u64),
        ScalarType::I64 => FieldValue::Int(r.get_i64(at)?),
        ScalarType::U64 => FieldValue::UInt(r.get_u64(at)?),
        ScalarType::F32 => FieldValue::Float(r.get_f32(at)? as f64),
        ScalarType::F64 => FieldValue::Float(r.get_f64(at)?),
        ScalarType::Angle => FieldValue::Float(r.get_i16(at)? as f64 * ANGLE_TO_RAD),
        ScalarType::Vec3 => FieldValue::Vec3(Vec3::new(
            r.get_f32(at)?,
            r.get_f32(at + 4)?,
            r.get_f32(at + 8)?,
        )),
        // The angle scale factor applied to float components reproduces the
        // wire format as observed; do not "correct" it.
        ScalarType::Vec3Fa => FieldValue::Vec3(Vec3::new(
            (r.get_f32(at)? as f64 * ANGLE_TO_RAD) as f32,
            (r.get_f32(at + 4)? as f64 * ANGLE_TO_RAD) as f32,
            (r.get_f32(at + 8)? as f64 * ANGLE_TO_RAD) as f32,
        )),
        ScalarType::SkillId32 => FieldValue::SkillId(SkillId::from_u32(r.get_u32(at)?)),
        ScalarType::SkillId => FieldValue::SkillId(SkillId::from_u64(r.get_u64(at)?)),
        ScalarType::Customize => FieldValue::Customize(Customize::from_u64(r.get_u64(at)?)),
    })
}

/// Encode one scalar at an absolute offset. `None` (or a mismatched value
/// for the domain types) writes the field's zero default.
pub(crate) fn write_scalar(
    w: &mut ByteWriter,
    at: usize,
    ty: ScalarType,
    value: Option<&FieldValue>,
) -> CodecResult<()> {
    match ty {
        ScalarType::Bool => {
            let v = value.and_then(FieldValue::as_bool).unwrap_or(false);
            w.set_u8(at, v as u8)
        }
        ScalarType::Byte => {
            let v = value.and_then(FieldValue::as_u64).unwrap_or(0);
            w.set_u8(at, v as u8)
        }
        ScalarType::I16 => {
            let v = value.and_then(FieldValue::as_i64).unwrap_or(0);
            w.set_i16(at, v as i16)
        }
        ScalarType::U16 => {
            let v = value.and_then(FieldValue::as_u64).unwrap_or(0);
            w.set_u16(at, v as u16)
        }
        ScalarType::I32 => {
            let v = value.and_then(FieldValue::as_i64).unwrap_or(0);
            w.set_i32(at, v as i32)
        }
        ScalarType::U32 => {
            let v = value.and_then(FieldValue::as_u64).unwrap_or(0);
            w.set_u32(at, v as u32)
        }
        ScalarType::I64 => {
            let v = value.and_then(FieldValue::as_i64).unwrap_or(0);
            w.set_i64(at, v)
        }
        ScalarType::U64 => {
            let v = value.and_then(FieldValue::as_u64).unwrap_or(0);
            w.set_u64(at, v)
        }
        ScalarType::F32 => {
            let v = value.and_then(FieldValue::as_f64).unwrap_or(0.0);
            w.set_f32(at, v as f32)
        }
        ScalarType::F64 => {
            let v = value.and_then(FieldValue::as_f64).unwrap_or(0.0);
            w.set_f64(at, v)
        }
        ScalarType::Angle => {
            let v = value.and_then(FieldValue::as_f64).unwrap_or(0.0);
            w.set_i16(at, (v * RAD_TO_ANGLE) as i16)
        }
        ScalarType::Vec3 => {
            let v = match value {
                Some(FieldValue::Vec3(v)) => *v,
                _ => Vec3::ZERO,
            };
            w.set_f32(at, v.x)?;
            w.set_f32(at + 4, v.y)?;
            w.set_f32(at + 8, v.z)
        }
        ScalarType::Vec3Fa => {
            let v = match value {
                Some(FieldValue::Vec3(v)) => *v,
                _ => Vec3::ZERO,
            };
            w.set_f32(at, (v.x as f64 * RAD_TO_ANGLE) as f32)?;
            w.set_f32(at + 4, (v.y as f64 * RAD_TO_ANGLE) as f32)?;
            w.set_f32(at + 8, (v.z as f64 * RAD_TO_ANGLE) as f32)
        }
        ScalarType::SkillId32 => {
            let raw = match value {
                Some(FieldValue::SkillId(id)) => id.as_u32(),
                Some(other) => other.as_u64().unwrap_or(0) as u32,
                None => 0,
            };
            w.set_u32(at, raw)
        }
        ScalarType::SkillId => {
            let raw = match value {
                Some(FieldValue::SkillId(id)) => id.as_u64(),
                Some(other) => other.as_u64().unwrap_or(0),
                None => 0,
            };
            w.set_u64(at, raw)
        }
        ScalarType::Customize => {
            let raw = match value {
                Some(FieldValue::Customize(c)) => c.as_u64(),
                Some(other) => other.as_u64().unwrap_or(0),
                None => 0,
            };
            w.set_u64(at, raw)
        }
    }
}
