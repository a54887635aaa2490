//! Clone Plans
//!
//! Schema-driven structural deep copy, independent of wire layout. Only
//! schema-declared fields are carried over, and domain values are rebuilt
//! through their raw integer form so a clone never shares an instance with
//! its source. Ref markers carry no logical value and are skipped.

use crate::schema::normalize::{NElem, NField, NormalizedSchema};
use crate::schema::types::ScalarType;
use crate::types::{Customize, SkillId, Vec3};
use crate::value::{FieldValue, MessageData};

/// One step of a compiled clone procedure.
#[derive(Debug, Clone)]
pub(crate) enum CloneOp {
    /// Copy the value as-is: plain scalars, strings, and whole lists of
    /// trivially copyable elements.
    Copy { field: String },
    /// Fresh byte sequence.
    Bytes { field: String },
    /// Rebuild a domain value from its raw form.
    Rebuild { field: String, ty: ScalarType },
    /// Recurse into a nested mapping (merging split declarations).
    Object { field: String, body: Vec<CloneOp> },
    /// Clone element by element.
    List { field: String, elem: CloneElem },
}

/// Per-element clone rule for non-trivial arrays.
#[derive(Debug, Clone)]
pub(crate) enum CloneElem {
    Rebuild(ScalarType),
    Object(Vec<CloneOp>),
}

/// A compiled deep-copy procedure.
#[derive(Debug, Clone)]
pub(crate) struct ClonePlan {
    ops: Vec<CloneOp>,
}

/// Compile the clone procedure for a normalized schema.
pub(crate) fn compile_clone(schema: &NormalizedSchema) -> ClonePlan {
    ClonePlan {
        ops: compile_fields(&schema.fields),
    }
}

fn compile_fields(fields: &[NField]) -> Vec<CloneOp> {
    let mut ops = Vec::with_capacity(fields.len());
    for field in fields {
        match field {
            NField::Scalar { name, ty } => {
                if ty.is_trivially_copyable() {
                    ops.push(CloneOp::Copy { field: name.clone() });
                } else {
                    ops.push(CloneOp::Rebuild {
                        field: name.clone(),
                        ty: *ty,
                    });
                }
            }

            // Markers transfer wire descriptors, not values.
            NField::RefArrayMarker { .. }
            | NField::RefBytesMarker { .. }
            | NField::RefStringMarker { .. } => {}

            NField::InlineString { name } | NField::StringBody { name, .. } => {
                ops.push(CloneOp::Copy { field: name.clone() });
            }

            NField::BytesBody { name, .. } => ops.push(CloneOp::Bytes { field: name.clone() }),

            NField::Object { name, fields } => ops.push(CloneOp::Object {
                field: name.clone(),
                body: compile_fields(fields),
            }),

            NField::ArrayBody { name, elem, .. } => {
                let op = match elem {
                    NElem::Scalar(ty) if ty.is_trivially_copyable() => {
                        CloneOp::Copy { field: name.clone() }
                    }
                    NElem::Scalar(ty) => CloneOp::List {
                        field: name.clone(),
                        elem: CloneElem::Rebuild(*ty),
                    },
                    NElem::Str => CloneOp::Copy { field: name.clone() },
                    NElem::Object(fields) => CloneOp::List {
                        field: name.clone(),
                        elem: CloneElem::Object(compile_fields(fields)),
                    },
                };
                ops.push(op);
            }
        }
    }
    ops
}

impl ClonePlan {
    /// Produce a fully independent copy of the schema-declared fields.
    pub(crate) fn run(&self, src: &MessageData) -> MessageData {
        let mut dst = MessageData::new();
        run_ops(&self.ops, src, &mut dst);
        dst
    }
}

fn run_ops(ops: &[CloneOp], src: &MessageData, dst: &mut MessageData) {
    for op in ops {
        match op {
            CloneOp::Copy { field } => {
                if let Some(value) = src.get(field) {
                    dst.set(field, value.clone());
                }
            }

            CloneOp::Bytes { field } => {
                if let Some(FieldValue::Bytes(bytes)) = src.get(field) {
                    dst.set(field, FieldValue::Bytes(bytes.clone()));
                }
            }

            CloneOp::Rebuild { field, ty } => {
                if let Some(value) = src.get(field) {
                    dst.set(field, rebuild(value, *ty));
                }
            }

            CloneOp::Object { field, body } => {
                if let Some(FieldValue::Struct(sub_src)) = src.get(field) {
                    let sub_dst = dst.entry_struct(field);
                    run_ops(body, sub_src, sub_dst);
                }
            }

            CloneOp::List { field, elem } => {
                if let Some(FieldValue::List(items)) = src.get(field) {
                    let cloned = items.iter().map(|item| clone_elem(elem, item)).collect();
                    dst.set(field, FieldValue::List(cloned));
                }
            }
        }
    }
}

/// Reconstruct an equivalent, independent domain value.
fn rebuild(value: &FieldValue, ty: ScalarType) -> FieldValue {
    match (ty, value) {
        (ScalarType::Vec3 | ScalarType::Vec3Fa, FieldValue::Vec3(v)) => {
            FieldValue::Vec3(Vec3::new(v.x, v.y, v.z))
        }
        (ScalarType::SkillId32, FieldValue::SkillId(id)) => {
            FieldValue::SkillId(SkillId::from_u32(id.as_u32()))
        }
        (ScalarType::SkillId, FieldValue::SkillId(id)) => {
            FieldValue::SkillId(SkillId::from_u64(id.as_u64()))
        }
        (ScalarType::Customize, FieldValue::Customize(c)) => {
            FieldValue::Customize(Customize::from_u64(c.as_u64()))
        }
        _ => value.clone(),
    }
}

fn clone_elem(elem: &CloneElem, item: &FieldValue) -> FieldValue {
    match elem {
        CloneElem::Rebuild(ty) => rebuild(item, *ty),
        CloneElem::Object(body) => match item {
            FieldValue::Struct(src) => {
                let mut dst = MessageData::new();
                run_ops(body, src, &mut dst);
                FieldValue::Struct(dst)
            }
            other => other.clone(),
        },
    }
}
