//! Encode Plans
//!
//! Compiles a normalized schema into a tree of typed write operations and
//! runs them against a caller-supplied output buffer. The encoder handles
//! two things the decoder never needs: placeholder back-patching (an offset
//! descriptor is written as zero, its position remembered, and overwritten
//! once the payload's real position is known) and absent-value defaulting
//! (every operation writes the field's zero form when no value is present,
//! so an absent nested object still produces a correctly sized region).

use crate::codec::buffer::{ByteWriter, CodecResult};
use crate::codec::scalar::write_scalar;
use crate::schema::normalize::{NElem, NField, NormalizedSchema};
use crate::schema::types::ScalarType;
use crate::value::{FieldValue, MessageData};

use super::layout::{At, Layout};
use super::{ELEM_CONTENT_OFFSET, ELEM_LINK_OFFSET, ELEM_STRING_OFFSET};

/// One step of a compiled encode procedure.
#[derive(Debug, Clone)]
pub(crate) enum EncodeOp {
    /// Write a scalar, or its zero default when absent.
    Scalar {
        at: At,
        ty: ScalarType,
        field: String,
    },
    /// Write the element or byte count of a value as u16 (0 when absent).
    Count { at: At, field: String },
    /// Write a zero placeholder and remember its position for patching.
    Reserve { at: At, slot: u16 },
    /// Fold a pending constant delta into the runtime cursor.
    Advance { by: usize },
    /// Overwrite a reserved placeholder with the current cursor position.
    Patch { slot: u16 },
    /// Write UTF-16 code units plus the zero terminator at the cursor.
    Utf16String { field: String },
    /// Write a raw byte run at the cursor (nothing when absent).
    RawBytes { field: String },
    /// Encode a nested object; absent objects encode as all defaults.
    Object { field: String, body: Vec<EncodeOp> },
    /// Write a forward-linked element chain.
    Array {
        field: String,
        offset_slot: u16,
        elem: EncodeElem,
    },
    /// Write several sibling chains one element index at a time.
    Interleaved { arms: Vec<InterleavedArm> },
}

/// One member array of an interleaved group.
#[derive(Debug, Clone)]
pub(crate) struct InterleavedArm {
    pub(crate) field: String,
    pub(crate) offset_slot: u16,
    pub(crate) elem: EncodeElem,
}

/// Element rule for an array chain.
#[derive(Debug, Clone)]
pub(crate) enum EncodeElem {
    Scalar(ScalarType),
    String,
    /// Object element body, compiled cursor-relative to the element start;
    /// ends with the advance that steps the cursor past the element.
    Object(Vec<EncodeOp>),
}

/// A compiled encode procedure.
#[derive(Debug, Clone)]
pub(crate) struct EncodePlan {
    ops: Vec<EncodeOp>,
    slot_count: u16,
    pub(crate) dynamic: bool,
    /// Static size of a fully static message, or the trailing constant to
    /// add to the final cursor of a dynamic one.
    pub(crate) tail_delta: usize,
}

/// Compile the encode procedure for a normalized schema.
pub(crate) fn compile_encode(schema: &NormalizedSchema, base: usize) -> EncodePlan {
    let mut layout = Layout::at_start(base);
    let ops = compile_fields(&schema.fields, &mut layout);
    EncodePlan {
        ops,
        slot_count: schema.slot_count,
        dynamic: layout.is_dynamic(),
        tail_delta: layout.delta(),
    }
}

/// Emit the cursor fold for a static-to-dynamic transition (or for pending
/// bytes already written relative to the cursor).
fn fold_into(ops: &mut Vec<EncodeOp>, layout: &mut Layout) {
    let by = layout.fold();
    if by > 0 {
        ops.push(EncodeOp::Advance { by });
    }
}

fn compile_elem(elem: &NElem) -> EncodeElem {
    match elem {
        NElem::Scalar(ty) => EncodeElem::Scalar(*ty),
        NElem::Str => EncodeElem::String,
        NElem::Object(fields) => {
            let mut sub = Layout::dynamic_at(ELEM_CONTENT_OFFSET);
            let mut body = compile_fields(fields, &mut sub);
            fold_into(&mut body, &mut sub);
            EncodeElem::Object(body)
        }
    }
}

fn compile_fields(fields: &[NField], layout: &mut Layout) -> Vec<EncodeOp> {
    let mut ops = Vec::with_capacity(fields.len());
    let mut idx = 0;
    while idx < fields.len() {
        // A run of interleaved arrays shares one write loop.
        if matches!(
            fields[idx],
            NField::ArrayBody {
                interleaved: true,
                ..
            }
        ) {
            let mut arms = Vec::new();
            while let Some(NField::ArrayBody {
                name,
                offset_slot,
                elem,
                interleaved: true,
                ..
            }) = fields.get(idx)
            {
                arms.push(InterleavedArm {
                    field: name.clone(),
                    offset_slot: *offset_slot,
                    elem: compile_elem(elem),
                });
                idx += 1;
            }
            fold_into(&mut ops, layout);
            ops.push(EncodeOp::Interleaved { arms });
            continue;
        }

        match &fields[idx] {
            NField::Scalar { name, ty } => ops.push(EncodeOp::Scalar {
                at: layout.take(ty.width()),
                ty: *ty,
                field: name.clone(),
            }),

            NField::RefArrayMarker {
                offset_slot, name, ..
            } => {
                ops.push(EncodeOp::Count {
                    at: layout.take(2),
                    field: name.clone(),
                });
                ops.push(EncodeOp::Reserve {
                    at: layout.take(2),
                    slot: *offset_slot,
                });
            }

            NField::RefBytesMarker {
                offset_slot, name, ..
            } => {
                ops.push(EncodeOp::Reserve {
                    at: layout.take(2),
                    slot: *offset_slot,
                });
                ops.push(EncodeOp::Count {
                    at: layout.take(2),
                    field: name.clone(),
                });
            }

            NField::RefStringMarker { offset_slot, .. } => {
                ops.push(EncodeOp::Reserve {
                    at: layout.take(2),
                    slot: *offset_slot,
                });
            }

            NField::StringBody { name, offset_slot } => {
                fold_into(&mut ops, layout);
                ops.push(EncodeOp::Patch { slot: *offset_slot });
                ops.push(EncodeOp::Utf16String {
                    field: name.clone(),
                });
            }

            NField::InlineString { name } => {
                fold_into(&mut ops, layout);
                ops.push(EncodeOp::Utf16String {
                    field: name.clone(),
                });
            }

            NField::BytesBody {
                name, offset_slot, ..
            } => {
                fold_into(&mut ops, layout);
                ops.push(EncodeOp::Patch { slot: *offset_slot });
                ops.push(EncodeOp::RawBytes {
                    field: name.clone(),
                });
            }

            NField::Object { name, fields } => {
                let body = compile_fields(fields, layout);
                ops.push(EncodeOp::Object {
                    field: name.clone(),
                    body,
                });
            }

            NField::ArrayBody {
                name,
                offset_slot,
                elem,
                ..
            } => {
                fold_into(&mut ops, layout);
                ops.push(EncodeOp::Array {
                    field: name.clone(),
                    offset_slot: *offset_slot,
                    elem: compile_elem(elem),
                });
            }
        }
        idx += 1;
    }
    ops
}

impl EncodePlan {
    /// Encode a message into `buf`, returning the total bytes written.
    pub(crate) fn run(&self, data: &MessageData, buf: &mut [u8]) -> CodecResult<usize> {
        let mut w = ByteWriter::new(buf);
        let mut slots = vec![0usize; self.slot_count as usize];
        let mut cursor = 0usize;
        run_ops(&self.ops, &mut w, &mut slots, &mut cursor, Some(data))?;
        Ok(if self.dynamic {
            cursor + self.tail_delta
        } else {
            self.tail_delta
        })
    }

    /// Inline positions in op order, for layout comparisons.
    #[cfg(test)]
    pub(crate) fn inline_positions(&self) -> Vec<At> {
        fn collect(ops: &[EncodeOp], out: &mut Vec<At>) {
            for op in ops {
                match op {
                    EncodeOp::Scalar { at, .. }
                    | EncodeOp::Count { at, .. }
                    | EncodeOp::Reserve { at, .. } => out.push(*at),
                    EncodeOp::Object { body, .. } => collect(body, out),
                    EncodeOp::Array {
                        elem: EncodeElem::Object(body),
                        ..
                    } => collect(body, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.ops, &mut out);
        out
    }
}

/// Field lookup honoring explicit nulls and absent parent objects.
fn fetch<'a>(data: Option<&'a MessageData>, field: &str) -> Option<&'a FieldValue> {
    data.and_then(|d| d.get(field)).filter(|v| !v.is_null())
}

fn run_ops(
    ops: &[EncodeOp],
    w: &mut ByteWriter,
    slots: &mut [usize],
    cursor: &mut usize,
    data: Option<&MessageData>,
) -> CodecResult<()> {
    for op in ops {
        match op {
            EncodeOp::Scalar { at, ty, field } => {
                write_scalar(w, at.resolve(*cursor), *ty, fetch(data, field))?;
            }

            EncodeOp::Count { at, field } => {
                let count = fetch(data, field).and_then(FieldValue::len).unwrap_or(0);
                w.set_u16(at.resolve(*cursor), count as u16)?;
            }

            EncodeOp::Reserve { at, slot } => {
                let pos = at.resolve(*cursor);
                slots[*slot as usize] = pos;
                w.set_u16(pos, 0)?;
            }

            EncodeOp::Advance { by } => *cursor += by,

            EncodeOp::Patch { slot } => {
                w.set_u16(slots[*slot as usize], *cursor as u16)?;
            }

            EncodeOp::Utf16String { field } => {
                write_utf16(w, cursor, fetch(data, field).and_then(FieldValue::as_str))?;
            }

            EncodeOp::RawBytes { field } => {
                if let Some(bytes) = fetch(data, field).and_then(FieldValue::as_bytes) {
                    w.set_bytes(*cursor, bytes)?;
                    *cursor += bytes.len();
                }
            }

            EncodeOp::Object { field, body } => {
                let sub = fetch(data, field).and_then(FieldValue::as_struct);
                run_ops(body, w, slots, cursor, sub)?;
            }

            EncodeOp::Array {
                field,
                offset_slot,
                elem,
            } => {
                let items = match fetch(data, field).and_then(FieldValue::as_list) {
                    Some(items) if !items.is_empty() => items,
                    _ => continue,
                };
                let mut last = slots[*offset_slot as usize];
                for item in items {
                    chain_step(w, cursor, &mut last)?;
                    write_elem(elem, item, w, slots, cursor)?;
                }
            }

            EncodeOp::Interleaved { arms } => {
                let lists: Vec<Option<&[FieldValue]>> = arms
                    .iter()
                    .map(|arm| fetch(data, &arm.field).and_then(FieldValue::as_list))
                    .collect();
                let mut lasts: Vec<usize> = arms
                    .iter()
                    .map(|arm| slots[arm.offset_slot as usize])
                    .collect();
                let max_len = lists
                    .iter()
                    .map(|l| l.map(<[FieldValue]>::len).unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                for idx in 0..max_len {
                    for (a, arm) in arms.iter().enumerate() {
                        let item = match lists[a].and_then(|items| items.get(idx)) {
                            Some(item) => item,
                            None => continue,
                        };
                        chain_step(w, cursor, &mut lasts[a])?;
                        write_elem(&arm.elem, item, w, slots, cursor)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Link the previous element (or the chain header) to the element starting
/// at the cursor, then lay down the element's own chain words.
fn chain_step(w: &mut ByteWriter, cursor: &mut usize, last: &mut usize) -> CodecResult<()> {
    w.set_u16(*last, *cursor as u16)?;
    w.set_u16(*cursor, *cursor as u16)?;
    w.set_u16(*cursor + ELEM_LINK_OFFSET, 0)?;
    *last = *cursor + ELEM_LINK_OFFSET;
    Ok(())
}

fn write_elem(
    elem: &EncodeElem,
    item: &FieldValue,
    w: &mut ByteWriter,
    slots: &mut [usize],
    cursor: &mut usize,
) -> CodecResult<()> {
    match elem {
        EncodeElem::Scalar(ty) => {
            let value = Some(item).filter(|v| !v.is_null());
            write_scalar(w, *cursor + ELEM_CONTENT_OFFSET, *ty, value)?;
            *cursor += ELEM_CONTENT_OFFSET + ty.width();
            Ok(())
        }
        EncodeElem::String => {
            let target = *cursor + ELEM_STRING_OFFSET;
            w.set_u16(*cursor + ELEM_CONTENT_OFFSET, target as u16)?;
            *cursor = target;
            write_utf16(w, cursor, item.as_str())
        }
        EncodeElem::Object(body) => run_ops(body, w, slots, cursor, item.as_struct()),
    }
}

/// Code units then the zero terminator; absent strings write only the
/// terminator. The cursor ends past the terminator.
fn write_utf16(w: &mut ByteWriter, cursor: &mut usize, value: Option<&str>) -> CodecResult<()> {
    if let Some(s) = value {
        for unit in s.encode_utf16() {
            w.set_u16(*cursor, unit)?;
            *cursor += 2;
        }
    }
    w.set_u16(*cursor, 0)?;
    *cursor += 2;
    Ok(())
}
