//! Decode Plans
//!
//! Compiles a normalized schema into a tree of typed read operations, then
//! interprets that tree against complete message buffers. Compilation fixes
//! every field position up front (absolute, or cursor relative once the walk
//! has passed variable-length data); interpretation is a single pass with no
//! schema inspection left.

use crate::codec::buffer::{ByteReader, CodecResult};
use crate::codec::scalar::read_scalar;
use crate::schema::normalize::{NElem, NField, NormalizedSchema};
use crate::schema::types::ScalarType;
use crate::value::{FieldValue, MessageData};

use super::layout::{At, Layout};
use super::{ELEM_CONTENT_OFFSET, ELEM_LINK_OFFSET};

/// One step of a compiled decode procedure.
#[derive(Debug, Clone)]
pub(crate) enum DecodeOp {
    /// Read a scalar and store it under the field name.
    Scalar {
        at: At,
        ty: ScalarType,
        field: String,
    },
    /// Load a u16 descriptor into a runtime slot.
    Descriptor { at: At, slot: u16 },
    /// Move the cursor to the position a slot recorded.
    SeekSlot { slot: u16 },
    /// Move the cursor to a compiled position.
    Seek { at: At },
    /// Read UTF-16 code units at the cursor until a zero terminator.
    Utf16String { field: String },
    /// Read exactly the slot-recorded count of raw bytes at the cursor.
    RawBytes { count_slot: u16, field: String },
    /// Decode a nested object into a (possibly shared) sub-mapping.
    Object { field: String, body: Vec<DecodeOp> },
    /// Walk a forward-linked element chain.
    Array {
        field: String,
        count_slot: u16,
        offset_slot: u16,
        elem: DecodeElem,
    },
}

/// Element rule for an array chain.
#[derive(Debug, Clone)]
pub(crate) enum DecodeElem {
    Scalar(ScalarType),
    String,
    Object(Vec<DecodeOp>),
}

/// A compiled decode procedure plus the two facts the framing layer needs.
#[derive(Debug, Clone)]
pub(crate) struct DecodePlan {
    ops: Vec<DecodeOp>,
    slot_count: u16,
    /// Whether the message has any variable-length region.
    pub(crate) dynamic: bool,
    /// Bytes needed before every fixed-region field is resolvable.
    pub(crate) fixed_len: usize,
}

/// Compile the decode procedure for a normalized schema. `base` is the byte
/// offset of the first field (past the framing header).
pub(crate) fn compile_decode(schema: &NormalizedSchema, base: usize) -> DecodePlan {
    let mut cx = DecodeCx { fixed_len: None };
    let mut layout = Layout::at_start(base);
    let ops = cx.compile_fields(&schema.fields, &mut layout);
    DecodePlan {
        ops,
        slot_count: schema.slot_count,
        dynamic: layout.is_dynamic(),
        fixed_len: cx.fixed_len.unwrap_or_else(|| layout.delta()),
    }
}

struct DecodeCx {
    /// Static size at the first static-to-dynamic transition.
    fixed_len: Option<usize>,
}

impl DecodeCx {
    fn mark_dynamic(&mut self, layout: &mut Layout) {
        if !layout.is_dynamic() && self.fixed_len.is_none() {
            self.fixed_len = Some(layout.delta());
        }
        layout.go_dynamic();
    }

    fn compile_fields(&mut self, fields: &[NField], layout: &mut Layout) -> Vec<DecodeOp> {
        let mut ops = Vec::with_capacity(fields.len());
        for field in fields {
            match field {
                NField::Scalar { name, ty } => ops.push(DecodeOp::Scalar {
                    at: layout.take(ty.width()),
                    ty: *ty,
                    field: name.clone(),
                }),

                NField::RefArrayMarker {
                    count_slot,
                    offset_slot,
                    ..
                } => {
                    ops.push(DecodeOp::Descriptor {
                        at: layout.take(2),
                        slot: *count_slot,
                    });
                    ops.push(DecodeOp::Descriptor {
                        at: layout.take(2),
                        slot: *offset_slot,
                    });
                }

                NField::RefBytesMarker {
                    offset_slot,
                    count_slot,
                    ..
                } => {
                    ops.push(DecodeOp::Descriptor {
                        at: layout.take(2),
                        slot: *offset_slot,
                    });
                    ops.push(DecodeOp::Descriptor {
                        at: layout.take(2),
                        slot: *count_slot,
                    });
                }

                NField::RefStringMarker { offset_slot, .. } => {
                    ops.push(DecodeOp::Descriptor {
                        at: layout.take(2),
                        slot: *offset_slot,
                    });
                }

                NField::StringBody { name, offset_slot } => {
                    self.mark_dynamic(layout);
                    ops.push(DecodeOp::SeekSlot { slot: *offset_slot });
                    ops.push(DecodeOp::Utf16String {
                        field: name.clone(),
                    });
                }

                NField::InlineString { name } => {
                    let at = layout.here();
                    self.mark_dynamic(layout);
                    ops.push(DecodeOp::Seek { at });
                    ops.push(DecodeOp::Utf16String {
                        field: name.clone(),
                    });
                }

                NField::BytesBody {
                    name,
                    offset_slot,
                    count_slot,
                } => {
                    self.mark_dynamic(layout);
                    ops.push(DecodeOp::SeekSlot { slot: *offset_slot });
                    ops.push(DecodeOp::RawBytes {
                        count_slot: *count_slot,
                        field: name.clone(),
                    });
                }

                NField::Object { name, fields } => {
                    let body = self.compile_fields(fields, layout);
                    ops.push(DecodeOp::Object {
                        field: name.clone(),
                        body,
                    });
                }

                NField::ArrayBody {
                    name,
                    count_slot,
                    offset_slot,
                    elem,
                    ..
                } => {
                    // Chain walking always happens in the variable region.
                    // Interleaved siblings decode exactly like plain arrays:
                    // each chain is independently traceable. The seek folds
                    // any pending inline bytes into the cursor so an empty
                    // chain still leaves it where the elements would start.
                    let at = layout.here();
                    self.mark_dynamic(layout);
                    ops.push(DecodeOp::Seek { at });
                    let elem = match elem {
                        NElem::Scalar(ty) => DecodeElem::Scalar(*ty),
                        NElem::Str => DecodeElem::String,
                        NElem::Object(fields) => {
                            let mut sub = Layout::dynamic_at(ELEM_CONTENT_OFFSET);
                            let mut body = self.compile_fields(fields, &mut sub);
                            // Step the cursor past the element's trailing
                            // inline bytes, as the encoder does.
                            if sub.delta() > 0 {
                                body.push(DecodeOp::Seek { at: sub.here() });
                            }
                            DecodeElem::Object(body)
                        }
                    };
                    ops.push(DecodeOp::Array {
                        field: name.clone(),
                        count_slot: *count_slot,
                        offset_slot: *offset_slot,
                        elem,
                    });
                }
            }
        }
        ops
    }
}

impl DecodePlan {
    /// Decode one complete message buffer into a structured value.
    pub(crate) fn run(&self, buf: &[u8]) -> CodecResult<MessageData> {
        let r = ByteReader::new(buf);
        let mut slots = vec![0usize; self.slot_count as usize];
        let mut out = MessageData::new();
        let mut cursor = 0usize;
        run_ops(&self.ops, &r, &mut slots, &mut cursor, &mut out)?;
        Ok(out)
    }

    /// Inline positions in op order, for layout comparisons.
    #[cfg(test)]
    pub(crate) fn inline_positions(&self) -> Vec<At> {
        fn collect(ops: &[DecodeOp], out: &mut Vec<At>) {
            for op in ops {
                match op {
                    DecodeOp::Scalar { at, .. } | DecodeOp::Descriptor { at, .. } => {
                        out.push(*at)
                    }
                    DecodeOp::Object { body, .. } => collect(body, out),
                    DecodeOp::Array {
                        elem: DecodeElem::Object(body),
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

fn run_ops(
    ops: &[DecodeOp],
    r: &ByteReader,
    slots: &mut [usize],
    cursor: &mut usize,
    out: &mut MessageData,
) -> CodecResult<()> {
    for op in ops {
        match op {
            DecodeOp::Scalar { at, ty, field } => {
                let value = read_scalar(r, at.resolve(*cursor), *ty)?;
                out.set(field, value);
            }

            DecodeOp::Descriptor { at, slot } => {
                slots[*slot as usize] = r.get_u16(at.resolve(*cursor))? as usize;
            }

            DecodeOp::SeekSlot { slot } => *cursor = slots[*slot as usize],

            DecodeOp::Seek { at } => *cursor = at.resolve(*cursor),

            DecodeOp::Utf16String { field } => {
                let s = read_utf16(r, cursor)?;
                out.set(field, FieldValue::Str(s));
            }

            DecodeOp::RawBytes { count_slot, field } => {
                let count = slots[*count_slot as usize];
                let bytes = r.get_bytes(*cursor, count)?.to_vec();
                *cursor += count;
                out.set(field, FieldValue::Bytes(bytes));
            }

            DecodeOp::Object { field, body } => {
                let sub = out.entry_struct(field);
                run_ops(body, r, slots, cursor, sub)?;
            }

            DecodeOp::Array {
                field,
                count_slot,
                offset_slot,
                elem,
            } => {
                let count = slots[*count_slot as usize];
                let mut next = slots[*offset_slot as usize];
                let mut items = Vec::with_capacity(count);
                let entry = *cursor;
                for _ in 0..count {
                    let start = next;
                    next = r.get_u16(start + ELEM_LINK_OFFSET)? as usize;
                    match elem {
                        DecodeElem::Scalar(ty) => {
                            items.push(read_scalar(r, start + ELEM_CONTENT_OFFSET, *ty)?);
                            *cursor = start + ELEM_CONTENT_OFFSET + ty.width();
                        }
                        DecodeElem::String => {
                            *cursor = r.get_u16(start + ELEM_CONTENT_OFFSET)? as usize;
                            items.push(FieldValue::Str(read_utf16(r, cursor)?));
                        }
                        DecodeElem::Object(body) => {
                            *cursor = start;
                            let mut elem_out = MessageData::new();
                            run_ops(body, r, slots, cursor, &mut elem_out)?;
                            items.push(FieldValue::Struct(elem_out));
                        }
                    }
                }
                // A chain interleaved with a longer sibling ends before
                // bytes already consumed; the cursor never moves backwards.
                if *cursor < entry {
                    *cursor = entry;
                }
                out.set(field, FieldValue::List(items));
            }
        }
    }
    Ok(())
}

/// Code units until a zero terminator; the cursor ends past the terminator,
/// mirroring the encoder.
fn read_utf16(r: &ByteReader, cursor: &mut usize) -> CodecResult<String> {
    let mut units = Vec::new();
    loop {
        let unit = r.get_u16(*cursor)?;
        *cursor += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok(String::from_utf16_lossy(&units))
}
