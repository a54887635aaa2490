//! Schema Normalization
//!
//! Wire schemas declare variable-length fields in two phases: a marker entry
//! (`RefArray`, `RefBytes`, `RefString`) that transfers a small inline
//! descriptor, and a same-named content entry that consumes it. The pairing
//! is by name within one nesting level; the entries need not be adjacent,
//! but the marker must come first. This pass resolves every pairing into an
//! explicit link backed by a preallocated runtime slot, checks interleaved
//! array placement, and rejects malformed schemas before any plan is built.
//! Plan compilation after a successful normalization cannot fail.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::types::{ArrayElem, Field, FieldType, Schema, ScalarType};

/// Errors detected while registering a message schema. These are raised once
/// per message type, never during message traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A type name in a definition file is not recognized.
    #[error("unknown field type \"{0}\"")]
    UnknownType(String),

    /// Two fields at the same nesting level reuse a name outside the
    /// marker/content pairing.
    #[error("field \"{0}\" declared more than once at the same level")]
    DuplicateField(String),

    /// A content field has no same-named marker before it.
    #[error("content field \"{name}\" has no preceding {expected} marker")]
    MissingMarker { name: String, expected: &'static str },

    /// A content field is paired with a marker of the wrong kind.
    #[error("marker and content for \"{0}\" have mismatched kinds")]
    MarkerMismatch(String),

    /// Interleaved arrays at one level must form one consecutive run.
    #[error("interleaved arrays must be consecutive fields (\"{0}\" breaks the run)")]
    NonAdjacentInterleaved(String),
}

/// Marker kind recorded during the level scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Array,
    Bytes,
    Str,
}

impl RefKind {
    fn expected_name(self) -> &'static str {
        match self {
            RefKind::Array => "refArray",
            RefKind::Bytes => "refBytes",
            RefKind::Str => "refString",
        }
    }
}

/// A normalized field, with every ref pairing resolved to runtime slots.
#[derive(Debug, Clone)]
pub(crate) enum NField {
    Scalar {
        name: String,
        ty: ScalarType,
    },
    /// `RefArray` marker: u16 count, then u16 offset.
    RefArrayMarker {
        count_slot: u16,
        offset_slot: u16,
        name: String,
    },
    /// `RefBytes` marker: u16 offset, then u16 count.
    RefBytesMarker {
        offset_slot: u16,
        count_slot: u16,
        name: String,
    },
    /// `RefString` marker: u16 offset.
    RefStringMarker {
        offset_slot: u16,
        name: String,
    },
    /// String content read/written at the current position, no marker.
    InlineString {
        name: String,
    },
    /// String content located through its marker's offset slot.
    StringBody {
        name: String,
        offset_slot: u16,
    },
    /// Byte run located and sized through its marker's slots.
    BytesBody {
        name: String,
        offset_slot: u16,
        count_slot: u16,
    },
    Object {
        name: String,
        fields: Vec<NField>,
    },
    /// Array content: a forward-linked chain of `count_slot` elements
    /// starting at `offset_slot`.
    ArrayBody {
        name: String,
        count_slot: u16,
        offset_slot: u16,
        elem: NElem,
        interleaved: bool,
    },
}

/// Normalized array element type.
#[derive(Debug, Clone)]
pub(crate) enum NElem {
    Scalar(ScalarType),
    Str,
    Object(Vec<NField>),
}

/// A schema with pairings resolved, ready for plan compilation.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedSchema {
    pub fields: Vec<NField>,
    /// Number of u16 descriptor slots the runtime must provide.
    pub slot_count: u16,
}

#[derive(Default)]
struct SlotAlloc {
    count: u16,
}

impl SlotAlloc {
    fn next(&mut self) -> u16 {
        let slot = self.count;
        self.count += 1;
        slot
    }
}

/// Resolve and validate a schema.
pub(crate) fn normalize(schema: &Schema) -> Result<NormalizedSchema, SchemaError> {
    let mut slots = SlotAlloc::default();
    let fields = normalize_level(&schema.fields, &mut slots)?;
    Ok(NormalizedSchema {
        fields,
        slot_count: slots.count,
    })
}

struct MarkerSlots {
    kind: RefKind,
    offset_slot: u16,
    count_slot: u16,
}

fn normalize_level(fields: &[Field], slots: &mut SlotAlloc) -> Result<Vec<NField>, SchemaError> {
    let mut markers: HashMap<&str, MarkerSlots> = HashMap::new();
    let mut taken: HashSet<&str> = HashSet::new();
    let mut objects: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(fields.len());
    let mut last_interleaved: Option<usize> = None;

    fn claim(
        name: &str,
        taken: &HashSet<&str>,
        markers: &HashMap<&str, MarkerSlots>,
        objects: &HashSet<&str>,
        allow_marker: bool,
    ) -> Result<(), SchemaError> {
        let clash = taken.contains(name)
            || objects.contains(name)
            || (!allow_marker && markers.contains_key(name));
        if clash {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }
        Ok(())
    }

    for (idx, field) in fields.iter().enumerate() {
        let name = field.name.as_str();
        match &field.ty {
            FieldType::Scalar(ty) => {
                claim(name, &taken, &markers, &objects, false)?;
                taken.insert(name);
                out.push(NField::Scalar {
                    name: name.to_string(),
                    ty: *ty,
                });
            }

            FieldType::RefArray => {
                claim(name, &taken, &markers, &objects, false)?;
                let count_slot = slots.next();
                let offset_slot = slots.next();
                markers.insert(
                    name,
                    MarkerSlots {
                        kind: RefKind::Array,
                        offset_slot,
                        count_slot,
                    },
                );
                out.push(NField::RefArrayMarker {
                    count_slot,
                    offset_slot,
                    name: name.to_string(),
                });
            }

            FieldType::RefBytes => {
                claim(name, &taken, &markers, &objects, false)?;
                let offset_slot = slots.next();
                let count_slot = slots.next();
                markers.insert(
                    name,
                    MarkerSlots {
                        kind: RefKind::Bytes,
                        offset_slot,
                        count_slot,
                    },
                );
                out.push(NField::RefBytesMarker {
                    offset_slot,
                    count_slot,
                    name: name.to_string(),
                });
            }

            FieldType::RefString => {
                claim(name, &taken, &markers, &objects, false)?;
                let offset_slot = slots.next();
                markers.insert(
                    name,
                    MarkerSlots {
                        kind: RefKind::Str,
                        offset_slot,
                        count_slot: 0,
                    },
                );
                out.push(NField::RefStringMarker {
                    offset_slot,
                    name: name.to_string(),
                });
            }

            FieldType::String => {
                claim(name, &taken, &markers, &objects, true)?;
                taken.insert(name);
                match markers.get(name) {
                    Some(m) if m.kind == RefKind::Str => out.push(NField::StringBody {
                        name: name.to_string(),
                        offset_slot: m.offset_slot,
                    }),
                    Some(_) => return Err(SchemaError::MarkerMismatch(name.to_string())),
                    None => out.push(NField::InlineString {
                        name: name.to_string(),
                    }),
                }
            }

            FieldType::Bytes => {
                claim(name, &taken, &markers, &objects, true)?;
                taken.insert(name);
                match markers.get(name) {
                    Some(m) if m.kind == RefKind::Bytes => out.push(NField::BytesBody {
                        name: name.to_string(),
                        offset_slot: m.offset_slot,
                        count_slot: m.count_slot,
                    }),
                    Some(_) => return Err(SchemaError::MarkerMismatch(name.to_string())),
                    None => {
                        return Err(SchemaError::MissingMarker {
                            name: name.to_string(),
                            expected: RefKind::Bytes.expected_name(),
                        })
                    }
                }
            }

            FieldType::Object(inner) => {
                // Objects may repeat: split declarations merge into one
                // nested mapping at run time.
                if taken.contains(name) || markers.contains_key(name) {
                    return Err(SchemaError::DuplicateField(name.to_string()));
                }
                objects.insert(name);
                out.push(NField::Object {
                    name: name.to_string(),
                    fields: normalize_level(&inner.fields, slots)?,
                });
            }

            FieldType::Array { elem, interleaved } => {
                claim(name, &taken, &markers, &objects, true)?;
                taken.insert(name);
                let (count_slot, offset_slot) = match markers.get(name) {
                    Some(m) if m.kind == RefKind::Array => (m.count_slot, m.offset_slot),
                    Some(_) => return Err(SchemaError::MarkerMismatch(name.to_string())),
                    None => {
                        return Err(SchemaError::MissingMarker {
                            name: name.to_string(),
                            expected: RefKind::Array.expected_name(),
                        })
                    }
                };
                if *interleaved {
                    if let Some(prev) = last_interleaved {
                        if prev + 1 != idx {
                            return Err(SchemaError::NonAdjacentInterleaved(name.to_string()));
                        }
                    }
                    last_interleaved = Some(idx);
                }
                let elem = match elem {
                    ArrayElem::Scalar(ty) => NElem::Scalar(*ty),
                    ArrayElem::String => NElem::Str,
                    ArrayElem::Object(inner) => {
                        NElem::Object(normalize_level(&inner.fields, slots)?)
                    }
                };
                out.push(NField::ArrayBody {
                    name: name.to_string(),
                    count_slot,
                    offset_slot,
                    elem,
                    interleaved: *interleaved,
                });
            }
        }
    }

    Ok(out)
}
