//! Schema Types - Message Field Definitions
//!
//! The type system for wire messages: an ordered list of named, typed
//! fields, possibly nested and recursive. Field order is significant and
//! fixed for the lifetime of a message type; a schema is compiled once and
//! never consulted again at message time.

use serde::{Deserialize, Serialize};

use super::normalize::SchemaError;

/// Primitive field types with a fixed wire width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// One byte, any nonzero value decodes as true.
    Bool,
    Byte,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Fixed-point angle: i16 covering [-pi, pi) at 2*pi/65536 resolution.
    Angle,
    /// Three consecutive f32 components.
    Vec3,
    /// Same layout as `Vec3` with each component passed through the angle
    /// scale factor.
    Vec3Fa,
    /// Skill identifier in its 32-bit wire form.
    SkillId32,
    /// Skill identifier in its 64-bit wire form.
    SkillId,
    /// Customization bitfield, 64-bit.
    Customize,
}

impl ScalarType {
    /// Bytes consumed on the wire.
    pub fn width(&self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Byte => 1,
            ScalarType::I16 | ScalarType::U16 | ScalarType::Angle => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 | ScalarType::SkillId32 => 4,
            ScalarType::I64
            | ScalarType::U64
            | ScalarType::F64
            | ScalarType::SkillId
            | ScalarType::Customize => 8,
            ScalarType::Vec3 | ScalarType::Vec3Fa => 12,
        }
    }

    /// Plain values a deep copy may move wholesale; domain values are
    /// rebuilt instead so clones never share an instance.
    pub fn is_trivially_copyable(&self) -> bool {
        !matches!(
            self,
            ScalarType::Vec3
                | ScalarType::Vec3Fa
                | ScalarType::SkillId32
                | ScalarType::SkillId
                | ScalarType::Customize
        )
    }

    /// Wire name used in message definition files.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Byte => "byte",
            ScalarType::I16 => "int16",
            ScalarType::U16 => "uint16",
            ScalarType::I32 => "int32",
            ScalarType::U32 => "uint32",
            ScalarType::I64 => "int64",
            ScalarType::U64 => "uint64",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
            ScalarType::Angle => "angle",
            ScalarType::Vec3 => "vec3",
            ScalarType::Vec3Fa => "vec3fa",
            ScalarType::SkillId32 => "skillid32",
            ScalarType::SkillId => "skillid",
            ScalarType::Customize => "customize",
        }
    }

    /// Look up a primitive by its definition-file name.
    pub fn from_name(name: &str) -> Result<Self, SchemaError> {
        Ok(match name {
            "bool" => ScalarType::Bool,
            "byte" => ScalarType::Byte,
            "int16" => ScalarType::I16,
            "uint16" => ScalarType::U16,
            "int32" => ScalarType::I32,
            "uint32" => ScalarType::U32,
            "int64" => ScalarType::I64,
            "uint64" => ScalarType::U64,
            "float" => ScalarType::F32,
            "double" => ScalarType::F64,
            "angle" => ScalarType::Angle,
            "vec3" => ScalarType::Vec3,
            "vec3fa" => ScalarType::Vec3Fa,
            "skillid32" => ScalarType::SkillId32,
            "skillid" => ScalarType::SkillId,
            "customize" => ScalarType::Customize,
            other => return Err(SchemaError::UnknownType(other.to_string())),
        })
    }
}

/// Element type of an array field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayElem {
    Scalar(ScalarType),
    String,
    Object(Schema),
}

/// Field type in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Scalar(ScalarType),
    /// Inline descriptor (u16 count, u16 offset) for a same-named `Array`.
    RefArray,
    /// Inline descriptor (u16 offset, u16 count) for a same-named `Bytes`.
    RefBytes,
    /// Inline descriptor (u16 offset) for a same-named `String`.
    RefString,
    /// Zero-terminated UTF-16 string; out-of-line when paired with a
    /// `RefString` marker, inline at the current position otherwise.
    String,
    /// Raw byte run located by its `RefBytes` marker.
    Bytes,
    /// Named group of sub-fields.
    Object(Schema),
    /// Forward-linked chain of variable-size elements, located by a
    /// `RefArray` marker. Interleaved siblings serialize element by element
    /// as one group.
    Array { elem: ArrayElem, interleaved: bool },
}

impl FieldType {
    /// Look up a non-aggregate field type by its definition-file name.
    pub fn from_name(name: &str) -> Result<Self, SchemaError> {
        Ok(match name {
            "refArray" => FieldType::RefArray,
            "refBytes" => FieldType::RefBytes,
            "refString" => FieldType::RefString,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            other => FieldType::Scalar(ScalarType::from_name(other)?),
        })
    }
}

/// A single named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

impl Field {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// An ordered message field layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a flat schema from `(name, type-name)` pairs as they appear in
    /// definition files. Unknown type names are rejected here, before any
    /// compilation happens.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, SchemaError> {
        let mut schema = Schema::new();
        for (name, ty) in pairs {
            schema = schema.field(name, FieldType::from_name(ty)?);
        }
        Ok(schema)
    }

    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }

    pub fn scalar(self, name: &str, ty: ScalarType) -> Self {
        self.field(name, FieldType::Scalar(ty))
    }

    pub fn ref_array(self, name: &str) -> Self {
        self.field(name, FieldType::RefArray)
    }

    pub fn ref_bytes(self, name: &str) -> Self {
        self.field(name, FieldType::RefBytes)
    }

    pub fn ref_string(self, name: &str) -> Self {
        self.field(name, FieldType::RefString)
    }

    pub fn string(self, name: &str) -> Self {
        self.field(name, FieldType::String)
    }

    pub fn bytes(self, name: &str) -> Self {
        self.field(name, FieldType::Bytes)
    }

    pub fn object(self, name: &str, inner: Schema) -> Self {
        self.field(name, FieldType::Object(inner))
    }

    pub fn array(self, name: &str, elem: ArrayElem) -> Self {
        self.field(
            name,
            FieldType::Array {
                elem,
                interleaved: false,
            },
        )
    }

    pub fn interleaved_array(self, name: &str, elem: ArrayElem) -> Self {
        self.field(
            name,
            FieldType::Array {
                elem,
                interleaved: true,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
