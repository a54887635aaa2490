//! Message Values
//!
//! A decoded message is dynamic: a mapping from field name to a tagged
//! value, arbitrarily nested. The same shape is what the encoder consumes,
//! with absent fields standing in for wire defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Customize, SkillId, Vec3};

/// A single field value in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicitly absent; encoded as the field's wire default.
    Null,
    Bool(bool),
    /// Signed integer value (i16/i32/i64 fields).
    Int(i64),
    /// Unsigned integer value (byte/u16/u32/u64 fields).
    UInt(u64),
    /// Floating point value (f32/f64/angle fields).
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Vec3(Vec3),
    SkillId(SkillId),
    Customize(Customize),
    List(Vec<FieldValue>),
    Struct(MessageData),
}

impl FieldValue {
    /// Lenient signed view, mirroring how the wire treats numeric fields.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::UInt(u) => Some(*u as i64),
            FieldValue::Float(f) => Some(*f as i64),
            FieldValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Lenient unsigned view.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Int(i) => Some(*i as u64),
            FieldValue::UInt(u) => Some(*u),
            FieldValue::Float(f) => Some(*f as u64),
            FieldValue::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::UInt(u) => Some(*u as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Bool(b) => Some(*b as u8 as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Int(i) => Some(*i != 0),
            FieldValue::UInt(u) => Some(*u != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&MessageData> {
        match self {
            FieldValue::Struct(data) => Some(data),
            _ => None,
        }
    }

    /// Element or byte count, for descriptor fields.
    pub fn len(&self) -> Option<usize> {
        match self {
            FieldValue::List(items) => Some(items.len()),
            FieldValue::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// A message as a field-name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub fields: HashMap<String, FieldValue>,
}

impl MessageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Nested mapping under `name`, allocated on first use. Repeated object
    /// declarations in a schema merge into the same mapping through this.
    pub fn entry_struct(&mut self, name: &str) -> &mut MessageData {
        let entry = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| FieldValue::Struct(MessageData::new()));
        if !matches!(entry, FieldValue::Struct(_)) {
            *entry = FieldValue::Struct(MessageData::new());
        }
        match entry {
            FieldValue::Struct(data) => data,
            _ => unreachable!("entry was just set to a struct"),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builder pattern: add a signed integer field.
    pub fn with_int(mut self, name: &str, value: i64) -> Self {
        self.set(name, FieldValue::Int(value));
        self
    }

    /// Builder pattern: add an unsigned integer field.
    pub fn with_uint(mut self, name: &str, value: u64) -> Self {
        self.set(name, FieldValue::UInt(value));
        self
    }

    /// Builder pattern: add a float field.
    pub fn with_float(mut self, name: &str, value: f64) -> Self {
        self.set(name, FieldValue::Float(value));
        self
    }

    /// Builder pattern: add a boolean field.
    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.set(name, FieldValue::Bool(value));
        self
    }

    /// Builder pattern: add a string field.
    pub fn with_str(mut self, name: &str, value: &str) -> Self {
        self.set(name, FieldValue::Str(value.to_string()));
        self
    }

    /// Builder pattern: add a bytes field.
    pub fn with_bytes(mut self, name: &str, value: Vec<u8>) -> Self {
        self.set(name, FieldValue::Bytes(value));
        self
    }

    /// Builder pattern: add a vector field.
    pub fn with_vec3(mut self, name: &str, value: Vec3) -> Self {
        self.set(name, FieldValue::Vec3(value));
        self
    }

    /// Builder pattern: add a list field.
    pub fn with_list(mut self, name: &str, items: Vec<FieldValue>) -> Self {
        self.set(name, FieldValue::List(items));
        self
    }

    /// Builder pattern: add a nested object field.
    pub fn with_struct(mut self, name: &str, value: MessageData) -> Self {
        self.set(name, FieldValue::Struct(value));
        self
    }
}
