//! wireplan - Schema-Compiled Wire Codecs
//!
//! Compiles declarative message field layouts into specialized decode,
//! encode and deep-copy procedures for a compact, variable-length binary
//! wire format:
//!
//! - Schemas are ordered, typed, possibly nested field lists; each message
//!   type is compiled once and its plans are reused for every message
//! - Variable-length payloads (strings, byte runs, arrays) are declared in
//!   two phases: an inline descriptor marker plus a same-named content field
//! - Arrays are forward-linked chains of variable-size elements; adjacent
//!   sibling arrays can be interleaved element by element on the wire
//! - Compiled plans report whether a message has a variable-length region
//!   and how many bytes its fixed region needs, for the framing layer

pub mod codec;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;

// Re-export the working surface
pub use codec::{ByteReader, ByteWriter, CodecError, CodecResult};
pub use plan::{compile, CompiledSchema, MESSAGE_HEADER_LEN};
pub use registry::SchemaRegistry;
pub use schema::{ArrayElem, Field, FieldType, ScalarType, Schema, SchemaError};
pub use types::{Customize, SkillId, Vec3};
pub use value::{FieldValue, MessageData};
