//! Schema Module - Message Layout Definitions
//!
//! Declarative descriptions of wire messages and the normalization pass
//! that validates them. Key concepts:
//!
//! 1. **Field taxonomy** - scalars, ref markers, strings, bytes, objects
//!    and linked-chain arrays, in significant order
//! 2. **Two-phase refs** - variable-length content is declared as an inline
//!    descriptor marker plus a same-named content field
//! 3. **Normalization** - pairings become explicit links and malformed
//!    schemas are rejected once, before any plan is compiled

pub mod normalize;
pub mod types;

pub use normalize::SchemaError;
pub use types::{ArrayElem, Field, FieldType, ScalarType, Schema};
