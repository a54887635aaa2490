//! Binary Codec Primitives
//!
//! Bounds-checked little-endian buffer accessors and the per-primitive
//! scalar read/write rules shared by the compiled plans.

pub mod buffer;
pub mod scalar;

pub use buffer::{ByteReader, ByteWriter, CodecError, CodecResult};
pub use scalar::{ANGLE_TO_RAD, RAD_TO_ANGLE};
