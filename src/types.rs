//! Opaque Domain Value Types
//!
//! Wire messages carry a few game-domain values the codec treats as opaque:
//! a 3D vector, a skill identifier and a character customization bitfield.
//! Each one is constructed from its raw wire integer(s) and converts back
//! losslessly.

use serde::{Deserialize, Serialize};

/// 3-component vector, stored on the wire as three consecutive f32 values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// All-zero vector, the wire default for absent fields.
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Skill identifier, wire-encoded as a u32 (legacy messages) or a u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SkillId(u64);

impl SkillId {
    pub fn from_u32(raw: u32) -> Self {
        Self(raw as u64)
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Truncating view for the 32-bit wire form.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Character customization bitfield, wire-encoded as a u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Customize(u64);

impl Customize {
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_id_roundtrip() {
        assert_eq!(SkillId::from_u32(0xDEAD_BEEF).as_u32(), 0xDEAD_BEEF);
        assert_eq!(
            SkillId::from_u64(0x1234_5678_9ABC_DEF0).as_u64(),
            0x1234_5678_9ABC_DEF0
        );
    }

    #[test]
    fn test_customize_roundtrip() {
        assert_eq!(
            Customize::from_u64(0xFFFF_0000_1111_2222).as_u64(),
            0xFFFF_0000_1111_2222
        );
    }

    #[test]
    fn test_vec3_zero_default() {
        assert_eq!(Vec3::default(), Vec3::ZERO);
    }
}
