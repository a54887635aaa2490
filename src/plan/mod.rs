//! Compiled Execution Plans
//!
//! One compilation pass walks a message schema and produces three
//! independent, self-contained procedures (decode, encode, deep copy) plus
//! the two facts the framing layer consumes: whether the message has a
//! variable-length region, and how many bytes its fixed region needs.
//! Compilation happens once per message type; afterwards the plans are
//! immutable and safe to run concurrently, each invocation carrying only
//! its own cursor and descriptor slots.

mod clone;
mod decode;
mod encode;
mod layout;

use tracing::debug;

use crate::codec::buffer::CodecResult;
use crate::schema::normalize::{normalize, SchemaError};
use crate::schema::types::Schema;
use crate::value::MessageData;

use clone::{compile_clone, ClonePlan};
use decode::{compile_decode, DecodePlan};
use encode::{compile_encode, EncodePlan};

/// Framing header at the front of every message buffer: u16 total length
/// plus u16 opcode, owned by the network layer. Compiled offsets are
/// absolute from buffer start and account for it.
pub const MESSAGE_HEADER_LEN: usize = 4;

/// Offset of the next-element link within an array element. Each element
/// starts with its own absolute offset followed by the next element's (zero
/// for the last), letting variable-size elements chain without a length
/// table.
pub(crate) const ELEM_LINK_OFFSET: usize = 2;

/// Offset of an element's content past its chain words.
pub(crate) const ELEM_CONTENT_OFFSET: usize = 4;

/// String elements carry one more descriptor pointing at their code units.
pub(crate) const ELEM_STRING_OFFSET: usize = 6;

/// The compiled artifact for one message type.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    decode: DecodePlan,
    encode: EncodePlan,
    clone: ClonePlan,
    dynamic: bool,
    min_length: usize,
}

/// Compile a schema into its decode, encode and clone procedures.
pub fn compile(schema: &Schema) -> Result<CompiledSchema, SchemaError> {
    let normalized = normalize(schema)?;
    let decode = compile_decode(&normalized, MESSAGE_HEADER_LEN);
    let encode = compile_encode(&normalized, MESSAGE_HEADER_LEN);
    let clone = compile_clone(&normalized);

    // Both walkers must agree on the physical layout.
    debug_assert_eq!(decode.dynamic, encode.dynamic);
    debug_assert!(decode.dynamic || decode.fixed_len == encode.tail_delta);

    debug!(
        "compiled message schema (dynamic: {}, min length: {})",
        decode.dynamic, decode.fixed_len
    );
    Ok(CompiledSchema {
        dynamic: decode.dynamic,
        min_length: decode.fixed_len,
        decode,
        encode,
        clone,
    })
}

impl CompiledSchema {
    /// Decode one complete message buffer into a structured value. The
    /// framing layer must have delivered at least `min_length` bytes; an
    /// offset escaping the buffer fails this message only.
    pub fn decode(&self, buf: &[u8]) -> CodecResult<MessageData> {
        self.decode.run(buf)
    }

    /// Encode a message into `buf`, returning the total bytes written
    /// (framing header included).
    pub fn encode(&self, data: &MessageData, buf: &mut [u8]) -> CodecResult<usize> {
        self.encode.run(data, buf)
    }

    /// Structural deep copy of the schema-declared fields.
    pub fn deep_clone(&self, data: &MessageData) -> MessageData {
        self.clone.run(data)
    }

    /// Whether the message has any variable-length region. When false the
    /// total size always equals `min_length`.
    #[inline]
    pub fn is_dynamic_length(&self) -> bool {
        self.dynamic
    }

    /// Bytes that must be buffered before the fixed region is resolvable.
    #[inline]
    pub fn min_length(&self) -> usize {
        self.min_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ArrayElem, ScalarType, Schema};
    use crate::types::{SkillId, Vec3};
    use crate::value::FieldValue;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn roundtrip(schema: &Schema, data: &MessageData) -> (usize, MessageData) {
        let compiled = compile(schema).unwrap();
        let mut buf = vec![0u8; 4096];
        let written = compiled.encode(data, &mut buf).unwrap();
        let decoded = compiled.decode(&buf[..]).unwrap();
        (written, decoded)
    }

    // -------------------------------------------------------------------------
    // Summary facts
    // -------------------------------------------------------------------------

    #[test]
    fn test_static_message_has_fixed_total_size() {
        let schema = Schema::new()
            .scalar("id", ScalarType::U32)
            .scalar("pos", ScalarType::Vec3)
            .scalar("angle", ScalarType::Angle);
        let compiled = compile(&schema).unwrap();
        assert!(!compiled.is_dynamic_length());
        assert_eq!(compiled.min_length(), 4 + 4 + 12 + 2);

        let mut buf = [0u8; 32];
        let written = compiled
            .encode(&MessageData::new(), &mut buf)
            .unwrap();
        assert_eq!(written, compiled.min_length());
    }

    #[test]
    fn test_dynamic_message_reports_fixed_region() {
        let schema = Schema::new()
            .scalar("id", ScalarType::U32)
            .ref_array("items")
            .ref_string("name")
            .string("name")
            .array("items", ArrayElem::Scalar(ScalarType::U32));
        let compiled = compile(&schema).unwrap();
        assert!(compiled.is_dynamic_length());
        assert_eq!(compiled.min_length(), 4 + 4 + 4 + 2);
    }

    // -------------------------------------------------------------------------
    // Round-trips
    // -------------------------------------------------------------------------

    #[test]
    fn test_scalar_roundtrip() {
        let schema = Schema::new()
            .scalar("flag", ScalarType::Bool)
            .scalar("small", ScalarType::Byte)
            .scalar("signed", ScalarType::I32)
            .scalar("big", ScalarType::U64)
            .scalar("ratio", ScalarType::F32)
            .scalar("skill", ScalarType::SkillId)
            .scalar("pos", ScalarType::Vec3);
        let mut data = MessageData::new()
            .with_bool("flag", true)
            .with_uint("small", 200)
            .with_int("signed", -123456)
            .with_uint("big", u64::MAX - 1)
            .with_float("ratio", 2.5)
            .with_vec3("pos", Vec3::new(1.0, -2.0, 3.5));
        data.set("skill", FieldValue::SkillId(SkillId::from_u64(0xABCD)));

        let (_, decoded) = roundtrip(&schema, &data);
        assert_eq!(decoded.get("flag"), Some(&FieldValue::Bool(true)));
        assert_eq!(decoded.get("small"), Some(&FieldValue::UInt(200)));
        assert_eq!(decoded.get("signed"), Some(&FieldValue::Int(-123456)));
        assert_eq!(decoded.get("big"), Some(&FieldValue::UInt(u64::MAX - 1)));
        assert_eq!(decoded.get("ratio"), Some(&FieldValue::Float(2.5)));
        assert_eq!(
            decoded.get("skill"),
            Some(&FieldValue::SkillId(SkillId::from_u64(0xABCD)))
        );
        assert_eq!(
            decoded.get("pos"),
            Some(&FieldValue::Vec3(Vec3::new(1.0, -2.0, 3.5)))
        );
    }

    #[test]
    fn test_string_and_bytes_roundtrip() {
        let schema = Schema::new()
            .ref_string("name")
            .ref_bytes("blob")
            .string("name")
            .bytes("blob");
        let data = MessageData::new()
            .with_str("name", "Velika")
            .with_bytes("blob", vec![1, 2, 3, 4, 5]);

        let (_, decoded) = roundtrip(&schema, &data);
        assert_eq!(decoded.get("name").and_then(FieldValue::as_str), Some("Velika"));
        assert_eq!(
            decoded.get("blob").and_then(FieldValue::as_bytes),
            Some(&[1u8, 2, 3, 4, 5][..])
        );
    }

    #[test]
    fn test_mixed_length_string_chain_keeps_order() {
        let schema = Schema::new()
            .ref_array("names")
            .array("names", ArrayElem::String);
        let names = ["a", "", "longer entry", "x", "mid"];
        let data = MessageData::new().with_list(
            "names",
            names
                .iter()
                .map(|s| FieldValue::Str(s.to_string()))
                .collect(),
        );

        let (_, decoded) = roundtrip(&schema, &data);
        let items = decoded.get("names").and_then(FieldValue::as_list).unwrap();
        assert_eq!(items.len(), 5);
        for (got, want) in items.iter().zip(names.iter()) {
            assert_eq!(got.as_str(), Some(*want));
        }
    }

    #[test]
    fn test_interleaved_arrays_roundtrip_independently() {
        let schema = Schema::new()
            .ref_array("ids")
            .ref_array("names")
            .interleaved_array("ids", ArrayElem::Scalar(ScalarType::U32))
            .interleaved_array("names", ArrayElem::String);
        let data = MessageData::new()
            .with_list(
                "ids",
                (1..=3u64).map(FieldValue::UInt).collect(),
            )
            .with_list(
                "names",
                (1..=5)
                    .map(|i| FieldValue::Str(format!("n{}", i)))
                    .collect(),
            );

        let (_, decoded) = roundtrip(&schema, &data);
        let ids = decoded.get("ids").and_then(FieldValue::as_list).unwrap();
        let names = decoded.get("names").and_then(FieldValue::as_list).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(names.len(), 5);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.as_u64(), Some(i as u64 + 1));
        }
        for (i, name) in names.iter().enumerate() {
            assert_eq!(name.as_str().map(str::to_string), Some(format!("n{}", i + 1)));
        }
    }

    #[test]
    fn test_array_of_objects_with_nested_strings() {
        let elem = Schema::new()
            .scalar("kind", ScalarType::U16)
            .ref_string("label")
            .string("label");
        let schema = Schema::new()
            .ref_array("entries")
            .array("entries", ArrayElem::Object(elem));

        let data = MessageData::new().with_list(
            "entries",
            vec![
                FieldValue::Struct(
                    MessageData::new().with_uint("kind", 1).with_str("label", "first"),
                ),
                FieldValue::Struct(
                    MessageData::new().with_uint("kind", 2).with_str("label", ""),
                ),
                FieldValue::Struct(
                    MessageData::new()
                        .with_uint("kind", 3)
                        .with_str("label", "third entry"),
                ),
            ],
        );

        let (_, decoded) = roundtrip(&schema, &data);
        let entries = decoded.get("entries").and_then(FieldValue::as_list).unwrap();
        assert_eq!(entries.len(), 3);
        let labels = ["first", "", "third entry"];
        for (i, entry) in entries.iter().enumerate() {
            let entry = entry.as_struct().unwrap();
            assert_eq!(entry.get("kind").and_then(FieldValue::as_u64), Some(i as u64 + 1));
            assert_eq!(
                entry.get("label").and_then(FieldValue::as_str),
                Some(labels[i])
            );
        }
    }

    #[test]
    fn test_inline_fields_after_content_stay_aligned() {
        let schema = Schema::new()
            .ref_string("name")
            .string("name")
            .scalar("checksum", ScalarType::U16);
        let data = MessageData::new()
            .with_str("name", "abc")
            .with_uint("checksum", 0xBEEF);
        let (_, decoded) = roundtrip(&schema, &data);
        assert_eq!(decoded.get("checksum"), Some(&FieldValue::UInt(0xBEEF)));

        let schema = Schema::new()
            .ref_bytes("blob")
            .bytes("blob")
            .scalar("checksum", ScalarType::U16);
        let data = MessageData::new()
            .with_bytes("blob", vec![1, 2, 3])
            .with_uint("checksum", 7);
        let (_, decoded) = roundtrip(&schema, &data);
        assert_eq!(decoded.get("checksum"), Some(&FieldValue::UInt(7)));
    }

    #[test]
    fn test_fields_after_array_content_stay_aligned() {
        let schema = Schema::new()
            .ref_array("ids")
            .array("ids", ArrayElem::Scalar(ScalarType::U16))
            .scalar("tail", ScalarType::U32);

        // Non-empty and empty chains both keep the trailing field aligned.
        for items in [vec![FieldValue::UInt(3), FieldValue::UInt(4)], vec![]] {
            let data = MessageData::new()
                .with_list("ids", items.clone())
                .with_uint("tail", 99);
            let (_, decoded) = roundtrip(&schema, &data);
            assert_eq!(decoded.get("tail"), Some(&FieldValue::UInt(99)));
            assert_eq!(decoded.get("ids").and_then(FieldValue::len), Some(items.len()));
        }
    }

    #[test]
    fn test_nested_object_roundtrip() {
        let schema = Schema::new().scalar("id", ScalarType::U32).object(
            "stats",
            Schema::new()
                .scalar("hp", ScalarType::U32)
                .object("inner", Schema::new().scalar("crit", ScalarType::F32)),
        );
        let data = MessageData::new().with_uint("id", 1).with_struct(
            "stats",
            MessageData::new().with_uint("hp", 500).with_struct(
                "inner",
                MessageData::new().with_float("crit", 0.25),
            ),
        );

        let (_, decoded) = roundtrip(&schema, &data);
        let stats = decoded.get("stats").and_then(FieldValue::as_struct).unwrap();
        assert_eq!(stats.get("hp").and_then(FieldValue::as_u64), Some(500));
        let inner = stats.get("inner").and_then(FieldValue::as_struct).unwrap();
        assert_eq!(inner.get("crit"), Some(&FieldValue::Float(0.25)));
    }

    // -------------------------------------------------------------------------
    // Absent-object defaulting
    // -------------------------------------------------------------------------

    #[test]
    fn test_absent_object_has_identical_length_and_zero_fields() {
        let schema = Schema::new().scalar("id", ScalarType::U32).object(
            "extra",
            Schema::new()
                .scalar("a", ScalarType::U16)
                .scalar("b", ScalarType::I64)
                .scalar("pos", ScalarType::Vec3),
        );

        let with_obj = MessageData::new().with_uint("id", 1).with_struct(
            "extra",
            MessageData::new().with_uint("a", 10).with_int("b", -5),
        );
        let without_obj = MessageData::new().with_uint("id", 1);

        let (len_with, _) = roundtrip(&schema, &with_obj);
        let (len_without, decoded) = roundtrip(&schema, &without_obj);
        assert_eq!(len_with, len_without);

        let extra = decoded.get("extra").and_then(FieldValue::as_struct).unwrap();
        assert_eq!(extra.get("a"), Some(&FieldValue::UInt(0)));
        assert_eq!(extra.get("b"), Some(&FieldValue::Int(0)));
        assert_eq!(extra.get("pos"), Some(&FieldValue::Vec3(Vec3::ZERO)));
    }

    #[test]
    fn test_absent_object_with_string_still_shapes_payload() {
        let schema = Schema::new().object(
            "info",
            Schema::new().ref_string("motd").string("motd"),
        );

        let (len_absent, decoded) = roundtrip(&schema, &MessageData::new());
        let (len_empty, _) = roundtrip(
            &schema,
            &MessageData::new().with_struct(
                "info",
                MessageData::new().with_str("motd", ""),
            ),
        );
        assert_eq!(len_absent, len_empty);

        let info = decoded.get("info").and_then(FieldValue::as_struct).unwrap();
        assert_eq!(info.get("motd").and_then(FieldValue::as_str), Some(""));
    }

    // -------------------------------------------------------------------------
    // Layout symmetry and rejection
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_and_encode_assign_identical_inline_positions() {
        let elem = Schema::new()
            .scalar("kind", ScalarType::U16)
            .ref_string("label")
            .string("label");
        let schema = Schema::new()
            .scalar("id", ScalarType::U32)
            .scalar("pos", ScalarType::Vec3)
            .ref_array("entries")
            .ref_bytes("blob")
            .ref_string("name")
            .string("name")
            .bytes("blob")
            .array("entries", ArrayElem::Object(elem));

        let normalized = crate::schema::normalize::normalize(&schema).unwrap();
        let decode = compile_decode(&normalized, MESSAGE_HEADER_LEN);
        let encode = compile_encode(&normalized, MESSAGE_HEADER_LEN);
        assert_eq!(decode.inline_positions(), encode.inline_positions());
    }

    #[test]
    fn test_unknown_type_name_rejected_before_compile() {
        let schema = Schema::from_pairs(&[("id", "uint32"), ("oops", "quaternion")]);
        assert!(matches!(
            schema.unwrap_err(),
            SchemaError::UnknownType(name) if name == "quaternion"
        ));
    }

    #[test]
    fn test_split_interleaved_group_rejected() {
        let schema = Schema::new()
            .ref_array("a")
            .ref_array("gap")
            .ref_array("b")
            .interleaved_array("a", ArrayElem::Scalar(ScalarType::U16))
            .array("gap", ArrayElem::Scalar(ScalarType::U16))
            .interleaved_array("b", ArrayElem::Scalar(ScalarType::U16));
        assert!(matches!(
            compile(&schema).unwrap_err(),
            SchemaError::NonAdjacentInterleaved(name) if name == "b"
        ));
    }

    // -------------------------------------------------------------------------
    // Clone behavior through the driver
    // -------------------------------------------------------------------------

    #[test]
    fn test_deep_clone_independence() {
        let schema = Schema::new()
            .scalar("id", ScalarType::U32)
            .object("pos", Schema::new().scalar("x", ScalarType::F32))
            .ref_array("tags")
            .array("tags", ArrayElem::String);
        let compiled = compile(&schema).unwrap();

        let src = MessageData::new()
            .with_uint("id", 7)
            .with_struct("pos", MessageData::new().with_float("x", 1.5))
            .with_list("tags", vec![FieldValue::Str("one".into())]);
        let mut cloned = compiled.deep_clone(&src);

        cloned.set("id", FieldValue::UInt(8));
        cloned.entry_struct("pos").set("x", FieldValue::Float(9.9));
        if let Some(FieldValue::List(items)) = cloned.fields.get_mut("tags") {
            items.push(FieldValue::Str("two".into()));
        }

        assert_eq!(src.get("id").and_then(FieldValue::as_u64), Some(7));
        let x = src
            .get("pos")
            .and_then(FieldValue::as_struct)
            .and_then(|p| p.get("x"))
            .and_then(FieldValue::as_f64);
        assert_eq!(x, Some(1.5));
        assert_eq!(
            src.get("tags").and_then(FieldValue::len),
            Some(1)
        );
    }

    // -------------------------------------------------------------------------
    // Randomized sweep
    // -------------------------------------------------------------------------

    #[test]
    fn test_randomized_roundtrip_sweep() {
        let schema = Schema::new()
            .scalar("id", ScalarType::U32)
            .scalar("delta", ScalarType::I16)
            .scalar("flag", ScalarType::Bool)
            .ref_string("name")
            .ref_array("values")
            .string("name")
            .array("values", ArrayElem::Scalar(ScalarType::U16));
        let compiled = compile(&schema).unwrap();

        let mut rng = StdRng::seed_from_u64(0x77_1E57);
        let mut buf = vec![0u8; 4096];
        for _ in 0..200 {
            let name: String = (0..rng.gen_range(0..12))
                .map(|_| rng.gen_range('a'..='z'))
                .collect();
            let values: Vec<FieldValue> = (0..rng.gen_range(0..10))
                .map(|_| FieldValue::UInt(rng.gen_range(0..u16::MAX as u64)))
                .collect();
            let data = MessageData::new()
                .with_uint("id", rng.gen::<u32>() as u64)
                .with_int("delta", rng.gen::<i16>() as i64)
                .with_bool("flag", rng.gen())
                .with_str("name", &name)
                .with_list("values", values.clone());

            let written = compiled.encode(&data, &mut buf).unwrap();
            assert!(written >= compiled.min_length());
            let decoded = compiled.decode(&buf[..]).unwrap();

            assert_eq!(decoded.get("id"), data.get("id"));
            assert_eq!(decoded.get("delta"), data.get("delta"));
            assert_eq!(decoded.get("flag"), data.get("flag"));
            assert_eq!(
                decoded.get("name").and_then(FieldValue::as_str),
                Some(name.as_str())
            );
            assert_eq!(
                decoded.get("values").and_then(FieldValue::as_list),
                Some(&values[..])
            );
        }
    }
}
