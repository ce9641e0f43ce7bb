// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire-level round trips through the runtime backend.

use shapecodec::shape::{KnownKind, PrimitiveKind};
use shapecodec::{
    CodecError, CodegenConfig, Object, ObjectShape, RuntimeCodecs, ShapeRegistry, TypeShape, Value,
};
use std::net::{IpAddr, Ipv4Addr};

fn string() -> TypeShape {
    TypeShape::primitive(PrimitiveKind::String)
}

fn int() -> TypeShape {
    TypeShape::primitive(PrimitiveKind::I32)
}

fn person_registry() -> ShapeRegistry {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Person")
                .field("name", string())
                .field("age", int())
                .field("nick", string().nullable())
                .field("tags", TypeShape::list(string()))
                .build(),
        )
        .expect("register");
    registry
}

fn person(nick: Option<&str>, tags: &[&str]) -> Value {
    Value::Object(
        Object::new("Person")
            .with("name", "Ada")
            .with("age", 36i32)
            .with("nick", nick)
            .with(
                "tags",
                Value::List(tags.iter().map(|t| Value::from(*t)).collect()),
            ),
    )
}

#[test]
fn test_person_wire_form() {
    let codecs = RuntimeCodecs::new(person_registry(), CodegenConfig::default());
    let shape = TypeShape::named("Person");
    let bytes = codecs
        .encode(&shape, &person(None, &["x"]))
        .expect("encode");
    let expected: Vec<u8> = [
        &[3, b'A', b'd', b'a'][..],
        &[36, 0, 0, 0],
        &[0],
        &[1, 0, 0, 0, 1, b'x'],
    ]
    .concat();
    assert_eq!(bytes, expected);
}

#[test]
fn test_person_round_trip() {
    let codecs = RuntimeCodecs::new(person_registry(), CodegenConfig::default());
    let shape = TypeShape::named("Person");
    for value in [
        person(None, &[]),
        person(Some("countess"), &["math", "engines"]),
        person(Some(""), &[""]),
    ] {
        let bytes = codecs.encode(&shape, &value).expect("encode");
        assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
    }
}

#[test]
fn test_encoding_is_deterministic() {
    let value = person(Some("countess"), &["a", "b", "c"]);
    let shape = TypeShape::named("Person");
    let first = RuntimeCodecs::new(person_registry(), CodegenConfig::default())
        .encode(&shape, &value)
        .expect("encode");
    let second = RuntimeCodecs::new(person_registry(), CodegenConfig::default())
        .encode(&shape, &value)
        .expect("encode");
    assert_eq!(first, second);
}

#[test]
fn test_null_root_is_one_zero_byte() {
    let codecs = RuntimeCodecs::new(person_registry(), CodegenConfig::default());
    let shape = TypeShape::named("Person").nullable();
    let bytes = codecs.encode(&shape, &Value::Null).expect("encode");
    assert_eq!(bytes, vec![0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), Value::Null);

    let value = person(None, &[]);
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes[0], 1);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_empty_list_is_a_zero_count() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::list(int());
    let bytes = codecs.encode(&shape, &Value::List(Vec::new())).expect("encode");
    assert_eq!(bytes, vec![0, 0, 0, 0]);
    assert_eq!(
        codecs.decode(&shape, &bytes).expect("decode"),
        Value::List(Vec::new())
    );
}

#[test]
fn test_dictionary_wire_form() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::dictionary(string(), int());
    let value = Value::Map(vec![
        (Value::from("a"), Value::I32(1)),
        (Value::from("bc"), Value::I32(-1)),
    ]);
    let bytes = codecs.encode(&shape, &value).expect("encode");
    let expected: Vec<u8> = [
        &[2, 0, 0, 0][..],
        &[1, b'a', 1, 0, 0, 0],
        &[2, b'b', b'c', 0xFF, 0xFF, 0xFF, 0xFF],
    ]
    .concat();
    assert_eq!(bytes, expected);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_multi_rank_array_writes_every_dimension() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::array(TypeShape::primitive(PrimitiveKind::U8), 2);
    let value = Value::Array {
        dims: vec![2, 3],
        items: (1..=6u8).map(Value::U8).collect(),
    };
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![2, 0, 0, 0, 3, 0, 0, 0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_multi_rank_array_of_wrong_rank_is_rejected() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::array(TypeShape::primitive(PrimitiveKind::U8), 2);
    let value = Value::Array {
        dims: vec![1, 1, 2],
        items: vec![Value::U8(7), Value::U8(9)],
    };
    let err = codecs.encode(&shape, &value).unwrap_err();
    assert!(matches!(err, CodecError::TypeMismatch { .. }), "{:?}", err);
}

#[test]
fn test_rank_one_array_decodes_to_list() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::array(int(), 1);
    let value = Value::List(vec![Value::I32(7), Value::I32(8)]);
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![2, 0, 0, 0, 7, 0, 0, 0, 8, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_known_types_round_trip() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Session")
                .field("id", TypeShape::known(KnownKind::Guid))
                .field("peer", TypeShape::known(KnownKind::IpAddress))
                .field("started", TypeShape::known(KnownKind::DateTime))
                .field("timeout", TypeShape::known(KnownKind::TimeSpan))
                .build(),
        )
        .expect("register");
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let shape = TypeShape::named("Session");
    let value = Value::Object(
        Object::new("Session")
            .with("id", Value::Guid([7; 16]))
            .with("peer", Value::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))))
            .with("started", Value::DateTime(638_000_000_000_000_000))
            .with("timeout", Value::TimeSpan(30 * 10_000_000)),
    );
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(&bytes[..16], &[7; 16]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_enum_uses_underlying_width() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let shape = TypeShape::enumeration(
        "Level",
        PrimitiveKind::U16,
        &[("Low", 1), ("High", 300)],
    );
    let bytes = codecs.encode(&shape, &Value::Enum(300)).expect("encode");
    assert_eq!(bytes, vec![0x2C, 0x01]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), Value::Enum(300));
}

#[test]
fn test_blittable_struct_is_copied_raw() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::structure("Vec2")
                .unmanaged()
                .field("x", TypeShape::primitive(PrimitiveKind::F32))
                .field("y", TypeShape::primitive(PrimitiveKind::F32))
                .build(),
        )
        .expect("register");
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let shape = TypeShape::list(TypeShape::named("Vec2"));
    let point = |x: f32, y: f32| Value::Object(Object::new("Vec2").with("x", x).with("y", y));
    let value = Value::List(vec![point(1.0, -2.5)]);
    let bytes = codecs.encode(&shape, &value).expect("encode");
    let expected: Vec<u8> = [
        &[1, 0, 0, 0][..],
        &1.0f32.to_le_bytes(),
        &(-2.5f32).to_le_bytes(),
    ]
    .concat();
    assert_eq!(bytes, expected);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_truncated_input_reports_eof() {
    let codecs = RuntimeCodecs::new(person_registry(), CodegenConfig::default());
    let shape = TypeShape::named("Person");
    let bytes = codecs
        .encode(&shape, &person(Some("n"), &["t"]))
        .expect("encode");
    let err = codecs.decode(&shape, &bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedEof { .. }));
}

#[test]
fn test_trailing_bytes_are_left_unread() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let value = codecs.decode(&int(), &[5, 0, 0, 0, 99]).expect("decode");
    assert_eq!(value, Value::I32(5));
}

#[test]
fn test_huge_count_fails_without_allocating() {
    let codecs = RuntimeCodecs::new(ShapeRegistry::new(), CodegenConfig::default());
    let err = codecs
        .decode(&TypeShape::list(int()), &[0xFF, 0xFF, 0xFF, 0x7F, 1, 0, 0, 0])
        .unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedEof { .. }));
}

#[test]
fn test_long_recursive_chain() {
    const LENGTH: i32 = 10_000;

    // Each node costs a few frames in both directions.
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let mut registry = ShapeRegistry::new();
            registry
                .register(
                    ObjectShape::class("Node")
                        .field("value", int())
                        .field("next", TypeShape::named("Node").nullable())
                        .build(),
                )
                .expect("register");
            let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());

            let mut chain = Value::Null;
            for value in (0..LENGTH).rev() {
                chain = Value::Object(Object::new("Node").with("value", value).with("next", chain));
            }
            let shape = TypeShape::named("Node");
            let bytes = codecs.encode(&shape, &chain).expect("encode");
            // i32 value plus the presence flag of `next`, per node
            assert_eq!(bytes.len(), LENGTH as usize * 5);
            let back = codecs.decode(&shape, &bytes).expect("decode");
            assert!(back == chain);
        })
        .expect("spawn");
    handle.join().expect("join");
}

#[test]
fn test_random_people_round_trip() {
    let codecs = RuntimeCodecs::new(person_registry(), CodegenConfig::default());
    let shape = TypeShape::named("Person");
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let word = |rng: &mut fastrand::Rng| -> String {
        let len = rng.usize(0..200);
        (0..len).map(|_| rng.alphanumeric()).collect()
    };
    for _ in 0..64 {
        let nick = rng.bool().then(|| word(&mut rng));
        let tags: Vec<Value> = (0..rng.usize(0..8))
            .map(|_| Value::String(word(&mut rng)))
            .collect();
        let value = Value::Object(
            Object::new("Person")
                .with("name", word(&mut rng))
                .with("age", rng.i32(..))
                .with("nick", nick)
                .with("tags", Value::List(tags)),
        );
        let bytes = codecs.encode(&shape, &value).expect("encode");
        assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
    }
}
