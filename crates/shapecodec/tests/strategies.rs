// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Strategy behavior observed through generated procedures and runtime codecs.

use shapecodec::hooks::FnConverter;
use shapecodec::shape::{
    ConstructorShape, Conversion, CustomMethods, DynamicTypes, MemberAttributes, PrimitiveKind,
    ResolverShape, StreamParam, VersionGate,
};
use shapecodec::{
    CodecError, CodecUnit, CodegenConfig, DiagnosticCode, DynamicResolver, Generator, Hooks,
    MemberShape, Object, ObjectShape, Op, ResolvedType, RuntimeCodecs, ShapeCache, ShapeRegistry,
    TypeShape, Value,
};

fn int() -> TypeShape {
    TypeShape::primitive(PrimitiveKind::I32)
}

fn string() -> TypeShape {
    TypeShape::primitive(PrimitiveKind::String)
}

fn generate(registry: &ShapeRegistry, shape: &TypeShape) -> CodecUnit {
    let config = CodegenConfig::default();
    let cache = ShapeCache::new();
    Generator::new(registry, &config, &cache)
        .generate(shape)
        .expect("generate")
}

/// The `Construct` op of the primary decode procedure.
fn construct_of(unit: &CodecUnit) -> Op {
    let entry = unit.primary().expect("entry");
    let decode = unit.procedure(entry.decode.expect("decode")).expect("proc");
    decode
        .body
        .iter()
        .find(|op| matches!(op, Op::Construct { .. }))
        .cloned()
        .expect("construct op")
}

// ---- reconstruction ---------------------------------------------------------

fn account(preferred_single: bool, balance_writable: bool) -> ShapeRegistry {
    let single = ConstructorShape::with_params(&["Id"]);
    let single = if preferred_single { single.preferred() } else { single };
    let balance = MemberShape::field("balance", TypeShape::primitive(PrimitiveKind::I64));
    let balance = if balance_writable { balance } else { balance.read_only() };
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Account")
                .field("id", int())
                .field("owner", string())
                .member(balance)
                .constructor(single)
                .constructor(ConstructorShape::with_params(&["id", "owner"]))
                .build(),
        )
        .expect("register");
    registry
}

#[test]
fn test_largest_matching_constructor_wins() {
    let unit = generate(&account(false, true), &TypeShape::named("Account"));
    let Op::Construct {
        ctor, assignments, ..
    } = construct_of(&unit)
    else {
        unreachable!()
    };
    let ctor = ctor.expect("constructor");
    assert_eq!(ctor.index, 1);
    let params: Vec<&str> = ctor.args.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(params, vec!["id", "owner"]);
    let assigned: Vec<&str> = assignments.iter().map(|a| a.member.as_str()).collect();
    assert_eq!(assigned, vec!["balance"]);
}

#[test]
fn test_preferred_constructor_wins_over_arity() {
    let unit = generate(&account(true, true), &TypeShape::named("Account"));
    let Op::Construct {
        ctor, assignments, ..
    } = construct_of(&unit)
    else {
        unreachable!()
    };
    assert_eq!(ctor.expect("constructor").index, 0);
    let assigned: Vec<&str> = assignments.iter().map(|a| a.member.as_str()).collect();
    assert_eq!(assigned, vec!["owner", "balance"]);
}

#[test]
fn test_read_only_member_outside_constructor_is_dropped() {
    let codecs = RuntimeCodecs::new(account(true, false), CodegenConfig::default());
    let shape = TypeShape::named("Account");
    let value = Value::Object(
        Object::new("Account")
            .with("id", 1i32)
            .with("owner", "ada")
            .with("balance", 500i64),
    );
    let bytes = codecs.encode(&shape, &value).expect("encode");
    let back = codecs.decode(&shape, &bytes).expect("decode");
    let expected = Value::Object(Object::new("Account").with("id", 1i32).with("owner", "ada"));
    assert_eq!(back, expected);
}

// ---- versioning -------------------------------------------------------------

fn message(default: Option<&str>) -> ShapeRegistry {
    let gate = MemberAttributes {
        version: Some(VersionGate {
            predicate: "is_v2".into(),
            variables: vec!["version".into()],
            default: default.map(str::to_string),
        }),
        ..Default::default()
    };
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Message")
                .field("version", int())
                .member(MemberShape::field("extra", int()).with_attrs(gate))
                .build(),
        )
        .expect("register");
    registry
}

fn version_hooks() -> Hooks {
    Hooks::new()
        .with_predicate("is_v2", |args: &[Value]| args.first() == Some(&Value::I32(2)))
        .with_default("zero", || Value::I32(0))
}

#[test]
fn test_versioned_member_follows_predicate() {
    let codecs =
        RuntimeCodecs::new(message(Some("zero")), CodegenConfig::default()).with_hooks(version_hooks());
    let shape = TypeShape::named("Message");
    let v1 = Value::Object(Object::new("Message").with("version", 1i32).with("extra", 5i32));
    let v2 = Value::Object(Object::new("Message").with("version", 2i32).with("extra", 5i32));

    let bytes = codecs.encode(&shape, &v1).expect("encode v1");
    assert_eq!(bytes, vec![1, 0, 0, 0]);
    let back = codecs.decode(&shape, &bytes).expect("decode v1");
    let defaulted = Value::Object(Object::new("Message").with("version", 1i32).with("extra", 0i32));
    assert_eq!(back, defaulted);

    let bytes = codecs.encode(&shape, &v2).expect("encode v2");
    assert_eq!(bytes, vec![2, 0, 0, 0, 5, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode v2"), v2);
}

#[test]
fn test_versioned_member_without_default_stays_unset() {
    let codecs = RuntimeCodecs::new(message(None), CodegenConfig::default()).with_hooks(version_hooks());
    let back = codecs
        .decode(&TypeShape::named("Message"), &[1, 0, 0, 0])
        .expect("decode");
    assert_eq!(back, Value::Object(Object::new("Message").with("version", 1i32)));
}

#[test]
fn test_missing_predicate_fails_codec_build() {
    let codecs = RuntimeCodecs::new(message(None), CodegenConfig::default());
    let err = codecs.codec(&TypeShape::named("Message")).unwrap_err();
    assert!(matches!(err, CodecError::MissingHook { kind: "predicate", .. }));
}

#[test]
fn test_version_variable_must_precede_member() {
    let gate = MemberAttributes {
        version: Some(VersionGate {
            predicate: "is_v2".into(),
            variables: vec!["version".into()],
            default: None,
        }),
        ..Default::default()
    };
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Late")
                .member(MemberShape::field("extra", int()).with_attrs(gate))
                .field("version", int())
                .build(),
        )
        .expect("register");
    let unit = generate(&registry, &TypeShape::named("Late"));
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::InvalidAnnotation));
}

// ---- conversion and custom methods -----------------------------------------

#[test]
fn test_converter_changes_wire_type() {
    let attrs = MemberAttributes {
        convert: Some(Conversion {
            converter: "tenths".into(),
            targets: vec![int()],
            convert_to: None,
            source: None,
        }),
        ..Default::default()
    };
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Reading")
                .member(
                    MemberShape::field("celsius", TypeShape::primitive(PrimitiveKind::F64))
                        .with_attrs(attrs),
                )
                .build(),
        )
        .expect("register");
    let tenths = FnConverter::new(
        |v: &Value| match v {
            Value::F64(c) => Ok(Value::I32((c * 10.0).round() as i32)),
            other => Err(CodecError::TypeMismatch {
                expected: "f64".into(),
                found: other.type_label(),
            }),
        },
        |v: Value| match v {
            Value::I32(t) => Ok(Value::F64(f64::from(t) / 10.0)),
            other => Err(CodecError::TypeMismatch {
                expected: "i32".into(),
                found: other.type_label(),
            }),
        },
    );
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default())
        .with_hooks(Hooks::new().with_converter("tenths", tenths));
    let shape = TypeShape::named("Reading");
    let value = Value::Object(Object::new("Reading").with("celsius", 21.5f64));
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, 215i32.to_le_bytes().to_vec());
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

fn palette_registry(deserialize: Option<&str>) -> ShapeRegistry {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::structure("Color")
                .field("r", TypeShape::primitive(PrimitiveKind::U8))
                .field("g", TypeShape::primitive(PrimitiveKind::U8))
                .field("b", TypeShape::primitive(PrimitiveKind::U8))
                .custom(CustomMethods {
                    serialize: Some("write_rgb".into()),
                    deserialize: deserialize.map(str::to_string),
                    stream: StreamParam::Exact {
                        type_name: "BufferWriter".into(),
                    },
                })
                .build(),
        )
        .expect("register");
    registry
        .register(
            ObjectShape::class("Palette")
                .field("primary", TypeShape::named("Color"))
                .build(),
        )
        .expect("register");
    registry
}

fn rgb(r: u8, g: u8, b: u8) -> Value {
    Value::Object(Object::new("Color").with("r", r).with("g", g).with("b", b))
}

#[test]
fn test_custom_methods_replace_member_encoding() {
    let hooks = Hooks::new()
        .with_encoder("Color", "write_rgb", |value, w| {
            let channels = match value.as_object() {
                Some(o) => ["r", "g", "b"].map(|c| match o.get(c) {
                    Some(Value::U8(v)) => *v,
                    _ => 0,
                }),
                None => [0; 3],
            };
            w.write_u32(u32::from_le_bytes([channels[0], channels[1], channels[2], 0xFF]))
        })
        .with_decoder("Color", "read_rgb", |r| {
            let [red, green, blue, _] = r.read_u32()?.to_le_bytes();
            Ok(rgb(red, green, blue))
        });
    let codecs = RuntimeCodecs::new(palette_registry(Some("read_rgb")), CodegenConfig::default())
        .with_hooks(hooks);
    let shape = TypeShape::named("Palette");
    let value = Value::Object(Object::new("Palette").with("primary", rgb(1, 2, 3)));
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![1, 2, 3, 0xFF]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_unpaired_custom_method_falls_back_to_members() {
    let registry = palette_registry(None);
    let unit = generate(&registry, &TypeShape::named("Palette"));
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::InvalidAnnotation));

    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let value = Value::Object(Object::new("Palette").with("primary", rgb(9, 8, 7)));
    let bytes = codecs
        .encode(&TypeShape::named("Palette"), &value)
        .expect("encode");
    assert_eq!(bytes, vec![9, 8, 7]);
}

// ---- dynamic types ----------------------------------------------------------

fn drawing_registry(resolver: bool) -> ShapeRegistry {
    let dynamic = DynamicTypes {
        candidates: vec!["Circle".into(), "Square".into()],
        resolver: resolver.then(|| ResolverShape {
            name: "by_name".into(),
            singleton: true,
            identifier: string(),
            unresolved_params: Vec::new(),
        }),
    };
    let mut registry = ShapeRegistry::new();
    registry
        .register(ObjectShape::abstract_class("Shape").build())
        .expect("register");
    for (name, member) in [("Circle", "radius"), ("Square", "side"), ("Triangle", "base")] {
        registry
            .register(
                ObjectShape::class(name)
                    .base(TypeShape::named("Shape"))
                    .field(member, int())
                    .build(),
            )
            .expect("register");
    }
    registry
        .register(
            ObjectShape::class("Drawing")
                .member(
                    MemberShape::field("shape", TypeShape::named("Shape")).with_attrs(
                        MemberAttributes {
                            dynamic: Some(dynamic),
                            ..Default::default()
                        },
                    ),
                )
                .build(),
        )
        .expect("register");
    registry
}

fn drawing(shape: &str, member: &str, size: i32) -> Value {
    Value::Object(
        Object::new("Drawing").with("shape", Object::new(shape).with(member, size)),
    )
}

#[test]
fn test_dynamic_subclass_uses_its_candidate_discriminant() {
    let mut registry = drawing_registry(false);
    registry
        .register(
            ObjectShape::class("Big")
                .base(TypeShape::named("Circle"))
                .field("glow", int())
                .build(),
        )
        .expect("register");
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let shape = TypeShape::named("Drawing");

    let big = Value::Object(
        Object::new("Drawing").with("shape", Object::new("Big").with("radius", 5i32).with("glow", 1i32)),
    );
    let bytes = codecs.encode(&shape, &big).expect("encode");
    assert_eq!(bytes, vec![1, 0, 0, 0, 5, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), drawing("Circle", "radius", 5));
}

#[test]
fn test_dynamic_candidates_use_one_based_discriminants() {
    let codecs = RuntimeCodecs::new(drawing_registry(false), CodegenConfig::default());
    let shape = TypeShape::named("Drawing");

    let square = drawing("Square", "side", 4);
    let bytes = codecs.encode(&shape, &square).expect("encode");
    assert_eq!(bytes, vec![2, 0, 0, 0, 4, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), square);

    let circle = drawing("Circle", "radius", 1);
    let bytes = codecs.encode(&shape, &circle).expect("encode");
    assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), circle);
}

#[test]
fn test_unknown_discriminant_is_rejected() {
    let codecs = RuntimeCodecs::new(drawing_registry(false), CodegenConfig::default());
    let err = codecs
        .decode(&TypeShape::named("Drawing"), &[9, 0, 0, 0, 1, 0, 0, 0])
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::UnsupportedDiscriminant { discriminant: 9, .. }
    ));
    let err = codecs
        .decode(&TypeShape::named("Drawing"), &[0, 0, 0, 0])
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::UnsupportedDiscriminant { discriminant: 0, .. }
    ));
}

#[test]
fn test_value_outside_candidates_is_rejected() {
    let codecs = RuntimeCodecs::new(drawing_registry(false), CodegenConfig::default());
    let err = codecs
        .encode(&TypeShape::named("Drawing"), &drawing("Triangle", "base", 3))
        .unwrap_err();
    assert!(matches!(err, CodecError::NoDynamicCandidate { .. }));
}

struct ByName {
    triangle: std::sync::Arc<shapecodec::CompiledCodec>,
}

impl DynamicResolver for ByName {
    fn identify(&self, value: &Value) -> Option<Value> {
        value.as_object().map(|o| Value::String(o.type_name.clone()))
    }

    fn resolve(&self, identifier: &Value) -> Option<ResolvedType> {
        match identifier {
            Value::String(name) if name == "Triangle" => {
                Some(ResolvedType::from_codec(std::sync::Arc::clone(&self.triangle)))
            }
            _ => None,
        }
    }
}

#[test]
fn test_resolver_handles_discriminant_zero() {
    let codecs = RuntimeCodecs::new(drawing_registry(true), CodegenConfig::default());
    let triangle = codecs
        .codec(&TypeShape::named("Triangle"))
        .expect("triangle codec");
    codecs.set_hooks(Hooks::new().with_resolver("by_name", ByName { triangle }));

    let shape = TypeShape::named("Drawing");
    let value = drawing("Triangle", "base", 3);
    let bytes = codecs.encode(&shape, &value).expect("encode");
    let expected: Vec<u8> = [
        &[0, 0, 0, 0][..],
        &[8],
        b"Triangle",
        &[3, 0, 0, 0],
    ]
    .concat();
    assert_eq!(bytes, expected);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);

    // Declared candidates still take precedence over the resolver.
    let bytes = codecs
        .encode(&shape, &drawing("Circle", "radius", 2))
        .expect("encode");
    assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
}

// ---- inheritance, generics, statics ----------------------------------------

#[test]
fn test_generating_base_is_delegated() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Entity")
                .generates_codec()
                .field("id", int())
                .build(),
        )
        .expect("register");
    registry
        .register(
            ObjectShape::class("User")
                .base(TypeShape::named("Entity"))
                .field("login", string())
                .build(),
        )
        .expect("register");

    let unit = generate(&registry, &TypeShape::named("User"));
    let entry = unit.primary().expect("entry");
    let encode = unit.procedure(entry.encode.expect("encode")).expect("proc");
    assert!(matches!(encode.body.first(), Some(Op::CallEncode { .. })));

    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let shape = TypeShape::named("User");
    let value = Value::Object(Object::new("User").with("id", 7i32).with("login", "ada"));
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![7, 0, 0, 0, 3, b'a', b'd', b'a']);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);

    let mut target = Value::Object(Object::new("User").with("id", 0i32).with("login", ""));
    codecs
        .decode_into(&shape, &mut target, &bytes)
        .expect("decode into");
    assert_eq!(target, value);
}

#[test]
fn test_generic_type_is_instantiated() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Box")
                .type_param("T")
                .field("item", TypeShape::param("T"))
                .field("items", TypeShape::list(TypeShape::param("T")))
                .build(),
        )
        .expect("register");
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
    let shape = TypeShape::generic("Box", vec![string()]);
    let value = Value::Object(
        Object::new("Box<string>")
            .with("item", "a")
            .with("items", Value::List(vec![Value::from("b")])),
    );
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![1, b'a', 1, 0, 0, 0, 1, b'b']);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_included_static_member_is_written_not_assigned() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::class("Config")
                .member(
                    MemberShape::field("schema", int())
                        .static_member()
                        .with_attrs(MemberAttributes {
                            include: true,
                            ..Default::default()
                        }),
                )
                .field("limit", int())
                .build(),
        )
        .expect("register");
    let codecs = RuntimeCodecs::new(registry, CodegenConfig::default())
        .with_hooks(Hooks::new().with_static("Config", "schema", 3i32));
    let shape = TypeShape::named("Config");
    let value = Value::Object(Object::new("Config").with("limit", 10i32));
    let bytes = codecs.encode(&shape, &value).expect("encode");
    assert_eq!(bytes, vec![3, 0, 0, 0, 10, 0, 0, 0]);
    assert_eq!(codecs.decode(&shape, &bytes).expect("decode"), value);
}

#[test]
fn test_interface_member_without_candidates_is_diagnosed() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(ObjectShape::interface("Plugin").build())
        .expect("register");
    registry
        .register(
            ObjectShape::class("Host")
                .field("name", string())
                .field("plugin", TypeShape::named("Plugin"))
                .build(),
        )
        .expect("register");
    let unit = generate(&registry, &TypeShape::named("Host"));
    assert!(unit.has_errors());
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::UnsupportedShape));
}
