// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rendered source for the less common strategies.

use shapecodec::emit::text::HEADER;
use shapecodec::shape::{
    ConstructorShape, Conversion, CustomMethods, DynamicTypes, MemberAttributes, PrimitiveKind,
    StreamParam, VersionGate,
};
use shapecodec::{
    CodegenConfig, Generator, MemberShape, ObjectShape, RustSourceBackend, ShapeCache,
    ShapeRegistry, TypeShape,
};

fn int() -> TypeShape {
    TypeShape::primitive(PrimitiveKind::I32)
}

fn render(registry: &ShapeRegistry, shape: &TypeShape) -> String {
    let config = CodegenConfig::default();
    let cache = ShapeCache::new();
    let unit = Generator::new(registry, &config, &cache)
        .generate(shape)
        .expect("generate");
    RustSourceBackend::new(&config.library)
        .render(&unit)
        .expect("render")
}

fn single(object: ObjectShape) -> ShapeRegistry {
    let mut registry = ShapeRegistry::new();
    registry.register(object).expect("register");
    registry
}

#[test]
fn test_output_starts_with_generated_header() {
    let registry = single(ObjectShape::class("Empty").build());
    let text = render(&registry, &TypeShape::named("Empty"));
    assert!(text.starts_with(HEADER));
    assert!(text.contains("use shapecodec::{CodecError, CodecResult, StreamReader, StreamWriter};"));
}

#[test]
fn test_versioned_member_renders_predicate_call() {
    let gate = MemberAttributes {
        version: Some(VersionGate {
            predicate: "is_v2".into(),
            variables: vec!["version".into()],
            default: Some("zero".into()),
        }),
        ..Default::default()
    };
    let registry = single(
        ObjectShape::class("Message")
            .field("version", int())
            .member(MemberShape::field("extra", int()).with_attrs(gate))
            .build(),
    );
    let text = render(&registry, &TypeShape::named("Message"));
    assert!(text.contains("if is_v2("));
    assert!(text.contains(" = if is_v2("));
    assert!(text.contains(" = zero();"));
}

#[test]
fn test_converter_renders_both_directions() {
    let attrs = MemberAttributes {
        convert: Some(Conversion {
            converter: "Tenths".into(),
            targets: vec![int()],
            convert_to: None,
            source: None,
        }),
        ..Default::default()
    };
    let registry = single(
        ObjectShape::class("Reading")
            .member(
                MemberShape::field("celsius", TypeShape::primitive(PrimitiveKind::F64))
                    .with_attrs(attrs),
            )
            .build(),
    );
    let text = render(&registry, &TypeShape::named("Reading"));
    assert!(text.contains("Tenths::to_wire("));
    assert!(text.contains("Tenths::from_wire("));
    assert!(text.contains("writer.write_i32("));
    assert!(text.contains("reader.read_i32()?;"));
}

#[test]
fn test_custom_methods_are_called_on_the_type() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(
            ObjectShape::structure("Color")
                .field("rgb", TypeShape::primitive(PrimitiveKind::U32))
                .custom(CustomMethods {
                    serialize: Some("write_rgb".into()),
                    deserialize: Some("read_rgb".into()),
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
    let text = render(&registry, &TypeShape::named("Palette"));
    assert!(text.contains("Color::write_rgb(&value.primary, writer)?;"));
    assert!(text.contains("let primary = Color::read_rgb(reader)?;"));
}

#[test]
fn test_dynamic_member_renders_downcasts_and_discriminants() {
    let mut registry = ShapeRegistry::new();
    registry
        .register(ObjectShape::abstract_class("Shape").build())
        .expect("register");
    for (name, member) in [("Circle", "radius"), ("Square", "side")] {
        registry
            .register(
                ObjectShape::class(name)
                    .base(TypeShape::named("Shape"))
                    .field(member, int())
                    .build(),
            )
            .expect("register");
    }
    let dynamic = MemberAttributes {
        dynamic: Some(DynamicTypes {
            candidates: vec!["Circle".into(), "Square".into()],
            resolver: None,
        }),
        ..Default::default()
    };
    registry
        .register(
            ObjectShape::class("Drawing")
                .member(MemberShape::field("shape", TypeShape::named("Shape")).with_attrs(dynamic))
                .build(),
        )
        .expect("register");

    let text = render(&registry, &TypeShape::named("Drawing"));
    assert!(text.contains("if let Some(__candidate) = __dynamic.downcast_ref::<Circle>() {"));
    assert!(text.contains("} else if let Some(__candidate) = __dynamic.downcast_ref::<Square>() {"));
    assert!(text.contains("writer.write_i32(1)?;"));
    assert!(text.contains("writer.write_i32(2)?;"));
    assert!(text.contains("CodecError::NoDynamicCandidate"));
    assert!(text.contains(" = match reader.read_i32()? {"));
    assert!(text.contains("return Err(CodecError::UnsupportedDiscriminant {"));
}

#[test]
fn test_blittable_struct_renders_byte_image() {
    let registry = single(
        ObjectShape::structure("Vec2")
            .unmanaged()
            .field("x", TypeShape::primitive(PrimitiveKind::F32))
            .field("y", TypeShape::primitive(PrimitiveKind::F32))
            .build(),
    );
    let text = render(&registry, &TypeShape::list(TypeShape::named("Vec2")));
    assert!(text.contains("let mut __image = [0u8; 8];"));
    assert!(text.contains("writer.write_bytes(&__image)?;"));
    assert!(text.contains("let __image = reader.read_vec(8)?;"));
    assert!(text.contains("shapecodec::stream::field_bytes(&__image, 4)?"));
}

#[test]
fn test_multi_rank_array_renders_grid() {
    let registry = ShapeRegistry::new();
    let text = render(
        &registry,
        &TypeShape::array(TypeShape::primitive(PrimitiveKind::U8), 2),
    );
    assert!(text.contains("shapecodec::Grid::with_dims(vec![len0, len1])?"));
    assert!(text.contains(".dim_of_rank(0, 2)?)?)?;"));
    assert!(text.contains(".dim_of_rank(1, 2)?)?)?;"));
}

#[test]
fn test_constructor_with_parameters_renders_numbered_new() {
    let registry = single(
        ObjectShape::class("Account")
            .field("id", int())
            .field("owner", TypeShape::primitive(PrimitiveKind::String))
            .field("balance", TypeShape::primitive(PrimitiveKind::I64))
            .constructor(ConstructorShape::with_params(&["id"]))
            .constructor(ConstructorShape::with_params(&["id", "owner"]))
            .build(),
    );
    let text = render(&registry, &TypeShape::named("Account"));
    assert!(text.contains("Account::new_1(id, owner)"));
    assert!(text.contains(".balance = balance;"));
}
