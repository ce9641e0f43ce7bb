// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shape model: what the generator knows about the types it encodes.
//!
//! # Architecture
//!
//! ```text
//! ShapeRegistry
//!   +-- ObjectShape (name, kind, base, members, constructors, custom, dynamic)
//!         +-- MemberShape (name, TypeShape, access flags, MemberAttributes)
//!         +-- ConstructorShape (params, preferred)
//!
//! TypeShape = ShapeKind + Nullability
//!   Primitive | Enum | Known | Array | Collection | Dictionary
//!   | NullableWrapper | Named | Param
//! ```
//!
//! Shapes are plain data and serde-serializable, so a schema can be written
//! by hand in TOML or JSON and loaded with [`ShapeRegistry::from_file`].

pub mod attributes;
pub mod kind;
pub mod object;
pub mod registry;
pub mod type_shape;

pub use attributes::{
    Conversion, CustomMethods, DynamicTypes, MemberAttributes, ResolverShape, StreamParam,
    VersionGate,
};
pub use kind::{InsertMethod, KnownKind, MemberKind, Nullability, ObjectKind, PrimitiveKind};
pub use object::{ConstructorShape, MemberShape, ObjectShape, ObjectShapeBuilder, ParamShape};
pub use registry::{SchemaFile, ShapeRegistry};
pub use type_shape::{
    CollectionShape, DictionaryShape, EnumShape, EnumVariant, ShapeKind, TypeKey, TypeShape,
};
