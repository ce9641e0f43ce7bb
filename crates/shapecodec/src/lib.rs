// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # shapecodec - shape-driven binary codec generation
//!
//! Given a description of a data type (its *shape*), shapecodec decides how
//! every reachable value is written to and read back from a little-endian
//! binary stream, and emits that decision as an intermediate procedure form.
//! Two backends consume the same procedures:
//!
//! - [`emit::text`] renders them as Rust source text for a code generator.
//! - [`emit::compiled`] turns them into executable closures over [`Value`].
//!
//! Both backends are fed by one [`chain::StrategyChain`], so the wire format
//! produced by generated source and by the runtime codec is byte-identical.
//!
//! ## Quick Start
//!
//! ```rust
//! use shapecodec::{
//!     CodegenConfig, Object, ObjectShape, RuntimeCodecs, ShapeRegistry, TypeShape, Value,
//! };
//! use shapecodec::shape::PrimitiveKind;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ShapeRegistry::new();
//! registry.register(
//!     ObjectShape::class("Person")
//!         .field("name", TypeShape::primitive(PrimitiveKind::String))
//!         .field("age", TypeShape::primitive(PrimitiveKind::I32))
//!         .build(),
//! )?;
//!
//! let codecs = RuntimeCodecs::new(registry, CodegenConfig::default());
//! let person = Value::Object(
//!     Object::new("Person")
//!         .with("name", Value::String("Ada".into()))
//!         .with("age", Value::I32(36)),
//! );
//!
//! let bytes = codecs.encode(&TypeShape::named("Person"), &person)?;
//! let back = codecs.decode(&TypeShape::named("Person"), &bytes)?;
//! assert_eq!(back, person);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  ShapeRegistry (ObjectShape, TypeShape, MemberShape, constructors)  |
//! +---------------------------------------------------------------------+
//! |  Generator -> CodecContext -> StrategyChain (13 strategies)         |
//! |     members::enumerate       reconstruct::resolve                   |
//! +---------------------------------------------------------------------+
//! |  ir::GeneratedProcedure (Op tree per type and direction)            |
//! +---------------------------------------------------------------------+
//! |  emit::text (Rust source)       |  emit::compiled (closures)        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Wire format
//!
//! Little-endian throughout. Nullable values carry a 1-byte presence flag,
//! collections a 4-byte signed count, strings a 7-bit encoded byte length
//! followed by UTF-8. Dynamic values are prefixed with an `i32` discriminant
//! where `1..=n` selects a declared candidate and `0` routes through a
//! resolver.
//!
//! ## Features
//!
//! - `trace`: function-entry tracing (`trace_fn!`) at `log::trace` level.

#![deny(unsafe_code)]

pub mod logging;

pub mod cache;
pub mod chain;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod generator;
pub mod grid;
pub mod hooks;
pub mod ir;
pub mod layout;
pub mod members;
pub mod reconstruct;
pub mod runtime;
pub mod shape;
pub mod stream;
pub mod value;

pub use cache::ShapeCache;
pub use chain::{StrategyChain, StrategyKind};
pub use config::{CodegenConfig, ConfigError, GeneratorConfig, LibraryConfig};
pub use context::CodecContext;
pub use descriptor::{Owner, ValueDescriptor};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use emit::compiled::CompiledCodec;
pub use emit::text::RustSourceBackend;
pub use error::{CodecError, CodecResult, GenResult, GenerationError, ShapeError};
pub use generator::{CodecUnit, Generator};
pub use grid::Grid;
pub use hooks::{Converter, DynamicResolver, Hooks, ResolvedType};
pub use ir::{Direction, GeneratedProcedure, Op, Place, ProcId};
pub use runtime::RuntimeCodecs;
pub use shape::{MemberShape, ObjectShape, ShapeRegistry, TypeKey, TypeShape};
pub use stream::{BufferWriter, SliceReader, StreamReader, StreamWriter};
pub use value::{Object, Value};
