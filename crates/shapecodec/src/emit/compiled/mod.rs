// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compiled backend: procedures lowered to closures over [`Value`].
//!
//! Lowering happens once per codec. Every hook an op names (converter,
//! predicate, default, custom method, resolver, static value) is looked up
//! at that point, so a missing hook fails [`CompiledCodec::compile`] rather
//! than a later encode. Only procedures reachable from the exposed entry
//! points are lowered.

mod decode;
mod encode;
pub(crate) mod machine;
pub(crate) mod scalar;

use crate::config::GeneratorConfig;
use crate::error::{CodecError, CodecResult};
use crate::generator::{CodecUnit, EntryPoints};
use crate::hooks::{Converter, DecodeFn, DefaultProvider, DynamicResolver, EncodeFn, Hooks, Predicate};
use crate::ir::{Direction, GeneratedProcedure, Place, ProcId};
use crate::stream::{BufferWriter, SliceReader, StreamReader, StreamWriter};
use crate::value::Value;
use machine::{CompiledPlace, CompiledProc, Machine};
use std::fmt;
use std::sync::Arc;

/// Hook lookups and error context shared by encode and decode lowering.
pub(crate) struct Lowering<'h> {
    hooks: &'h Hooks,
    type_name: &'h str,
}

impl<'h> Lowering<'h> {
    fn invalid(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Generation {
            type_name: self.type_name.to_string(),
            reason: reason.into(),
        }
    }

    fn place(&self, place: &Place) -> CodecResult<CompiledPlace> {
        Ok(match place {
            Place::Input => CompiledPlace::Input,
            Place::Local(id) => CompiledPlace::Local(id.0 as usize),
            Place::Member { base, name } => {
                CompiledPlace::Member(Box::new(self.place(base)?), name.clone())
            }
            Place::Static { type_name, member } => CompiledPlace::Static(
                self.hooks
                    .static_value(type_name, member)
                    .cloned()
                    .ok_or_else(|| {
                        CodecError::missing_hook("static value", format!("{}::{}", type_name, member))
                    })?,
            ),
        })
    }

    fn converter(&self, name: &str) -> CodecResult<Arc<dyn Converter>> {
        self.hooks
            .converter(name)
            .ok_or_else(|| CodecError::missing_hook("converter", name))
    }

    fn predicate(&self, name: &str) -> CodecResult<Predicate> {
        self.hooks
            .predicate(name)
            .ok_or_else(|| CodecError::missing_hook("predicate", name))
    }

    fn default_provider(&self, name: &str) -> CodecResult<DefaultProvider> {
        self.hooks
            .default_provider(name)
            .ok_or_else(|| CodecError::missing_hook("default provider", name))
    }

    fn encoder(&self, type_name: &str, method: &str) -> CodecResult<EncodeFn> {
        self.hooks.encoder(type_name, method).ok_or_else(|| {
            CodecError::missing_hook("custom encoder", format!("{}::{}", type_name, method))
        })
    }

    fn decoder(&self, type_name: &str, method: &str) -> CodecResult<DecodeFn> {
        self.hooks.decoder(type_name, method).ok_or_else(|| {
            CodecError::missing_hook("custom decoder", format!("{}::{}", type_name, method))
        })
    }

    fn resolver(&self, name: &str) -> CodecResult<Arc<dyn DynamicResolver>> {
        self.hooks
            .resolver(name)
            .ok_or_else(|| CodecError::missing_hook("dynamic resolver", name))
    }

    fn procedure(&self, proc: &GeneratedProcedure) -> CodecResult<CompiledProc> {
        if !proc.is_available() {
            return Err(self.invalid(format!(
                "{} procedure of {} did not generate: {}",
                proc.direction.label(),
                proc.shape,
                proc.failure.as_deref().unwrap_or("unknown reason")
            )));
        }
        let locals = proc.locals.len();
        Ok(match proc.direction {
            Direction::Encode => CompiledProc::Encode {
                locals,
                body: self.encode_ops(&proc.body)?,
            },
            Direction::Decode => CompiledProc::Decode {
                locals,
                result: proc
                    .result
                    .map(|l| l.0 as usize)
                    .ok_or_else(|| self.invalid("decode procedure has no result local"))?,
                body: self.decode_ops(&proc.body)?,
            },
            Direction::DecodeInto => CompiledProc::DecodeInto {
                locals,
                body: self.decode_ops(&proc.body)?,
            },
        })
    }
}

/// Executable codec for one root shape.
pub struct CompiledCodec {
    type_name: String,
    procs: Vec<Option<CompiledProc>>,
    encode: Option<usize>,
    decode: Option<usize>,
    decode_into: Option<usize>,
    max_depth: usize,
}

impl CompiledCodec {
    /// Lower the procedures behind `entry` (one of `unit.entries`).
    pub fn compile(
        unit: &CodecUnit,
        entry: &EntryPoints,
        hooks: &Hooks,
        config: &GeneratorConfig,
    ) -> CodecResult<Self> {
        crate::trace_fn!("CompiledCodec::compile");
        let type_name = entry.shape.to_string();
        let exposed: Vec<ProcId> = [entry.encode, entry.decode, entry.decode_into]
            .into_iter()
            .flatten()
            .collect();
        let reachable = unit.reachable_from(&exposed);

        let lowering = Lowering {
            hooks,
            type_name: &type_name,
        };
        let procs = unit
            .procedures
            .iter()
            .zip(&reachable)
            .map(|(proc, &used)| {
                if used {
                    lowering.procedure(proc).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<CodecResult<Vec<_>>>()?;

        log::debug!(
            "[CompiledCodec] {}: {} of {} procedures lowered",
            type_name,
            procs.iter().filter(|p| p.is_some()).count(),
            procs.len()
        );
        Ok(Self {
            encode: entry.encode.map(ProcId::index),
            decode: entry.decode.map(ProcId::index),
            decode_into: entry.decode_into.map(ProcId::index),
            max_depth: config.max_decode_depth,
            procs,
            type_name,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn can_encode(&self) -> bool {
        self.encode.is_some()
    }

    pub fn can_decode(&self) -> bool {
        self.decode.is_some()
    }

    pub fn can_decode_into(&self) -> bool {
        self.decode_into.is_some()
    }

    fn machine(&self) -> Machine<'_> {
        Machine::new(&self.procs, self.max_depth)
    }

    pub fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        let mut writer = BufferWriter::new();
        self.encode_to(value, &mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn encode_to(&self, value: &Value, writer: &mut dyn StreamWriter) -> CodecResult<()> {
        let proc = self.encode.ok_or_else(|| CodecError::EncoderUnavailable {
            type_name: self.type_name.clone(),
        })?;
        self.machine().encode(proc, value, writer)
    }

    /// Decode one value; bytes after it are left unread.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        self.decode_from(&mut SliceReader::new(bytes))
    }

    pub fn decode_from(&self, reader: &mut dyn StreamReader) -> CodecResult<Value> {
        let proc = self.decode.ok_or_else(|| self.no_decoder())?;
        self.machine().decode(proc, reader)
    }

    /// Overwrite the writable members of `target` with decoded values.
    pub fn decode_into(&self, target: &mut Value, bytes: &[u8]) -> CodecResult<()> {
        self.decode_into_from(target, &mut SliceReader::new(bytes))
    }

    pub fn decode_into_from(&self, target: &mut Value, reader: &mut dyn StreamReader) -> CodecResult<()> {
        let proc = self.decode_into.ok_or_else(|| self.no_decoder())?;
        self.machine().decode_into(proc, target, reader)
    }

    fn no_decoder(&self) -> CodecError {
        CodecError::DecoderUnavailable {
            type_name: self.type_name.clone(),
        }
    }
}

impl fmt::Debug for CompiledCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCodec")
            .field("type_name", &self.type_name)
            .field("encode", &self.encode)
            .field("decode", &self.decode)
            .field("decode_into", &self.decode_into)
            .field("procedures", &self.procs.iter().filter(|p| p.is_some()).count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ShapeCache;
    use crate::config::CodegenConfig;
    use crate::generator::Generator;
    use crate::shape::{PrimitiveKind, ShapeRegistry, TypeShape};
    use crate::value::Object;

    fn codec(registry: &ShapeRegistry, shape: &TypeShape, hooks: &Hooks) -> CodecResult<CompiledCodec> {
        let config = CodegenConfig::default();
        let cache = ShapeCache::new();
        let unit = Generator::new(registry, &config, &cache)
            .generate(shape)
            .expect("generate");
        let entry = unit.primary().expect("entry");
        CompiledCodec::compile(&unit, entry, hooks, &config.generator)
    }

    #[test]
    fn test_string_list_wire_form() {
        let shape = TypeShape::list(TypeShape::primitive(PrimitiveKind::String));
        let codec = codec(&ShapeRegistry::new(), &shape, &Hooks::new()).expect("codec");
        let value = Value::List(vec![Value::String("hi".into())]);
        let bytes = codec.encode(&value).expect("encode");
        assert_eq!(bytes, vec![1, 0, 0, 0, 2, b'h', b'i']);
        assert_eq!(codec.decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn test_missing_converter_fails_compilation() {
        use crate::shape::{Conversion, MemberAttributes, MemberShape, ObjectShape};
        let attrs = MemberAttributes {
            convert: Some(Conversion {
                converter: "tenths".into(),
                targets: vec![TypeShape::primitive(PrimitiveKind::I32)],
                convert_to: None,
                source: None,
            }),
            ..MemberAttributes::default()
        };
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("Temp")
                    .member(
                        MemberShape::field("celsius", TypeShape::primitive(PrimitiveKind::F64))
                            .with_attrs(attrs),
                    )
                    .build(),
            )
            .expect("register");
        let err = codec(&registry, &TypeShape::named("Temp"), &Hooks::new()).unwrap_err();
        assert!(matches!(err, CodecError::MissingHook { kind: "converter", .. }));
    }

    #[test]
    fn test_decode_into_overwrites_members() {
        use crate::shape::ObjectShape;
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("Counter")
                    .field("hits", TypeShape::primitive(PrimitiveKind::I32))
                    .build(),
            )
            .expect("register");
        let codec = codec(&registry, &TypeShape::named("Counter"), &Hooks::new()).expect("codec");
        assert!(codec.can_decode_into());
        let mut target = Value::Object(Object::new("Counter").with("hits", 1i32));
        codec
            .decode_into(&mut target, &[7, 0, 0, 0])
            .expect("decode into");
        assert_eq!(target, Value::Object(Object::new("Counter").with("hits", 7i32)));
    }
}
