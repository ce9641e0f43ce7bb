// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lowering of encode procedures.

use super::machine::{bind, encode_step, run_encode, EncodeStep};
use super::scalar;
use super::Lowering;
use crate::error::{CodecError, CodecResult};
use crate::hooks::DynamicResolver;
use crate::ir::{ConvertDirection, DynamicCase, Op, ResolverCall};
use crate::value::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Exact candidate first; otherwise the first candidate the value derives from.
struct EncodeCase {
    type_name: String,
    subtypes: Vec<String>,
    discriminant: i32,
    proc: usize,
}

struct EncodeResolver {
    hook: Arc<dyn DynamicResolver>,
    name: String,
    identifier: usize,
    body: Vec<EncodeStep>,
}

impl Lowering<'_> {
    pub(super) fn encode_ops(&self, ops: &[Op]) -> CodecResult<Vec<EncodeStep>> {
        ops.iter().map(|op| self.encode_op(op)).collect()
    }

    fn encode_op(&self, op: &Op) -> CodecResult<EncodeStep> {
        Ok(match op {
            Op::WritePrimitive { kind, src } => {
                let (kind, src) = (*kind, self.place(src)?);
                encode_step(move |_, f, w| {
                    scalar::write_primitive(kind, &*src.fetch(f.input, &f.locals)?, w)
                })
            }
            Op::WriteEnum {
                underlying, src, ..
            } => {
                let (underlying, src) = (*underlying, self.place(src)?);
                encode_step(move |_, f, w| {
                    scalar::write_enum(underlying, &*src.fetch(f.input, &f.locals)?, w)
                })
            }
            Op::WriteKnown { kind, src } => {
                let (kind, src) = (*kind, self.place(src)?);
                encode_step(move |_, f, w| {
                    scalar::write_known(kind, &*src.fetch(f.input, &f.locals)?, w)
                })
            }
            Op::WriteBlittable { layout, src } => {
                let (layout, src) = (Arc::clone(layout), self.place(src)?);
                encode_step(move |_, f, w| {
                    scalar::write_blittable(&layout, &*src.fetch(f.input, &f.locals)?, w)
                })
            }
            Op::EncodeNullable {
                src, bind: local, body, ..
            } => {
                let (src, local) = (self.place(src)?, local.0 as usize);
                let body = self.encode_ops(body)?;
                encode_step(move |m, f, w| {
                    let value = src.fetch(f.input, &f.locals)?;
                    if value.is_null() {
                        return w.write_bool(false);
                    }
                    w.write_bool(true)?;
                    bind(&mut f.locals, local, value)?;
                    run_encode(&body, m, f, w)
                })
            }
            Op::WriteCount { src, count } => {
                let (src, count) = (self.place(src)?, *count);
                encode_step(move |_, f, w| {
                    let value = src.fetch(f.input, &f.locals)?;
                    w.write_i32(scalar::count_of(&value, count)?)
                })
            }
            Op::ForEach { src, item, body } => {
                let (src, item) = (self.place(src)?, item.0 as usize);
                let body = self.encode_ops(body)?;
                encode_step(move |m, f, w| match src.fetch(f.input, &f.locals)? {
                    Cow::Borrowed(value) => {
                        for element in scalar::items(value)? {
                            bind(&mut f.locals, item, Cow::Borrowed(element))?;
                            run_encode(&body, m, f, w)?;
                        }
                        Ok(())
                    }
                    Cow::Owned(value) => {
                        for element in scalar::items(&value)? {
                            bind(&mut f.locals, item, Cow::Owned(element.clone()))?;
                            run_encode(&body, m, f, w)?;
                        }
                        Ok(())
                    }
                })
            }
            Op::ForEachEntry {
                src,
                key,
                value,
                body,
            } => {
                let src = self.place(src)?;
                let (key, value) = (key.0 as usize, value.0 as usize);
                let body = self.encode_ops(body)?;
                encode_step(move |m, f, w| match src.fetch(f.input, &f.locals)? {
                    Cow::Borrowed(map) => {
                        for (k, v) in scalar::entries(map)? {
                            bind(&mut f.locals, key, Cow::Borrowed(k))?;
                            bind(&mut f.locals, value, Cow::Borrowed(v))?;
                            run_encode(&body, m, f, w)?;
                        }
                        Ok(())
                    }
                    Cow::Owned(map) => {
                        for (k, v) in scalar::entries(&map)? {
                            bind(&mut f.locals, key, Cow::Owned(k.clone()))?;
                            bind(&mut f.locals, value, Cow::Owned(v.clone()))?;
                            run_encode(&body, m, f, w)?;
                        }
                        Ok(())
                    }
                })
            }
            Op::CallEncode { proc, src } => {
                let (proc, src) = (proc.index(), self.place(src)?);
                encode_step(move |m, f, w| m.encode(proc, &*src.fetch(f.input, &f.locals)?, w))
            }
            Op::CustomEncode {
                type_name,
                method,
                src,
            } => {
                let (encode, src) = (self.encoder(type_name, method)?, self.place(src)?);
                encode_step(move |_, f, w| encode(&*src.fetch(f.input, &f.locals)?, w))
            }
            Op::Convert {
                converter,
                direction: ConvertDirection::ToWire,
                src,
                dst,
            } => {
                let (converter, src, dst) = (self.converter(converter)?, self.place(src)?, dst.0 as usize);
                encode_step(move |_, f, _| {
                    let wire = converter.to_wire(&*src.fetch(f.input, &f.locals)?)?;
                    bind(&mut f.locals, dst, Cow::Owned(wire))
                })
            }
            Op::Gate {
                predicate,
                args,
                then,
                otherwise,
                ..
            } => {
                let predicate = self.predicate(predicate)?;
                let args = args
                    .iter()
                    .map(|a| self.place(a))
                    .collect::<CodecResult<Vec<_>>>()?;
                let (then, otherwise) = (self.encode_ops(then)?, self.encode_ops(otherwise)?);
                encode_step(move |m, f, w| {
                    let values = args
                        .iter()
                        .map(|a| a.fetch(f.input, &f.locals).map(Cow::into_owned))
                        .collect::<CodecResult<Vec<Value>>>()?;
                    if predicate(&values) {
                        run_encode(&then, m, f, w)
                    } else {
                        run_encode(&otherwise, m, f, w)
                    }
                })
            }
            Op::DynamicEncode {
                type_name,
                src,
                cases,
                resolver,
            } => self.dynamic_encode(type_name, src, cases, resolver.as_ref())?,
            other => {
                return Err(self.invalid(format!("{:?} cannot appear in an encode procedure", other)))
            }
        })
    }

    fn dynamic_encode(
        &self,
        type_name: &str,
        src: &crate::ir::Place,
        cases: &[DynamicCase],
        resolver: Option<&ResolverCall>,
    ) -> CodecResult<EncodeStep> {
        let src = self.place(src)?;
        let cases: Vec<EncodeCase> = cases
            .iter()
            .map(|c| EncodeCase {
                type_name: c.type_name.clone(),
                subtypes: c.subtypes.clone(),
                discriminant: c.discriminant,
                proc: c.proc.index(),
            })
            .collect();
        let resolver = match resolver {
            Some(call) => Some(EncodeResolver {
                hook: self.resolver(&call.name)?,
                name: call.name.clone(),
                identifier: call.identifier.0 as usize,
                body: self.encode_ops(&call.body)?,
            }),
            None => None,
        };
        let type_name = type_name.to_string();

        Ok(encode_step(move |m, f, w| {
            let value = src.fetch(f.input, &f.locals)?;
            let runtime_type = value.as_object().map(|o| o.type_name.as_str());
            let case = runtime_type.and_then(|name| {
                cases
                    .iter()
                    .find(|c| c.type_name == name)
                    .or_else(|| cases.iter().find(|c| c.subtypes.iter().any(|s| s == name)))
            });
            if let Some(case) = case {
                w.write_i32(case.discriminant)?;
                return m.encode(case.proc, &value, w);
            }

            let no_candidate = || CodecError::NoDynamicCandidate {
                type_name: type_name.clone(),
                found: value.type_label(),
            };
            let Some(resolver) = &resolver else {
                return Err(no_candidate());
            };
            let identifier = resolver.hook.identify(&value).ok_or_else(no_candidate)?;
            let resolved = resolver.hook.resolve(&identifier).ok_or_else(|| CodecError::Hook {
                name: resolver.name.clone(),
                reason: format!("identifier {:?} does not resolve", identifier),
            })?;
            w.write_i32(0)?;
            bind(&mut f.locals, resolver.identifier, Cow::Owned(identifier))?;
            run_encode(&resolver.body, m, f, w)?;
            (resolved.encode)(&value, w)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Hooks;
    use crate::ir::{LocalId, Place};
    use crate::shape::PrimitiveKind;
    use crate::stream::BufferWriter;
    use crate::value::Object;

    fn run(ops: &[Op], hooks: &Hooks, input: &Value, locals: usize) -> CodecResult<Vec<u8>> {
        let lowering = Lowering {
            hooks,
            type_name: "Test",
        };
        let steps = lowering.encode_ops(ops)?;
        let procs = Vec::new();
        let machine = super::super::machine::Machine::new(&procs, 8);
        let mut frame = super::super::machine::EncodeFrame {
            input,
            locals: vec![None; locals],
        };
        let mut writer = BufferWriter::new();
        run_encode(&steps, &machine, &mut frame, &mut writer)?;
        Ok(writer.into_inner())
    }

    #[test]
    fn test_nullable_writes_presence_flag() {
        let ops = vec![Op::EncodeNullable {
            src: Place::Input,
            bind: LocalId(0),
            wrapper: false,
            body: vec![Op::WritePrimitive {
                kind: PrimitiveKind::U8,
                src: Place::Local(LocalId(0)),
            }],
        }];
        let hooks = Hooks::new();
        assert_eq!(run(&ops, &hooks, &Value::Null, 1).expect("null"), vec![0]);
        assert_eq!(run(&ops, &hooks, &Value::U8(9), 1).expect("set"), vec![1, 9]);
    }

    #[test]
    fn test_gate_skips_member_when_predicate_fails() {
        let ops = vec![Op::Gate {
            predicate: "v2".into(),
            args: vec![Place::member(Place::Input, "version")],
            then: vec![Op::WritePrimitive {
                kind: PrimitiveKind::U8,
                src: Place::member(Place::Input, "extra"),
            }],
            otherwise: Vec::new(),
            result: None,
        }];
        let hooks = Hooks::new().with_predicate("v2", |args| args.first() == Some(&Value::I32(2)));
        let v1 = Value::Object(Object::new("M").with("version", 1i32).with("extra", 5u8));
        let v2 = Value::Object(Object::new("M").with("version", 2i32).with("extra", 5u8));
        assert!(run(&ops, &hooks, &v1, 0).expect("v1").is_empty());
        assert_eq!(run(&ops, &hooks, &v2, 0).expect("v2"), vec![5]);
    }

    #[test]
    fn test_decode_op_is_rejected() {
        let ops = vec![Op::ReadCount { dst: LocalId(0) }];
        let err = run(&ops, &Hooks::new(), &Value::Null, 1).unwrap_err();
        assert!(matches!(err, CodecError::Generation { .. }));
    }
}
