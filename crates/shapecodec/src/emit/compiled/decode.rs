// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lowering of decode and decode-into procedures.
//!
//! Counts read from the stream are trusted only up to a point: collections
//! preallocate at most [`crate::stream::MAX_PREALLOC`] elements, so a corrupted count fails
//! with an end-of-stream error instead of a huge allocation.

use super::machine::{
    decode_step, local_mut, local_usize, run_decode, store, take, take_set, CompiledPlace,
    DecodeFrame, DecodeStep,
};
use super::scalar;
use super::Lowering;
use crate::error::{CodecError, CodecResult};
use crate::hooks::DynamicResolver;
use crate::ir::{
    Assignment, ConvertDirection, CtorCall, DynamicCase, InitKind, LocalId, Op, Place, ResolverCall,
};
use crate::stream::MAX_PREALLOC;
use crate::value::{Object, Value};
use std::sync::Arc;

/// Instance a decode-into call writes to.
#[derive(Clone, Copy)]
enum Target {
    Input,
    Local(usize),
}

fn target_mut<'f>(frame: &'f mut DecodeFrame<'_>, target: Target) -> CodecResult<&'f mut Value> {
    match target {
        Target::Input => frame.target.as_deref_mut().ok_or_else(|| CodecError::Generation {
            type_name: String::new(),
            reason: "procedure has no input instance".into(),
        }),
        Target::Local(index) => local_mut(&mut frame.locals, index),
    }
}

fn object_mut(value: &mut Value) -> CodecResult<&mut Object> {
    let label = value.type_label();
    value
        .as_object_mut()
        .ok_or_else(|| CodecError::mismatch("object", label))
}

/// Row-major position of `indices` in an array of `dims`.
fn flat_index(dims: &[usize], indices: &[usize]) -> CodecResult<usize> {
    if dims.len() != indices.len() {
        return Err(CodecError::OutOfRange(format!(
            "{} indices for an array of rank {}",
            indices.len(),
            dims.len()
        )));
    }
    let mut flat = 0usize;
    for (dim, index) in dims.iter().zip(indices) {
        if index >= dim {
            return Err(CodecError::OutOfRange(format!(
                "index {} outside dimension {}",
                index, dim
            )));
        }
        flat = flat * dim + index;
    }
    Ok(flat)
}

fn push_element(collection: &mut Value, indices: &[usize], item: Value) -> CodecResult<()> {
    let (flat, items) = match collection {
        Value::List(items) => (indices.first().copied().unwrap_or_default(), items),
        Value::Array { dims, items } => (flat_index(dims, indices)?, items),
        other => return Err(CodecError::mismatch("array", other.type_label())),
    };
    if flat != items.len() {
        return Err(CodecError::OutOfRange(format!(
            "element {} stored out of order (have {})",
            flat,
            items.len()
        )));
    }
    items.push(item);
    Ok(())
}

struct DecodeResolver {
    hook: Arc<dyn DynamicResolver>,
    name: String,
    identifier: usize,
    body: Vec<DecodeStep>,
}

fn index(id: LocalId) -> usize {
    id.0 as usize
}

impl Lowering<'_> {
    pub(super) fn decode_ops(&self, ops: &[Op]) -> CodecResult<Vec<DecodeStep>> {
        ops.iter().map(|op| self.decode_op(op)).collect()
    }

    fn target(&self, place: &Place) -> CodecResult<Target> {
        match place {
            Place::Input => Ok(Target::Input),
            Place::Local(id) => Ok(Target::Local(index(*id))),
            other => Err(self.invalid(format!("{:?} cannot receive a decoded instance", other))),
        }
    }

    fn decode_op(&self, op: &Op) -> CodecResult<DecodeStep> {
        Ok(match op {
            Op::ReadPrimitive { kind, dst } => {
                let (kind, dst) = (*kind, index(*dst));
                decode_step(move |_, f, r| store(&mut f.locals, dst, scalar::read_primitive(kind, r)?))
            }
            Op::ReadEnum {
                underlying, dst, ..
            } => {
                let (underlying, dst) = (*underlying, index(*dst));
                decode_step(move |_, f, r| store(&mut f.locals, dst, scalar::read_enum(underlying, r)?))
            }
            Op::ReadKnown { kind, dst } => {
                let (kind, dst) = (*kind, index(*dst));
                decode_step(move |_, f, r| store(&mut f.locals, dst, scalar::read_known(kind, r)?))
            }
            Op::ReadBlittable { layout, dst } => {
                let (layout, dst) = (Arc::clone(layout), index(*dst));
                decode_step(move |_, f, r| {
                    store(&mut f.locals, dst, scalar::read_blittable(&layout, r)?)
                })
            }
            Op::DecodeNullable {
                dst, inner, body, ..
            } => {
                let (dst, inner) = (index(*dst), index(*inner));
                let body = self.decode_ops(body)?;
                decode_step(move |m, f, r| {
                    if !r.read_bool()? {
                        return store(&mut f.locals, dst, Value::Null);
                    }
                    run_decode(&body, m, f, r)?;
                    let value = take(&mut f.locals, inner)?;
                    store(&mut f.locals, dst, value)
                })
            }
            Op::ReadCount { dst } => {
                let dst = index(*dst);
                decode_step(move |_, f, r| {
                    let count = r.read_count()?;
                    store(&mut f.locals, dst, Value::I32(count as i32))
                })
            }
            Op::NewCollection { dst, init, .. } => self.new_collection(index(*dst), init),
            Op::Repeat { count, index: i, body } => {
                let (count, i) = (index(*count), index(*i));
                let body = self.decode_ops(body)?;
                decode_step(move |m, f, r| {
                    let n = local_usize(&f.locals, count)?;
                    for position in 0..n {
                        store(&mut f.locals, i, Value::I32(position as i32))?;
                        run_decode(&body, m, f, r)?;
                    }
                    Ok(())
                })
            }
            Op::Insert {
                collection, item, ..
            } => {
                let (collection, item) = (index(*collection), index(*item));
                decode_step(move |_, f, _| {
                    let value = take(&mut f.locals, item)?;
                    match local_mut(&mut f.locals, collection)? {
                        Value::List(items) => {
                            items.push(value);
                            Ok(())
                        }
                        other => Err(CodecError::mismatch("list", other.type_label())),
                    }
                })
            }
            Op::InsertEntry {
                collection,
                key,
                value,
            } => {
                let (collection, key, value) = (index(*collection), index(*key), index(*value));
                decode_step(move |_, f, _| {
                    let entry = (take(&mut f.locals, key)?, take(&mut f.locals, value)?);
                    match local_mut(&mut f.locals, collection)? {
                        Value::Map(entries) => {
                            entries.push(entry);
                            Ok(())
                        }
                        other => Err(CodecError::mismatch("map", other.type_label())),
                    }
                })
            }
            Op::StoreElement {
                array,
                indices,
                item,
            } => {
                let (array, item) = (index(*array), index(*item));
                let indices: Vec<usize> = indices.iter().map(|i| index(*i)).collect();
                decode_step(move |_, f, _| {
                    let value = take(&mut f.locals, item)?;
                    let at = indices
                        .iter()
                        .map(|i| local_usize(&f.locals, *i))
                        .collect::<CodecResult<Vec<_>>>()?;
                    push_element(local_mut(&mut f.locals, array)?, &at, value)
                })
            }
            Op::CallDecode { proc, dst } => {
                let (proc, dst) = (proc.index(), index(*dst));
                decode_step(move |m, f, r| {
                    let value = m.decode(proc, r)?;
                    store(&mut f.locals, dst, value)
                })
            }
            Op::CallDecodeInto { proc, target } => {
                let (proc, target) = (proc.index(), self.target(target)?);
                decode_step(move |m, f, r| m.decode_into(proc, target_mut(f, target)?, r))
            }
            Op::NewPartial { dst, type_name } => {
                let (dst, type_name) = (index(*dst), type_name.clone());
                decode_step(move |_, f, _| {
                    store(&mut f.locals, dst, Value::Object(Object::new(type_name.clone())))
                })
            }
            Op::CustomDecode {
                type_name,
                method,
                dst,
            } => {
                let (decode, dst) = (self.decoder(type_name, method)?, index(*dst));
                decode_step(move |_, f, r| {
                    let value = decode(r)?;
                    store(&mut f.locals, dst, value)
                })
            }
            Op::Convert {
                converter,
                direction: ConvertDirection::FromWire,
                src: Place::Local(wire),
                dst,
            } => {
                let (converter, wire, dst) = (self.converter(converter)?, index(*wire), index(*dst));
                decode_step(move |_, f, _| {
                    let value = converter.from_wire(take(&mut f.locals, wire)?)?;
                    store(&mut f.locals, dst, value)
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
                    .collect::<CodecResult<Vec<CompiledPlace>>>()?;
                let (then, otherwise) = (self.decode_ops(then)?, self.decode_ops(otherwise)?);
                decode_step(move |m, f, r| {
                    let values = args
                        .iter()
                        .map(|a| a.read(f.target.as_deref(), &f.locals))
                        .collect::<CodecResult<Vec<Value>>>()?;
                    if predicate(&values) {
                        run_decode(&then, m, f, r)
                    } else {
                        run_decode(&otherwise, m, f, r)
                    }
                })
            }
            Op::SetDefault { dst, provider } => {
                let (provider, dst) = (self.default_provider(provider)?, index(*dst));
                decode_step(move |_, f, _| store(&mut f.locals, dst, provider()))
            }
            Op::DynamicDecode {
                type_name,
                dst,
                cases,
                resolver,
            } => self.dynamic_decode(type_name, index(*dst), cases, resolver.as_ref())?,
            Op::Construct {
                dst,
                type_name,
                ctor,
                assignments,
                base,
            } => construct(index(*dst), type_name, ctor.as_ref(), assignments, *base),
            Op::AssignMember {
                target,
                member,
                value,
            } => {
                let (target, member, value) = (self.target(target)?, member.clone(), index(*value));
                decode_step(move |_, f, _| {
                    let Some(decoded) = take_set(&mut f.locals, value) else {
                        return Ok(());
                    };
                    object_mut(target_mut(f, target)?)?.set(member.clone(), decoded);
                    Ok(())
                })
            }
            other => {
                return Err(self.invalid(format!("{:?} cannot appear in a decode procedure", other)))
            }
        })
    }

    fn new_collection(&self, dst: usize, init: &InitKind) -> DecodeStep {
        match init.clone() {
            InitKind::List { capacity } => decode_step(move |_, f, _| {
                let reserve = match capacity {
                    Some(count) => local_usize(&f.locals, index(count))?.min(MAX_PREALLOC),
                    None => 0,
                };
                store(&mut f.locals, dst, Value::List(Vec::with_capacity(reserve)))
            }),
            InitKind::Map { capacity } => decode_step(move |_, f, _| {
                let reserve = match capacity {
                    Some(count) => local_usize(&f.locals, index(count))?.min(MAX_PREALLOC),
                    None => 0,
                };
                store(&mut f.locals, dst, Value::Map(Vec::with_capacity(reserve)))
            }),
            InitKind::Array { dims } => decode_step(move |_, f, _| {
                let lengths = dims
                    .iter()
                    .map(|d| local_usize(&f.locals, index(*d)))
                    .collect::<CodecResult<Vec<_>>>()?;
                let total = lengths
                    .iter()
                    .try_fold(1usize, |acc, d| acc.checked_mul(*d))
                    .ok_or_else(|| CodecError::OutOfRange(format!("array dimensions {:?}", lengths)))?;
                let items = Vec::with_capacity(total.min(MAX_PREALLOC));
                let array = if lengths.len() == 1 {
                    Value::List(items)
                } else {
                    Value::Array {
                        dims: lengths,
                        items,
                    }
                };
                store(&mut f.locals, dst, array)
            }),
        }
    }

    fn dynamic_decode(
        &self,
        type_name: &str,
        dst: usize,
        cases: &[DynamicCase],
        resolver: Option<&ResolverCall>,
    ) -> CodecResult<DecodeStep> {
        let cases: Vec<(i32, usize)> = cases
            .iter()
            .map(|c| (c.discriminant, c.proc.index()))
            .collect();
        let resolver = match resolver {
            Some(call) => Some(DecodeResolver {
                hook: self.resolver(&call.name)?,
                name: call.name.clone(),
                identifier: index(call.identifier),
                body: self.decode_ops(&call.body)?,
            }),
            None => None,
        };
        let type_name = type_name.to_string();

        Ok(decode_step(move |m, f, r| {
            let discriminant = r.read_i32()?;
            let unsupported = || CodecError::UnsupportedDiscriminant {
                type_name: type_name.clone(),
                discriminant,
            };
            let value = match (discriminant, &resolver) {
                (0, Some(resolver)) => {
                    run_decode(&resolver.body, m, f, r)?;
                    let identifier = take(&mut f.locals, resolver.identifier)?;
                    let resolved = resolver.hook.resolve(&identifier).ok_or_else(|| CodecError::Hook {
                        name: resolver.name.clone(),
                        reason: format!("identifier {:?} does not resolve", identifier),
                    })?;
                    (resolved.decode)(r)?
                }
                (0, None) => return Err(unsupported()),
                (d, _) => {
                    let (_, proc) = cases
                        .iter()
                        .find(|(case, _)| *case == d)
                        .ok_or_else(unsupported)?;
                    m.decode(*proc, r)?
                }
            };
            store(&mut f.locals, dst, value)
        }))
    }
}

/// Build the object: base members, then constructor arguments, then
/// assigned members. Unset constructor arguments become `Null`; unset
/// assignments are skipped.
fn construct(
    dst: usize,
    type_name: &str,
    ctor: Option<&CtorCall>,
    assignments: &[Assignment],
    base: Option<LocalId>,
) -> DecodeStep {
    let type_name = type_name.to_string();
    let args: Vec<(String, usize)> = ctor
        .map(|c| c.args.iter().map(|(m, l)| (m.clone(), index(*l))).collect())
        .unwrap_or_default();
    let assigned: Vec<(String, usize)> = assignments
        .iter()
        .map(|a| (a.member.clone(), index(a.value)))
        .collect();
    let base = base.map(index);

    decode_step(move |_, f, _| {
        let mut object = Object::new(type_name.clone());
        if let Some(base) = base {
            if let Value::Object(partial) = take(&mut f.locals, base)? {
                object.fields = partial.fields;
            }
        }
        for (member, local) in &args {
            let value = take_set(&mut f.locals, *local).unwrap_or(Value::Null);
            object.set(member.clone(), value);
        }
        for (member, local) in &assigned {
            if let Some(value) = take_set(&mut f.locals, *local) {
                object.set(member.clone(), value);
            }
        }
        store(&mut f.locals, dst, Value::Object(object))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_index_is_row_major() {
        assert_eq!(flat_index(&[2, 3], &[1, 2]).expect("index"), 5);
        assert!(flat_index(&[2, 3], &[2, 0]).is_err());
    }

    #[test]
    fn test_elements_must_arrive_in_order() {
        let mut array = Value::Array {
            dims: vec![2, 2],
            items: Vec::new(),
        };
        push_element(&mut array, &[0, 0], Value::I32(1)).expect("first");
        assert!(push_element(&mut array, &[1, 1], Value::I32(2)).is_err());
    }
}
