// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collection strategy: rank-1 arrays, growable collections and dictionaries.
//!
//! Wire form: `i32` count, then each element (dictionaries: key then value).
//! Decode allocates with the count as capacity when the collection type
//! offers a capacity constructor, then inserts each element with the best
//! available insert method (`Add`, then `Push`, then `Enqueue`).

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{Count, InitKind, LocalId, Op};
use crate::shape::{InsertMethod, PrimitiveKind, ShapeKind, TypeShape};

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let chain = ctx.chain();
    match &desc.shape.kind {
        ShapeKind::Array { element, rank: 1 } => encode_sequence(ctx, desc, element),
        ShapeKind::Collection(collection) => encode_sequence(ctx, desc, &collection.element),
        ShapeKind::Dictionary(dictionary) => {
            let src = ctx.place_of(desc)?;
            ctx.emit(Op::WriteCount {
                src: src.clone(),
                count: Count::Elements,
            })?;

            ctx.begin_block()?;
            let (key, key_desc) = ctx.bind_local("key", dictionary.key.as_ref().clone())?;
            let (value, value_desc) =
                ctx.bind_local("value", dictionary.value.as_ref().clone())?;
            let encoded = match chain.encode(ctx, &key_desc) {
                Ok(true) => chain.encode(ctx, &value_desc),
                other => other,
            };
            let body = ctx.end_block()?;
            if !encoded? {
                return Ok(Outcome::Failed);
            }
            ctx.emit(Op::ForEachEntry {
                src,
                key,
                value,
                body,
            })?;
            Ok(Outcome::Done)
        }
        _ => Ok(Outcome::NotExecuted),
    }
}

fn encode_sequence(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    element: &TypeShape,
) -> GenResult<Outcome> {
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::WriteCount {
        src: src.clone(),
        count: Count::Elements,
    })?;

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (item, item_desc) = ctx.bind_local("item", element.clone())?;
    let encoded = chain.encode(ctx, &item_desc);
    let body = ctx.end_block()?;
    if !encoded? {
        return Ok(Outcome::Failed);
    }
    ctx.emit(Op::ForEach { src, item, body })?;
    Ok(Outcome::Done)
}

/// How one decoded element lands in the collection.
enum Store {
    Insert(InsertMethod),
    Element,
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    match &desc.shape.kind {
        ShapeKind::Array { element, rank: 1 } => {
            decode_sequence(ctx, desc, dst, element, None, Store::Element)
        }
        ShapeKind::Collection(collection) => {
            let Some(method) = InsertMethod::PREFERENCE
                .into_iter()
                .find(|m| collection.inserts.contains(m))
            else {
                ctx.report(
                    DiagnosticCode::UnsupportedShape,
                    Some(&desc.name),
                    format!("{} has no usable insert method", desc.shape.base_name()),
                );
                return Ok(Outcome::Failed);
            };
            decode_sequence(
                ctx,
                desc,
                dst,
                &collection.element,
                Some(collection.capacity_constructor),
                Store::Insert(method),
            )
        }
        ShapeKind::Dictionary(dictionary) => {
            let count = read_count(ctx)?;
            ctx.emit(Op::NewCollection {
                dst,
                type_name: desc.shape.base_name(),
                init: InitKind::Map {
                    capacity: dictionary.capacity_constructor.then_some(count),
                },
            })?;
            let index = index_local(ctx)?;

            let chain = ctx.chain();
            ctx.begin_block()?;
            let (key, key_desc) = ctx.bind_local("key", dictionary.key.as_ref().clone())?;
            let (value, value_desc) =
                ctx.bind_local("value", dictionary.value.as_ref().clone())?;
            let decoded = match chain.decode(ctx, &key_desc, key) {
                Ok(true) => chain.decode(ctx, &value_desc, value),
                other => other,
            };
            if matches!(decoded, Ok(true)) {
                ctx.emit(Op::InsertEntry {
                    collection: dst,
                    key,
                    value,
                })?;
            }
            let body = ctx.end_block()?;
            if !decoded? {
                return Ok(Outcome::Failed);
            }
            ctx.emit(Op::Repeat { count, index, body })?;
            Ok(Outcome::Done)
        }
        _ => Ok(Outcome::NotExecuted),
    }
}

fn read_count(ctx: &mut CodecContext<'_>) -> GenResult<LocalId> {
    let count = ctx.declare_local("count", &TypeShape::primitive(PrimitiveKind::I32))?;
    ctx.emit(Op::ReadCount { dst: count })?;
    Ok(count)
}

fn index_local(ctx: &mut CodecContext<'_>) -> GenResult<LocalId> {
    ctx.declare_local("i", &TypeShape::primitive(PrimitiveKind::I32))
}

/// `capacity`: `None` for arrays (always sized), otherwise whether the
/// collection type has a capacity constructor.
fn decode_sequence(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
    element: &TypeShape,
    capacity: Option<bool>,
    store: Store,
) -> GenResult<Outcome> {
    let count = read_count(ctx)?;
    let init = match capacity {
        None => InitKind::Array { dims: vec![count] },
        Some(sized) => InitKind::List {
            capacity: sized.then_some(count),
        },
    };
    ctx.emit(Op::NewCollection {
        dst,
        type_name: desc.shape.base_name(),
        init,
    })?;
    let index = index_local(ctx)?;

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (item, item_desc) = ctx.bind_local("item", element.clone())?;
    let decoded = chain.decode(ctx, &item_desc, item);
    if matches!(decoded, Ok(true)) {
        let op = match store {
            Store::Insert(method) => Op::Insert {
                collection: dst,
                method,
                item,
            },
            Store::Element => Op::StoreElement {
                array: dst,
                indices: vec![index],
                item,
            },
        };
        ctx.emit(op)?;
    }
    let body = ctx.end_block()?;
    if !decoded? {
        return Ok(Outcome::Failed);
    }
    ctx.emit(Op::Repeat { count, index, body })?;
    Ok(Outcome::Done)
}
