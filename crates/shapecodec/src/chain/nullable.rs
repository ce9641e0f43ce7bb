// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nullable strategy: a presence byte (`0` null, `1` present) followed by
//! the non-null value.
//!
//! Nullable wrappers (`Option<T>`-style value types) unwrap to their inner
//! shape; nullable references are encoded as the same shape made non-null.

use super::{Outcome, StrategyFlags};
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::shape::{ShapeKind, TypeShape};

/// Non-null shape and whether it came out of a wrapper.
fn unwrap(shape: &TypeShape) -> (TypeShape, bool) {
    match &shape.kind {
        ShapeKind::NullableWrapper { inner } => (inner.as_ref().non_null(), true),
        _ => (shape.non_null(), false),
    }
}

pub fn encode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    if !desc.shape.is_nullable() {
        return Ok(Outcome::NotExecuted);
    }
    let (inner, wrapper) = unwrap(&desc.shape);
    let src = ctx.place_of(desc)?;

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (bind, _) = ctx.bind_local(&desc.name, inner.clone())?;
    let bind_name = ctx.local_name(bind)?;
    let encoded = chain.encode_masked(ctx, &desc.rebind(&bind_name, inner), mask);
    let body = ctx.end_block()?;
    if !encoded? {
        return Ok(Outcome::Failed);
    }

    ctx.emit(Op::EncodeNullable {
        src,
        bind,
        wrapper,
        body,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    if !desc.shape.is_nullable() {
        return Ok(Outcome::NotExecuted);
    }
    let (inner_shape, wrapper) = unwrap(&desc.shape);

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (inner, _) = ctx.bind_local(&desc.name, inner_shape.clone())?;
    let inner_name = ctx.local_name(inner)?;
    let decoded = chain.decode_masked(ctx, &desc.rebind(&inner_name, inner_shape), inner, mask);
    let body = ctx.end_block()?;
    if !decoded? {
        return Ok(Outcome::Failed);
    }

    ctx.emit(Op::DecodeNullable {
        dst,
        inner,
        wrapper,
        body,
    })?;
    Ok(Outcome::Done)
}
