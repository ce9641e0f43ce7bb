// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-rank array strategy.
//!
//! Wire form: one `i32` length per dimension, then every element in
//! row-major order. Decode allocates the full array up front and fills it
//! with one nested loop per dimension.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{Count, InitKind, LocalId, Op};
use crate::shape::{PrimitiveKind, ShapeKind, TypeShape};

fn multi_rank(shape: &TypeShape) -> Option<(TypeShape, usize)> {
    match &shape.kind {
        ShapeKind::Array { element, rank } if *rank >= 2 => Some((element.as_ref().clone(), *rank)),
        _ => None,
    }
}

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let Some((element, rank)) = multi_rank(&desc.shape) else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    for index in 0..rank {
        ctx.emit(Op::WriteCount {
            src: src.clone(),
            count: Count::Dimension { index, rank },
        })?;
    }

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (item, item_desc) = ctx.bind_local("item", element)?;
    let encoded = chain.encode(ctx, &item_desc);
    let body = ctx.end_block()?;
    if !encoded? {
        return Ok(Outcome::Failed);
    }
    ctx.emit(Op::ForEach { src, item, body })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let Some((element, rank)) = multi_rank(&desc.shape) else {
        return Ok(Outcome::NotExecuted);
    };
    let int = TypeShape::primitive(PrimitiveKind::I32);

    let mut dims = Vec::with_capacity(rank);
    for dim in 0..rank {
        let len = ctx.declare_local(&format!("len{}", dim), &int)?;
        ctx.emit(Op::ReadCount { dst: len })?;
        dims.push(len);
    }
    ctx.emit(Op::NewCollection {
        dst,
        type_name: desc.shape.base_name(),
        init: InitKind::Array { dims: dims.clone() },
    })?;

    let mut indices = Vec::with_capacity(rank);
    for dim in 0..rank {
        indices.push(ctx.declare_local(&format!("i{}", dim), &int)?);
    }

    let chain = ctx.chain();
    ctx.begin_block()?;
    let (item, item_desc) = ctx.bind_local("item", element)?;
    let decoded = chain.decode(ctx, &item_desc, item);
    if matches!(decoded, Ok(true)) {
        ctx.emit(Op::StoreElement {
            array: dst,
            indices: indices.clone(),
            item,
        })?;
    }
    let mut body = ctx.end_block()?;
    if !decoded? {
        return Ok(Outcome::Failed);
    }

    for (count, index) in dims.into_iter().zip(indices).rev() {
        body = vec![Op::Repeat { count, index, body }];
    }
    for op in body {
        ctx.emit(op)?;
    }
    Ok(Outcome::Done)
}
