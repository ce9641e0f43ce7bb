// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Primitive strategy: bool, fixed-width integers, floats and strings map
//! directly to stream operations.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::shape::ShapeKind;

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let ShapeKind::Primitive { primitive } = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::WritePrimitive {
        kind: *primitive,
        src,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let ShapeKind::Primitive { primitive } = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::ReadPrimitive {
        kind: *primitive,
        dst,
    })?;
    Ok(Outcome::Done)
}
