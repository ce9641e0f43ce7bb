// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Enum strategy: enums travel as their underlying integer.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::shape::ShapeKind;

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let ShapeKind::Enum(shape) = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::WriteEnum {
        type_name: shape.name.clone(),
        underlying: shape.underlying,
        src,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let ShapeKind::Enum(shape) = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::ReadEnum {
        type_name: shape.name.clone(),
        underlying: shape.underlying,
        dst,
    })?;
    Ok(Outcome::Done)
}
