// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Known-type strategy: fixed encodings for Guid, IpAddress, BigInteger,
//! DateTime and TimeSpan (see [`crate::shape::KnownKind`]).

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::shape::ShapeKind;

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let ShapeKind::Known { known } = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::WriteKnown { kind: *known, src })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let ShapeKind::Known { known } = &desc.shape.kind else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::ReadKnown { kind: *known, dst })?;
    Ok(Outcome::Done)
}
