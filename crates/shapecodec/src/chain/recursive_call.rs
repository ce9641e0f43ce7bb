// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive-call strategy: an object type that already has a registered
//! procedure is encoded by calling it.
//!
//! Registration happens before a body is generated, so this is also what
//! terminates self-referencing types.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{Direction, LocalId, Op};

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    if desc.shape.named_ref().is_none() {
        return Ok(Outcome::NotExecuted);
    }
    let Some(proc) = ctx.resolve_procedure(&desc.shape.key(), Direction::Encode) else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::CallEncode { proc, src })?;
    Ok(Outcome::Done)
}

/// Nested values are always decoded into a fresh instance.
pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    if desc.shape.named_ref().is_none() {
        return Ok(Outcome::NotExecuted);
    }
    let Some(proc) = ctx.resolve_procedure(&desc.shape.key(), Direction::Decode) else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::CallDecode { proc, dst })?;
    Ok(Outcome::Done)
}
