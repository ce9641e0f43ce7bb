// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blittable strategy: unmanaged structs are copied as their raw
//! little-endian layout (see [`crate::layout`]).

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::layout::BlitLayout;
use std::sync::Arc;

fn layout_of(ctx: &CodecContext<'_>, desc: &ValueDescriptor) -> Option<Arc<BlitLayout>> {
    desc.shape.named_ref()?;
    let object = ctx.object(&desc.shape).ok()?;
    if !object.unmanaged {
        return None;
    }
    match ctx.cache().layout(ctx.registry(), &object) {
        Ok(layout) => Some(layout),
        Err(reason) => {
            log::debug!("[blittable] {} not blittable: {}", object.name, reason);
            None
        }
    }
}

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let Some(layout) = layout_of(ctx, desc) else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::WriteBlittable { layout, src })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let Some(layout) = layout_of(ctx, desc) else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::ReadBlittable { layout, dst })?;
    Ok(Outcome::Done)
}
