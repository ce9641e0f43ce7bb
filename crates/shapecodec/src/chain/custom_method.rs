// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Custom-method strategy: user-written encode/decode methods.
//!
//! Methods come from the member annotation first, then from the value's
//! type (non-null occurrences only). They must come in pairs so both
//! directions agree on the wire form, and their stream parameter must accept
//! the configured stream type.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use crate::shape::CustomMethods;

struct Methods {
    type_name: String,
    serialize: String,
    deserialize: String,
}

fn lookup(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> Option<Methods> {
    let (type_name, custom): (String, CustomMethods) = match &desc.attrs.custom {
        Some(custom) => (desc.shape.base_name(), custom.clone()),
        None => {
            if desc.shape.is_nullable() {
                return None;
            }
            desc.shape.named_ref()?;
            let object = ctx.object(&desc.shape).ok()?;
            (object.name.clone(), object.custom.clone()?)
        }
    };

    let generator = &ctx.config().generator;
    if !custom
        .stream
        .accepts(&generator.stream_type, &generator.stream_capability)
    {
        log::debug!(
            "[custom_method] {} methods take {:?}, not {}",
            type_name,
            custom.stream,
            generator.stream_type
        );
        return None;
    }

    match (custom.serialize, custom.deserialize) {
        (Some(serialize), Some(deserialize)) => Some(Methods {
            type_name,
            serialize,
            deserialize,
        }),
        (None, None) => None,
        _ => {
            ctx.report(
                DiagnosticCode::InvalidAnnotation,
                Some(&desc.name),
                format!(
                    "custom methods of '{}' must provide both serialize and deserialize",
                    type_name
                ),
            );
            None
        }
    }
}

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let Some(methods) = lookup(ctx, desc) else {
        return Ok(Outcome::NotExecuted);
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::CustomEncode {
        type_name: methods.type_name,
        method: methods.serialize,
        src,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let Some(methods) = lookup(ctx, desc) else {
        return Ok(Outcome::NotExecuted);
    };
    ctx.emit(Op::CustomDecode {
        type_name: methods.type_name,
        method: methods.deserialize,
        dst,
    })?;
    Ok(Outcome::Done)
}
