// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! User-conversion strategy.
//!
//! A member annotated with a converter is encoded as the converter's output.
//! Encode converts into a local and restarts the chain on it. Decode restarts
//! the chain on a wire-typed temporary and converts back in a finalizer.
//!
//! A converted member that is also version-gated is converted inside the
//! gate: conversion waits until the versioned strategy has run.

use super::{Outcome, Rewrite, StrategyFlags};
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::{GenResult, GenerationError};
use crate::ir::{ConvertDirection, LocalId, Op, Place};
use crate::shape::{Conversion, MemberAttributes, TypeShape};

/// Wire shape for `desc`, or `None` after reporting a bad annotation.
fn target_shape(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    conversion: &Conversion,
) -> GenResult<Option<TypeShape>> {
    if let Some(source) = &conversion.source {
        if source.non_null() != desc.shape.non_null() {
            return Err(GenerationError::Fatal(format!(
                "converter '{}' expects {} but member '{}' is {}",
                conversion.converter,
                source.type_name(),
                desc.name,
                desc.shape.type_name()
            )));
        }
    }
    match conversion.select_target() {
        Ok(target) => Ok(Some(target.clone())),
        Err(reason) => {
            ctx.report(DiagnosticCode::InvalidAnnotation, Some(&desc.name), reason);
            Ok(None)
        }
    }
}

fn pending(desc: &ValueDescriptor, mask: StrategyFlags) -> Option<Conversion> {
    if desc.attrs.version.is_some() && mask.contains(StrategyFlags::VERSIONED) {
        return None;
    }
    desc.attrs.convert.clone()
}

/// Annotations that still apply to the converted value.
fn remaining_attrs(desc: &ValueDescriptor) -> MemberAttributes {
    MemberAttributes {
        convert: None,
        custom: None,
        ..(*desc.attrs).clone()
    }
}

pub fn encode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    let Some(conversion) = pending(desc, mask) else {
        return Ok(Outcome::NotExecuted);
    };
    let Some(target) = target_shape(ctx, desc, &conversion)? else {
        return Ok(Outcome::Failed);
    };

    let src = ctx.place_of(desc)?;
    let (wire, _) = ctx.bind_local(&format!("{}_wire", desc.name), target.clone())?;
    let wire_name = ctx.local_name(wire)?;
    ctx.emit(Op::Convert {
        converter: conversion.converter,
        direction: ConvertDirection::ToWire,
        src,
        dst: wire,
    })?;

    let descriptor = desc
        .rebind(&wire_name, target)
        .with_attrs(remaining_attrs(desc));
    Ok(Outcome::Retry(Rewrite {
        descriptor,
        target: None,
        finalizer: None,
    }))
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    let Some(conversion) = pending(desc, mask) else {
        return Ok(Outcome::NotExecuted);
    };
    let Some(target) = target_shape(ctx, desc, &conversion)? else {
        return Ok(Outcome::Failed);
    };

    let wire = ctx.declare_local(&format!("{}_wire", desc.name), &target)?;
    let wire_name = ctx.local_name(wire)?;
    let finalizer = Op::Convert {
        converter: conversion.converter,
        direction: ConvertDirection::FromWire,
        src: Place::Local(wire),
        dst,
    };

    let descriptor = desc
        .rebind(&wire_name, target)
        .with_attrs(remaining_attrs(desc));
    Ok(Outcome::Retry(Rewrite {
        descriptor,
        target: Some(wire),
        finalizer: Some(finalizer),
    }))
}
