// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic strategy: polymorphic values with a known candidate list.
//!
//! Wire form: `i32` discriminant (candidate position + 1), then the value
//! encoded by that candidate's procedure. Discriminant `0` selects the
//! resolver: its identifier is written next, and the resolver maps it back
//! to a codec on decode. Every candidate gets its own procedure so the
//! cases can call it.

use super::Outcome;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{Direction, DynamicCase, LocalId, Op, ResolverCall};
use crate::shape::{DynamicTypes, ResolverShape, TypeShape};

/// Annotation on the member, else on the value's type.
fn annotation(ctx: &CodecContext<'_>, desc: &ValueDescriptor) -> Option<(DynamicTypes, bool)> {
    if let Some(dynamic) = &desc.attrs.dynamic {
        return Some((dynamic.clone(), false));
    }
    desc.shape.named_ref()?;
    let object = ctx.object(&desc.shape).ok()?;
    object.dynamic.clone().map(|d| (d, true))
}

fn check_resolver(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    resolver: &ResolverShape,
) -> bool {
    let problem = if !resolver.singleton {
        Some("does not expose a singleton instance".to_string())
    } else if !resolver.unresolved_params.is_empty() {
        Some(format!(
            "leaves type parameters unresolved: {}",
            resolver.unresolved_params.join(", ")
        ))
    } else {
        None
    };
    match problem {
        Some(problem) => {
            ctx.report(
                DiagnosticCode::InvalidAnnotation,
                Some(&desc.name),
                format!("resolver '{}' {}", resolver.name, problem),
            );
            false
        }
        None => true,
    }
}

/// Candidate procedures, or `None` after reporting an unusable candidate.
fn candidate_cases(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dynamic: &DynamicTypes,
    type_level: bool,
    direction: Direction,
) -> GenResult<Option<Vec<DynamicCase>>> {
    let declared = desc.shape.base_name();
    let mut cases = Vec::with_capacity(dynamic.candidates.len());
    for (position, candidate) in dynamic.candidates.iter().enumerate() {
        let shape = TypeShape::named(candidate);
        let problem = match ctx.object(&shape) {
            Err(e) => Some(e.to_string()),
            Ok(_) if type_level && *candidate == declared => {
                Some("a type cannot list itself as a dynamic candidate".to_string())
            }
            Ok(_) => None,
        };
        if let Some(problem) = problem {
            ctx.report(
                DiagnosticCode::InvalidAnnotation,
                Some(&desc.name),
                format!("dynamic candidate '{}': {}", candidate, problem),
            );
            return Ok(None);
        }
        let proc = ctx.ensure_procedure(&shape, direction)?;
        cases.push(DynamicCase {
            discriminant: position as i32 + 1,
            type_name: candidate.clone(),
            subtypes: ctx.registry().subtypes_of(candidate),
            proc,
        });
    }
    Ok(Some(cases))
}

/// Identifier local plus the ops that encode or decode it.
fn resolver_call(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    resolver: &ResolverShape,
    direction: Direction,
) -> GenResult<Option<ResolverCall>> {
    let chain = ctx.chain();
    ctx.begin_block()?;
    let (identifier, id_desc) =
        ctx.bind_local(&format!("{}_id", desc.name), resolver.identifier.clone())?;
    let handled = match direction {
        Direction::Encode => chain.encode(ctx, &id_desc),
        Direction::Decode | Direction::DecodeInto => chain.decode(ctx, &id_desc, identifier),
    };
    let body = ctx.end_block()?;
    if !handled? {
        return Ok(None);
    }
    Ok(Some(ResolverCall {
        name: resolver.name.clone(),
        identifier,
        body,
    }))
}

enum Plan {
    Decline,
    Failed,
    Ready(Vec<DynamicCase>, Option<ResolverCall>),
}

fn plan(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    direction: Direction,
) -> GenResult<Plan> {
    let Some((dynamic, type_level)) = annotation(ctx, desc) else {
        return Ok(Plan::Decline);
    };
    if dynamic.candidates.is_empty() && dynamic.resolver.is_none() {
        return Ok(Plan::Decline);
    }
    if let Some(resolver) = &dynamic.resolver {
        if !check_resolver(ctx, desc, resolver) {
            return Ok(Plan::Failed);
        }
    }
    let Some(cases) = candidate_cases(ctx, desc, &dynamic, type_level, direction)? else {
        return Ok(Plan::Failed);
    };
    let resolver = match &dynamic.resolver {
        Some(resolver) => match resolver_call(ctx, desc, resolver, direction)? {
            Some(call) => Some(call),
            None => return Ok(Plan::Failed),
        },
        None => None,
    };
    Ok(Plan::Ready(cases, resolver))
}

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let (cases, resolver) = match plan(ctx, desc, Direction::Encode)? {
        Plan::Decline => return Ok(Outcome::NotExecuted),
        Plan::Failed => return Ok(Outcome::Failed),
        Plan::Ready(cases, resolver) => (cases, resolver),
    };
    let src = ctx.place_of(desc)?;
    ctx.emit(Op::DynamicEncode {
        type_name: desc.shape.base_name(),
        src,
        cases,
        resolver,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let (cases, resolver) = match plan(ctx, desc, Direction::Decode)? {
        Plan::Decline => return Ok(Outcome::NotExecuted),
        Plan::Failed => return Ok(Outcome::Failed),
        Plan::Ready(cases, resolver) => (cases, resolver),
    };
    ctx.emit(Op::DynamicDecode {
        type_name: desc.shape.base_name(),
        dst,
        cases,
        resolver,
    })?;
    Ok(Outcome::Done)
}
