// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Member-by-member strategy: the fallback for object types.
//!
//! Encode walks the enumerated members (see [`crate::members`]) and runs the
//! chain on each. Decode reads every member into a local, then rebuilds the
//! object through [`crate::reconstruct`].
//!
//! An object body is generated in one of three places:
//!
//! - the pending root of the current top-level procedure,
//! - its own procedure (recursive types), reached through a call,
//! - inline, inside a non-top-level scope of the enclosing procedure.
//!
//! An ancestor that generates its own codec is not flattened: encode calls
//! its encode procedure on the same value, decode fills a partial base
//! instance through its decode-into procedure and merges it on
//! construction.

use super::Outcome;
use crate::context::{CodecContext, CodecScope, VisitedMember};
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{Direction, LocalId, Op, Place};
use crate::members::{self, MemberEntry};
use crate::reconstruct::{self, DecodedLocal};
use crate::shape::{ObjectKind, ObjectShape, TypeShape};
use std::sync::Arc;

/// Resolved object for `desc`, or an outcome to return right away.
fn object_of(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
) -> Result<Arc<ObjectShape>, Outcome> {
    if desc.shape.named_ref().is_none() {
        return Err(Outcome::NotExecuted);
    }
    ctx.object(&desc.shape).map_err(|e| {
        ctx.report(DiagnosticCode::UnsupportedShape, Some(&desc.name), e.to_string());
        Outcome::Failed
    })
}

/// Members without a readable getter are skipped in both directions.
fn skip_unreadable(ctx: &mut CodecContext<'_>, entry: &MemberEntry) -> bool {
    let member = &entry.member;
    if member.readable || member.attrs.custom.is_some() {
        return false;
    }
    ctx.report(
        DiagnosticCode::UnreadableMember,
        Some(&member.name),
        format!("'{}.{}' has no readable accessor and is skipped", entry.declaring_type, member.name),
    );
    true
}

fn member_descriptor(entry: &MemberEntry, parent: &ValueDescriptor) -> ValueDescriptor {
    if entry.member.is_static {
        ValueDescriptor::static_member(&entry.member, &entry.declaring_type)
    } else {
        ValueDescriptor::member(&entry.member, parent.child_owner())
    }
}

fn outcome(ok: bool) -> Outcome {
    if ok {
        Outcome::Done
    } else {
        Outcome::Failed
    }
}

// ---- encode ------------------------------------------------------------------

pub fn encode(ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<Outcome> {
    let object = match object_of(ctx, desc) {
        Ok(object) => object,
        Err(outcome) => return Ok(outcome),
    };
    if object.kind == ObjectKind::Interface {
        ctx.report(
            DiagnosticCode::UnsupportedShape,
            Some(&desc.name),
            format!("interface '{}' needs dynamic candidates to be encoded", object.name),
        );
        return Ok(Outcome::Failed);
    }

    let key = desc.shape.key();
    if ctx.take_root(&key) {
        return encode_body(ctx, &object, desc).map(outcome);
    }

    if ctx.needs_own_procedure(&desc.shape) {
        let proc = ctx.ensure_procedure(&desc.shape, Direction::Encode)?;
        let src = ctx.place_of(desc)?;
        ctx.emit(Op::CallEncode { proc, src })?;
        return Ok(Outcome::Done);
    }

    let value = ctx.place_of(desc)?;
    let proc = ctx.current()?.proc;
    ctx.push_scope(CodecScope::inline(key, proc, Direction::Encode, value));
    let result = encode_body(ctx, &object, desc);
    ctx.pop_scope();
    result.map(outcome)
}

fn encode_body(
    ctx: &mut CodecContext<'_>,
    object: &ObjectShape,
    desc: &ValueDescriptor,
) -> GenResult<bool> {
    crate::trace_fn!("member_by_member::encode_body");
    let registry = ctx.registry();
    let cache = ctx.cache();
    let chain = ctx.chain();

    if let Some((base_shape, _)) = members::delegated_base(registry, cache, object)? {
        let proc = ctx.ensure_procedure(&base_shape, Direction::Encode)?;
        let src = ctx.current()?.get_value().clone();
        ctx.emit(Op::CallEncode { proc, src })?;
    }

    let entries = cache.members(registry, object)?;
    for entry in entries.iter() {
        if skip_unreadable(ctx, entry) {
            continue;
        }
        let member = member_descriptor(entry, desc);
        let place = ctx.place_of(&member)?;
        if chain.encode(ctx, &member)? {
            ctx.current_mut()?.visit(VisitedMember {
                name: entry.member.name.clone(),
                place: Some(place),
                local: None,
            });
        }
    }
    Ok(true)
}

// ---- decode ------------------------------------------------------------------

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<Outcome> {
    let object = match object_of(ctx, desc) {
        Ok(object) => object,
        Err(outcome) => return Ok(outcome),
    };
    if object.kind.is_abstract() {
        ctx.report(
            DiagnosticCode::UnsupportedShape,
            Some(&desc.name),
            format!(
                "'{}' cannot be instantiated; declare dynamic candidates for it",
                object.name
            ),
        );
        return Ok(Outcome::Failed);
    }

    let key = desc.shape.key();
    if ctx.take_root(&key) {
        return decode_body(ctx, &object, desc, dst).map(outcome);
    }

    if ctx.needs_own_procedure(&desc.shape) {
        let proc = ctx.ensure_procedure(&desc.shape, Direction::Decode)?;
        ctx.emit(Op::CallDecode { proc, dst })?;
        return Ok(Outcome::Done);
    }

    let proc = ctx.current()?.proc;
    ctx.push_scope(CodecScope::inline(
        key,
        proc,
        Direction::Decode,
        Place::Local(dst),
    ));
    let result = decode_body(ctx, &object, desc, dst);
    ctx.pop_scope();
    result.map(outcome)
}

/// Read every member into a local; returns the candidates for
/// reconstruction (instance members that decoded successfully).
fn decode_members(
    ctx: &mut CodecContext<'_>,
    object: &ObjectShape,
    desc: &ValueDescriptor,
) -> GenResult<Vec<DecodedLocal>> {
    let registry = ctx.registry();
    let cache = ctx.cache();
    let chain = ctx.chain();

    let entries = cache.members(registry, object)?;
    let mut decoded = Vec::with_capacity(entries.len());
    for entry in entries.iter() {
        if skip_unreadable(ctx, entry) {
            continue;
        }
        let member = member_descriptor(entry, desc);
        let local = ctx.declare_local(&entry.member.name, &entry.member.shape)?;
        if !chain.decode(ctx, &member, local)? {
            continue;
        }
        ctx.current_mut()?.visit(VisitedMember {
            name: entry.member.name.clone(),
            place: None,
            local: Some(local),
        });
        if entry.member.is_static {
            log::debug!(
                "[member_by_member] static {}.{} read and discarded",
                entry.declaring_type,
                entry.member.name
            );
            continue;
        }
        decoded.push(DecodedLocal {
            name: entry.member.name.clone(),
            member: entry.member.name.clone(),
            local,
            writable: entry.member.writable,
        });
    }
    Ok(decoded)
}

/// Decode a delegated base into a partial instance, if there is one.
fn decode_base(ctx: &mut CodecContext<'_>, object: &ObjectShape) -> GenResult<Option<LocalId>> {
    let Some((base_shape, _)) = members::delegated_base(ctx.registry(), ctx.cache(), object)?
    else {
        return Ok(None);
    };
    let partial = ctx.declare_local("base", &base_shape)?;
    ctx.emit(Op::NewPartial {
        dst: partial,
        type_name: base_shape.base_name(),
    })?;
    let proc = ctx.ensure_procedure(&base_shape, Direction::DecodeInto)?;
    ctx.emit(Op::CallDecodeInto {
        proc,
        target: Place::Local(partial),
    })?;
    Ok(Some(partial))
}

fn decode_body(
    ctx: &mut CodecContext<'_>,
    object: &ObjectShape,
    desc: &ValueDescriptor,
    dst: LocalId,
) -> GenResult<bool> {
    crate::trace_fn!("member_by_member::decode_body");
    let base = decode_base(ctx, object)?;
    let decoded = decode_members(ctx, object, desc)?;
    let ranking = ctx.cache().constructor_ranking(object);

    match reconstruct::resolve(object, &ranking, &decoded) {
        Ok(plan) => {
            for skipped in &plan.skipped {
                log::debug!(
                    "[member_by_member] {}.{} is read-only and not set by the constructor",
                    object.name,
                    skipped
                );
            }
            ctx.emit(Op::Construct {
                dst,
                type_name: object.name.clone(),
                ctor: plan.ctor,
                assignments: plan.assignments,
                base,
            })?;
            Ok(true)
        }
        Err(e) => {
            let reason = e.to_string();
            ctx.report(DiagnosticCode::ReconstructionImpossible, None, reason.clone());
            ctx.fail_current(&reason)?;
            Ok(false)
        }
    }
}

/// Body of a decode-into procedure: members are decoded and assigned onto
/// the existing instance passed as the procedure input.
pub fn decode_into_root(ctx: &mut CodecContext<'_>, shape: &TypeShape) -> GenResult<bool> {
    let root = ValueDescriptor::root(shape.clone());
    let object = match object_of(ctx, &root) {
        Ok(object) => object,
        Err(_) => {
            ctx.report(
                DiagnosticCode::UnsupportedShape,
                None,
                format!("{} is not an object type", shape.type_name()),
            );
            return Ok(false);
        }
    };
    if object.kind == ObjectKind::Interface {
        ctx.report(
            DiagnosticCode::UnsupportedShape,
            None,
            format!("interface '{}' has no state to decode into", object.name),
        );
        return Ok(false);
    }
    ctx.take_root(&shape.key());

    if let Some((base_shape, _)) = members::delegated_base(ctx.registry(), ctx.cache(), &object)? {
        let proc = ctx.ensure_procedure(&base_shape, Direction::DecodeInto)?;
        ctx.emit(Op::CallDecodeInto {
            proc,
            target: Place::Input,
        })?;
    }

    for local in decode_members(ctx, &object, &root)? {
        if !local.writable {
            log::debug!(
                "[member_by_member] {}.{} is read-only; decode-into leaves it unchanged",
                object.name,
                local.member
            );
            continue;
        }
        ctx.emit(Op::AssignMember {
            target: Place::Input,
            member: local.member,
            value: local.local,
        })?;
    }
    Ok(true)
}
