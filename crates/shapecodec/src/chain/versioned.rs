// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Versioned strategy: a member guarded by a predicate over earlier members.
//!
//! The predicate receives the values of the named sibling members. Those
//! must already be handled in the current object scope, so encode and decode
//! evaluate the predicate on the same data. When the predicate is false on
//! decode, the member takes its default provider's value (or stays unset).

use super::{Outcome, StrategyFlags};
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{Direction, LocalId, Op, Place};
use crate::shape::VersionGate;

enum Gate {
    Absent,
    Invalid,
    Ready(VersionGate, Vec<Place>),
}

fn resolve_gate(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    direction: Direction,
) -> GenResult<Gate> {
    let Some(gate) = desc.attrs.version.clone() else {
        return Ok(Gate::Absent);
    };

    let mut args = Vec::with_capacity(gate.variables.len());
    let mut missing = None;
    {
        let scope = ctx.current()?;
        for variable in &gate.variables {
            let found = scope.visited(variable).and_then(|v| match direction {
                Direction::Encode => v.place.clone(),
                Direction::Decode | Direction::DecodeInto => v.local.map(Place::Local),
            });
            match found {
                Some(place) => args.push(place),
                None => {
                    missing = Some(variable.clone());
                    break;
                }
            }
        }
    }

    if let Some(variable) = missing {
        ctx.report(
            DiagnosticCode::InvalidAnnotation,
            Some(&desc.name),
            format!(
                "version variable '{}' of predicate '{}' is not a member handled before '{}'",
                variable, gate.predicate, desc.name
            ),
        );
        return Ok(Gate::Invalid);
    }
    Ok(Gate::Ready(gate, args))
}

pub fn encode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    let (gate, args) = match resolve_gate(ctx, desc, Direction::Encode)? {
        Gate::Absent => return Ok(Outcome::NotExecuted),
        Gate::Invalid => return Ok(Outcome::Failed),
        Gate::Ready(gate, args) => (gate, args),
    };

    let chain = ctx.chain();
    ctx.begin_block()?;
    let encoded = chain.encode_masked(ctx, desc, mask - StrategyFlags::VERSIONED);
    let then = ctx.end_block()?;
    if !encoded? {
        return Ok(Outcome::Failed);
    }

    ctx.emit(Op::Gate {
        predicate: gate.predicate,
        args,
        then,
        otherwise: Vec::new(),
        result: None,
    })?;
    Ok(Outcome::Done)
}

pub fn decode(
    ctx: &mut CodecContext<'_>,
    desc: &ValueDescriptor,
    dst: LocalId,
    mask: StrategyFlags,
) -> GenResult<Outcome> {
    let (gate, args) = match resolve_gate(ctx, desc, Direction::Decode)? {
        Gate::Absent => return Ok(Outcome::NotExecuted),
        Gate::Invalid => return Ok(Outcome::Failed),
        Gate::Ready(gate, args) => (gate, args),
    };

    let chain = ctx.chain();
    ctx.begin_block()?;
    let decoded = chain.decode_masked(ctx, desc, dst, mask - StrategyFlags::VERSIONED);
    let then = ctx.end_block()?;
    if !decoded? {
        return Ok(Outcome::Failed);
    }

    let otherwise = gate
        .default
        .map(|provider| vec![Op::SetDefault { dst, provider }])
        .unwrap_or_default();
    ctx.emit(Op::Gate {
        predicate: gate.predicate,
        args,
        then,
        otherwise,
        result: Some(dst),
    })?;
    Ok(Outcome::Done)
}
