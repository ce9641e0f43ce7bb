// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Strategy chain: ordered selection of how a value is encoded.
//!
//! Every value descriptor is offered to the strategies in fixed priority
//! order. The first one that accepts it emits ops and answers
//! [`Outcome::Done`]. A strategy may also rewrite the descriptor and ask for
//! a restart ([`Outcome::Retry`]); the chain then clears that strategy's bit
//! so it cannot fire twice on the same logical value, and remembers any
//! finalizer op the rewrite produced. Finalizers run in reverse order once
//! the chain completes. A strategy that accepts a value but cannot finish it
//! records a diagnostic and answers [`Outcome::Failed`], which stops the
//! chain without trying later strategies.
//!
//! | # | Strategy | Accepts |
//! |---|----------|---------|
//! | 1 | user conversion | member annotated with a converter |
//! | 2 | versioned | member annotated with a version predicate |
//! | 3 | custom method | type or member with matching custom methods |
//! | 4 | nullable | nullable shapes |
//! | 5 | recursive call | types with a registered procedure |
//! | 6 | primitive | bool, integers, floats, string |
//! | 7 | enum | enums (as underlying integer) |
//! | 8 | blittable | unmanaged structs (raw copy) |
//! | 9 | known | Guid, IpAddress, BigInteger, DateTime, TimeSpan |
//! | 10 | dynamic | polymorphic members with candidates or resolver |
//! | 11 | multi-rank array | arrays with rank >= 2 |
//! | 12 | collection | rank-1 arrays, collections, dictionaries |
//! | 13 | member by member | any remaining object type |

pub mod blittable;
pub mod collection;
pub mod conversion;
pub mod custom_method;
pub mod dynamic;
pub mod enumeration;
pub mod known;
pub mod member_by_member;
pub mod multi_rank;
pub mod nullable;
pub mod primitive;
pub mod recursive_call;
pub mod versioned;

use crate::config::CodegenConfig;
use crate::context::CodecContext;
use crate::descriptor::ValueDescriptor;
use crate::diagnostics::DiagnosticCode;
use crate::error::GenResult;
use crate::ir::{LocalId, Op};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    UserConversion,
    Versioned,
    CustomMethod,
    Nullable,
    RecursiveCall,
    Primitive,
    Enum,
    Blittable,
    Known,
    Dynamic,
    MultiRankArray,
    Collection,
    MemberByMember,
}

impl StrategyKind {
    /// All strategies in priority order.
    pub const ALL: [StrategyKind; 13] = [
        StrategyKind::UserConversion,
        StrategyKind::Versioned,
        StrategyKind::CustomMethod,
        StrategyKind::Nullable,
        StrategyKind::RecursiveCall,
        StrategyKind::Primitive,
        StrategyKind::Enum,
        StrategyKind::Blittable,
        StrategyKind::Known,
        StrategyKind::Dynamic,
        StrategyKind::MultiRankArray,
        StrategyKind::Collection,
        StrategyKind::MemberByMember,
    ];

    /// 1-based priority; lower runs first.
    pub fn priority(self) -> u8 {
        match self {
            StrategyKind::UserConversion => 1,
            StrategyKind::Versioned => 2,
            StrategyKind::CustomMethod => 3,
            StrategyKind::Nullable => 4,
            StrategyKind::RecursiveCall => 5,
            StrategyKind::Primitive => 6,
            StrategyKind::Enum => 7,
            StrategyKind::Blittable => 8,
            StrategyKind::Known => 9,
            StrategyKind::Dynamic => 10,
            StrategyKind::MultiRankArray => 11,
            StrategyKind::Collection => 12,
            StrategyKind::MemberByMember => 13,
        }
    }

    pub fn flag(self) -> StrategyFlags {
        StrategyFlags::from_bits_truncate(1 << (self.priority() - 1))
    }

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::UserConversion => "user_conversion",
            StrategyKind::Versioned => "versioned",
            StrategyKind::CustomMethod => "custom_method",
            StrategyKind::Nullable => "nullable",
            StrategyKind::RecursiveCall => "recursive_call",
            StrategyKind::Primitive => "primitive",
            StrategyKind::Enum => "enum",
            StrategyKind::Blittable => "blittable",
            StrategyKind::Known => "known",
            StrategyKind::Dynamic => "dynamic",
            StrategyKind::MultiRankArray => "multi_rank_array",
            StrategyKind::Collection => "collection",
            StrategyKind::MemberByMember => "member_by_member",
        }
    }

    fn try_encode(
        self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        mask: StrategyFlags,
    ) -> GenResult<Outcome> {
        match self {
            StrategyKind::UserConversion => conversion::encode(ctx, desc, mask),
            StrategyKind::Versioned => versioned::encode(ctx, desc, mask),
            StrategyKind::CustomMethod => custom_method::encode(ctx, desc),
            StrategyKind::Nullable => nullable::encode(ctx, desc, mask),
            StrategyKind::RecursiveCall => recursive_call::encode(ctx, desc),
            StrategyKind::Primitive => primitive::encode(ctx, desc),
            StrategyKind::Enum => enumeration::encode(ctx, desc),
            StrategyKind::Blittable => blittable::encode(ctx, desc),
            StrategyKind::Known => known::encode(ctx, desc),
            StrategyKind::Dynamic => dynamic::encode(ctx, desc),
            StrategyKind::MultiRankArray => multi_rank::encode(ctx, desc),
            StrategyKind::Collection => collection::encode(ctx, desc),
            StrategyKind::MemberByMember => member_by_member::encode(ctx, desc),
        }
    }

    fn try_decode(
        self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        dst: LocalId,
        mask: StrategyFlags,
    ) -> GenResult<Outcome> {
        match self {
            StrategyKind::UserConversion => conversion::decode(ctx, desc, dst, mask),
            StrategyKind::Versioned => versioned::decode(ctx, desc, dst, mask),
            StrategyKind::CustomMethod => custom_method::decode(ctx, desc, dst),
            StrategyKind::Nullable => nullable::decode(ctx, desc, dst, mask),
            StrategyKind::RecursiveCall => recursive_call::decode(ctx, desc, dst),
            StrategyKind::Primitive => primitive::decode(ctx, desc, dst),
            StrategyKind::Enum => enumeration::decode(ctx, desc, dst),
            StrategyKind::Blittable => blittable::decode(ctx, desc, dst),
            StrategyKind::Known => known::decode(ctx, desc, dst),
            StrategyKind::Dynamic => dynamic::decode(ctx, desc, dst),
            StrategyKind::MultiRankArray => multi_rank::decode(ctx, desc, dst),
            StrategyKind::Collection => collection::decode(ctx, desc, dst),
            StrategyKind::MemberByMember => member_by_member::decode(ctx, desc, dst),
        }
    }
}

bitflags! {
    /// Set of strategies still allowed for one logical value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StrategyFlags: u16 {
        const USER_CONVERSION = 1 << 0;
        const VERSIONED = 1 << 1;
        const CUSTOM_METHOD = 1 << 2;
        const NULLABLE = 1 << 3;
        const RECURSIVE_CALL = 1 << 4;
        const PRIMITIVE = 1 << 5;
        const ENUM = 1 << 6;
        const BLITTABLE = 1 << 7;
        const KNOWN = 1 << 8;
        const DYNAMIC = 1 << 9;
        const MULTI_RANK_ARRAY = 1 << 10;
        const COLLECTION = 1 << 11;
        const MEMBER_BY_MEMBER = 1 << 12;
    }
}

/// Descriptor rewrite requested by a strategy.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub descriptor: ValueDescriptor,
    /// New decode destination.
    pub target: Option<LocalId>,
    /// Op emitted after the chain completes.
    pub finalizer: Option<Op>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    NotExecuted,
    Done,
    Retry(Rewrite),
    /// Accepted the value but could not encode it; a diagnostic was recorded.
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Goal {
    Encode,
    Decode(LocalId),
}

#[derive(Debug, Clone)]
pub struct StrategyChain {
    order: Vec<StrategyKind>,
    enabled: StrategyFlags,
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new(&CodegenConfig::default())
    }
}

impl StrategyChain {
    pub fn new(config: &CodegenConfig) -> Self {
        let mut order: Vec<StrategyKind> = StrategyKind::ALL
            .into_iter()
            .filter(|k| config.is_enabled(*k))
            .collect();
        order.sort_by_key(|k| k.priority());
        let enabled = order
            .iter()
            .fold(StrategyFlags::empty(), |acc, k| acc | k.flag());
        Self { order, enabled }
    }

    /// Strategies enabled by configuration.
    pub fn enabled(&self) -> StrategyFlags {
        self.enabled
    }

    pub fn order(&self) -> &[StrategyKind] {
        &self.order
    }

    pub fn encode(&self, ctx: &mut CodecContext<'_>, desc: &ValueDescriptor) -> GenResult<bool> {
        self.encode_masked(ctx, desc, self.enabled)
    }

    pub fn decode(
        &self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        dst: LocalId,
    ) -> GenResult<bool> {
        self.decode_masked(ctx, desc, dst, self.enabled)
    }

    /// Encode with only the strategies in `mask`.
    pub fn encode_masked(
        &self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        mask: StrategyFlags,
    ) -> GenResult<bool> {
        self.run_guarded(ctx, desc, Goal::Encode, mask)
    }

    /// Decode into `dst` with only the strategies in `mask`.
    pub fn decode_masked(
        &self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        dst: LocalId,
        mask: StrategyFlags,
    ) -> GenResult<bool> {
        self.run_guarded(ctx, desc, Goal::Decode(dst), mask)
    }

    fn run_guarded(
        &self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        goal: Goal,
        mask: StrategyFlags,
    ) -> GenResult<bool> {
        if !ctx.enter() {
            ctx.report(
                DiagnosticCode::RecursionLimit,
                Some(&desc.name),
                format!(
                    "nesting exceeds {} levels at {}",
                    ctx.config().generator.max_depth,
                    desc.shape.type_name()
                ),
            );
            return Ok(false);
        }
        let result = self.run(ctx, desc, goal, mask);
        ctx.exit();
        result
    }

    fn run(
        &self,
        ctx: &mut CodecContext<'_>,
        desc: &ValueDescriptor,
        mut goal: Goal,
        mut mask: StrategyFlags,
    ) -> GenResult<bool> {
        let reported_before = ctx.diagnostic_count();
        let mut current = desc.clone();
        let mut finalizers: Vec<Op> = Vec::new();

        'restart: loop {
            for &kind in &self.order {
                if !mask.contains(kind.flag()) {
                    continue;
                }
                let outcome = match goal {
                    Goal::Encode => kind.try_encode(ctx, &current, mask)?,
                    Goal::Decode(dst) => kind.try_decode(ctx, &current, dst, mask)?,
                };
                match outcome {
                    Outcome::NotExecuted => continue,
                    Outcome::Failed => return Ok(false),
                    Outcome::Done => {
                        log::debug!(
                            "[chain] {} -> {} ({})",
                            current.name,
                            kind.name(),
                            current.shape.type_name()
                        );
                        for op in finalizers.into_iter().rev() {
                            ctx.emit(op)?;
                        }
                        return Ok(true);
                    }
                    Outcome::Retry(rewrite) => {
                        log::debug!(
                            "[chain] {} rewritten by {} to {}",
                            current.name,
                            kind.name(),
                            rewrite.descriptor.shape.type_name()
                        );
                        mask.remove(kind.flag());
                        current = rewrite.descriptor;
                        if let Some(target) = rewrite.target {
                            goal = Goal::Decode(target);
                        }
                        if let Some(op) = rewrite.finalizer {
                            finalizers.push(op);
                        }
                        continue 'restart;
                    }
                }
            }
            break;
        }

        if ctx.diagnostic_count() == reported_before {
            ctx.report(
                DiagnosticCode::UnsupportedShape,
                Some(&desc.name),
                format!("no strategy can encode {}", current.shape.type_name()),
            );
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_are_strictly_increasing() {
        let priorities: Vec<u8> = StrategyKind::ALL.iter().map(|k| k.priority()).collect();
        assert_eq!(priorities, (1..=13).collect::<Vec<u8>>());
    }

    #[test]
    fn test_flags_match_priorities() {
        assert_eq!(StrategyKind::UserConversion.flag(), StrategyFlags::USER_CONVERSION);
        assert_eq!(StrategyKind::Known.flag(), StrategyFlags::KNOWN);
        assert_eq!(StrategyKind::MemberByMember.flag(), StrategyFlags::MEMBER_BY_MEMBER);
    }

    #[test]
    fn test_disabled_strategies_are_skipped() {
        let mut config = CodegenConfig::default();
        config.generator.disabled_strategies = vec![StrategyKind::Blittable];
        let chain = StrategyChain::new(&config);
        assert_eq!(chain.order().len(), 12);
        assert!(!chain.enabled().contains(StrategyFlags::BLITTABLE));
        assert!(chain.enabled().contains(StrategyFlags::COLLECTION));
    }
}
