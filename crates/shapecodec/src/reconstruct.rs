// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reconstruction: rebuild an object from its decoded members.
//!
//! Constructors are tried in precedence order (explicitly preferred first,
//! then by descending parameter count). The first constructor whose every
//! parameter matches exactly one not-yet-consumed decoded local wins; the
//! remaining locals are assigned to writable members and silently dropped
//! for read-only ones.

use crate::ir::{Assignment, CtorCall, LocalId};
use crate::shape::{ConstructorShape, ObjectShape};
use std::cmp::Reverse;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("'{type_name}' has no accessible constructor")]
    NoConstructors { type_name: String },

    #[error("no constructor of '{type_name}' matches the decoded members ({tried} tried)")]
    NoMatchingConstructor { type_name: String, tried: usize },

    #[error("'{type_name}' is abstract and cannot be constructed")]
    Abstract { type_name: String },
}

/// A decoded member waiting to be placed into the new object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLocal {
    /// Logical name used for parameter matching.
    pub name: String,
    /// Member the value belongs to.
    pub member: String,
    pub local: LocalId,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconstructionPlan {
    pub ctor: Option<CtorCall>,
    pub assignments: Vec<Assignment>,
    /// Read-only members not taken by the constructor.
    pub skipped: Vec<String>,
}

/// Remove a trailing `__N` uniqueness suffix.
pub fn strip_uniqueness_suffix(name: &str) -> &str {
    match name.rfind("__") {
        Some(pos)
            if pos > 0
                && pos + 2 < name.len()
                && name[pos + 2..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &name[..pos]
        }
        _ => name,
    }
}

/// Parameter/member name equivalence.
///
/// Names match when, after stripping uniqueness suffixes, they have the same
/// length, their first characters are equal ignoring case, and the remainders
/// are identical. `name` matches `Name`; `userName` does not match `username`.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = strip_uniqueness_suffix(a);
    let b = strip_uniqueness_suffix(b);
    if a.len() != b.len() {
        return false;
    }
    let mut ac = a.chars();
    let mut bc = b.chars();
    match (ac.next(), bc.next()) {
        (None, None) => true,
        (Some(x), Some(y)) => x.to_lowercase().eq(y.to_lowercase()) && ac.as_str() == bc.as_str(),
        _ => false,
    }
}

/// Constructor indices in precedence order: preferred first, then more
/// parameters first; declaration order breaks ties.
pub fn rank_constructors(ctors: &[ConstructorShape]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ctors.len()).collect();
    order.sort_by_key(|&i| (Reverse(ctors[i].preferred), Reverse(ctors[i].params.len())));
    order
}

/// Choose a constructor for `decoded` and plan the remaining assignments.
pub fn resolve(
    object: &ObjectShape,
    ranking: &[usize],
    decoded: &[DecodedLocal],
) -> Result<ReconstructionPlan, ReconstructError> {
    if object.kind.is_abstract() {
        return Err(ReconstructError::Abstract {
            type_name: object.name.clone(),
        });
    }
    if object.constructors.is_empty() {
        return Err(ReconstructError::NoConstructors {
            type_name: object.name.clone(),
        });
    }

    for &index in ranking {
        let Some(ctor) = object.constructors.get(index) else {
            continue;
        };
        if let Some((call, used)) = try_constructor(index, ctor, decoded) {
            log::debug!(
                "[reconstruct] {} via constructor #{} ({} args)",
                object.name,
                index,
                call.args.len()
            );
            let mut plan = ReconstructionPlan {
                ctor: Some(call),
                ..Default::default()
            };
            for (local, taken) in decoded.iter().zip(used) {
                if taken {
                    continue;
                }
                if local.writable {
                    plan.assignments.push(Assignment {
                        member: local.member.clone(),
                        value: local.local,
                    });
                } else {
                    plan.skipped.push(local.member.clone());
                }
            }
            return Ok(plan);
        }
    }

    Err(ReconstructError::NoMatchingConstructor {
        type_name: object.name.clone(),
        tried: ranking.len(),
    })
}

fn try_constructor(
    index: usize,
    ctor: &ConstructorShape,
    decoded: &[DecodedLocal],
) -> Option<(CtorCall, Vec<bool>)> {
    let mut used = vec![false; decoded.len()];
    let mut args = Vec::with_capacity(ctor.params.len());
    for param in &ctor.params {
        let mut matches = decoded
            .iter()
            .enumerate()
            .filter(|(i, d)| !used[*i] && names_match(param.match_name(), &d.name));
        let (slot, local) = match (matches.next(), matches.next()) {
            (Some(hit), None) => hit,
            _ => return None,
        };
        used[slot] = true;
        args.push((local.member.clone(), local.local));
    }
    Some((CtorCall { index, args }, used))
}
