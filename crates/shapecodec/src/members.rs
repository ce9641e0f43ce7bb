// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Member enumeration: which members of a type are encoded, and in what order.
//!
//! Members are collected base-first along the inheritance chain, stopping at
//! the first ancestor that generates its own codec (that ancestor is encoded
//! by delegation instead, see [`delegated_base`]). Each member is tagged with
//! its inheritance depth (derived type = 0) and the list is stably sorted by
//! `(explicit order or last, base before derived)`.

use crate::cache::ShapeCache;
use crate::error::ShapeError;
use crate::shape::{MemberShape, ObjectShape, ShapeRegistry, TypeShape};
use std::cmp::Reverse;
use std::sync::Arc;

/// Guard against inheritance cycles in hand-written schemas.
const MAX_INHERITANCE_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberEntry {
    pub member: MemberShape,
    /// Type that declares the member.
    pub declaring_type: String,
    /// Inheritance distance from the enumerated type.
    pub depth: usize,
}

/// Inclusion rule: not ignored, and either public readable instance state or
/// explicitly included.
pub fn is_included(member: &MemberShape) -> bool {
    !member.attrs.ignore
        && ((member.public && member.readable && !member.is_static) || member.attrs.include)
}

/// Ancestors whose members are flattened into `object`, nearest first.
fn flattened_ancestors(
    registry: &ShapeRegistry,
    cache: &ShapeCache,
    object: &ObjectShape,
) -> Result<(Vec<Arc<ObjectShape>>, Option<DelegatedBase>), ShapeError> {
    let mut ancestors = Vec::new();
    let mut next: Option<TypeShape> = object.base.clone();
    while let Some(base_shape) = next {
        if ancestors.len() >= MAX_INHERITANCE_DEPTH {
            return Err(ShapeError::Invalid {
                shape: object.name.clone(),
                reason: "inheritance chain too deep or cyclic".into(),
            });
        }
        let base = cache.object(registry, &base_shape)?;
        if base.generates_codec {
            return Ok((ancestors, Some((base_shape, base))));
        }
        next = base.base.clone();
        ancestors.push(base);
    }
    Ok((ancestors, None))
}

/// Base occurrence shape and its resolved object.
pub type DelegatedBase = (TypeShape, Arc<ObjectShape>);

/// First ancestor that generates its own codec, if any.
pub fn delegated_base(
    registry: &ShapeRegistry,
    cache: &ShapeCache,
    object: &ObjectShape,
) -> Result<Option<DelegatedBase>, ShapeError> {
    flattened_ancestors(registry, cache, object).map(|(_, delegated)| delegated)
}

/// Ordered encodable members of `object`.
pub fn enumerate(
    registry: &ShapeRegistry,
    cache: &ShapeCache,
    object: &ObjectShape,
) -> Result<Vec<MemberEntry>, ShapeError> {
    crate::trace_fn!("members::enumerate");
    let (ancestors, _) = flattened_ancestors(registry, cache, object)?;

    let mut entries = Vec::new();
    for (depth, level) in ancestors.iter().enumerate().rev() {
        push_level(&mut entries, level, depth + 1);
    }
    push_level(&mut entries, object, 0);

    entries.sort_by_key(|e| {
        (
            e.member.attrs.order.map_or(i64::MAX, i64::from),
            Reverse(e.depth),
        )
    });
    Ok(entries)
}

fn push_level(entries: &mut Vec<MemberEntry>, level: &ObjectShape, depth: usize) {
    entries.extend(
        level
            .members
            .iter()
            .filter(|m| is_included(m))
            .map(|m| MemberEntry {
                member: m.clone(),
                declaring_type: level.name.clone(),
                depth,
            }),
    );
}
