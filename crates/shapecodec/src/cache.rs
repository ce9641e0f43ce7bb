// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent cache of per-type analysis results.
//!
//! Member enumeration, constructor ranking, blittable layouts, recursion
//! checks and generic instantiations are pure functions of a type's shape.
//! The cache makes each one run at most once per type name; concurrent
//! misses may both compute, and the first insert wins.
//!
//! One cache belongs to one [`ShapeRegistry`]: keys are type names.

use crate::layout::{self, BlitLayout};
use crate::members::{self, MemberEntry};
use crate::reconstruct;
use crate::error::ShapeError;
use crate::shape::{ObjectShape, ShapeRegistry, TypeShape};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ShapeCache {
    objects: DashMap<String, Arc<ObjectShape>>,
    members: DashMap<String, Arc<Vec<MemberEntry>>>,
    rankings: DashMap<String, Arc<Vec<usize>>>,
    layouts: DashMap<String, Result<Arc<BlitLayout>, String>>,
    recursive: DashMap<String, bool>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> LookupStats {
        LookupStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Resolved (and, for generics, instantiated) object shape.
    pub fn object(
        &self,
        registry: &ShapeRegistry,
        shape: &TypeShape,
    ) -> Result<Arc<ObjectShape>, ShapeError> {
        let key = shape.base_name();
        if let Some(found) = self.objects.get(&key) {
            self.hit();
            return Ok(Arc::clone(found.value()));
        }
        self.miss();
        let object = registry.resolve(&shape.non_null())?;
        Ok(Arc::clone(
            self.objects.entry(key).or_insert(object).value(),
        ))
    }

    /// Ordered members of `object` (see [`members::enumerate`]).
    pub fn members(
        &self,
        registry: &ShapeRegistry,
        object: &ObjectShape,
    ) -> Result<Arc<Vec<MemberEntry>>, ShapeError> {
        if let Some(found) = self.members.get(&object.name) {
            self.hit();
            return Ok(Arc::clone(found.value()));
        }
        self.miss();
        let entries = Arc::new(members::enumerate(registry, self, object)?);
        Ok(Arc::clone(
            self.members
                .entry(object.name.clone())
                .or_insert(entries)
                .value(),
        ))
    }

    /// Constructor indices in precedence order.
    pub fn constructor_ranking(&self, object: &ObjectShape) -> Arc<Vec<usize>> {
        if let Some(found) = self.rankings.get(&object.name) {
            self.hit();
            return Arc::clone(found.value());
        }
        self.miss();
        let ranking = Arc::new(reconstruct::rank_constructors(&object.constructors));
        Arc::clone(
            self.rankings
                .entry(object.name.clone())
                .or_insert(ranking)
                .value(),
        )
    }

    pub fn layout(
        &self,
        registry: &ShapeRegistry,
        object: &ObjectShape,
    ) -> Result<Arc<BlitLayout>, String> {
        if let Some(found) = self.layouts.get(&object.name) {
            self.hit();
            return found.value().clone();
        }
        self.miss();
        let computed = layout::compute(registry, object);
        self.layouts
            .entry(object.name.clone())
            .or_insert(computed)
            .value()
            .clone()
    }

    pub fn is_recursive(&self, registry: &ShapeRegistry, shape: &TypeShape) -> bool {
        let key = shape.base_name();
        if let Some(found) = self.recursive.get(&key) {
            self.hit();
            return *found.value();
        }
        self.miss();
        let recursive = registry.is_recursive(shape);
        *self.recursive.entry(key).or_insert(recursive).value()
    }

    pub fn clear(&self) {
        self.objects.clear();
        self.members.clear();
        self.rankings.clear();
        self.layouts.clear();
        self.recursive.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::PrimitiveKind;

    #[test]
    fn test_members_are_computed_once() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("P")
                    .field("x", TypeShape::primitive(PrimitiveKind::I32))
                    .build(),
            )
            .expect("register");
        let cache = ShapeCache::new();
        let p = registry.get("P").expect("p");

        let first = cache.members(&registry, p).expect("members");
        let second = cache.members(&registry, p).expect("members");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), LookupStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_layout_failure_is_cached() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("C")
                    .field("x", TypeShape::primitive(PrimitiveKind::I32))
                    .build(),
            )
            .expect("register");
        let cache = ShapeCache::new();
        let c = registry.get("C").expect("c");
        assert!(cache.layout(&registry, c).is_err());
        assert!(cache.layout(&registry, c).is_err());
        assert_eq!(cache.stats().hits, 1);
    }
}
