// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Orchestration: one generation request from root shapes to procedures.
//!
//! A request runs one [`CodecContext`] over one or more root shapes, so the
//! at-most-one-procedure-per-(type, direction) rule holds across all of
//! them. The result is a [`CodecUnit`]: the procedures, the entry points of
//! every root, and the diagnostics recorded along the way.
//!
//! An entry point is only exposed when its procedure and everything it
//! calls, transitively, generated successfully.

use crate::cache::ShapeCache;
use crate::chain::StrategyChain;
use crate::config::CodegenConfig;
use crate::context::CodecContext;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::GenResult;
use crate::ir::{Direction, GeneratedProcedure, ProcId};
use crate::shape::{ObjectKind, ShapeRegistry, TypeShape};

/// Entry procedures of one root shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoints {
    pub shape: TypeShape,
    pub encode: Option<ProcId>,
    pub decode: Option<ProcId>,
    pub decode_into: Option<ProcId>,
}

impl EntryPoints {
    pub fn get(&self, direction: Direction) -> Option<ProcId> {
        match direction {
            Direction::Encode => self.encode,
            Direction::Decode => self.decode,
            Direction::DecodeInto => self.decode_into,
        }
    }
}

/// Output of one generation request.
#[derive(Debug, Clone)]
pub struct CodecUnit {
    /// Indexed by [`ProcId`].
    pub procedures: Vec<GeneratedProcedure>,
    pub entries: Vec<EntryPoints>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CodecUnit {
    pub fn procedure(&self, id: ProcId) -> Option<&GeneratedProcedure> {
        self.procedures.get(id.index())
    }

    /// Entry points of `shape` (matched by type key).
    pub fn entry(&self, shape: &TypeShape) -> Option<&EntryPoints> {
        let key = shape.key();
        self.entries.iter().find(|e| e.shape.key() == key)
    }

    /// Entry points of the first root shape.
    pub fn primary(&self) -> Option<&EntryPoints> {
        self.entries.first()
    }

    /// Root shape and direction when `id` is an exposed entry point.
    pub fn entry_of(&self, id: ProcId) -> Option<(&EntryPoints, Direction)> {
        self.entries.iter().find_map(|e| {
            [Direction::Encode, Direction::Decode, Direction::DecodeInto]
                .into_iter()
                .find(|d| e.get(*d) == Some(id))
                .map(|d| (e, d))
        })
    }

    /// Procedures reachable from `roots` through calls, indexed by [`ProcId`].
    pub fn reachable_from(&self, roots: &[ProcId]) -> Vec<bool> {
        let mut reachable = vec![false; self.procedures.len()];
        let mut pending = roots.to_vec();
        while let Some(id) = pending.pop() {
            let Some(seen) = reachable.get_mut(id.index()) else {
                continue;
            };
            if *seen {
                continue;
            }
            *seen = true;
            if let Some(proc) = self.procedure(id) {
                pending.extend(proc.callees());
            }
        }
        reachable
    }

    /// Every exposed entry procedure, in root order.
    pub fn exposed(&self) -> Vec<ProcId> {
        self.entries
            .iter()
            .flat_map(|e| [e.encode, e.decode, e.decode_into])
            .flatten()
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Procedures usable as entry points: sealed, and every callee usable too.
fn usable_procedures(procedures: &[GeneratedProcedure]) -> Vec<bool> {
    let callees: Vec<Vec<ProcId>> = procedures.iter().map(GeneratedProcedure::callees).collect();
    let mut usable: Vec<bool> = procedures.iter().map(GeneratedProcedure::is_available).collect();
    loop {
        let mut changed = false;
        for (index, calls) in callees.iter().enumerate() {
            if usable[index] && calls.iter().any(|c| !usable.get(c.index()).copied().unwrap_or(false)) {
                usable[index] = false;
                changed = true;
            }
        }
        if !changed {
            return usable;
        }
    }
}

pub struct Generator<'a> {
    registry: &'a ShapeRegistry,
    config: &'a CodegenConfig,
    cache: &'a ShapeCache,
    chain: StrategyChain,
}

impl<'a> Generator<'a> {
    pub fn new(registry: &'a ShapeRegistry, config: &'a CodegenConfig, cache: &'a ShapeCache) -> Self {
        Self {
            registry,
            config,
            cache,
            chain: StrategyChain::new(config),
        }
    }

    pub fn chain(&self) -> &StrategyChain {
        &self.chain
    }

    /// Encode, decode and (for object types) decode-into procedures of `shape`.
    pub fn generate(&self, shape: &TypeShape) -> GenResult<CodecUnit> {
        self.generate_all(std::slice::from_ref(shape))
    }

    /// Every non-generic registered type marked `generates_codec`.
    pub fn generate_library(&self) -> GenResult<CodecUnit> {
        let roots: Vec<TypeShape> = self
            .registry
            .iter()
            .filter(|o| o.generates_codec && !o.is_generic())
            .map(|o| TypeShape::named(&o.name))
            .collect();
        self.generate_all(&roots)
    }

    pub fn generate_all(&self, roots: &[TypeShape]) -> GenResult<CodecUnit> {
        crate::trace_fn!("Generator::generate_all");
        for root in roots {
            root.validate()?;
            if root.named_ref().is_some() {
                self.cache.object(self.registry, root)?;
            }
        }

        let mut ctx = CodecContext::new(self.registry, self.config, self.cache, &self.chain);
        let mut raw = Vec::with_capacity(roots.len());
        for root in roots {
            let encode = ctx.ensure_procedure(root, Direction::Encode)?;
            let decode = ctx.ensure_procedure(root, Direction::Decode)?;
            let decode_into = if self.wants_decode_into(root)? {
                Some(ctx.ensure_procedure(root, Direction::DecodeInto)?)
            } else {
                None
            };
            raw.push((root.clone(), encode, decode, decode_into));
        }

        let (procedures, diagnostics) = ctx.finish();
        let usable = usable_procedures(&procedures);
        let expose = |id: ProcId| usable.get(id.index()).copied().unwrap_or(false).then_some(id);
        let entries = raw
            .into_iter()
            .map(|(shape, encode, decode, decode_into)| EntryPoints {
                encode: expose(encode),
                decode: expose(decode),
                decode_into: decode_into.and_then(expose),
                shape,
            })
            .collect::<Vec<_>>();

        for entry in &entries {
            log::debug!(
                "[generator] {}: encode={} decode={} decode_into={}",
                entry.shape,
                entry.encode.is_some(),
                entry.decode.is_some(),
                entry.decode_into.is_some()
            );
        }
        Ok(CodecUnit {
            procedures,
            entries,
            diagnostics,
        })
    }

    fn wants_decode_into(&self, root: &TypeShape) -> GenResult<bool> {
        if !self.config.generator.emit_decode_into
            || root.is_nullable()
            || root.named_ref().is_none()
        {
            return Ok(false);
        }
        let object = self.cache.object(self.registry, root)?;
        Ok(object.kind != ObjectKind::Interface && object.dynamic.is_none() && object.custom.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;
    use crate::ir::{Op, ProcState};
    use crate::shape::{ConstructorShape, MemberShape, ObjectShape, PrimitiveKind};

    fn int() -> TypeShape {
        TypeShape::primitive(PrimitiveKind::I32)
    }

    fn generate(registry: &ShapeRegistry, shape: &TypeShape) -> CodecUnit {
        let config = CodegenConfig::default();
        let cache = ShapeCache::new();
        Generator::new(registry, &config, &cache)
            .generate(shape)
            .expect("generate")
    }

    #[test]
    fn test_primitive_root_writes_directly() {
        let unit = generate(&ShapeRegistry::new(), &int());
        let entry = unit.primary().expect("entry");
        let encode = unit.procedure(entry.encode.expect("encode")).expect("proc");
        assert!(matches!(encode.body.as_slice(), [Op::WritePrimitive { .. }]));
        assert!(entry.decode_into.is_none());
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_recursive_type_gets_one_procedure_per_direction() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("Node")
                    .field("value", int())
                    .field("next", TypeShape::named("Node").nullable())
                    .build(),
            )
            .expect("register");
        let unit = generate(&registry, &TypeShape::named("Node"));
        let encodes = unit
            .procedures
            .iter()
            .filter(|p| p.direction == Direction::Encode)
            .count();
        assert_eq!(encodes, 1);
        let entry = unit.primary().expect("entry");
        let encode = unit.procedure(entry.encode.expect("encode")).expect("proc");
        assert_eq!(encode.callees(), vec![encode.id]);
    }

    #[test]
    fn test_reconstruction_failure_hides_decoder() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("Locked")
                    .member(MemberShape::field("id", int()).read_only())
                    .constructor(ConstructorShape::with_params(&["other"]))
                    .build(),
            )
            .expect("register");
        let unit = generate(&registry, &TypeShape::named("Locked"));
        let entry = unit.primary().expect("entry");
        assert!(entry.encode.is_some());
        assert!(entry.decode.is_none());
        assert!(unit
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::ReconstructionImpossible));
        let failed = unit
            .procedures
            .iter()
            .find(|p| p.direction == Direction::Decode)
            .expect("decode proc");
        assert_eq!(failed.state, ProcState::Failed);
    }

    #[test]
    fn test_caller_of_failed_procedure_is_hidden() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::class("Leaf")
                    .field("next", TypeShape::named("Leaf").nullable())
                    .constructor(ConstructorShape::with_params(&["missing"]))
                    .build(),
            )
            .expect("register");
        registry
            .register(
                ObjectShape::class("Holder")
                    .field("leaf", TypeShape::named("Leaf"))
                    .build(),
            )
            .expect("register");
        let unit = generate(&registry, &TypeShape::named("Holder"));
        let entry = unit.primary().expect("entry");
        assert!(entry.encode.is_some());
        assert!(entry.decode.is_none());
    }

    #[test]
    fn test_unknown_root_is_an_error() {
        let config = CodegenConfig::default();
        let cache = ShapeCache::new();
        let registry = ShapeRegistry::new();
        let result = Generator::new(&registry, &config, &cache).generate(&TypeShape::named("Ghost"));
        assert!(result.is_err());
    }

    #[test]
    fn test_library_covers_generating_types() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(ObjectShape::class("A").generates_codec().field("x", int()).build())
            .expect("register");
        registry
            .register(ObjectShape::class("B").field("y", int()).build())
            .expect("register");
        let config = CodegenConfig::default();
        let cache = ShapeCache::new();
        let unit = Generator::new(&registry, &config, &cache)
            .generate_library()
            .expect("library");
        assert_eq!(unit.entries.len(), 1);
        assert_eq!(unit.entries[0].shape, TypeShape::named("A"));
    }
}
