// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec context: the generation state shared by all strategies.
//!
//! # Scopes
//!
//! The context keeps a stack of [`CodecScope`]s. The bottom scope is always
//! top-level: it owns a [`GeneratedProcedure`]. Inline object expansions push
//! non-top-level scopes that share the enclosing procedure. Generating a new
//! top-level procedure in the middle of another one pushes a second
//! top-level scope; its ops go to its own procedure until it is popped.
//!
//! # Procedure registry
//!
//! `(TypeKey, Direction)` maps to the procedure generating that type. A
//! procedure is registered *before* its body is generated, so a type that
//! reaches itself resolves to a call instead of recursing forever.
//!
//! [`GeneratedProcedure`]: crate::ir::GeneratedProcedure

use crate::cache::ShapeCache;
use crate::chain::{member_by_member, StrategyChain, StrategyFlags};
use crate::config::CodegenConfig;
use crate::descriptor::{Owner, ValueDescriptor, INPUT_NAME};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::{GenResult, GenerationError, ShapeError};
use crate::ir::{
    Direction, GeneratedProcedure, LocalId, Op, OpSink, Place, ProcId, ProcedureBuilder,
};
use crate::shape::{ObjectShape, ShapeRegistry, TypeKey, TypeShape};
use std::collections::HashMap;
use std::sync::Arc;

/// A member already handled in the current object scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedMember {
    pub name: String,
    /// Encode-side location.
    pub place: Option<Place>,
    /// Decode-side local.
    pub local: Option<LocalId>,
}

/// One level of the scope stack.
#[derive(Debug, Clone)]
pub struct CodecScope {
    pub key: TypeKey,
    pub is_top_level: bool,
    pub proc: ProcId,
    pub direction: Direction,
    value: Place,
    /// Root object body not generated yet (top-level scopes only).
    pub root_pending: bool,
    visited: Vec<VisitedMember>,
}

impl CodecScope {
    fn top_level(key: TypeKey, proc: ProcId, direction: Direction) -> Self {
        Self {
            key,
            is_top_level: true,
            proc,
            direction,
            value: Place::Input,
            root_pending: true,
            visited: Vec::new(),
        }
    }

    /// Scope for an object expanded inline into the enclosing procedure.
    pub fn inline(key: TypeKey, proc: ProcId, direction: Direction, value: Place) -> Self {
        Self {
            key,
            is_top_level: false,
            proc,
            direction,
            value,
            root_pending: false,
            visited: Vec::new(),
        }
    }

    /// Location of the scope's object: the encode source or decode-into target.
    pub fn get_value(&self) -> &Place {
        &self.value
    }

    /// Stream binding name in generated procedures.
    pub fn get_stream(&self) -> &'static str {
        match self.direction {
            Direction::Encode => "writer",
            Direction::Decode | Direction::DecodeInto => "reader",
        }
    }

    pub fn visit(&mut self, member: VisitedMember) {
        self.visited.push(member);
    }

    pub fn visited(&self, name: &str) -> Option<&VisitedMember> {
        self.visited.iter().find(|v| v.name == name)
    }
}

pub struct CodecContext<'a> {
    registry: &'a ShapeRegistry,
    config: &'a CodegenConfig,
    cache: &'a ShapeCache,
    chain: &'a StrategyChain,
    stack: Vec<CodecScope>,
    registered: HashMap<(TypeKey, Direction), ProcId>,
    procedures: Vec<ProcedureBuilder>,
    diagnostics: Diagnostics,
    depth: usize,
}

impl<'a> CodecContext<'a> {
    pub fn new(
        registry: &'a ShapeRegistry,
        config: &'a CodegenConfig,
        cache: &'a ShapeCache,
        chain: &'a StrategyChain,
    ) -> Self {
        Self {
            registry,
            config,
            cache,
            chain,
            stack: Vec::new(),
            registered: HashMap::new(),
            procedures: Vec::new(),
            diagnostics: Diagnostics::default(),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'a ShapeRegistry {
        self.registry
    }

    pub fn config(&self) -> &'a CodegenConfig {
        self.config
    }

    pub fn cache(&self) -> &'a ShapeCache {
        self.cache
    }

    pub fn chain(&self) -> &'a StrategyChain {
        self.chain
    }

    // ---- scope stack -------------------------------------------------------

    pub fn push_scope(&mut self, scope: CodecScope) {
        self.stack.push(scope);
    }

    /// Pop the innermost scope; a top-level scope seals its procedure.
    pub fn pop_scope(&mut self) -> Option<CodecScope> {
        let scope = self.stack.pop()?;
        if scope.is_top_level {
            if let Some(builder) = self.procedures.get_mut(scope.proc.index()) {
                builder.seal();
                log::debug!(
                    "[CodecContext] sealed {} {} ({})",
                    scope.direction.label(),
                    scope.key,
                    scope.proc
                );
            }
        }
        Some(scope)
    }

    pub fn current(&self) -> GenResult<&CodecScope> {
        self.stack
            .last()
            .ok_or_else(|| GenerationError::Fatal("no active codec scope".into()))
    }

    pub fn current_mut(&mut self) -> GenResult<&mut CodecScope> {
        self.stack
            .last_mut()
            .ok_or_else(|| GenerationError::Fatal("no active codec scope".into()))
    }

    /// Consume the pending root of the current top-level scope when `key`
    /// names it.
    pub fn take_root(&mut self, key: &TypeKey) -> bool {
        match self.stack.last_mut() {
            Some(scope) if scope.is_top_level && scope.root_pending && scope.key == *key => {
                scope.root_pending = false;
                true
            }
            _ => false,
        }
    }

    // ---- op emission -------------------------------------------------------

    pub fn sink(&mut self) -> GenResult<&mut ProcedureBuilder> {
        let proc = self.current()?.proc;
        self.procedures
            .get_mut(proc.index())
            .ok_or_else(|| GenerationError::Fatal(format!("unknown procedure {}", proc)))
    }

    pub fn emit(&mut self, op: Op) -> GenResult<()> {
        self.sink()?.emit(op);
        Ok(())
    }

    pub fn begin_block(&mut self) -> GenResult<()> {
        self.sink()?.begin_block();
        Ok(())
    }

    pub fn end_block(&mut self) -> GenResult<Vec<Op>> {
        Ok(self.sink()?.end_block())
    }

    pub fn declare_local(&mut self, name: &str, shape: &TypeShape) -> GenResult<LocalId> {
        let type_name = shape.type_name();
        Ok(self.sink()?.declare_local(name, &type_name))
    }

    pub fn local_name(&mut self, id: LocalId) -> GenResult<String> {
        Ok(self.sink()?.local_name(id).to_string())
    }

    /// Declare a local and a descriptor bound to it.
    pub fn bind_local(
        &mut self,
        name: &str,
        shape: TypeShape,
    ) -> GenResult<(LocalId, ValueDescriptor)> {
        let id = self.declare_local(name, &shape)?;
        let local = self.local_name(id)?;
        Ok((id, ValueDescriptor::local(&local, shape)))
    }

    /// Where `desc` can be read from inside the current procedure.
    pub fn place_of(&mut self, desc: &ValueDescriptor) -> GenResult<Place> {
        let base = match &desc.owner {
            Owner::None => return self.named_place(&desc.name),
            Owner::Receiver(chain) => chain
                .iter()
                .fold(Place::Input, |place, name| Place::member(place, name)),
            Owner::Named { root, chain } => chain
                .iter()
                .fold(self.named_place(root)?, |place, name| Place::member(place, name)),
            Owner::Static { type_name, chain } => match chain.split_first() {
                None => {
                    return Ok(Place::Static {
                        type_name: type_name.clone(),
                        member: desc.name.clone(),
                    })
                }
                Some((first, rest)) => rest.iter().fold(
                    Place::Static {
                        type_name: type_name.clone(),
                        member: first.clone(),
                    },
                    |place, name| Place::member(place, name),
                ),
            },
        };
        Ok(Place::member(base, &desc.name))
    }

    fn named_place(&mut self, name: &str) -> GenResult<Place> {
        if name == INPUT_NAME {
            return Ok(Place::Input);
        }
        self.sink()?
            .find_local(name)
            .map(Place::Local)
            .ok_or_else(|| GenerationError::Fatal(format!("unbound local '{}'", name)))
    }

    // ---- procedures --------------------------------------------------------

    pub fn resolve_procedure(&self, key: &TypeKey, direction: Direction) -> Option<ProcId> {
        self.registered.get(&(key.clone(), direction)).copied()
    }

    /// Procedure for `shape` in `direction`, generating it on first request.
    pub fn ensure_procedure(&mut self, shape: &TypeShape, direction: Direction) -> GenResult<ProcId> {
        crate::trace_fn!("CodecContext::ensure_procedure");
        let key = shape.key();
        if let Some(id) = self.resolve_procedure(&key, direction) {
            return Ok(id);
        }

        let id = ProcId(self.procedures.len() as u32);
        self.procedures
            .push(ProcedureBuilder::new(id, shape.clone(), direction));
        self.registered.insert((key.clone(), direction), id);
        log::debug!(
            "[CodecContext] registered {} {} as {}",
            direction.label(),
            key,
            id
        );

        self.push_scope(CodecScope::top_level(key, id, direction));
        let saved_depth = std::mem::replace(&mut self.depth, 0);
        let generated = self.generate_root(shape, direction);
        self.depth = saved_depth;

        match generated {
            Ok(true) => {}
            Ok(false) => self.fail_current("root value could not be generated")?,
            Err(e) => {
                self.pop_scope();
                return Err(e);
            }
        }
        self.pop_scope();
        Ok(id)
    }

    fn generate_root(&mut self, shape: &TypeShape, direction: Direction) -> GenResult<bool> {
        let chain = self.chain;
        let mask = self.chain.enabled() - StrategyFlags::RECURSIVE_CALL;
        let root = ValueDescriptor::root(shape.clone());
        match direction {
            Direction::Encode => chain.encode_masked(self, &root, mask),
            Direction::Decode => {
                let result = self.declare_local("result", shape)?;
                self.sink()?.set_result(result);
                chain.decode_masked(self, &root, result, mask)
            }
            Direction::DecodeInto => member_by_member::decode_into_root(self, shape),
        }
    }

    /// Mark the procedure of the current scope as failed.
    pub fn fail_current(&mut self, reason: &str) -> GenResult<()> {
        let builder = self.sink()?;
        log::debug!("[CodecContext] procedure {} failed: {}", builder.id(), reason);
        builder.fail(reason);
        Ok(())
    }

    /// Types that get their own procedure instead of being inlined.
    pub fn needs_own_procedure(&self, shape: &TypeShape) -> bool {
        self.cache.is_recursive(self.registry, shape)
    }

    pub fn object(&self, shape: &TypeShape) -> Result<Arc<ObjectShape>, ShapeError> {
        self.cache.object(self.registry, shape)
    }

    // ---- depth -------------------------------------------------------------

    /// Enter one strategy nesting level; false past the configured limit.
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.config.generator.max_depth {
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ---- diagnostics -------------------------------------------------------

    pub fn report(&mut self, code: DiagnosticCode, member: Option<&str>, message: impl Into<String>) {
        let type_name = self
            .stack
            .last()
            .map(|s| s.key.to_string())
            .unwrap_or_default();
        let mut diagnostic = Diagnostic::new(code, type_name, message);
        if let Some(member) = member {
            diagnostic = diagnostic.on_member(member);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostic_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Finished procedures (indexed by `ProcId`) and collected diagnostics.
    pub fn finish(self) -> (Vec<GeneratedProcedure>, Vec<Diagnostic>) {
        let procedures = self
            .procedures
            .into_iter()
            .map(ProcedureBuilder::finish)
            .collect();
        (procedures, self.diagnostics.into_vec())
    }
}
