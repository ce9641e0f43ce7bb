// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime facade: get-or-build compiled codecs by shape.
//!
//! A codec is generated and lowered the first time its shape is used, then
//! shared through an `Arc` until the hooks change. Concurrent first uses may
//! both build; the first insert wins.

use crate::cache::ShapeCache;
use crate::config::CodegenConfig;
use crate::diagnostics::Severity;
use crate::emit::compiled::CompiledCodec;
use crate::error::{CodecError, CodecResult};
use crate::generator::Generator;
use crate::hooks::Hooks;
use crate::shape::{ShapeRegistry, TypeKey, TypeShape};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct RuntimeCodecs {
    registry: Arc<ShapeRegistry>,
    config: CodegenConfig,
    cache: ShapeCache,
    hooks: RwLock<Arc<Hooks>>,
    codecs: DashMap<TypeKey, Arc<CompiledCodec>>,
}

impl RuntimeCodecs {
    pub fn new(registry: impl Into<Arc<ShapeRegistry>>, config: CodegenConfig) -> Self {
        Self {
            registry: registry.into(),
            config,
            cache: ShapeCache::new(),
            hooks: RwLock::new(Arc::new(Hooks::new())),
            codecs: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_hooks(self, hooks: Hooks) -> Self {
        *self.hooks.write() = Arc::new(hooks);
        self
    }

    /// Replace the hooks; codecs built against the old set are dropped.
    pub fn set_hooks(&self, hooks: Hooks) {
        *self.hooks.write() = Arc::new(hooks);
        self.codecs.clear();
    }

    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    /// Number of codecs built so far.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Compiled codec for `shape`, built on first use.
    pub fn codec(&self, shape: &TypeShape) -> CodecResult<Arc<CompiledCodec>> {
        let key = shape.key();
        if let Some(codec) = self.codecs.get(&key) {
            return Ok(Arc::clone(codec.value()));
        }
        let codec = Arc::new(self.build(shape)?);
        Ok(Arc::clone(self.codecs.entry(key).or_insert(codec).value()))
    }

    fn build(&self, shape: &TypeShape) -> CodecResult<CompiledCodec> {
        crate::trace_fn!("RuntimeCodecs::build");
        let generation = |reason: String| CodecError::Generation {
            type_name: shape.to_string(),
            reason,
        };
        let unit = Generator::new(&self.registry, &self.config, &self.cache)
            .generate(shape)
            .map_err(|e| generation(e.to_string()))?;
        for diagnostic in &unit.diagnostics {
            match diagnostic.severity {
                Severity::Error => log::warn!("[RuntimeCodecs] {}", diagnostic),
                Severity::Warning => log::debug!("[RuntimeCodecs] {}", diagnostic),
            }
        }

        let entry = unit
            .primary()
            .ok_or_else(|| generation("no entry points generated".into()))?;
        if entry.encode.is_none() && entry.decode.is_none() {
            let reasons: Vec<String> = unit
                .diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(ToString::to_string)
                .collect();
            return Err(generation(if reasons.is_empty() {
                "neither direction generated".into()
            } else {
                reasons.join("; ")
            }));
        }

        let hooks = Arc::clone(&self.hooks.read());
        let codec = CompiledCodec::compile(&unit, entry, &hooks, &self.config.generator)?;
        log::debug!("[RuntimeCodecs] built {:?}", codec);
        Ok(codec)
    }

    pub fn encode(&self, shape: &TypeShape, value: &Value) -> CodecResult<Vec<u8>> {
        self.codec(shape)?.encode(value)
    }

    pub fn decode(&self, shape: &TypeShape, bytes: &[u8]) -> CodecResult<Value> {
        self.codec(shape)?.decode(bytes)
    }

    /// Overwrite the writable members of `target` from `bytes`.
    pub fn decode_into(&self, shape: &TypeShape, target: &mut Value, bytes: &[u8]) -> CodecResult<()> {
        self.codec(shape)?.decode_into(target, bytes)
    }
}

impl std::fmt::Debug for RuntimeCodecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeCodecs")
            .field("types", &self.registry.len())
            .field("codecs", &self.codecs.len())
            .finish_non_exhaustive()
    }
}
