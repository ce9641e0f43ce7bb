// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generator configuration.
//!
//! Supports both programmatic and file-based configuration:
//!
//! ```toml
//! [generator]
//! max_depth = 64
//! disabled_strategies = ["blittable"]
//!
//! [library.encode]
//! name = "write_to"
//!
//! [library.decode_self]
//! enabled = false
//! ```

use crate::chain::StrategyKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Maximum strategy nesting before a recursion-limit diagnostic.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum procedure call depth while decoding with a compiled codec.
    #[serde(default = "default_max_decode_depth")]
    pub max_decode_depth: usize,

    /// Strategies skipped by the chain.
    #[serde(default)]
    pub disabled_strategies: Vec<StrategyKind>,

    /// Concrete stream type custom methods may declare.
    #[serde(default = "default_stream_type")]
    pub stream_type: String,

    /// Capability a generic custom-method stream parameter must be bound by.
    #[serde(default = "default_stream_capability")]
    pub stream_capability: String,

    /// Generate decode-into procedures for object types.
    #[serde(default = "default_true")]
    pub emit_decode_into: bool,
}

fn default_max_depth() -> usize {
    64
}

fn default_max_decode_depth() -> usize {
    16_384
}

fn default_stream_type() -> String {
    "BufferWriter".to_string()
}

fn default_stream_capability() -> String {
    "StreamWriter".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_decode_depth: default_max_decode_depth(),
            disabled_strategies: Vec::new(),
            stream_type: default_stream_type(),
            stream_capability: default_stream_capability(),
            emit_decode_into: true,
        }
    }
}

/// Name and toggle of one generated entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodName {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl MethodName {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }

    /// Name when enabled.
    pub fn get(&self) -> Option<&str> {
        self.enabled.then_some(self.name.as_str())
    }
}

/// Entry-point naming for generated source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Static encode method.
    #[serde(default = "default_encode")]
    pub encode: MethodName,

    /// Static decode-new method.
    #[serde(default = "default_decode")]
    pub decode: MethodName,

    /// Static decode-into method.
    #[serde(default = "default_decode_into")]
    pub decode_into: MethodName,

    /// Instance decode-into-self method.
    #[serde(default = "default_decode_self")]
    pub decode_self: MethodName,
}

fn default_encode() -> MethodName {
    MethodName::new("serialize")
}

fn default_decode() -> MethodName {
    MethodName::new("deserialize")
}

fn default_decode_into() -> MethodName {
    MethodName::new("deserialize_into")
}

fn default_decode_self() -> MethodName {
    MethodName::new("read_from")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            encode: default_encode(),
            decode: default_decode(),
            decode_into: default_decode_into(),
            decode_self: default_decode_self(),
        }
    }
}

impl CodegenConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generator = &self.generator;
        if generator.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if generator.max_decode_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_decode_depth must be at least 1".into(),
            ));
        }
        if generator
            .disabled_strategies
            .contains(&StrategyKind::MemberByMember)
        {
            return Err(ConfigError::Invalid(
                "member_by_member is the terminal strategy and cannot be disabled".into(),
            ));
        }

        let methods = [
            ("encode", &self.library.encode),
            ("decode", &self.library.decode),
            ("decode_into", &self.library.decode_into),
            ("decode_self", &self.library.decode_self),
        ];
        let mut seen: Vec<&str> = Vec::new();
        for (slot, method) in methods {
            let Some(name) = method.get() else { continue };
            if !is_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "{} method name '{}' is not a valid identifier",
                    slot, name
                )));
            }
            if seen.contains(&name) {
                return Err(ConfigError::Invalid(format!(
                    "method name '{}' is used twice",
                    name
                )));
            }
            seen.push(name);
        }

        Ok(())
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        !self.generator.disabled_strategies.contains(&kind)
    }

    /// Set the strategy nesting limit.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.generator.max_depth = depth;
        self
    }

    /// Set the compiled decoder call depth limit.
    pub fn max_decode_depth(mut self, depth: usize) -> Self {
        self.generator.max_decode_depth = depth;
        self
    }

    /// Skip a strategy.
    pub fn disable(mut self, kind: StrategyKind) -> Self {
        if !self.generator.disabled_strategies.contains(&kind) {
            self.generator.disabled_strategies.push(kind);
        }
        self
    }

    /// Set the stream type and capability custom methods are matched against.
    pub fn stream(mut self, stream_type: impl Into<String>, capability: impl Into<String>) -> Self {
        self.generator.stream_type = stream_type.into();
        self.generator.stream_capability = capability.into();
        self
    }

    /// Toggle decode-into procedures.
    pub fn decode_into(mut self, enabled: bool) -> Self {
        self.generator.emit_decode_into = enabled;
        self
    }

    /// Rename or disable the generated entry points (`None` disables).
    pub fn methods(
        mut self,
        encode: Option<&str>,
        decode: Option<&str>,
        decode_into: Option<&str>,
        decode_self: Option<&str>,
    ) -> Self {
        let slots = [
            (&mut self.library.encode, encode),
            (&mut self.library.decode, decode),
            (&mut self.library.decode_into, decode_into),
            (&mut self.library.decode_self, decode_self),
        ];
        for (slot, name) in slots {
            match name {
                Some(name) => {
                    slot.name = name.to_string();
                    slot.enabled = true;
                }
                None => slot.enabled = false,
            }
        }
        self
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}
