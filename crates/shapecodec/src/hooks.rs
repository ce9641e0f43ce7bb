// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! User behavior referenced by name from shape annotations.
//!
//! Annotations only carry names (a converter, a predicate, a resolver).
//! Generated source calls those names directly; compiled codecs look them
//! up here once, when a codec is compiled. A name that is missing at that
//! point fails compilation with [`CodecError::MissingHook`].
//!
//! # Example
//!
//! ```rust
//! use shapecodec::{Hooks, Value};
//! use shapecodec::hooks::FnConverter;
//!
//! let hooks = Hooks::new()
//!     .with_predicate("is_v2", |args: &[Value]| args.first() == Some(&Value::I32(2)))
//!     .with_default("zero", || Value::I32(0))
//!     .with_converter(
//!         "celsius",
//!         FnConverter::new(
//!             |v: &Value| Ok(v.clone()),
//!             |v: Value| Ok(v),
//!         ),
//!     );
//! assert!(hooks.predicate("is_v2").is_some());
//! ```

use crate::emit::compiled::CompiledCodec;
use crate::error::CodecResult;
use crate::stream::{StreamReader, StreamWriter};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Two-way value conversion used by the user-conversion strategy.
pub trait Converter: Send + Sync {
    /// Member value to the value actually encoded.
    fn to_wire(&self, value: &Value) -> CodecResult<Value>;

    /// Decoded wire value back to the member value.
    fn from_wire(&self, wire: Value) -> CodecResult<Value>;
}

/// Converter built from two closures.
pub struct FnConverter<T, F> {
    to_wire: T,
    from_wire: F,
}

impl<T, F> FnConverter<T, F>
where
    T: Fn(&Value) -> CodecResult<Value> + Send + Sync,
    F: Fn(Value) -> CodecResult<Value> + Send + Sync,
{
    pub fn new(to_wire: T, from_wire: F) -> Self {
        Self { to_wire, from_wire }
    }
}

impl<T, F> Converter for FnConverter<T, F>
where
    T: Fn(&Value) -> CodecResult<Value> + Send + Sync,
    F: Fn(Value) -> CodecResult<Value> + Send + Sync,
{
    fn to_wire(&self, value: &Value) -> CodecResult<Value> {
        (self.to_wire)(value)
    }

    fn from_wire(&self, wire: Value) -> CodecResult<Value> {
        (self.from_wire)(wire)
    }
}

pub type Predicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;
pub type DefaultProvider = Arc<dyn Fn() -> Value + Send + Sync>;
pub type EncodeFn = Arc<dyn Fn(&Value, &mut dyn StreamWriter) -> CodecResult<()> + Send + Sync>;
pub type DecodeFn = Arc<dyn Fn(&mut dyn StreamReader) -> CodecResult<Value> + Send + Sync>;

/// Codec a resolver hands back for a resolved identifier.
#[derive(Clone)]
pub struct ResolvedType {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl ResolvedType {
    pub fn new(encode: EncodeFn, decode: DecodeFn) -> Self {
        Self { encode, decode }
    }

    /// Delegate to a compiled codec.
    pub fn from_codec(codec: Arc<CompiledCodec>) -> Self {
        let decoder = Arc::clone(&codec);
        Self {
            encode: Arc::new(move |value, writer| codec.encode_to(value, writer)),
            decode: Arc::new(move |reader| decoder.decode_from(reader)),
        }
    }
}

impl fmt::Debug for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedType").finish_non_exhaustive()
    }
}

/// Fallback for dynamic values that match no declared candidate.
///
/// On encode the resolver names the value (`identify`); the identifier is
/// written after discriminant `0`, then the resolved codec writes the value.
/// On decode the identifier is read back and resolved to the same codec.
pub trait DynamicResolver: Send + Sync {
    fn identify(&self, value: &Value) -> Option<Value>;

    fn resolve(&self, identifier: &Value) -> Option<ResolvedType>;
}

/// Named hooks available to compiled codecs.
#[derive(Clone, Default)]
pub struct Hooks {
    converters: HashMap<String, Arc<dyn Converter>>,
    predicates: HashMap<String, Predicate>,
    defaults: HashMap<String, DefaultProvider>,
    encoders: HashMap<String, EncodeFn>,
    decoders: HashMap<String, DecodeFn>,
    resolvers: HashMap<String, Arc<dyn DynamicResolver>>,
    statics: HashMap<String, Value>,
}

fn method_key(type_name: &str, method: &str) -> String {
    format!("{}::{}", type_name, method)
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(mut self, name: &str, converter: impl Converter + 'static) -> Self {
        self.converters
            .insert(name.to_string(), Arc::new(converter));
        self
    }

    pub fn with_predicate(
        mut self,
        name: &str,
        predicate: impl Fn(&[Value]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates
            .insert(name.to_string(), Arc::new(predicate));
        self
    }

    pub fn with_default(
        mut self,
        name: &str,
        provider: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.defaults.insert(name.to_string(), Arc::new(provider));
        self
    }

    /// Custom encode method `type_name::method`.
    pub fn with_encoder(
        mut self,
        type_name: &str,
        method: &str,
        encode: impl Fn(&Value, &mut dyn StreamWriter) -> CodecResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.encoders
            .insert(method_key(type_name, method), Arc::new(encode));
        self
    }

    /// Custom decode method `type_name::method`.
    pub fn with_decoder(
        mut self,
        type_name: &str,
        method: &str,
        decode: impl Fn(&mut dyn StreamReader) -> CodecResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.decoders
            .insert(method_key(type_name, method), Arc::new(decode));
        self
    }

    pub fn with_resolver(mut self, name: &str, resolver: impl DynamicResolver + 'static) -> Self {
        self.resolvers
            .insert(name.to_string(), Arc::new(resolver));
        self
    }

    /// Value of the static member `type_name::member`.
    pub fn with_static(mut self, type_name: &str, member: &str, value: impl Into<Value>) -> Self {
        self.statics
            .insert(method_key(type_name, member), value.into());
        self
    }

    pub fn converter(&self, name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(name).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<Predicate> {
        self.predicates.get(name).cloned()
    }

    pub fn default_provider(&self, name: &str) -> Option<DefaultProvider> {
        self.defaults.get(name).cloned()
    }

    pub fn encoder(&self, type_name: &str, method: &str) -> Option<EncodeFn> {
        self.encoders.get(&method_key(type_name, method)).cloned()
    }

    pub fn decoder(&self, type_name: &str, method: &str) -> Option<DecodeFn> {
        self.decoders.get(&method_key(type_name, method)).cloned()
    }

    pub fn resolver(&self, name: &str) -> Option<Arc<dyn DynamicResolver>> {
        self.resolvers.get(name).cloned()
    }

    pub fn static_value(&self, type_name: &str, member: &str) -> Option<&Value> {
        self.statics.get(&method_key(type_name, member))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }
        f.debug_struct("Hooks")
            .field("converters", &names(&self.converters))
            .field("predicates", &names(&self.predicates))
            .field("defaults", &names(&self.defaults))
            .field("encoders", &names(&self.encoders))
            .field("decoders", &names(&self.decoders))
            .field("resolvers", &names(&self.resolvers))
            .field("statics", &names(&self.statics))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferWriter;

    #[test]
    fn test_methods_are_keyed_by_type() {
        let hooks = Hooks::new().with_encoder("Point", "write", |_, w| w.write_u8(7));
        assert!(hooks.encoder("Point", "write").is_some());
        assert!(hooks.encoder("Other", "write").is_none());

        let encode = hooks.encoder("Point", "write").expect("encoder");
        let mut writer = BufferWriter::new();
        encode(&Value::Null, &mut writer).expect("encode");
        assert_eq!(writer.as_slice(), &[7]);
    }

    #[test]
    fn test_fn_converter_round_trip() {
        let converter = FnConverter::new(
            |v: &Value| Ok(Value::I64(v.as_i64().unwrap_or_default() * 10)),
            |v: Value| Ok(Value::I32((v.as_i64().unwrap_or_default() / 10) as i32)),
        );
        let wire = converter.to_wire(&Value::I32(4)).expect("to wire");
        assert_eq!(wire, Value::I64(40));
        assert_eq!(converter.from_wire(wire).expect("from wire"), Value::I32(4));
    }

    #[test]
    fn test_debug_lists_names_only() {
        let hooks = Hooks::new()
            .with_default("b", || Value::Null)
            .with_default("a", || Value::Null)
            .with_static("Config", "version", 3i32);
        let text = format!("{:?}", hooks);
        assert!(text.contains("defaults: [\"a\", \"b\"]"));
        assert!(text.contains("Config::version"));
        assert_eq!(hooks.static_value("Config", "version"), Some(&Value::I32(3)));
    }
}
