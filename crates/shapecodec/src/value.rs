// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values consumed and produced by compiled codecs.
//!
//! A [`Value`] is the runtime counterpart of a [`crate::TypeShape`]: objects
//! are field bags tagged with their type name, sequences are flat vectors,
//! and multi-rank arrays keep their dimensions next to row-major items.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    /// Enum member by underlying integer value.
    Enum(i64),
    Guid([u8; 16]),
    Ip(IpAddr),
    /// Two's-complement little-endian magnitude.
    BigInt(Vec<u8>),
    /// Ticks (100 ns units) since 0001-01-01.
    DateTime(i64),
    /// Ticks (100 ns units).
    TimeSpan(i64),
    List(Vec<Value>),
    /// Multi-rank array, items in row-major order.
    Array {
        dims: Vec<usize>,
        items: Vec<Value>,
    },
    Map(Vec<(Value, Value)>),
    Object(Object),
}

impl Value {
    /// Short label used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::Guid(_) => "Guid",
            Value::Ip(_) => "IpAddress",
            Value::BigInt(_) => "BigInteger",
            Value::DateTime(_) => "DateTime",
            Value::TimeSpan(_) => "TimeSpan",
            Value::List(_) => "list",
            Value::Array { .. } => "array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Type name for objects, kind label otherwise.
    pub fn type_label(&self) -> String {
        match self {
            Value::Object(obj) => obj.type_name.clone(),
            other => other.kind_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view for counts, indices and enum raw values.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(i64::from(v)),
            Value::U8(v) => Some(i64::from(v)),
            Value::I16(v) => Some(i64::from(v)),
            Value::U16(v) => Some(i64::from(v)),
            Value::I32(v) => Some(i64::from(v)),
            Value::U32(v) => Some(i64::from(v)),
            Value::I64(v) | Value::Enum(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Elements of a list or multi-rank array.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array { items, .. } => Some(items),
            _ => None,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Object => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Field bag of a user-defined type.
///
/// Equality ignores field order: a decoded object may list constructor
/// arguments before assigned members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Object {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style `set`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_equality_ignores_field_order() {
        let a = Object::new("P").with("x", 1i32).with("y", 2i32);
        let b = Object::new("P").with("y", 2i32).with("x", 1i32);
        assert_eq!(a, b);
        assert_ne!(a, Object::new("Q").with("x", 1i32).with("y", 2i32));
    }

    #[test]
    fn test_set_replaces_existing_field() {
        let mut obj = Object::new("P").with("x", 1i32);
        obj.set("x", 5i32);
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get("x"), Some(&Value::I32(5)));
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::String("a".into()));
    }

    #[test]
    fn test_as_i64_covers_enum_and_unsigned() {
        assert_eq!(Value::Enum(-3).as_i64(), Some(-3));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::U8(7).as_i64(), Some(7));
    }
}
