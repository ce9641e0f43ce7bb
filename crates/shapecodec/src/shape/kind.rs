// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf classifications used by [`super::TypeShape`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar types with a direct stream read/write pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::String => "string",
        }
    }

    /// In-memory size, `None` for strings.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => Some(1),
            PrimitiveKind::I16 | PrimitiveKind::U16 => Some(2),
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => Some(4),
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => Some(8),
            PrimitiveKind::String => None,
        }
    }

    /// Valid as an enum underlying type.
    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Bool | PrimitiveKind::F32 | PrimitiveKind::F64 | PrimitiveKind::String
        )
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Well-known library types with a fixed encoding.
///
/// | Kind | Wire form |
/// |------|-----------|
/// | Guid | 16 raw bytes |
/// | IpAddress | 1-byte length (4 or 16) + address bytes |
/// | BigInteger | 7-bit length + two's-complement LE bytes |
/// | DateTime | `i64` ticks |
/// | TimeSpan | `i64` ticks |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownKind {
    Guid,
    IpAddress,
    BigInteger,
    DateTime,
    TimeSpan,
}

impl KnownKind {
    pub fn name(self) -> &'static str {
        match self {
            KnownKind::Guid => "Guid",
            KnownKind::IpAddress => "IpAddress",
            KnownKind::BigInteger => "BigInteger",
            KnownKind::DateTime => "DateTime",
            KnownKind::TimeSpan => "TimeSpan",
        }
    }

    /// Helper suffix used by generated source (`write_guid`, `read_date_time`).
    pub fn snake_name(self) -> &'static str {
        match self {
            KnownKind::Guid => "guid",
            KnownKind::IpAddress => "ip_address",
            KnownKind::BigInteger => "big_integer",
            KnownKind::DateTime => "date_time",
            KnownKind::TimeSpan => "time_span",
        }
    }
}

/// Declared nullability of a shape occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    #[default]
    NotNull,
    Nullable,
    /// Only legal on unconstrained type parameters.
    Unknown,
}

/// How a decoded element is added to a runtime collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMethod {
    Add,
    Push,
    Enqueue,
}

impl InsertMethod {
    /// Preference order when a collection exposes several.
    pub const PREFERENCE: [InsertMethod; 3] =
        [InsertMethod::Add, InsertMethod::Push, InsertMethod::Enqueue];

    pub fn method_name(self) -> &'static str {
        match self {
            InsertMethod::Add => "add",
            InsertMethod::Push => "push",
            InsertMethod::Enqueue => "enqueue",
        }
    }
}

/// Object declaration kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Struct,
    #[default]
    Class,
    Abstract,
    Interface,
}

impl ObjectKind {
    /// Cannot be instantiated by a decoder.
    pub fn is_abstract(self) -> bool {
        matches!(self, ObjectKind::Abstract | ObjectKind::Interface)
    }
}

/// Field or property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    #[default]
    Field,
    Property,
}
