// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Member and type annotations that steer strategy selection.
//!
//! Annotations name their behavior (converter, predicate, resolver) rather
//! than carrying it. The text backend renders the names as calls; the
//! compiled backend looks them up in [`crate::Hooks`].

use super::type_shape::TypeShape;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberAttributes {
    /// Exclude from encoding even when public.
    pub ignore: bool,
    /// Include even when not public and readable.
    pub include: bool,
    /// Explicit position; unordered members sort last.
    pub order: Option<i32>,
    pub convert: Option<Conversion>,
    pub version: Option<VersionGate>,
    pub dynamic: Option<DynamicTypes>,
    pub custom: Option<CustomMethods>,
}

impl MemberAttributes {
    pub fn is_empty(&self) -> bool {
        *self == MemberAttributes::default()
    }
}

/// User conversion: encode `converter(value)` instead of the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conversion {
    pub converter: String,
    /// Conversion targets the converter implements.
    pub targets: Vec<TypeShape>,
    /// Selects one of `targets` by type name when there are several.
    #[serde(default)]
    pub convert_to: Option<String>,
    /// Source type the converter expects; must match the member type.
    #[serde(default)]
    pub source: Option<TypeShape>,
}

impl Conversion {
    /// Pick the conversion target: the only one, or the one `convert_to` names.
    pub fn select_target(&self) -> Result<&TypeShape, String> {
        match (&self.convert_to, self.targets.as_slice()) {
            (_, []) => Err(format!("converter '{}' declares no targets", self.converter)),
            (None, [only]) => Ok(only),
            (None, many) => Err(format!(
                "converter '{}' has {} targets and no convert_to selection",
                self.converter,
                many.len()
            )),
            (Some(wanted), targets) => {
                let mut hits = targets.iter().filter(|t| t.type_name() == *wanted);
                match (hits.next(), hits.next()) {
                    (Some(target), None) => Ok(target),
                    (None, _) => Err(format!(
                        "converter '{}' has no target named '{}'",
                        self.converter, wanted
                    )),
                    (Some(_), Some(_)) => Err(format!(
                        "converter '{}' target '{}' is ambiguous",
                        self.converter, wanted
                    )),
                }
            }
        }
    }
}

/// Conditional member: encoded only when `predicate(variables...)` holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionGate {
    pub predicate: String,
    /// Earlier sibling members passed to the predicate.
    #[serde(default)]
    pub variables: Vec<String>,
    /// Default provider used on decode when the predicate is false.
    #[serde(default)]
    pub default: Option<String>,
}

/// Polymorphic candidates and an optional fallback resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicTypes {
    /// Candidate type names; discriminant is position + 1.
    #[serde(default)]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub resolver: Option<ResolverShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolverShape {
    pub name: String,
    /// Exposes a singleton accessor.
    #[serde(default = "default_true")]
    pub singleton: bool,
    /// Identifier written before the resolver payload.
    pub identifier: TypeShape,
    /// Generic parameters left open on the resolver type.
    #[serde(default)]
    pub unresolved_params: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// User-provided encode/decode methods on a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomMethods {
    #[serde(default)]
    pub serialize: Option<String>,
    #[serde(default)]
    pub deserialize: Option<String>,
    pub stream: StreamParam,
}

/// Stream parameter declared by a custom method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamParam {
    /// Concrete stream type, matched by name.
    Exact { type_name: String },
    /// Generic parameter whose constraint must equal the stream capability.
    Generic { constraint: String },
}

impl StreamParam {
    pub fn accepts(&self, stream_type: &str, capability: &str) -> bool {
        match self {
            StreamParam::Exact { type_name } => type_name == stream_type,
            StreamParam::Generic { constraint } => constraint == capability,
        }
    }
}
