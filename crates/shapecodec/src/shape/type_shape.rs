// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type shape: the classification of one type occurrence.

use super::kind::{InsertMethod, KnownKind, Nullability, PrimitiveKind};
use crate::error::ShapeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shape of a type occurrence (member type, element type, root type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeShape {
    #[serde(flatten)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub nullability: Nullability,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeKind {
    Primitive {
        primitive: PrimitiveKind,
    },
    Enum(EnumShape),
    Known {
        known: KnownKind,
    },
    Array {
        element: Arc<TypeShape>,
        #[serde(default = "default_rank")]
        rank: usize,
    },
    Collection(CollectionShape),
    Dictionary(DictionaryShape),
    /// Value-type optional wrapper around `inner`.
    NullableWrapper {
        inner: Arc<TypeShape>,
    },
    /// Reference to a registered object type, optionally instantiated.
    Named {
        name: String,
        #[serde(default)]
        args: Vec<TypeShape>,
    },
    /// Unsubstituted generic parameter.
    Param {
        name: String,
    },
}

fn default_rank() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumShape {
    pub name: String,
    pub underlying: PrimitiveKind,
    #[serde(default)]
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// Single-element-type collection (list, set, stack, queue).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionShape {
    #[serde(default = "default_collection_name")]
    pub name: String,
    pub element: Arc<TypeShape>,
    #[serde(default = "default_inserts")]
    pub inserts: Vec<InsertMethod>,
    /// Exposes a `(capacity)` constructor.
    #[serde(default = "default_true")]
    pub capacity_constructor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryShape {
    #[serde(default = "default_dictionary_name")]
    pub name: String,
    pub key: Arc<TypeShape>,
    pub value: Arc<TypeShape>,
    #[serde(default = "default_true")]
    pub capacity_constructor: bool,
}

fn default_collection_name() -> String {
    "List".to_string()
}

fn default_dictionary_name() -> String {
    "Dictionary".to_string()
}

fn default_inserts() -> Vec<InsertMethod> {
    vec![InsertMethod::Add]
}

fn default_true() -> bool {
    true
}

/// Procedure registration key: non-null type name plus nullability bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    pub name: Arc<str>,
    pub nullable: bool,
}

impl TypeKey {
    pub fn new(name: impl Into<Arc<str>>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl TypeShape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            nullability: Nullability::NotNull,
        }
    }

    pub fn primitive(primitive: PrimitiveKind) -> Self {
        Self::new(ShapeKind::Primitive { primitive })
    }

    pub fn known(known: KnownKind) -> Self {
        Self::new(ShapeKind::Known { known })
    }

    pub fn enumeration(name: &str, underlying: PrimitiveKind, variants: &[(&str, i64)]) -> Self {
        Self::new(ShapeKind::Enum(EnumShape {
            name: name.to_string(),
            underlying,
            variants: variants
                .iter()
                .map(|(n, v)| EnumVariant {
                    name: (*n).to_string(),
                    value: *v,
                })
                .collect(),
        }))
    }

    pub fn named(name: &str) -> Self {
        Self::new(ShapeKind::Named {
            name: name.to_string(),
            args: Vec::new(),
        })
    }

    pub fn generic(name: &str, args: Vec<TypeShape>) -> Self {
        Self::new(ShapeKind::Named {
            name: name.to_string(),
            args,
        })
    }

    pub fn param(name: &str) -> Self {
        Self {
            kind: ShapeKind::Param {
                name: name.to_string(),
            },
            nullability: Nullability::Unknown,
        }
    }

    pub fn array(element: TypeShape, rank: usize) -> Self {
        Self::new(ShapeKind::Array {
            element: Arc::new(element),
            rank,
        })
    }

    /// `List<element>` with `Add` and a capacity constructor.
    pub fn list(element: TypeShape) -> Self {
        Self::collection("List", element, &[InsertMethod::Add])
    }

    pub fn collection(name: &str, element: TypeShape, inserts: &[InsertMethod]) -> Self {
        Self::new(ShapeKind::Collection(CollectionShape {
            name: name.to_string(),
            element: Arc::new(element),
            inserts: inserts.to_vec(),
            capacity_constructor: true,
        }))
    }

    pub fn dictionary(key: TypeShape, value: TypeShape) -> Self {
        Self::new(ShapeKind::Dictionary(DictionaryShape {
            name: default_dictionary_name(),
            key: Arc::new(key),
            value: Arc::new(value),
            capacity_constructor: true,
        }))
    }

    /// Value-type optional (`Nullable<inner>`).
    pub fn wrapper(inner: TypeShape) -> Self {
        Self {
            kind: ShapeKind::NullableWrapper {
                inner: Arc::new(inner),
            },
            nullability: Nullability::Nullable,
        }
    }

    /// Same shape, marked nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullability = Nullability::Nullable;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullability == Nullability::Nullable
    }

    /// Same shape with nullability cleared.
    pub fn non_null(&self) -> TypeShape {
        TypeShape {
            kind: self.kind.clone(),
            nullability: Nullability::NotNull,
        }
    }

    /// Canonical type name without the nullability marker.
    pub fn base_name(&self) -> String {
        match &self.kind {
            ShapeKind::Primitive { primitive } => primitive.name().to_string(),
            ShapeKind::Enum(e) => e.name.clone(),
            ShapeKind::Known { known } => known.name().to_string(),
            ShapeKind::Array { element, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1));
                format!("{}[{}]", element.type_name(), commas)
            }
            ShapeKind::Collection(c) => format!("{}<{}>", c.name, c.element.type_name()),
            ShapeKind::Dictionary(d) => {
                format!("{}<{}, {}>", d.name, d.key.type_name(), d.value.type_name())
            }
            ShapeKind::NullableWrapper { inner } => inner.base_name(),
            ShapeKind::Named { name, args } => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let args: Vec<String> = args.iter().map(TypeShape::type_name).collect();
                    format!("{}<{}>", name, args.join(", "))
                }
            }
            ShapeKind::Param { name } => name.clone(),
        }
    }

    /// Canonical type name including a trailing `?` when nullable.
    pub fn type_name(&self) -> String {
        if self.is_nullable() {
            format!("{}?", self.base_name())
        } else {
            self.base_name()
        }
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::new(self.base_name(), self.is_nullable())
    }

    /// Registered object name, when this is a plain reference.
    pub fn named_ref(&self) -> Option<(&str, &[TypeShape])> {
        match &self.kind {
            ShapeKind::Named { name, args } => Some((name.as_str(), args.as_slice())),
            _ => None,
        }
    }

    /// Check structural invariants of this occurrence and its children.
    ///
    /// - `Unknown` nullability only on type parameters.
    /// - Nullable wrappers are always nullable and never nest.
    /// - Arrays have rank >= 1, enums an integer underlying type.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let is_param = matches!(self.kind, ShapeKind::Param { .. });
        if self.nullability == Nullability::Unknown && !is_param {
            return Err(ShapeError::InvalidNullability {
                shape: self.base_name(),
                reason: "unknown nullability is only allowed on type parameters".into(),
            });
        }

        match &self.kind {
            ShapeKind::Primitive { .. } | ShapeKind::Known { .. } | ShapeKind::Param { .. } => {
                Ok(())
            }
            ShapeKind::Enum(e) => {
                if e.underlying.is_integer() {
                    Ok(())
                } else {
                    Err(ShapeError::Invalid {
                        shape: e.name.clone(),
                        reason: format!("enum underlying type must be an integer, got {}", e.underlying),
                    })
                }
            }
            ShapeKind::Array { element, rank } => {
                if *rank == 0 {
                    return Err(ShapeError::Invalid {
                        shape: self.base_name(),
                        reason: "array rank must be at least 1".into(),
                    });
                }
                element.validate()
            }
            ShapeKind::Collection(c) => c.element.validate(),
            ShapeKind::Dictionary(d) => {
                d.key.validate()?;
                d.value.validate()
            }
            ShapeKind::NullableWrapper { inner } => {
                if !self.is_nullable() {
                    return Err(ShapeError::InvalidNullability {
                        shape: self.base_name(),
                        reason: "nullable wrapper must be nullable".into(),
                    });
                }
                if inner.is_nullable() || matches!(inner.kind, ShapeKind::NullableWrapper { .. }) {
                    return Err(ShapeError::InvalidNullability {
                        shape: self.base_name(),
                        reason: "nullable wrapper cannot wrap a nullable shape".into(),
                    });
                }
                inner.validate()
            }
            ShapeKind::Named { args, .. } => args.iter().try_for_each(TypeShape::validate),
        }
    }

    /// Replace type parameters using `bindings` (name -> shape).
    ///
    /// A nullable parameter occurrence stays nullable after substitution.
    pub fn substitute(&self, bindings: &[(String, TypeShape)]) -> TypeShape {
        let kind = match &self.kind {
            ShapeKind::Param { name } => {
                if let Some((_, bound)) = bindings.iter().find(|(n, _)| n == name) {
                    let mut out = bound.clone();
                    if self.is_nullable() {
                        out.nullability = Nullability::Nullable;
                    }
                    return out;
                }
                self.kind.clone()
            }
            ShapeKind::Array { element, rank } => ShapeKind::Array {
                element: Arc::new(element.substitute(bindings)),
                rank: *rank,
            },
            ShapeKind::Collection(c) => ShapeKind::Collection(CollectionShape {
                element: Arc::new(c.element.substitute(bindings)),
                ..c.clone()
            }),
            ShapeKind::Dictionary(d) => ShapeKind::Dictionary(DictionaryShape {
                key: Arc::new(d.key.substitute(bindings)),
                value: Arc::new(d.value.substitute(bindings)),
                ..d.clone()
            }),
            ShapeKind::NullableWrapper { inner } => ShapeKind::NullableWrapper {
                inner: Arc::new(inner.substitute(bindings)),
            },
            ShapeKind::Named { name, args } => ShapeKind::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            other => other.clone(),
        };
        TypeShape {
            kind,
            nullability: self.nullability,
        }
    }

    /// Visit every named reference reachable inside this occurrence.
    pub fn for_each_named<'a>(&'a self, f: &mut dyn FnMut(&'a TypeShape)) {
        match &self.kind {
            ShapeKind::Named { args, .. } => {
                f(self);
                for arg in args {
                    arg.for_each_named(f);
                }
            }
            ShapeKind::Array { element, .. } => element.for_each_named(f),
            ShapeKind::Collection(c) => c.element.for_each_named(f),
            ShapeKind::Dictionary(d) => {
                d.key.for_each_named(f);
                d.value.for_each_named(f);
            }
            ShapeKind::NullableWrapper { inner } => inner.for_each_named(f),
            _ => {}
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let person = TypeShape::named("Person");
        assert_eq!(person.type_name(), "Person");
        assert_eq!(person.clone().nullable().type_name(), "Person?");
        assert_eq!(TypeShape::list(person.clone()).type_name(), "List<Person>");
        assert_eq!(
            TypeShape::array(TypeShape::primitive(PrimitiveKind::I32), 3).type_name(),
            "i32[,,]"
        );
        assert_eq!(
            TypeShape::dictionary(TypeShape::primitive(PrimitiveKind::String), person).type_name(),
            "Dictionary<string, Person>"
        );
        assert_eq!(
            TypeShape::wrapper(TypeShape::primitive(PrimitiveKind::I32)).type_name(),
            "i32?"
        );
    }

    #[test]
    fn test_key_separates_nullability() {
        let a = TypeShape::named("Node").key();
        let b = TypeShape::named("Node").nullable().key();
        assert_ne!(a, b);
        assert_eq!(a.name, b.name);
        assert_eq!(b.to_string(), "Node?");
    }

    #[test]
    fn test_unknown_nullability_only_on_params() {
        assert!(TypeShape::param("T").validate().is_ok());
        let mut bad = TypeShape::named("Person");
        bad.nullability = Nullability::Unknown;
        assert!(matches!(
            bad.validate(),
            Err(ShapeError::InvalidNullability { .. })
        ));
    }

    #[test]
    fn test_wrapper_cannot_nest() {
        let inner = TypeShape::wrapper(TypeShape::primitive(PrimitiveKind::I32));
        assert!(TypeShape::wrapper(inner).validate().is_err());
    }

    #[test]
    fn test_substitute_keeps_nullable_marker() {
        let shape = TypeShape::list(TypeShape::param("T").nullable());
        let bound = shape.substitute(&[("T".into(), TypeShape::named("Person"))]);
        assert_eq!(bound.type_name(), "List<Person?>");
    }

    #[test]
    fn test_shape_from_toml() {
        let shape: TypeShape = toml::from_str(
            r#"
kind = "collection"
element = { kind = "named", name = "Person", nullability = "nullable" }
"#,
        )
        .expect("parse");
        assert_eq!(shape.type_name(), "List<Person?>");
    }
}
