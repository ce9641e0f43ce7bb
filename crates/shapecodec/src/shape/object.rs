// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object shapes: user-defined types with members and constructors.

use super::attributes::{CustomMethods, DynamicTypes, MemberAttributes};
use super::kind::{MemberKind, ObjectKind};
use super::type_shape::{ShapeKind, TypeShape};
use crate::error::ShapeError;
use serde::{Deserialize, Serialize};

/// A user-defined type.
///
/// Classes and structs without explicit constructors get an implicit
/// parameterless one (both through [`ObjectShapeBuilder`] and when loaded
/// from a schema file with no `constructors` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectShape {
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    /// Contains no managed references (eligible for raw copies).
    #[serde(default)]
    pub unmanaged: bool,
    #[serde(default)]
    pub base: Option<TypeShape>,
    /// Carries its own generated codec (stops member flattening).
    #[serde(default)]
    pub generates_codec: bool,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub members: Vec<MemberShape>,
    #[serde(default = "implicit_constructors")]
    pub constructors: Vec<ConstructorShape>,
    #[serde(default)]
    pub custom: Option<CustomMethods>,
    #[serde(default)]
    pub dynamic: Option<DynamicTypes>,
}

fn implicit_constructors() -> Vec<ConstructorShape> {
    vec![ConstructorShape::default()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberShape {
    pub name: String,
    pub shape: TypeShape,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default = "default_true")]
    pub readable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub attrs: MemberAttributes,
}

fn default_true() -> bool {
    true
}

impl MemberShape {
    /// Public read/write instance field.
    pub fn field(name: &str, shape: TypeShape) -> Self {
        Self {
            name: name.to_string(),
            shape,
            kind: MemberKind::Field,
            public: true,
            readable: true,
            writable: true,
            is_static: false,
            attrs: MemberAttributes::default(),
        }
    }

    /// Public read/write instance property.
    pub fn property(name: &str, shape: TypeShape) -> Self {
        Self {
            kind: MemberKind::Property,
            ..Self::field(name, shape)
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    #[must_use]
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: MemberAttributes) -> Self {
        self.attrs = attrs;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorShape {
    #[serde(default)]
    pub params: Vec<ParamShape>,
    /// Explicitly marked as the preferred constructor.
    #[serde(default)]
    pub preferred: bool,
}

impl ConstructorShape {
    pub fn with_params(names: &[&str]) -> Self {
        Self {
            params: names.iter().map(|n| ParamShape::new(n)).collect(),
            preferred: false,
        }
    }

    #[must_use]
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamShape {
    pub name: String,
    /// Member name this parameter binds to, overriding name matching.
    #[serde(default)]
    pub rename: Option<String>,
}

impl ParamShape {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rename: None,
        }
    }

    /// Name used when matching decoded members.
    pub fn match_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

impl ObjectShape {
    pub fn class(name: &str) -> ObjectShapeBuilder {
        ObjectShapeBuilder::new(name, ObjectKind::Class)
    }

    pub fn structure(name: &str) -> ObjectShapeBuilder {
        ObjectShapeBuilder::new(name, ObjectKind::Struct)
    }

    pub fn abstract_class(name: &str) -> ObjectShapeBuilder {
        ObjectShapeBuilder::new(name, ObjectKind::Abstract).no_default_constructor()
    }

    pub fn interface(name: &str) -> ObjectShapeBuilder {
        ObjectShapeBuilder::new(name, ObjectKind::Interface).no_default_constructor()
    }

    pub fn member(&self, name: &str) -> Option<&MemberShape> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.name.is_empty() {
            return Err(ShapeError::Invalid {
                shape: self.name.clone(),
                reason: "type name is empty".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for member in &self.members {
            if !seen.insert(member.name.as_str()) {
                return Err(ShapeError::Invalid {
                    shape: self.name.clone(),
                    reason: format!("duplicate member '{}'", member.name),
                });
            }
            member.shape.validate()?;
            if let ShapeKind::Param { name } = &member.shape.kind {
                if !self.type_params.contains(name) {
                    return Err(ShapeError::Invalid {
                        shape: self.name.clone(),
                        reason: format!("member '{}' uses undeclared parameter '{}'", member.name, name),
                    });
                }
            }
        }
        if let Some(base) = &self.base {
            if base.named_ref().is_none() {
                return Err(ShapeError::Invalid {
                    shape: self.name.clone(),
                    reason: format!("base '{}' is not an object type", base.type_name()),
                });
            }
            if self.kind == ObjectKind::Struct {
                return Err(ShapeError::Invalid {
                    shape: self.name.clone(),
                    reason: "structs cannot have a base type".into(),
                });
            }
        }
        Ok(())
    }
}

/// Fluent construction of [`ObjectShape`]s.
#[derive(Debug)]
pub struct ObjectShapeBuilder {
    shape: ObjectShape,
    default_ctor: bool,
}

impl ObjectShapeBuilder {
    fn new(name: &str, kind: ObjectKind) -> Self {
        Self {
            shape: ObjectShape {
                name: name.to_string(),
                kind,
                unmanaged: false,
                base: None,
                generates_codec: false,
                type_params: Vec::new(),
                members: Vec::new(),
                constructors: Vec::new(),
                custom: None,
                dynamic: None,
            },
            default_ctor: true,
        }
    }

    pub fn field(mut self, name: &str, shape: TypeShape) -> Self {
        self.shape.members.push(MemberShape::field(name, shape));
        self
    }

    pub fn property(mut self, name: &str, shape: TypeShape) -> Self {
        self.shape.members.push(MemberShape::property(name, shape));
        self
    }

    pub fn member(mut self, member: MemberShape) -> Self {
        self.shape.members.push(member);
        self
    }

    /// Add an explicit constructor.
    pub fn constructor(mut self, ctor: ConstructorShape) -> Self {
        self.shape.constructors.push(ctor);
        self
    }

    /// Explicit constructors replace the implicit parameterless one.
    pub fn no_default_constructor(mut self) -> Self {
        self.default_ctor = false;
        self
    }

    pub fn base(mut self, base: TypeShape) -> Self {
        self.shape.base = Some(base);
        self
    }

    pub fn unmanaged(mut self) -> Self {
        self.shape.unmanaged = true;
        self
    }

    pub fn generates_codec(mut self) -> Self {
        self.shape.generates_codec = true;
        self
    }

    pub fn type_param(mut self, name: &str) -> Self {
        self.shape.type_params.push(name.to_string());
        self
    }

    pub fn custom(mut self, custom: CustomMethods) -> Self {
        self.shape.custom = Some(custom);
        self
    }

    pub fn dynamic(mut self, dynamic: DynamicTypes) -> Self {
        self.shape.dynamic = Some(dynamic);
        self
    }

    pub fn build(mut self) -> ObjectShape {
        if self.shape.constructors.is_empty() && self.default_ctor {
            self.shape.constructors.push(ConstructorShape::default());
        }
        self.shape
    }
}
