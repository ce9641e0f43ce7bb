// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value descriptors: the unit every strategy operates on.

use crate::shape::{MemberAttributes, MemberShape, TypeShape};
use std::sync::Arc;

/// Name of the procedure input binding.
pub const INPUT_NAME: &str = "value";

/// Where a described value lives relative to the procedure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A local or the procedure input, looked up by name.
    None,
    /// Member path rooted at the procedure input (`value.a.b`).
    Receiver(Vec<String>),
    /// Member path rooted at a named local (`item.a.b`).
    Named { root: String, chain: Vec<String> },
    /// Member path rooted at a static member of a type.
    Static { type_name: String, chain: Vec<String> },
}

/// A value to encode or decode: its shape, where it lives, and the
/// annotations it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescriptor {
    pub shape: TypeShape,
    pub owner: Owner,
    pub name: String,
    pub attrs: Arc<MemberAttributes>,
}

impl ValueDescriptor {
    /// Procedure input of a top-level procedure.
    pub fn root(shape: TypeShape) -> Self {
        Self::local(INPUT_NAME, shape)
    }

    /// Unannotated local binding.
    pub fn local(name: &str, shape: TypeShape) -> Self {
        Self {
            shape,
            owner: Owner::None,
            name: name.to_string(),
            attrs: Arc::new(MemberAttributes::default()),
        }
    }

    /// Member of an object owned by `owner`.
    pub fn member(member: &MemberShape, owner: Owner) -> Self {
        Self {
            shape: member.shape.clone(),
            owner,
            name: member.name.clone(),
            attrs: Arc::new(member.attrs.clone()),
        }
    }

    /// Static member of `type_name`.
    pub fn static_member(member: &MemberShape, type_name: &str) -> Self {
        Self::member(
            member,
            Owner::Static {
                type_name: type_name.to_string(),
                chain: Vec::new(),
            },
        )
    }

    pub fn is_input(&self) -> bool {
        self.owner == Owner::None && self.name == INPUT_NAME
    }

    /// Owner for members of the value this descriptor describes.
    pub fn child_owner(&self) -> Owner {
        match &self.owner {
            Owner::None if self.is_input() => Owner::Receiver(Vec::new()),
            Owner::None => Owner::Named {
                root: self.name.clone(),
                chain: Vec::new(),
            },
            Owner::Receiver(chain) => Owner::Receiver(extend(chain, &self.name)),
            Owner::Named { root, chain } => Owner::Named {
                root: root.clone(),
                chain: extend(chain, &self.name),
            },
            Owner::Static { type_name, chain } => Owner::Static {
                type_name: type_name.clone(),
                chain: extend(chain, &self.name),
            },
        }
    }

    /// Same location, different shape (after unwrapping or converting).
    #[must_use]
    pub fn with_shape(&self, shape: TypeShape) -> Self {
        Self {
            shape,
            ..self.clone()
        }
    }

    /// Same annotations, bound to a local instead of the original location.
    #[must_use]
    pub fn rebind(&self, local: &str, shape: TypeShape) -> Self {
        Self {
            shape,
            owner: Owner::None,
            name: local.to_string(),
            attrs: Arc::clone(&self.attrs),
        }
    }

    /// Same descriptor with attributes replaced.
    #[must_use]
    pub fn with_attrs(&self, attrs: MemberAttributes) -> Self {
        Self {
            attrs: Arc::new(attrs),
            ..self.clone()
        }
    }

    /// Dotted access path as written in generated source.
    ///
    /// The receiver (procedure input) is not spelled out, matching how a
    /// member is referenced from inside its own type.
    pub fn full_access_path(&self) -> String {
        match &self.owner {
            Owner::None => self.name.clone(),
            Owner::Receiver(chain) => join(None, chain, &self.name),
            Owner::Named { root, chain } => join(Some(root), chain, &self.name),
            Owner::Static { type_name, chain } => {
                let mut out = format!("{}::", type_name);
                out.push_str(&join(None, chain, &self.name));
                out
            }
        }
    }
}

fn extend(chain: &[String], name: &str) -> Vec<String> {
    let mut out = chain.to_vec();
    out.push(name.to_string());
    out
}

fn join(root: Option<&String>, chain: &[String], name: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(chain.len() + 2);
    if let Some(root) = root {
        parts.push(root);
    }
    parts.extend(chain.iter().map(String::as_str));
    parts.push(name);
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::PrimitiveKind;

    fn int() -> TypeShape {
        TypeShape::primitive(PrimitiveKind::I32)
    }

    #[test]
    fn test_access_path_omits_receiver() {
        let root = ValueDescriptor::root(TypeShape::named("Person"));
        let address = ValueDescriptor::member(
            &MemberShape::field("address", TypeShape::named("Address")),
            root.child_owner(),
        );
        let zip = ValueDescriptor::member(&MemberShape::field("zip", int()), address.child_owner());
        assert_eq!(address.full_access_path(), "address");
        assert_eq!(zip.full_access_path(), "address.zip");
    }

    #[test]
    fn test_access_path_from_local() {
        let item = ValueDescriptor::local("item", TypeShape::named("Point"));
        let x = ValueDescriptor::member(&MemberShape::field("x", int()), item.child_owner());
        assert_eq!(x.full_access_path(), "item.x");
    }

    #[test]
    fn test_static_path() {
        let member = MemberShape::field("count", int()).static_member();
        let d = ValueDescriptor::static_member(&member, "Counter");
        assert_eq!(d.full_access_path(), "Counter::count");
    }

    #[test]
    fn test_rebind_keeps_attributes() {
        let mut attrs = MemberAttributes::default();
        attrs.order = Some(3);
        let d = ValueDescriptor::local("x", int()).with_attrs(attrs);
        let r = d.rebind("x__1", int());
        assert_eq!(r.attrs.order, Some(3));
        assert_eq!(r.owner, Owner::None);
    }
}
