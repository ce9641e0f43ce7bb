// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory layout of unmanaged structs.
//!
//! A struct qualifies for raw copying only when every instance member is a
//! fixed-size scalar, enum, fixed-size known type, or another qualifying
//! struct. Fields use sequential layout: each at its natural alignment, the
//! struct aligned to its widest field and padded to a multiple of it.

use crate::shape::{KnownKind, ObjectKind, ObjectShape, PrimitiveKind, ShapeKind, ShapeRegistry};
use std::sync::Arc;

/// Raw scalar stored at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitScalar {
    Primitive(PrimitiveKind),
    /// Enum stored as its underlying integer.
    Enum(PrimitiveKind),
    Guid,
    /// `DateTime` / `TimeSpan` as `i64` ticks.
    Ticks(KnownKind),
}

impl BlitScalar {
    pub fn size(self) -> usize {
        match self {
            BlitScalar::Primitive(p) | BlitScalar::Enum(p) => p.fixed_size().unwrap_or(0),
            BlitScalar::Guid => 16,
            BlitScalar::Ticks(_) => 8,
        }
    }

    pub fn align(self) -> usize {
        match self {
            BlitScalar::Guid => 4,
            other => other.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlitField {
    /// Member path from the struct root (`["pos", "x"]`).
    pub path: Vec<String>,
    /// Type names along `path`, excluding the scalar itself.
    pub owners: Vec<String>,
    pub scalar: BlitScalar,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlitLayout {
    pub type_name: String,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<BlitField>,
}

/// Compute the layout of `object`, or the reason it does not qualify.
pub fn compute(registry: &ShapeRegistry, object: &ObjectShape) -> Result<Arc<BlitLayout>, String> {
    let mut visiting = Vec::new();
    compute_inner(registry, object, &mut visiting).map(Arc::new)
}

fn compute_inner(
    registry: &ShapeRegistry,
    object: &ObjectShape,
    visiting: &mut Vec<String>,
) -> Result<BlitLayout, String> {
    if object.kind != ObjectKind::Struct || !object.unmanaged {
        return Err(format!("'{}' is not an unmanaged struct", object.name));
    }
    if object.base.is_some() {
        return Err(format!("'{}' has a base type", object.name));
    }
    if visiting.contains(&object.name) {
        return Err(format!("'{}' contains itself", object.name));
    }
    visiting.push(object.name.clone());

    let mut fields = Vec::new();
    let mut offset = 0usize;
    let mut align = 1usize;

    for member in object.members.iter().filter(|m| !m.is_static) {
        if member.shape.is_nullable() {
            return Err(format!("'{}.{}' is nullable", object.name, member.name));
        }
        let scalar = match &member.shape.kind {
            ShapeKind::Primitive { primitive } if *primitive != PrimitiveKind::String => {
                Some(BlitScalar::Primitive(*primitive))
            }
            ShapeKind::Enum(e) => Some(BlitScalar::Enum(e.underlying)),
            ShapeKind::Known {
                known: KnownKind::Guid,
            } => Some(BlitScalar::Guid),
            ShapeKind::Known {
                known: known @ (KnownKind::DateTime | KnownKind::TimeSpan),
            } => Some(BlitScalar::Ticks(*known)),
            ShapeKind::Named { .. } => None,
            _ => {
                return Err(format!(
                    "'{}.{}' of type {} holds references",
                    object.name,
                    member.name,
                    member.shape.type_name()
                ))
            }
        };

        match scalar {
            Some(scalar) => {
                let a = scalar.align();
                offset = round_up(offset, a);
                align = align.max(a);
                fields.push(BlitField {
                    path: vec![member.name.clone()],
                    owners: vec![object.name.clone()],
                    scalar,
                    offset,
                });
                offset += scalar.size();
            }
            None => {
                let nested_shape = registry.resolve(&member.shape).map_err(|e| e.to_string())?;
                let nested = compute_inner(registry, &nested_shape, visiting)?;
                offset = round_up(offset, nested.align);
                align = align.max(nested.align);
                for field in nested.fields {
                    let mut path = vec![member.name.clone()];
                    path.extend(field.path);
                    let mut owners = vec![object.name.clone()];
                    owners.extend(field.owners);
                    fields.push(BlitField {
                        path,
                        owners,
                        scalar: field.scalar,
                        offset: offset + field.offset,
                    });
                }
                offset += nested.size;
            }
        }
    }

    visiting.pop();
    Ok(BlitLayout {
        type_name: object.name.clone(),
        size: round_up(offset, align),
        align,
        fields,
    })
}

fn round_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TypeShape;

    fn registry() -> ShapeRegistry {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::structure("Vec2")
                    .unmanaged()
                    .field("x", TypeShape::primitive(PrimitiveKind::F32))
                    .field("y", TypeShape::primitive(PrimitiveKind::F32))
                    .build(),
            )
            .expect("register");
        registry
            .register(
                ObjectShape::structure("Particle")
                    .unmanaged()
                    .field("alive", TypeShape::primitive(PrimitiveKind::Bool))
                    .field("pos", TypeShape::named("Vec2"))
                    .field("id", TypeShape::primitive(PrimitiveKind::I64))
                    .build(),
            )
            .expect("register");
        registry
            .register(
                ObjectShape::structure("Named")
                    .unmanaged()
                    .field("name", TypeShape::primitive(PrimitiveKind::String))
                    .build(),
            )
            .expect("register");
        registry
    }

    #[test]
    fn test_natural_alignment_and_padding() {
        let registry = registry();
        let particle = registry.get("Particle").expect("particle");
        let layout = compute(&registry, particle).expect("layout");
        // bool @0, Vec2 @4 (align 4), i64 @16 (align 8), size 24
        let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 16]);
        assert_eq!(layout.align, 8);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.fields[1].path, vec!["pos".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_strings_are_refused() {
        let registry = registry();
        let named = registry.get("Named").expect("named");
        assert!(compute(&registry, named).is_err());
    }

    #[test]
    fn test_managed_struct_is_refused() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::structure("Plain")
                    .field("x", TypeShape::primitive(PrimitiveKind::I32))
                    .build(),
            )
            .expect("register");
        let plain = registry.get("Plain").expect("plain");
        assert!(compute(&registry, plain).is_err());
    }
}
