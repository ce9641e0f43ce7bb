// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry of object shapes, keyed by type name.

use super::object::ObjectShape;
use super::type_shape::TypeShape;
use crate::error::ShapeError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const MAX_BASE_DEPTH: usize = 256;

/// On-disk schema: a list of object shapes.
///
/// ```toml
/// [[types]]
/// name = "Person"
///
/// [[types.members]]
/// name = "name"
/// shape = { kind = "primitive", primitive = "string" }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<ObjectShape>,
}

#[derive(Debug, Default, Clone)]
pub struct ShapeRegistry {
    types: HashMap<String, Arc<ObjectShape>>,
    order: Vec<String>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, shape: ObjectShape) -> Result<(), ShapeError> {
        shape.validate()?;
        if self.types.contains_key(&shape.name) {
            return Err(ShapeError::Duplicate(shape.name));
        }
        log::debug!("[ShapeRegistry::register] {}", shape.name);
        self.order.push(shape.name.clone());
        self.types.insert(shape.name.clone(), Arc::new(shape));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ObjectShape>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered shapes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ObjectShape>> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Whether `name` inherits from `ancestor`, directly or through other bases.
    pub fn derives_from(&self, name: &str, ancestor: &str) -> bool {
        let mut current = self.get(name);
        for _ in 0..MAX_BASE_DEPTH {
            let Some(base) = current.and_then(|o| o.base.as_ref()) else {
                return false;
            };
            if base.base_name() == ancestor {
                return true;
            }
            current = base.named_ref().and_then(|(base_name, _)| self.get(base_name));
        }
        false
    }

    /// Registered types deriving from `ancestor`, in registration order.
    pub fn subtypes_of(&self, ancestor: &str) -> Vec<String> {
        self.iter()
            .filter(|o| self.derives_from(&o.name, ancestor))
            .map(|o| o.name.clone())
            .collect()
    }

    /// Resolve a named occurrence to its object shape, instantiating generics.
    pub fn resolve(&self, shape: &TypeShape) -> Result<Arc<ObjectShape>, ShapeError> {
        let Some((name, args)) = shape.named_ref() else {
            return Err(ShapeError::Invalid {
                shape: shape.type_name(),
                reason: "not an object type".into(),
            });
        };
        let object = self
            .types
            .get(name)
            .ok_or_else(|| ShapeError::UnknownType(name.to_string()))?;
        if args.len() != object.type_params.len() {
            return Err(ShapeError::ArityMismatch {
                name: name.to_string(),
                expected: object.type_params.len(),
                got: args.len(),
            });
        }
        if args.is_empty() {
            return Ok(Arc::clone(object));
        }
        Ok(Arc::new(Self::instantiate(object, shape)))
    }

    /// Substitute type arguments into a generic definition.
    ///
    /// The instance is named after the occurrence (`Box<i32>`) and has no
    /// remaining type parameters.
    fn instantiate(definition: &ObjectShape, occurrence: &TypeShape) -> ObjectShape {
        let args = occurrence.named_ref().map(|(_, a)| a).unwrap_or_default();
        let bindings: Vec<(String, TypeShape)> = definition
            .type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();

        let mut instance = definition.clone();
        instance.name = occurrence.base_name();
        instance.type_params.clear();
        instance.base = definition.base.as_ref().map(|b| b.substitute(&bindings));
        for member in &mut instance.members {
            member.shape = member.shape.substitute(&bindings);
        }
        instance
    }

    /// Named occurrences an object's codec may need to reach.
    pub fn references(object: &ObjectShape) -> Vec<TypeShape> {
        let mut out = Vec::new();
        let mut push_named = |shape: &TypeShape| {
            shape.for_each_named(&mut |named: &TypeShape| out.push(named.non_null()));
        };
        if let Some(base) = &object.base {
            push_named(base);
        }
        for member in &object.members {
            push_named(&member.shape);
            if let Some(conv) = &member.attrs.convert {
                conv.targets.iter().for_each(&mut push_named);
            }
            if let Some(dynamic) = &member.attrs.dynamic {
                for candidate in &dynamic.candidates {
                    push_named(&TypeShape::named(candidate));
                }
            }
        }
        if let Some(dynamic) = &object.dynamic {
            for candidate in &dynamic.candidates {
                push_named(&TypeShape::named(candidate));
            }
        }
        out
    }

    /// Whether a named type can reach itself through its members.
    pub fn is_recursive(&self, shape: &TypeShape) -> bool {
        let target = shape.base_name();
        let Ok(root) = self.resolve(&shape.non_null()) else {
            return false;
        };
        let mut visited = HashSet::new();
        let mut pending = Self::references(&root);
        while let Some(next) = pending.pop() {
            let name = next.base_name();
            if name == target {
                return true;
            }
            if !visited.insert(name) {
                continue;
            }
            if let Ok(object) = self.resolve(&next) {
                pending.extend(Self::references(&object));
            }
        }
        false
    }

    pub fn from_schema(schema: SchemaFile) -> Result<Self, ShapeError> {
        let mut registry = Self::new();
        for shape in schema.types {
            registry.register(shape)?;
        }
        Ok(registry)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ShapeError> {
        let schema: SchemaFile =
            toml::from_str(text).map_err(|e| ShapeError::Parse(e.to_string()))?;
        Self::from_schema(schema)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ShapeError> {
        let schema: SchemaFile =
            serde_json::from_str(text).map_err(|e| ShapeError::Parse(e.to_string()))?;
        Self::from_schema(schema)
    }

    /// Load a `.toml` or `.json` schema file (chosen by extension).
    pub fn from_file(path: &Path) -> Result<Self, ShapeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShapeError::Parse(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn to_schema(&self) -> SchemaFile {
        SchemaFile {
            types: self.iter().map(|s| ObjectShape::clone(s)).collect(),
        }
    }
}
