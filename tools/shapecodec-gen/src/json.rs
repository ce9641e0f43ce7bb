// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Plain JSON <-> [`Value`] conversion.
//!
//! Input is read against the target shape, so `5` becomes an `i32` or a
//! `u8` depending on where it appears. Output needs no shape.
//!
//! | Shape | JSON |
//! |-------|------|
//! | enum | variant name or underlying number |
//! | Guid, BigInteger | hex string |
//! | IpAddress | dotted or colon string |
//! | DateTime, TimeSpan | ticks |
//! | dictionary | object (string keys) or `[[key, value], ...]` |
//! | multi-rank array | `{"dims": [..], "items": [..]}` |
//! | object | object; `"$type"` picks a derived type |

use anyhow::{anyhow, bail, Context};
use serde_json::{Map, Number, Value as Json};
use shapecodec::shape::{KnownKind, PrimitiveKind, ShapeKind};
use shapecodec::{MemberShape, Object, ShapeRegistry, TypeShape, Value};
use std::sync::Arc;

/// Key naming the runtime type of an object.
pub const TYPE_KEY: &str = "$type";

const MAX_INHERITANCE_DEPTH: usize = 256;

pub fn to_value(registry: &ShapeRegistry, shape: &TypeShape, json: &Json) -> anyhow::Result<Value> {
    if json.is_null() {
        if shape.is_nullable() || matches!(shape.kind, ShapeKind::NullableWrapper { .. }) {
            return Ok(Value::Null);
        }
        bail!("null given for non-nullable {}", shape.type_name());
    }

    match &shape.kind {
        ShapeKind::Primitive { primitive } => primitive_value(*primitive, json),
        ShapeKind::Enum(e) => {
            let value = match json {
                Json::String(name) => e
                    .variants
                    .iter()
                    .find(|v| v.name == *name)
                    .map(|v| v.value)
                    .ok_or_else(|| anyhow!("'{}' is not a variant of {}", name, e.name))?,
                other => other
                    .as_i64()
                    .ok_or_else(|| anyhow!("expected a variant of {}, got {}", e.name, other))?,
            };
            Ok(Value::Enum(value))
        }
        ShapeKind::Known { known } => known_value(*known, json),
        ShapeKind::Array { element, rank } => {
            if *rank <= 1 {
                return Ok(Value::List(items(registry, element, json)?));
            }
            let dims: Vec<usize> = serde_json::from_value(
                json.get("dims")
                    .cloned()
                    .ok_or_else(|| anyhow!("multi-rank array needs \"dims\""))?,
            )
            .context("array dims")?;
            if dims.len() != *rank {
                bail!("expected {} dims, got {}", rank, dims.len());
            }
            let values = items(
                registry,
                element,
                json.get("items")
                    .ok_or_else(|| anyhow!("multi-rank array needs \"items\""))?,
            )?;
            if dims.iter().product::<usize>() != values.len() {
                bail!("dims {:?} do not match {} items", dims, values.len());
            }
            Ok(Value::Array {
                dims,
                items: values,
            })
        }
        ShapeKind::Collection(c) => Ok(Value::List(items(registry, &c.element, json)?)),
        ShapeKind::Dictionary(d) => {
            let entries = match json {
                Json::Object(map) => map
                    .iter()
                    .map(|(k, v)| -> anyhow::Result<(Value, Value)> {
                        Ok((
                            to_value(registry, &d.key, &Json::String(k.clone()))?,
                            to_value(registry, &d.value, v)?,
                        ))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?,
                Json::Array(pairs) => pairs
                    .iter()
                    .map(|pair| -> anyhow::Result<(Value, Value)> {
                        match pair.as_array().map(Vec::as_slice) {
                            Some([k, v]) => Ok((
                                to_value(registry, &d.key, k)?,
                                to_value(registry, &d.value, v)?,
                            )),
                            _ => bail!("dictionary entries must be [key, value] pairs"),
                        }
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?,
                other => bail!("expected a dictionary, got {}", other),
            };
            Ok(Value::Map(entries))
        }
        ShapeKind::NullableWrapper { inner } => to_value(registry, inner, json),
        ShapeKind::Named { .. } => object_value(registry, shape, json),
        ShapeKind::Param { name } => bail!("unbound type parameter {}", name),
    }
}

fn items(registry: &ShapeRegistry, element: &TypeShape, json: &Json) -> anyhow::Result<Vec<Value>> {
    json.as_array()
        .ok_or_else(|| anyhow!("expected an array, got {}", json))?
        .iter()
        .map(|item| to_value(registry, element, item))
        .collect()
}

fn primitive_value(kind: PrimitiveKind, json: &Json) -> anyhow::Result<Value> {
    let int = || {
        json.as_i64()
            .ok_or_else(|| anyhow!("expected {}, got {}", kind, json))
    };
    let out_of_range = |v: i64| anyhow!("{} out of range for {}", v, kind);
    Ok(match kind {
        PrimitiveKind::Bool => Value::Bool(
            json.as_bool()
                .ok_or_else(|| anyhow!("expected bool, got {}", json))?,
        ),
        PrimitiveKind::I8 => Value::I8(int().and_then(|v| i8::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::U8 => Value::U8(int().and_then(|v| u8::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::I16 => Value::I16(int().and_then(|v| i16::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::U16 => Value::U16(int().and_then(|v| u16::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::I32 => Value::I32(int().and_then(|v| i32::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::U32 => Value::U32(int().and_then(|v| u32::try_from(v).map_err(|_| out_of_range(v)))?),
        PrimitiveKind::I64 => Value::I64(int()?),
        PrimitiveKind::U64 => Value::U64(
            json.as_u64()
                .ok_or_else(|| anyhow!("expected u64, got {}", json))?,
        ),
        PrimitiveKind::F32 => Value::F32(
            json.as_f64()
                .ok_or_else(|| anyhow!("expected f32, got {}", json))? as f32,
        ),
        PrimitiveKind::F64 => Value::F64(
            json.as_f64()
                .ok_or_else(|| anyhow!("expected f64, got {}", json))?,
        ),
        PrimitiveKind::String => Value::String(
            json.as_str()
                .ok_or_else(|| anyhow!("expected string, got {}", json))?
                .to_string(),
        ),
    })
}

fn known_value(kind: KnownKind, json: &Json) -> anyhow::Result<Value> {
    let text = || {
        json.as_str()
            .ok_or_else(|| anyhow!("expected {} as a string, got {}", kind.name(), json))
    };
    let ticks = || {
        json.as_i64()
            .ok_or_else(|| anyhow!("expected {} ticks, got {}", kind.name(), json))
    };
    Ok(match kind {
        KnownKind::Guid => {
            let bytes = crate::hex::decode(&text()?.replace('-', ""))?;
            let guid: [u8; 16] = bytes
                .try_into()
                .map_err(|_| anyhow!("a Guid is 16 bytes"))?;
            Value::Guid(guid)
        }
        KnownKind::IpAddress => Value::Ip(text()?.parse().context("IP address")?),
        KnownKind::BigInteger => Value::BigInt(crate::hex::decode(text()?)?),
        KnownKind::DateTime => Value::DateTime(ticks()?),
        KnownKind::TimeSpan => Value::TimeSpan(ticks()?),
    })
}

fn object_value(registry: &ShapeRegistry, shape: &TypeShape, json: &Json) -> anyhow::Result<Value> {
    let Json::Object(fields) = json else {
        bail!("expected an object for {}, got {}", shape.type_name(), json);
    };
    let declared = shape.non_null();
    let actual = match fields.get(TYPE_KEY) {
        Some(Json::String(name)) => TypeShape::named(name),
        Some(other) => bail!("{} must be a type name, got {}", TYPE_KEY, other),
        None => declared,
    };
    let members = all_members(registry, &actual)?;

    let mut object = Object::new(actual.base_name());
    for (name, field) in fields {
        if name == TYPE_KEY {
            continue;
        }
        let member = members
            .iter()
            .find(|m| m.name == *name)
            .ok_or_else(|| anyhow!("{} has no member '{}'", actual.type_name(), name))?;
        let value = to_value(registry, &member.shape, field)
            .with_context(|| format!("{}.{}", actual.type_name(), name))?;
        object.set(name.clone(), value);
    }
    Ok(Value::Object(object))
}

/// Members of `shape` and every ancestor, nearest first.
fn all_members(registry: &ShapeRegistry, shape: &TypeShape) -> anyhow::Result<Vec<MemberShape>> {
    let mut members = Vec::new();
    let mut next = Some(shape.clone());
    let mut depth = 0;
    while let Some(current) = next {
        depth += 1;
        if depth > MAX_INHERITANCE_DEPTH {
            bail!("inheritance chain of {} is too deep", shape.type_name());
        }
        let object: Arc<_> = registry.resolve(&current)?;
        members.extend(object.members.iter().cloned());
        next = object.base.clone();
    }
    Ok(members)
}

pub fn from_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::I8(v) => Json::from(*v),
        Value::U8(v) => Json::from(*v),
        Value::I16(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::I32(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I64(v) | Value::Enum(v) | Value::DateTime(v) | Value::TimeSpan(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::F32(v) => float(f64::from(*v)),
        Value::F64(v) => float(*v),
        Value::String(v) => Json::String(v.clone()),
        Value::Guid(bytes) => Json::String(crate::hex::encode(bytes)),
        Value::Ip(addr) => Json::String(addr.to_string()),
        Value::BigInt(bytes) => Json::String(crate::hex::encode(bytes)),
        Value::List(items) => Json::Array(items.iter().map(from_value).collect()),
        Value::Array { dims, items } => {
            let mut map = Map::new();
            map.insert("dims".into(), Json::from(dims.clone()));
            map.insert(
                "items".into(),
                Json::Array(items.iter().map(from_value).collect()),
            );
            Json::Object(map)
        }
        Value::Map(entries) => {
            if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                let map = entries
                    .iter()
                    .filter_map(|(k, v)| match k {
                        Value::String(k) => Some((k.clone(), from_value(v))),
                        _ => None,
                    })
                    .collect();
                Json::Object(map)
            } else {
                Json::Array(
                    entries
                        .iter()
                        .map(|(k, v)| Json::Array(vec![from_value(k), from_value(v)]))
                        .collect(),
                )
            }
        }
        Value::Object(object) => {
            let mut map = Map::new();
            map.insert(TYPE_KEY.into(), Json::String(object.type_name.clone()));
            for (name, field) in &object.fields {
                map.insert(name.clone(), from_value(field));
            }
            Json::Object(map)
        }
    }
}

/// Non-finite floats have no JSON form.
fn float(v: f64) -> Json {
    Number::from_f64(v).map_or(Json::Null, Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapecodec::ObjectShape;

    fn registry() -> ShapeRegistry {
        let mut registry = ShapeRegistry::new();
        registry
            .register(
                ObjectShape::abstract_class("Animal")
                    .field("name", TypeShape::primitive(PrimitiveKind::String))
                    .build(),
            )
            .expect("register");
        registry
            .register(
                ObjectShape::class("Dog")
                    .base(TypeShape::named("Animal"))
                    .field("good", TypeShape::primitive(PrimitiveKind::Bool))
                    .build(),
            )
            .expect("register");
        registry
    }

    #[test]
    fn test_numbers_follow_the_shape() {
        let registry = registry();
        let five = json!(5);
        assert_eq!(
            to_value(&registry, &TypeShape::primitive(PrimitiveKind::U8), &five).expect("u8"),
            Value::U8(5)
        );
        assert_eq!(
            to_value(&registry, &TypeShape::primitive(PrimitiveKind::I64), &five).expect("i64"),
            Value::I64(5)
        );
        assert!(to_value(&registry, &TypeShape::primitive(PrimitiveKind::U8), &json!(300)).is_err());
    }

    #[test]
    fn test_enum_accepts_name_or_number() {
        let registry = registry();
        let shape = TypeShape::enumeration("Level", PrimitiveKind::I32, &[("Low", 1), ("High", 9)]);
        assert_eq!(to_value(&registry, &shape, &json!("High")).expect("name"), Value::Enum(9));
        assert_eq!(to_value(&registry, &shape, &json!(1)).expect("number"), Value::Enum(1));
        assert!(to_value(&registry, &shape, &json!("Medium")).is_err());
    }

    #[test]
    fn test_type_key_selects_derived_members() {
        let registry = registry();
        let value = to_value(
            &registry,
            &TypeShape::named("Animal"),
            &json!({"$type": "Dog", "name": "Rex", "good": true}),
        )
        .expect("object");
        let expected = Value::Object(Object::new("Dog").with("name", "Rex").with("good", true));
        assert_eq!(value, expected);
        assert_eq!(from_value(&value), json!({"$type": "Dog", "name": "Rex", "good": true}));
    }

    #[test]
    fn test_unknown_member_is_rejected() {
        let registry = registry();
        let err = to_value(&registry, &TypeShape::named("Dog"), &json!({"wings": 2})).unwrap_err();
        assert!(err.to_string().contains("wings"));
    }

    #[test]
    fn test_null_needs_a_nullable_shape() {
        let registry = registry();
        let string = TypeShape::primitive(PrimitiveKind::String);
        assert!(to_value(&registry, &string, &Json::Null).is_err());
        assert_eq!(
            to_value(&registry, &string.nullable(), &Json::Null).expect("null"),
            Value::Null
        );
    }

    #[test]
    fn test_dictionary_with_non_string_keys_uses_pairs() {
        let value = Value::Map(vec![(Value::I32(1), Value::from("one"))]);
        assert_eq!(from_value(&value), json!([[1, "one"]]));
        let registry = registry();
        let shape = TypeShape::dictionary(
            TypeShape::primitive(PrimitiveKind::I32),
            TypeShape::primitive(PrimitiveKind::String),
        );
        assert_eq!(to_value(&registry, &shape, &json!([[1, "one"]])).expect("pairs"), value);
    }
}
