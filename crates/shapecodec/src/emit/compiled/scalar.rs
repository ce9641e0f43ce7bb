// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf encodings: primitives, enums, known types and raw struct layouts.
//!
//! Writers accept any integer variant whose value fits the wire width, so
//! a `Value::I64(3)` can be written as a `u8`. Readers always produce the
//! exact variant of the declared kind.

use crate::error::{CodecError, CodecResult};
use crate::ir::Count;
use crate::layout::{BlitLayout, BlitScalar};
use crate::shape::{KnownKind, PrimitiveKind};
use crate::stream::{BufferWriter, SliceReader, StreamReader, StreamWriter};
use crate::value::{Object, Value};

fn narrow<T: TryFrom<i64>>(raw: i64, kind: PrimitiveKind) -> CodecResult<T> {
    T::try_from(raw).map_err(|_| CodecError::OutOfRange(format!("{} does not fit in {}", raw, kind)))
}

fn integer_of(value: &Value, kind: PrimitiveKind) -> CodecResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| CodecError::mismatch(kind.name(), value.type_label()))
}

/// Write `raw` with the width of integer `kind`.
pub fn write_integer(kind: PrimitiveKind, raw: i64, w: &mut dyn StreamWriter) -> CodecResult<()> {
    match kind {
        PrimitiveKind::I8 => w.write_i8(narrow(raw, kind)?),
        PrimitiveKind::U8 => w.write_u8(narrow(raw, kind)?),
        PrimitiveKind::I16 => w.write_i16(narrow(raw, kind)?),
        PrimitiveKind::U16 => w.write_u16(narrow(raw, kind)?),
        PrimitiveKind::I32 => w.write_i32(narrow(raw, kind)?),
        PrimitiveKind::U32 => w.write_u32(narrow(raw, kind)?),
        PrimitiveKind::I64 => w.write_i64(raw),
        PrimitiveKind::U64 => w.write_u64(narrow(raw, kind)?),
        other => Err(CodecError::mismatch("integer kind", other.name())),
    }
}

pub fn read_integer(kind: PrimitiveKind, r: &mut dyn StreamReader) -> CodecResult<i64> {
    Ok(match kind {
        PrimitiveKind::I8 => i64::from(r.read_i8()?),
        PrimitiveKind::U8 => i64::from(r.read_u8()?),
        PrimitiveKind::I16 => i64::from(r.read_i16()?),
        PrimitiveKind::U16 => i64::from(r.read_u16()?),
        PrimitiveKind::I32 => i64::from(r.read_i32()?),
        PrimitiveKind::U32 => i64::from(r.read_u32()?),
        PrimitiveKind::I64 => r.read_i64()?,
        PrimitiveKind::U64 => {
            let raw = r.read_u64()?;
            i64::try_from(raw)
                .map_err(|_| CodecError::OutOfRange(format!("enum value {} exceeds i64", raw)))?
        }
        other => return Err(CodecError::mismatch("integer kind", other.name())),
    })
}

pub fn write_primitive(kind: PrimitiveKind, value: &Value, w: &mut dyn StreamWriter) -> CodecResult<()> {
    match (kind, value) {
        (PrimitiveKind::Bool, Value::Bool(b)) => w.write_bool(*b),
        (PrimitiveKind::U64, Value::U64(v)) => w.write_u64(*v),
        (PrimitiveKind::F32, Value::F32(v)) => w.write_f32(*v),
        (PrimitiveKind::F64, Value::F64(v)) => w.write_f64(*v),
        (PrimitiveKind::F64, Value::F32(v)) => w.write_f64(f64::from(*v)),
        (PrimitiveKind::String, Value::String(s)) => w.write_string(s),
        (
            PrimitiveKind::Bool | PrimitiveKind::F32 | PrimitiveKind::F64 | PrimitiveKind::String,
            other,
        ) => Err(CodecError::mismatch(kind.name(), other.type_label())),
        (integer, other) => write_integer(integer, integer_of(other, integer)?, w),
    }
}

pub fn read_primitive(kind: PrimitiveKind, r: &mut dyn StreamReader) -> CodecResult<Value> {
    Ok(match kind {
        PrimitiveKind::Bool => Value::Bool(r.read_bool()?),
        PrimitiveKind::I8 => Value::I8(r.read_i8()?),
        PrimitiveKind::U8 => Value::U8(r.read_u8()?),
        PrimitiveKind::I16 => Value::I16(r.read_i16()?),
        PrimitiveKind::U16 => Value::U16(r.read_u16()?),
        PrimitiveKind::I32 => Value::I32(r.read_i32()?),
        PrimitiveKind::U32 => Value::U32(r.read_u32()?),
        PrimitiveKind::I64 => Value::I64(r.read_i64()?),
        PrimitiveKind::U64 => Value::U64(r.read_u64()?),
        PrimitiveKind::F32 => Value::F32(r.read_f32()?),
        PrimitiveKind::F64 => Value::F64(r.read_f64()?),
        PrimitiveKind::String => Value::String(r.read_string()?),
    })
}

pub fn write_enum(underlying: PrimitiveKind, value: &Value, w: &mut dyn StreamWriter) -> CodecResult<()> {
    write_integer(underlying, integer_of(value, underlying)?, w)
}

pub fn read_enum(underlying: PrimitiveKind, r: &mut dyn StreamReader) -> CodecResult<Value> {
    read_integer(underlying, r).map(Value::Enum)
}

pub fn write_known(kind: KnownKind, value: &Value, w: &mut dyn StreamWriter) -> CodecResult<()> {
    match (kind, value) {
        (KnownKind::Guid, Value::Guid(g)) => w.write_guid(g),
        (KnownKind::IpAddress, Value::Ip(ip)) => w.write_ip_address(ip),
        (KnownKind::BigInteger, Value::BigInt(bytes)) => w.write_big_integer(bytes),
        (KnownKind::DateTime, Value::DateTime(ticks)) => w.write_date_time(*ticks),
        (KnownKind::TimeSpan, Value::TimeSpan(ticks)) => w.write_time_span(*ticks),
        (kind, other) => Err(CodecError::mismatch(kind.name(), other.type_label())),
    }
}

pub fn read_known(kind: KnownKind, r: &mut dyn StreamReader) -> CodecResult<Value> {
    Ok(match kind {
        KnownKind::Guid => Value::Guid(r.read_guid()?),
        KnownKind::IpAddress => Value::Ip(r.read_ip_address()?),
        KnownKind::BigInteger => Value::BigInt(r.read_big_integer()?),
        KnownKind::DateTime => Value::DateTime(r.read_date_time()?),
        KnownKind::TimeSpan => Value::TimeSpan(r.read_time_span()?),
    })
}

fn write_scalar(scalar: BlitScalar, value: &Value, w: &mut dyn StreamWriter) -> CodecResult<()> {
    match scalar {
        BlitScalar::Primitive(kind) => write_primitive(kind, value, w),
        BlitScalar::Enum(underlying) => write_enum(underlying, value, w),
        BlitScalar::Guid => write_known(KnownKind::Guid, value, w),
        BlitScalar::Ticks(kind) => write_known(kind, value, w),
    }
}

fn read_scalar(scalar: BlitScalar, r: &mut dyn StreamReader) -> CodecResult<Value> {
    match scalar {
        BlitScalar::Primitive(kind) => read_primitive(kind, r),
        BlitScalar::Enum(underlying) => read_enum(underlying, r),
        BlitScalar::Guid => read_known(KnownKind::Guid, r),
        BlitScalar::Ticks(kind) => read_known(kind, r),
    }
}

fn field_at<'a>(value: &'a Value, path: &[String]) -> CodecResult<&'a Value> {
    path.iter()
        .try_fold(value, |v, name| crate::emit::compiled::machine::member_of(v, name))
}

/// Raw image of an unmanaged struct: `layout.size` bytes, padding zeroed.
pub fn write_blittable(layout: &BlitLayout, value: &Value, w: &mut dyn StreamWriter) -> CodecResult<()> {
    let mut image = vec![0u8; layout.size];
    let mut scratch = BufferWriter::with_capacity(16);
    for field in &layout.fields {
        scratch.clear();
        write_scalar(field.scalar, field_at(value, &field.path)?, &mut scratch)?;
        let bytes = scratch.as_slice();
        let slot = image
            .get_mut(field.offset..field.offset + bytes.len())
            .ok_or_else(|| {
                CodecError::OutOfRange(format!(
                    "field '{}' at offset {} overruns {} bytes",
                    field.path.join("."),
                    field.offset,
                    layout.size
                ))
            })?;
        slot.copy_from_slice(bytes);
    }
    w.write_bytes(&image)
}

fn set_path(object: &mut Object, path: &[String], owners: &[String], value: Value) -> CodecResult<()> {
    match path {
        [] => Ok(()),
        [name] => {
            object.set(name.clone(), value);
            Ok(())
        }
        [name, rest @ ..] => {
            let nested_owners = owners.get(1..).unwrap_or_default();
            if object.get(name).is_none() {
                let owner = nested_owners.first().cloned().unwrap_or_default();
                object.set(name.clone(), Object::new(owner));
            }
            let nested = object
                .fields
                .iter_mut()
                .find(|(n, _)| n == name)
                .and_then(|(_, v)| v.as_object_mut())
                .ok_or_else(|| CodecError::mismatch("object", name.clone()))?;
            set_path(nested, rest, nested_owners, value)
        }
    }
}

pub fn read_blittable(layout: &BlitLayout, r: &mut dyn StreamReader) -> CodecResult<Value> {
    let image = r.read_vec(layout.size)?;
    let mut root = Object::new(layout.type_name.clone());
    for field in &layout.fields {
        let bytes = image.get(field.offset..).unwrap_or_default();
        let mut reader = SliceReader::new(bytes);
        let value = read_scalar(field.scalar, &mut reader)?;
        set_path(&mut root, &field.path, &field.owners, value)?;
    }
    Ok(Value::Object(root))
}

/// Element count, or the length of one dimension of a multi-rank array.
pub fn count_of(value: &Value, count: Count) -> CodecResult<i32> {
    let len = match (value, count) {
        (Value::List(items), Count::Elements) => items.len(),
        (Value::Array { dims, items }, count) => {
            let total = dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d));
            if total != Some(items.len()) {
                return Err(CodecError::OutOfRange(format!(
                    "array of dimensions {:?} holds {} items",
                    dims,
                    items.len()
                )));
            }
            match count {
                Count::Elements => items.len(),
                Count::Dimension { index, rank } => {
                    if dims.len() != rank {
                        return Err(CodecError::mismatch(
                            format!("array of rank {}", rank),
                            format!("array of rank {}", dims.len()),
                        ));
                    }
                    *dims.get(index).ok_or_else(|| {
                        CodecError::OutOfRange(format!("array of rank {} has no dimension {}", rank, index))
                    })?
                }
            }
        }
        (Value::Map(entries), Count::Elements) => entries.len(),
        (other, _) => return Err(CodecError::mismatch("collection", other.type_label())),
    };
    i32::try_from(len).map_err(|_| CodecError::OutOfRange(format!("{} elements", len)))
}

pub fn items(value: &Value) -> CodecResult<&[Value]> {
    value
        .as_items()
        .ok_or_else(|| CodecError::mismatch("sequence", value.type_label()))
}

pub fn entries(value: &Value) -> CodecResult<&[(Value, Value)]> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(CodecError::mismatch("map", other.type_label())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlitField;

    fn encode(f: impl FnOnce(&mut BufferWriter) -> CodecResult<()>) -> Vec<u8> {
        let mut w = BufferWriter::new();
        f(&mut w).expect("write");
        w.into_inner()
    }

    #[test]
    fn test_integers_are_narrowed_with_range_check() {
        let bytes = encode(|w| write_primitive(PrimitiveKind::U8, &Value::I64(200), w));
        assert_eq!(bytes, vec![200]);

        let mut w = BufferWriter::new();
        let err = write_primitive(PrimitiveKind::U8, &Value::I32(-1), &mut w).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange(_)));
    }

    #[test]
    fn test_string_kind_rejects_numbers() {
        let mut w = BufferWriter::new();
        let err = write_primitive(PrimitiveKind::String, &Value::I32(1), &mut w).unwrap_err();
        assert_eq!(err, CodecError::mismatch("string", "i32"));
    }

    #[test]
    fn test_enum_uses_underlying_width() {
        let bytes = encode(|w| write_enum(PrimitiveKind::I16, &Value::Enum(-2), w));
        assert_eq!(bytes, vec![0xFE, 0xFF]);
        let mut r = SliceReader::new(&bytes);
        assert_eq!(read_enum(PrimitiveKind::I16, &mut r).expect("read"), Value::Enum(-2));
    }

    #[test]
    fn test_blittable_image_is_padded() {
        let layout = BlitLayout {
            type_name: "P".into(),
            size: 8,
            align: 4,
            fields: vec![
                BlitField {
                    path: vec!["flag".into()],
                    owners: vec!["P".into()],
                    scalar: BlitScalar::Primitive(PrimitiveKind::Bool),
                    offset: 0,
                },
                BlitField {
                    path: vec!["n".into()],
                    owners: vec!["P".into()],
                    scalar: BlitScalar::Primitive(PrimitiveKind::I32),
                    offset: 4,
                },
            ],
        };
        let value = Value::Object(Object::new("P").with("flag", true).with("n", 5i32));
        let bytes = encode(|w| write_blittable(&layout, &value, w));
        assert_eq!(bytes, vec![1, 0, 0, 0, 5, 0, 0, 0]);
        let mut r = SliceReader::new(&bytes);
        assert_eq!(read_blittable(&layout, &mut r).expect("read"), value);
    }

    #[test]
    fn test_count_checks_array_shape() {
        let array = Value::Array {
            dims: vec![2, 3],
            items: vec![Value::I32(0); 6],
        };
        let second = Count::Dimension { index: 1, rank: 2 };
        assert_eq!(count_of(&array, second).expect("dim"), 3);
        assert_eq!(count_of(&array, Count::Elements).expect("all"), 6);
        let broken = Value::Array {
            dims: vec![2, 3],
            items: vec![Value::I32(0); 5],
        };
        assert!(count_of(&broken, Count::Dimension { index: 0, rank: 2 }).is_err());
        let deeper = Value::Array {
            dims: vec![1, 2, 3],
            items: vec![Value::I32(0); 6],
        };
        assert!(matches!(
            count_of(&deeper, Count::Dimension { index: 0, rank: 2 }),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
}
