// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Execution state of compiled procedures.
//!
//! Each procedure compiles to a list of steps (boxed closures). A step runs
//! against a frame holding the procedure's locals; procedure calls go
//! through the [`Machine`], which bounds the call depth.

use crate::error::{CodecError, CodecResult};
use crate::stream::{StreamReader, StreamWriter};
use crate::value::Value;
use std::borrow::Cow;
use std::cell::Cell;

pub(crate) type EncodeStep = Box<
    dyn Fn(&Machine<'_>, &mut EncodeFrame<'_>, &mut dyn StreamWriter) -> CodecResult<()>
        + Send
        + Sync,
>;

pub(crate) type DecodeStep = Box<
    dyn Fn(&Machine<'_>, &mut DecodeFrame<'_>, &mut dyn StreamReader) -> CodecResult<()>
        + Send
        + Sync,
>;

/// Box an encode closure (pins down its higher-ranked signature).
pub(crate) fn encode_step<F>(f: F) -> EncodeStep
where
    F: Fn(&Machine<'_>, &mut EncodeFrame<'_>, &mut dyn StreamWriter) -> CodecResult<()>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

pub(crate) fn decode_step<F>(f: F) -> DecodeStep
where
    F: Fn(&Machine<'_>, &mut DecodeFrame<'_>, &mut dyn StreamReader) -> CodecResult<()>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

/// Locals borrow from the encoded value where possible.
pub(crate) struct EncodeFrame<'v> {
    pub input: &'v Value,
    pub locals: Vec<Option<Cow<'v, Value>>>,
}

pub(crate) struct DecodeFrame<'t> {
    /// Existing instance of a decode-into procedure.
    pub target: Option<&'t mut Value>,
    pub locals: Vec<Option<Value>>,
}

pub(crate) enum CompiledProc {
    Encode {
        locals: usize,
        body: Vec<EncodeStep>,
    },
    Decode {
        locals: usize,
        result: usize,
        body: Vec<DecodeStep>,
    },
    DecodeInto {
        locals: usize,
        body: Vec<DecodeStep>,
    },
}

pub(crate) fn unbound_local(index: usize) -> CodecError {
    CodecError::Generation {
        type_name: String::new(),
        reason: format!("local #{} is not bound", index),
    }
}

/// Readable location, with static member values captured at compile time.
#[derive(Debug, Clone)]
pub(crate) enum CompiledPlace {
    Input,
    Local(usize),
    Member(Box<CompiledPlace>, String),
    Static(Value),
}

pub(crate) fn member_of<'a>(value: &'a Value, name: &str) -> CodecResult<&'a Value> {
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::mismatch("object", value.type_label()))?;
    object.get(name).ok_or_else(|| CodecError::MissingField {
        type_name: object.type_name.clone(),
        field: name.to_string(),
    })
}

impl CompiledPlace {
    /// Encode-side read: borrowed when the value lives inside the input.
    pub fn fetch<'v>(
        &self,
        input: &'v Value,
        locals: &[Option<Cow<'v, Value>>],
    ) -> CodecResult<Cow<'v, Value>> {
        match self {
            CompiledPlace::Input => Ok(Cow::Borrowed(input)),
            CompiledPlace::Local(index) => match locals.get(*index) {
                Some(Some(Cow::Borrowed(value))) => Ok(Cow::Borrowed(*value)),
                Some(Some(Cow::Owned(value))) => Ok(Cow::Owned(value.clone())),
                _ => Err(unbound_local(*index)),
            },
            CompiledPlace::Member(base, name) => match base.fetch(input, locals)? {
                Cow::Borrowed(value) => member_of(value, name).map(Cow::Borrowed),
                Cow::Owned(value) => member_of(&value, name).map(|v| Cow::Owned(v.clone())),
            },
            CompiledPlace::Static(value) => Ok(Cow::Owned(value.clone())),
        }
    }

    /// Decode-side read; `target` is the decode-into instance.
    pub fn read(&self, target: Option<&Value>, locals: &[Option<Value>]) -> CodecResult<Value> {
        match self {
            CompiledPlace::Input => target.cloned().ok_or_else(|| CodecError::Generation {
                type_name: String::new(),
                reason: "procedure has no input instance".into(),
            }),
            CompiledPlace::Local(index) => locals
                .get(*index)
                .and_then(Option::as_ref)
                .cloned()
                .ok_or_else(|| unbound_local(*index)),
            CompiledPlace::Member(base, name) => {
                let base = base.read(target, locals)?;
                member_of(&base, name).cloned()
            }
            CompiledPlace::Static(value) => Ok(value.clone()),
        }
    }
}

pub(crate) fn bind<'v>(
    locals: &mut [Option<Cow<'v, Value>>],
    index: usize,
    value: Cow<'v, Value>,
) -> CodecResult<()> {
    let slot = locals.get_mut(index).ok_or_else(|| unbound_local(index))?;
    *slot = Some(value);
    Ok(())
}

pub(crate) fn store(locals: &mut [Option<Value>], index: usize, value: Value) -> CodecResult<()> {
    let slot = locals.get_mut(index).ok_or_else(|| unbound_local(index))?;
    *slot = Some(value);
    Ok(())
}

pub(crate) fn take(locals: &mut [Option<Value>], index: usize) -> CodecResult<Value> {
    locals
        .get_mut(index)
        .and_then(Option::take)
        .ok_or_else(|| unbound_local(index))
}

/// Like [`take`], but an unset local (skipped version gate) is `None`.
pub(crate) fn take_set(locals: &mut [Option<Value>], index: usize) -> Option<Value> {
    locals.get_mut(index).and_then(Option::take)
}

pub(crate) fn local_mut(locals: &mut [Option<Value>], index: usize) -> CodecResult<&mut Value> {
    locals
        .get_mut(index)
        .and_then(Option::as_mut)
        .ok_or_else(|| unbound_local(index))
}

/// Non-negative integer held by a count or index local.
pub(crate) fn local_usize(locals: &[Option<Value>], index: usize) -> CodecResult<usize> {
    let value = locals
        .get(index)
        .and_then(Option::as_ref)
        .ok_or_else(|| unbound_local(index))?;
    let raw = value
        .as_i64()
        .ok_or_else(|| CodecError::mismatch("count", value.type_label()))?;
    usize::try_from(raw).map_err(|_| CodecError::OutOfRange(format!("count {}", raw)))
}

pub(crate) fn run_encode(
    steps: &[EncodeStep],
    machine: &Machine<'_>,
    frame: &mut EncodeFrame<'_>,
    writer: &mut dyn StreamWriter,
) -> CodecResult<()> {
    for step in steps {
        step(machine, frame, writer)?;
    }
    Ok(())
}

pub(crate) fn run_decode(
    steps: &[DecodeStep],
    machine: &Machine<'_>,
    frame: &mut DecodeFrame<'_>,
    reader: &mut dyn StreamReader,
) -> CodecResult<()> {
    for step in steps {
        step(machine, frame, reader)?;
    }
    Ok(())
}

/// Procedure table plus call-depth accounting for one top-level call.
pub(crate) struct Machine<'p> {
    procs: &'p [Option<CompiledProc>],
    depth: Cell<usize>,
    max_depth: usize,
}

impl<'p> Machine<'p> {
    pub fn new(procs: &'p [Option<CompiledProc>], max_depth: usize) -> Self {
        Self {
            procs,
            depth: Cell::new(0),
            max_depth,
        }
    }

    fn enter(&self) -> CodecResult<()> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(CodecError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.depth.set(depth + 1);
        Ok(())
    }

    fn exit(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    fn proc(&self, index: usize) -> CodecResult<&'p CompiledProc> {
        self.procs
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| CodecError::Generation {
                type_name: String::new(),
                reason: format!("procedure #{} was not compiled", index),
            })
    }

    pub fn encode(
        &self,
        proc: usize,
        value: &Value,
        writer: &mut dyn StreamWriter,
    ) -> CodecResult<()> {
        let CompiledProc::Encode { locals, body } = self.proc(proc)? else {
            return Err(CodecError::EncoderUnavailable {
                type_name: value.type_label(),
            });
        };
        self.enter()?;
        let mut frame = EncodeFrame {
            input: value,
            locals: vec![None; *locals],
        };
        let result = run_encode(body, self, &mut frame, writer);
        self.exit();
        result
    }

    pub fn decode(&self, proc: usize, reader: &mut dyn StreamReader) -> CodecResult<Value> {
        let CompiledProc::Decode {
            locals,
            result,
            body,
        } = self.proc(proc)?
        else {
            return Err(CodecError::DecoderUnavailable {
                type_name: format!("#{}", proc),
            });
        };
        self.enter()?;
        let mut frame = DecodeFrame {
            target: None,
            locals: vec![None; *locals],
        };
        let outcome = run_decode(body, self, &mut frame, reader);
        self.exit();
        outcome?;
        take(&mut frame.locals, *result)
    }

    pub fn decode_into(
        &self,
        proc: usize,
        target: &mut Value,
        reader: &mut dyn StreamReader,
    ) -> CodecResult<()> {
        let CompiledProc::DecodeInto { locals, body } = self.proc(proc)? else {
            return Err(CodecError::DecoderUnavailable {
                type_name: target.type_label(),
            });
        };
        self.enter()?;
        let mut frame = DecodeFrame {
            target: Some(target),
            locals: vec![None; *locals],
        };
        let result = run_decode(body, self, &mut frame, reader);
        self.exit();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferWriter;
    use crate::value::Object;

    #[test]
    fn test_member_fetch_borrows_from_input() {
        let input = Value::Object(Object::new("P").with("x", Value::I32(3)));
        let place = CompiledPlace::Member(Box::new(CompiledPlace::Input), "x".into());
        let fetched = place.fetch(&input, &[]).expect("fetch");
        assert!(matches!(fetched, Cow::Borrowed(Value::I32(3))));
    }

    #[test]
    fn test_missing_field_names_type() {
        let input = Value::Object(Object::new("P"));
        let place = CompiledPlace::Member(Box::new(CompiledPlace::Input), "x".into());
        assert_eq!(
            place.fetch(&input, &[]).unwrap_err(),
            CodecError::MissingField {
                type_name: "P".into(),
                field: "x".into()
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let step = encode_step(|m, f, w| m.encode(0, f.input, w));
        let procs = vec![Some(CompiledProc::Encode {
            locals: 0,
            body: vec![step],
        })];
        let machine = Machine::new(&procs, 8);
        let mut writer = BufferWriter::new();
        assert_eq!(
            machine.encode(0, &Value::Null, &mut writer).unwrap_err(),
            CodecError::DepthExceeded { limit: 8 }
        );
    }

    #[test]
    fn test_decode_returns_result_local() {
        let step = decode_step(|_, f, r| store(&mut f.locals, 1, Value::U8(r.read_u8()?)));
        let procs = vec![Some(CompiledProc::Decode {
            locals: 2,
            result: 1,
            body: vec![step],
        })];
        let machine = Machine::new(&procs, 8);
        let mut reader = crate::stream::SliceReader::new(&[9]);
        assert_eq!(machine.decode(0, &mut reader).expect("decode"), Value::U8(9));
    }
}
