// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Text backend: procedures rendered as Rust source.
//!
//! Entry procedures of object roots become associated functions in an
//! `impl Type` block, named by [`LibraryConfig`]. Entry procedures of other
//! roots (`List<Person>`, `Person?`) become `pub fn {method}_{type}` free
//! functions. Every other reachable procedure is a private helper named
//! `__{direction}_{type}_{id}`.
//!
//! Shapes map onto Rust types as follows:
//!
//! | Shape | Rust |
//! |-------|------|
//! | `string` | `String` |
//! | `T?` | `Option<T>` |
//! | `T[]` / `T[,]` | `Vec<T>` / `shapecodec::Grid<T>` |
//! | `List<T>` / `Dictionary<K, V>` | `Vec<T>` / `HashMap<K, V>` |
//! | `Guid` / `IpAddress` / `BigInteger` | `[u8; 16]` / `IpAddr` / `Vec<u8>` |
//! | `DateTime` / `TimeSpan` | `i64` ticks |
//!
//! Generated code expects the following from user types:
//!
//! - enums: `Copy`, `From<underlying>`;
//! - constructors: `Type::default()` (no parameters), `Type::new(..)` for
//!   constructor 0 and `Type::new_{n}(..)` for constructor `n`;
//! - base types: `AsRef<Base>` / `AsMut<Base>` on the derived type;
//! - converters: `Conv::to_wire(&T) -> CodecResult<W>` and
//!   `Conv::from_wire(W) -> CodecResult<T>`;
//! - version predicates: free functions over references to the members;
//! - dynamic types: `downcast_ref::<Candidate>()` for encode and
//!   `From<Candidate>` for decode; resolvers expose `identify`, `encode`
//!   and `decode`.

use crate::config::LibraryConfig;
use crate::error::{CodecError, CodecResult};
use crate::generator::CodecUnit;
use crate::ir::{
    sanitize, Assignment, ConvertDirection, Count, CtorCall, Direction, DynamicCase, GeneratedProcedure,
    InitKind, LocalId, Op, Place, ProcId, ResolverCall,
};
use crate::layout::{BlitField, BlitLayout, BlitScalar};
use crate::shape::{KnownKind, PrimitiveKind};
use std::collections::HashSet;

/// First line of every rendered file.
pub const HEADER: &str = "// @generated by shapecodec-gen. Do not edit.";

const PREALLOC: &str = "shapecodec::stream::MAX_PREALLOC";

/// Indented line buffer.
#[derive(Default)]
struct Source {
    text: String,
    indent: usize,
}

impl Source {
    fn line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.text.push_str("    ");
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn open(&mut self, line: impl AsRef<str>) {
        self.line(line);
        self.indent += 1;
    }

    fn close(&mut self, line: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(line);
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }
}

/// How a procedure is addressed from generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Callable {
    Method { owner: String, name: String },
    Free { name: String, public: bool },
}

impl Callable {
    fn path(&self) -> String {
        match self {
            Callable::Method { owner, name } => format!("{}::{}", type_path(owner), name),
            Callable::Free { name, .. } => name.clone(),
        }
    }

    fn fn_name(&self) -> &str {
        match self {
            Callable::Method { name, .. } | Callable::Free { name, .. } => name,
        }
    }

    fn is_public(&self) -> bool {
        matches!(
            self,
            Callable::Method { .. } | Callable::Free { public: true, .. }
        )
    }
}

/// Renders a [`CodecUnit`] as one Rust source file.
pub struct RustSourceBackend<'a> {
    library: &'a LibraryConfig,
}

impl<'a> RustSourceBackend<'a> {
    pub fn new(library: &'a LibraryConfig) -> Self {
        Self { library }
    }

    pub fn render(&self, unit: &CodecUnit) -> CodecResult<String> {
        crate::trace_fn!("RustSourceBackend::render");
        let reachable = unit.reachable_from(&unit.exposed());
        let names = self.assign_names(unit);

        let mut out = Source::default();
        out.line(HEADER);
        out.blank();
        out.line("#[allow(unused_imports)]");
        out.line("use shapecodec::{CodecError, CodecResult, StreamReader, StreamWriter};");

        let mut emitted = vec![false; unit.procedures.len()];
        for entry in &unit.entries {
            let mut methods = Vec::new();
            let mut free = Vec::new();
            for id in [entry.encode, entry.decode, entry.decode_into]
                .into_iter()
                .flatten()
            {
                if emitted.get(id.index()).copied().unwrap_or(true) {
                    continue;
                }
                match names.get(id.index()) {
                    Some(Some(Callable::Method { .. })) => methods.push(id),
                    _ => free.push(id),
                }
            }

            let read_from = self
                .library
                .decode_self
                .get()
                .zip(entry.decode_into)
                .filter(|_| is_object_root(&entry.shape));
            if !methods.is_empty() || read_from.is_some() {
                out.blank();
                out.open(format!("impl {} {{", rust_type(&entry.shape.type_name())));
                for (position, id) in methods.iter().enumerate() {
                    if position > 0 {
                        out.blank();
                    }
                    self.render_procedure(unit, &names, *id, &mut out)?;
                    emitted[id.index()] = true;
                }
                if let Some((name, into)) = read_from {
                    let callee = callable(&names, into)?;
                    if !methods.is_empty() {
                        out.blank();
                    }
                    out.open(format!(
                        "pub fn {}(&mut self, reader: &mut dyn StreamReader) -> CodecResult<()> {{",
                        name
                    ));
                    out.line(format!("{}(self, reader)", callee.path()));
                    out.close("}");
                }
                out.close("}");
            }
            for id in free {
                out.blank();
                self.render_procedure(unit, &names, id, &mut out)?;
                emitted[id.index()] = true;
            }
        }

        for proc in &unit.procedures {
            let index = proc.id.index();
            if reachable.get(index).copied().unwrap_or(false) && !emitted[index] {
                out.blank();
                self.render_procedure(unit, &names, proc.id, &mut out)?;
                emitted[index] = true;
            }
        }

        log::debug!(
            "[RustSourceBackend] rendered {} procedures ({} bytes)",
            emitted.iter().filter(|e| **e).count(),
            out.text.len()
        );
        Ok(out.text)
    }

    /// Entry names first (in root order), then helper names.
    fn assign_names(&self, unit: &CodecUnit) -> Vec<Option<Callable>> {
        let mut names: Vec<Option<Callable>> = vec![None; unit.procedures.len()];
        let mut taken: HashSet<String> = HashSet::new();

        for entry in &unit.entries {
            for direction in [Direction::Encode, Direction::Decode, Direction::DecodeInto] {
                let Some(id) = entry.get(direction) else {
                    continue;
                };
                let Some(method) = self.method_name(direction) else {
                    continue;
                };
                let Some(slot) = names.get_mut(id.index()) else {
                    continue;
                };
                if slot.is_some() {
                    continue;
                }
                *slot = Some(if is_object_root(&entry.shape) {
                    Callable::Method {
                        owner: rust_type(&entry.shape.type_name()),
                        name: method.to_string(),
                    }
                } else {
                    let mut name = format!("{}_{}", method, sanitize(&entry.shape.type_name()));
                    if !taken.insert(name.clone()) {
                        name = format!("{}_{}", name, id.0);
                        taken.insert(name.clone());
                    }
                    Callable::Free { name, public: true }
                });
            }
        }

        for (proc, slot) in unit.procedures.iter().zip(names.iter_mut()) {
            if slot.is_none() {
                *slot = Some(Callable::Free {
                    name: format!(
                        "__{}_{}_{}",
                        proc.direction.label(),
                        sanitize(&proc.shape.type_name()),
                        proc.id.0
                    ),
                    public: false,
                });
            }
        }
        names
    }

    fn method_name(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Encode => self.library.encode.get(),
            Direction::Decode => self.library.decode.get(),
            Direction::DecodeInto => self.library.decode_into.get(),
        }
    }

    fn render_procedure(
        &self,
        unit: &CodecUnit,
        names: &[Option<Callable>],
        id: ProcId,
        out: &mut Source,
    ) -> CodecResult<()> {
        let proc = unit.procedure(id).ok_or_else(|| CodecError::Generation {
            type_name: id.to_string(),
            reason: "procedure is not part of the unit".into(),
        })?;
        if !proc.is_available() {
            return Err(CodecError::Generation {
                type_name: proc.shape.to_string(),
                reason: format!(
                    "{} procedure did not generate: {}",
                    proc.direction.label(),
                    proc.failure.as_deref().unwrap_or("unknown reason")
                ),
            });
        }

        let callee = callable(names, id)?;
        let visibility = if callee.is_public() { "pub " } else { "" };
        let ty = rust_type(&proc.shape.type_name());
        let signature = match proc.direction {
            Direction::Encode => format!(
                "{}fn {}(value: &{}, writer: &mut dyn StreamWriter) -> CodecResult<()> {{",
                visibility,
                callee.fn_name(),
                ty
            ),
            Direction::Decode => format!(
                "{}fn {}(reader: &mut dyn StreamReader) -> CodecResult<{}> {{",
                visibility,
                callee.fn_name(),
                ty
            ),
            Direction::DecodeInto => format!(
                "{}fn {}(target: &mut {}, reader: &mut dyn StreamReader) -> CodecResult<()> {{",
                visibility,
                callee.fn_name(),
                ty
            ),
        };

        out.line("#[allow(unused_variables, unused_mut)]");
        out.open(signature);
        let mut renderer = ProcRenderer {
            unit,
            names,
            proc,
            optional: HashSet::new(),
            out,
        };
        renderer.ops(&proc.body)?;
        match (proc.direction, proc.result) {
            (Direction::Decode, Some(result)) => {
                let line = format!("Ok({})", proc.local_name(result));
                out.line(line);
            }
            (Direction::Decode, None) => {
                return Err(CodecError::Generation {
                    type_name: proc.shape.to_string(),
                    reason: "decode procedure has no result local".into(),
                })
            }
            _ => out.line("Ok(())"),
        }
        out.close("}");
        Ok(())
    }
}

fn callable(names: &[Option<Callable>], id: ProcId) -> CodecResult<&Callable> {
    names
        .get(id.index())
        .and_then(Option::as_ref)
        .ok_or_else(|| CodecError::Generation {
            type_name: id.to_string(),
            reason: "procedure has no name".into(),
        })
}

fn is_object_root(shape: &crate::shape::TypeShape) -> bool {
    shape.named_ref().is_some() && !shape.is_nullable()
}

/// Renders the body of one procedure.
struct ProcRenderer<'a> {
    unit: &'a CodecUnit,
    names: &'a [Option<Callable>],
    proc: &'a GeneratedProcedure,
    /// Gated locals holding `Option<T>` because the member may be absent.
    optional: HashSet<LocalId>,
    out: &'a mut Source,
}

impl ProcRenderer<'_> {
    fn invalid(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Generation {
            type_name: self.proc.shape.to_string(),
            reason: reason.into(),
        }
    }

    fn name(&self, id: LocalId) -> &str {
        self.proc.local_name(id)
    }

    fn local_type(&self, id: LocalId) -> String {
        self.proc
            .local(id)
            .map_or_else(|| "_".to_string(), |l| rust_type(&l.type_name))
    }

    fn callee(&self, id: ProcId) -> CodecResult<String> {
        callable(self.names, id).map(Callable::path)
    }

    fn callee_type(&self, id: ProcId) -> CodecResult<String> {
        self.unit
            .procedure(id)
            .map(|p| rust_type(&p.shape.type_name()))
            .ok_or_else(|| self.invalid(format!("unknown procedure {}", id)))
    }

    fn is_encode(&self) -> bool {
        self.proc.direction == Direction::Encode
    }

    // ---- places ------------------------------------------------------------

    /// Place as a path expression (`value.pos`, `item`, `Config::limit()`).
    fn access(&self, place: &Place) -> String {
        match place {
            Place::Input if self.is_encode() => "value".to_string(),
            Place::Input => "target".to_string(),
            Place::Local(id) => self.name(*id).to_string(),
            Place::Member { base, name } => format!("{}.{}", self.access(base), name),
            Place::Static { type_name, member } => {
                format!("{}::{}()", type_path(&rust_type(type_name)), member)
            }
        }
    }

    /// Place as a shared reference.
    fn reference(&self, place: &Place) -> String {
        match place {
            Place::Input => self.access(place),
            Place::Local(_) if self.is_encode() => self.access(place),
            _ => format!("&{}", self.access(place)),
        }
    }

    /// Place as a `Copy` scalar.
    fn scalar(&self, place: &Place) -> String {
        match place {
            Place::Input | Place::Local(_) if self.is_encode() => format!("*{}", self.access(place)),
            _ => self.access(place),
        }
    }

    fn ops(&mut self, ops: &[Op]) -> CodecResult<()> {
        for op in ops {
            if self.is_encode() {
                self.encode_op(op)?;
            } else {
                self.decode_op(op)?;
            }
        }
        Ok(())
    }

    // ---- encode ------------------------------------------------------------

    fn encode_op(&mut self, op: &Op) -> CodecResult<()> {
        match op {
            Op::WritePrimitive { kind, src } => {
                let line = match kind {
                    PrimitiveKind::String => format!("writer.write_string({})?;", self.reference(src)),
                    kind => format!("writer.write_{}({})?;", kind.name(), self.scalar(src)),
                };
                self.out.line(line);
            }
            Op::WriteEnum {
                underlying, src, ..
            } => {
                let line = format!(
                    "writer.write_{}({} as {})?;",
                    underlying.name(),
                    self.scalar(src),
                    underlying.name()
                );
                self.out.line(line);
            }
            Op::WriteKnown { kind, src } => {
                let arg = match kind {
                    KnownKind::DateTime | KnownKind::TimeSpan => self.scalar(src),
                    _ => self.reference(src),
                };
                let line = format!("writer.write_{}({})?;", kind.snake_name(), arg);
                self.out.line(line);
            }
            Op::WriteBlittable { layout, src } => self.write_blittable(layout, src),
            Op::EncodeNullable {
                src, bind, body, ..
            } => {
                let head = format!("match {} {{", self.reference(src));
                self.out.open(head);
                let some = format!("Some({}) => {{", self.name(*bind));
                self.out.open(some);
                self.out.line("writer.write_bool(true)?;");
                self.ops(body)?;
                self.out.close("}");
                self.out.line("None => writer.write_bool(false)?,");
                self.out.close("}");
            }
            Op::WriteCount { src, count } => {
                let len = match count {
                    Count::Elements => format!("{}.len()", self.access(src)),
                    Count::Dimension { index, rank } => {
                        format!("{}.dim_of_rank({}, {})?", self.access(src), index, rank)
                    }
                };
                self.out
                    .line(format!("writer.write_i32(shapecodec::stream::count({})?)?;", len));
            }
            Op::ForEach { src, item, body } => {
                let head = format!("for {} in {}.iter() {{", self.name(*item), self.access(src));
                self.out.open(head);
                self.ops(body)?;
                self.out.close("}");
            }
            Op::ForEachEntry {
                src,
                key,
                value,
                body,
            } => {
                let head = format!(
                    "for ({}, {}) in {}.iter() {{",
                    self.name(*key),
                    self.name(*value),
                    self.access(src)
                );
                self.out.open(head);
                self.ops(body)?;
                self.out.close("}");
            }
            Op::CallEncode { proc, src } => {
                let callee = self.callee(*proc)?;
                let delegates = *src == Place::Input
                    && self.unit.procedure(*proc).map(|p| &p.key) != Some(&self.proc.key);
                let arg = if delegates {
                    format!("AsRef::<{}>::as_ref(value)", self.callee_type(*proc)?)
                } else {
                    self.reference(src)
                };
                self.out.line(format!("{}({}, writer)?;", callee, arg));
            }
            Op::CustomEncode {
                type_name,
                method,
                src,
            } => {
                let line = format!(
                    "{}::{}({}, writer)?;",
                    type_path(&rust_type(type_name)),
                    method,
                    self.reference(src)
                );
                self.out.line(line);
            }
            Op::Convert {
                converter,
                direction: ConvertDirection::ToWire,
                src,
                dst,
            } => {
                let line = format!(
                    "let {} = &{}::to_wire({})?;",
                    self.name(*dst),
                    converter,
                    self.reference(src)
                );
                self.out.line(line);
            }
            Op::Gate {
                predicate,
                args,
                then,
                otherwise,
                ..
            } => {
                let head = format!("if {}({}) {{", predicate, self.args(args));
                self.out.open(head);
                self.ops(then)?;
                if !otherwise.is_empty() {
                    self.out.close("} else {");
                    self.out.indent += 1;
                    self.ops(otherwise)?;
                }
                self.out.close("}");
            }
            Op::DynamicEncode {
                type_name,
                src,
                cases,
                resolver,
            } => self.dynamic_encode(type_name, src, cases, resolver.as_ref())?,
            other => {
                return Err(self.invalid(format!("{:?} cannot appear in an encode procedure", other)))
            }
        }
        Ok(())
    }

    fn args(&self, args: &[Place]) -> String {
        args.iter()
            .map(|a| self.reference(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn write_blittable(&mut self, layout: &BlitLayout, src: &Place) {
        let base = self.access(src);
        self.out.open("{");
        self.out
            .line(format!("let mut __image = [0u8; {}];", layout.size));
        for field in &layout.fields {
            let expr = format!("{}.{}", base, field.path.join("."));
            let (start, end) = (field.offset, field.offset + field.scalar.size());
            let line = match field.scalar {
                BlitScalar::Primitive(PrimitiveKind::Bool) => {
                    format!("__image[{}] = u8::from({});", start, expr)
                }
                BlitScalar::Primitive(_) | BlitScalar::Ticks(_) => format!(
                    "__image[{}..{}].copy_from_slice(&{}.to_le_bytes());",
                    start, end, expr
                ),
                BlitScalar::Enum(underlying) => format!(
                    "__image[{}..{}].copy_from_slice(&({} as {}).to_le_bytes());",
                    start,
                    end,
                    expr,
                    underlying.name()
                ),
                BlitScalar::Guid => {
                    format!("__image[{}..{}].copy_from_slice(&{});", start, end, expr)
                }
            };
            self.out.line(line);
        }
        self.out.line("writer.write_bytes(&__image)?;");
        self.out.close("}");
    }

    fn dynamic_encode(
        &mut self,
        type_name: &str,
        src: &Place,
        cases: &[DynamicCase],
        resolver: Option<&ResolverCall>,
    ) -> CodecResult<()> {
        self.out.open("{");
        let bind = format!("let __dynamic = {};", self.reference(src));
        self.out.line(bind);

        let mut keyword = "if";
        for case in cases {
            let candidate = rust_type(&case.type_name);
            self.out.open(format!(
                "{} let Some(__candidate) = __dynamic.downcast_ref::<{}>() {{",
                keyword, candidate
            ));
            self.out.line(format!("writer.write_i32({})?;", case.discriminant));
            let callee = self.callee(case.proc)?;
            self.out.line(format!("{}(__candidate, writer)?;", callee));
            self.out.indent -= 1;
            keyword = "} else if";
        }
        if let Some(call) = resolver {
            self.out.open(format!(
                "{} let Some({}) = &{}::identify(__dynamic) {{",
                keyword,
                self.name(call.identifier),
                call.name
            ));
            self.out.line("writer.write_i32(0)?;");
            self.ops(&call.body)?;
            let line = format!(
                "{}::encode({}, __dynamic, writer)?;",
                call.name,
                self.name(call.identifier)
            );
            self.out.line(line);
            self.out.indent -= 1;
        }
        let no_candidate = format!(
            "return Err(CodecError::NoDynamicCandidate {{ type_name: {:?}.to_string(), found: std::any::type_name_of_val(__dynamic).to_string() }});",
            type_name
        );
        if cases.is_empty() && resolver.is_none() {
            self.out.line(no_candidate);
        } else {
            self.out.open("} else {");
            self.out.line(no_candidate);
            self.out.close("}");
        }
        self.out.close("}");
        Ok(())
    }

    // ---- decode ------------------------------------------------------------

    fn decode_op(&mut self, op: &Op) -> CodecResult<()> {
        match op {
            Op::ReadPrimitive { kind, dst } => {
                let line = format!("let {} = reader.read_{}()?;", self.name(*dst), kind.name());
                self.out.line(line);
            }
            Op::ReadEnum {
                type_name,
                underlying,
                dst,
            } => {
                let line = format!(
                    "let {} = {}::from(reader.read_{}()?);",
                    self.name(*dst),
                    type_path(&rust_type(type_name)),
                    underlying.name()
                );
                self.out.line(line);
            }
            Op::ReadKnown { kind, dst } => {
                let line = format!("let {} = reader.read_{}()?;", self.name(*dst), kind.snake_name());
                self.out.line(line);
            }
            Op::ReadBlittable { layout, dst } => {
                let head = format!("let {} = {{", self.name(*dst));
                self.out.open(head);
                self.out
                    .line(format!("let __image = reader.read_vec({})?;", layout.size));
                self.out
                    .open(format!("{} {{", type_path(&rust_type(&layout.type_name))));
                self.blit_fields(&layout.fields, 0)?;
                self.out.close("}");
                self.out.close("};");
            }
            Op::DecodeNullable {
                dst, inner, body, ..
            } => {
                let head = format!("let {} = if reader.read_bool()? {{", self.name(*dst));
                self.out.open(head);
                self.ops(body)?;
                let some = format!("Some({})", self.name(*inner));
                self.out.line(some);
                self.out.close("} else {");
                self.out.indent += 1;
                self.out.line("None");
                self.out.close("};");
            }
            Op::ReadCount { dst } => {
                let line = format!("let {} = reader.read_count()?;", self.name(*dst));
                self.out.line(line);
            }
            Op::NewCollection { dst, init, .. } => self.new_collection(*dst, init),
            Op::Repeat { count, index, body } => {
                let head = format!("for {} in 0..{} {{", self.name(*index), self.name(*count));
                self.out.open(head);
                self.ops(body)?;
                self.out.close("}");
            }
            Op::Insert {
                collection, item, method,
            } => {
                let ty = self.local_type(*collection);
                let method = insert_method(collection_head(&ty)).unwrap_or(method.method_name());
                let line = format!("{}.{}({});", self.name(*collection), method, self.name(*item));
                self.out.line(line);
            }
            Op::InsertEntry {
                collection,
                key,
                value,
            } => {
                let line = format!(
                    "{}.insert({}, {});",
                    self.name(*collection),
                    self.name(*key),
                    self.name(*value)
                );
                self.out.line(line);
            }
            Op::StoreElement { array, item, .. } => {
                let line = format!("{}.push({});", self.name(*array), self.name(*item));
                self.out.line(line);
            }
            Op::CallDecode { proc, dst } => {
                let line = format!("let {} = {}(reader)?;", self.name(*dst), self.callee(*proc)?);
                self.out.line(line);
            }
            Op::CallDecodeInto { proc, target } => {
                let arg = match target {
                    Place::Input => {
                        format!("AsMut::<{}>::as_mut(&mut *target)", self.callee_type(*proc)?)
                    }
                    other => format!("&mut {}", self.access(other)),
                };
                let line = format!("{}({}, reader)?;", self.callee(*proc)?, arg);
                self.out.line(line);
            }
            Op::NewPartial { dst, type_name } => {
                let line = format!(
                    "let mut {} = {}::default();",
                    self.name(*dst),
                    type_path(&rust_type(type_name))
                );
                self.out.line(line);
            }
            Op::CustomDecode {
                type_name,
                method,
                dst,
            } => {
                let line = format!(
                    "let {} = {}::{}(reader)?;",
                    self.name(*dst),
                    type_path(&rust_type(type_name)),
                    method
                );
                self.out.line(line);
            }
            Op::Convert {
                converter,
                direction: ConvertDirection::FromWire,
                src: Place::Local(wire),
                dst,
            } => {
                let line = format!(
                    "let {} = {}::from_wire({})?;",
                    self.name(*dst),
                    converter,
                    self.name(*wire)
                );
                self.out.line(line);
            }
            Op::SetDefault { dst, provider } => {
                let line = format!("let {} = {}();", self.name(*dst), provider);
                self.out.line(line);
            }
            Op::Gate {
                predicate,
                args,
                then,
                otherwise,
                result,
            } => self.decode_gate(predicate, args, then, otherwise, *result)?,
            Op::DynamicDecode {
                type_name,
                dst,
                cases,
                resolver,
            } => self.dynamic_decode(type_name, *dst, cases, resolver.as_ref())?,
            Op::Construct {
                dst,
                type_name,
                ctor,
                assignments,
                base,
            } => self.construct(*dst, type_name, ctor.as_ref(), assignments, *base),
            Op::AssignMember {
                target,
                member,
                value,
            } => {
                let target = format!("{}.{}", self.access(target), member);
                self.assign(&target, *value);
            }
            other => {
                return Err(self.invalid(format!("{:?} cannot appear in a decode procedure", other)))
            }
        }
        Ok(())
    }

    fn blit_fields(&mut self, fields: &[BlitField], depth: usize) -> CodecResult<()> {
        let mut start = 0;
        while let Some(field) = fields.get(start) {
            let name = field
                .path
                .get(depth)
                .ok_or_else(|| self.invalid("blittable field path is too short"))?;
            if field.path.len() == depth + 1 {
                let line = format!("{}: {},", name, blit_read(field));
                self.out.line(line);
                start += 1;
                continue;
            }
            let end = fields[start..]
                .iter()
                .position(|f| f.path.get(depth) != Some(name))
                .map_or(fields.len(), |p| start + p);
            let owner = field
                .owners
                .get(depth + 1)
                .ok_or_else(|| self.invalid("blittable field has no owner type"))?;
            self.out.open(format!("{}: {} {{", name, owner));
            self.blit_fields(&fields[start..end], depth + 1)?;
            self.out.close("},");
            start = end;
        }
        Ok(())
    }

    fn new_collection(&mut self, dst: LocalId, init: &InitKind) {
        let ty = self.local_type(dst);
        let head = collection_head(&ty).to_string();
        let name = self.name(dst).to_string();
        let line = match init {
            InitKind::List { capacity } | InitKind::Map { capacity } => match capacity {
                Some(count) if has_capacity_constructor(&head) => format!(
                    "let mut {}: {} = {}::with_capacity({}.min({}));",
                    name,
                    ty,
                    head,
                    self.name(*count),
                    PREALLOC
                ),
                _ => format!("let mut {}: {} = {}::new();", name, ty, head),
            },
            InitKind::Array { dims } => match dims.as_slice() {
                [count] => format!(
                    "let mut {}: {} = Vec::with_capacity({}.min({}));",
                    name,
                    ty,
                    self.name(*count),
                    PREALLOC
                ),
                dims => format!(
                    "let mut {}: {} = shapecodec::Grid::with_dims(vec![{}])?;",
                    name,
                    ty,
                    dims.iter()
                        .map(|d| self.name(*d))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
        };
        self.out.line(line);
    }

    fn decode_gate(
        &mut self,
        predicate: &str,
        args: &[Place],
        then: &[Op],
        otherwise: &[Op],
        result: Option<LocalId>,
    ) -> CodecResult<()> {
        let condition = format!("{}({})", predicate, self.args(args));
        let Some(dst) = result else {
            self.out.open(format!("if {} {{", condition));
            self.ops(then)?;
            self.out.close("}");
            return Ok(());
        };

        let name = self.name(dst).to_string();
        self.out.open(format!("let {} = if {} {{", name, condition));
        self.ops(then)?;
        if otherwise.is_empty() {
            self.out.line(format!("Some({})", name));
            self.out.close("} else {");
            self.out.indent += 1;
            self.out.line("None");
            self.optional.insert(dst);
        } else {
            self.out.line(name.as_str());
            self.out.close("} else {");
            self.out.indent += 1;
            self.ops(otherwise)?;
            self.out.line(name.as_str());
        }
        self.out.close("};");
        Ok(())
    }

    fn dynamic_decode(
        &mut self,
        type_name: &str,
        dst: LocalId,
        cases: &[DynamicCase],
        resolver: Option<&ResolverCall>,
    ) -> CodecResult<()> {
        let head = format!(
            "let {}: {} = match reader.read_i32()? {{",
            self.name(dst),
            self.local_type(dst)
        );
        self.out.open(head);
        for case in cases {
            let line = format!(
                "{} => {}(reader)?.into(),",
                case.discriminant,
                self.callee(case.proc)?
            );
            self.out.line(line);
        }
        if let Some(call) = resolver {
            self.out.open("0 => {");
            self.ops(&call.body)?;
            let line = format!("{}::decode(&{}, reader)?", call.name, self.name(call.identifier));
            self.out.line(line);
            self.out.close("}");
        }
        self.out.open("discriminant => {");
        self.out.open("return Err(CodecError::UnsupportedDiscriminant {");
        self.out.line(format!("type_name: {:?}.to_string(),", type_name));
        self.out.line("discriminant,");
        self.out.close("})");
        self.out.close("}");
        self.out.close("};");
        Ok(())
    }

    fn construct(
        &mut self,
        dst: LocalId,
        type_name: &str,
        ctor: Option<&CtorCall>,
        assignments: &[Assignment],
        base: Option<LocalId>,
    ) {
        let ty = type_path(&rust_type(type_name));
        let call = match ctor {
            Some(ctor) if !ctor.args.is_empty() => {
                let args = ctor
                    .args
                    .iter()
                    .map(|(_, local)| self.argument(*local))
                    .collect::<Vec<_>>()
                    .join(", ");
                if ctor.index == 0 {
                    format!("{}::new({})", ty, args)
                } else {
                    format!("{}::new_{}({})", ty, ctor.index, args)
                }
            }
            _ => format!("{}::default()", ty),
        };
        let mutable = if assignments.is_empty() && base.is_none() {
            ""
        } else {
            "mut "
        };
        let name = self.name(dst).to_string();
        self.out.line(format!("let {}{} = {};", mutable, name, call));
        for assignment in assignments {
            self.assign(&format!("{}.{}", name, assignment.member), assignment.value);
        }
        if let Some(base) = base {
            let line = format!(
                "*AsMut::<{}>::as_mut(&mut {}) = {};",
                self.local_type(base),
                name,
                self.name(base)
            );
            self.out.line(line);
        }
    }

    fn argument(&self, local: LocalId) -> String {
        if self.optional.contains(&local) {
            format!("{}.unwrap_or_default()", self.name(local))
        } else {
            self.name(local).to_string()
        }
    }

    fn assign(&mut self, target: &str, value: LocalId) {
        let name = self.name(value).to_string();
        if self.optional.contains(&value) {
            self.out.line(format!(
                "if let Some({}) = {} {{ {} = {}; }}",
                name, name, target, name
            ));
        } else {
            self.out.line(format!("{} = {};", target, name));
        }
    }
}

fn blit_read(field: &BlitField) -> String {
    let bytes = format!("shapecodec::stream::field_bytes(&__image, {})?", field.offset);
    match field.scalar {
        BlitScalar::Primitive(PrimitiveKind::Bool) => format!("__image[{}] != 0", field.offset),
        BlitScalar::Primitive(kind) => format!("{}::from_le_bytes({})", kind.name(), bytes),
        BlitScalar::Enum(underlying) => {
            format!("{}::from_le_bytes({}).into()", underlying.name(), bytes)
        }
        BlitScalar::Guid => bytes,
        BlitScalar::Ticks(_) => format!("i64::from_le_bytes({})", bytes),
    }
}

/// Path form usable before `::` (`<Vec<i32>>` for generic types).
fn type_path(rust: &str) -> String {
    if rust.contains('<') || rust.starts_with('[') {
        format!("<{}>", rust)
    } else {
        rust.to_string()
    }
}

/// Type constructor of a rendered type (`Vec` for `Vec<i32>`).
fn collection_head(rust: &str) -> &str {
    rust.split('<').next().unwrap_or(rust)
}

fn has_capacity_constructor(head: &str) -> bool {
    !matches!(
        head,
        "std::collections::BTreeSet" | "std::collections::BTreeMap" | "std::collections::LinkedList"
    )
}

fn insert_method(head: &str) -> Option<&'static str> {
    match head {
        "Vec" => Some("push"),
        "std::collections::VecDeque" | "std::collections::LinkedList" => Some("push_back"),
        "std::collections::HashSet" | "std::collections::BTreeSet" => Some("insert"),
        _ => None,
    }
}

/// Rust spelling of a canonical shape type name.
pub fn rust_type(name: &str) -> String {
    let name = name.trim();
    if let Some(inner) = name.strip_suffix('?') {
        return format!("Option<{}>", rust_type(inner));
    }
    if name.ends_with(']') {
        if let Some(open) = name.rfind('[') {
            let rank = name[open..].matches(',').count() + 1;
            let element = rust_type(&name[..open]);
            return if rank == 1 {
                format!("Vec<{}>", element)
            } else {
                format!("shapecodec::Grid<{}>", element)
            };
        }
    }
    if let (Some(open), true) = (name.find('<'), name.ends_with('>')) {
        let args: Vec<String> = split_args(&name[open + 1..name.len() - 1])
            .into_iter()
            .map(rust_type)
            .collect();
        return format!("{}<{}>", rust_collection(&name[..open]), args.join(", "));
    }
    match name {
        "string" => "String".to_string(),
        "Guid" => "[u8; 16]".to_string(),
        "IpAddress" => "std::net::IpAddr".to_string(),
        "BigInteger" => "Vec<u8>".to_string(),
        "DateTime" | "TimeSpan" => "i64".to_string(),
        other => other.to_string(),
    }
}

fn rust_collection(head: &str) -> &str {
    match head {
        "List" | "Stack" => "Vec",
        "Dictionary" => "std::collections::HashMap",
        "SortedDictionary" => "std::collections::BTreeMap",
        "HashSet" => "std::collections::HashSet",
        "SortedSet" => "std::collections::BTreeSet",
        "Queue" => "std::collections::VecDeque",
        "LinkedList" => "std::collections::LinkedList",
        other => other,
    }
}

/// Split generic arguments at top-level commas.
fn split_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(args[start..].trim());
    out
}
