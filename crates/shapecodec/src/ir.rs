// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Procedure IR shared by both emission backends.
//!
//! Strategies append [`Op`]s to the procedure of the current scope through
//! [`OpSink`]. Nested bodies (loops, conditionals, nullable branches) are
//! collected with `begin_block` / `end_block` and attached to the op that
//! owns them.

use crate::layout::BlitLayout;
use crate::shape::{InsertMethod, KnownKind, PrimitiveKind, TypeKey, TypeShape};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(pub u32);

impl ProcId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encode,
    /// Decode into a freshly constructed value.
    Decode,
    /// Decode into an existing instance.
    DecodeInto,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Encode => "encode",
            Direction::Decode => "decode",
            Direction::DecodeInto => "decode_into",
        }
    }
}

/// Readable location inside a procedure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Place {
    /// Procedure input: the value being encoded, or the decode-into target.
    Input,
    Local(LocalId),
    Member { base: Box<Place>, name: String },
    Static { type_name: String, member: String },
}

impl Place {
    pub fn member(base: Place, name: &str) -> Place {
        Place::Member {
            base: Box::new(base),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub id: LocalId,
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertDirection {
    ToWire,
    FromWire,
}

/// Allocation performed before elements are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InitKind {
    List { capacity: Option<LocalId> },
    Map { capacity: Option<LocalId> },
    /// Array with one length local per dimension.
    Array { dims: Vec<LocalId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicCase {
    /// 1-based wire discriminant.
    pub discriminant: i32,
    pub type_name: String,
    /// Registered types deriving from `type_name`; encoded through its procedure.
    pub subtypes: Vec<String>,
    pub proc: ProcId,
}

/// Resolver fallback of a dynamic value (discriminant 0).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverCall {
    pub name: String,
    pub identifier: LocalId,
    /// Encodes or decodes the identifier local.
    pub body: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CtorCall {
    pub index: usize,
    /// `(member, local)` per parameter, in parameter order.
    pub args: Vec<(String, LocalId)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub member: String,
    pub value: LocalId,
}

/// Length written by [`Op::WriteCount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    /// Elements of a sequence or entries of a dictionary.
    Elements,
    /// Length of dimension `index`; the array must have exactly `rank` dimensions.
    Dimension { index: usize, rank: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    WritePrimitive {
        kind: PrimitiveKind,
        src: Place,
    },
    ReadPrimitive {
        kind: PrimitiveKind,
        dst: LocalId,
    },
    WriteEnum {
        type_name: String,
        underlying: PrimitiveKind,
        src: Place,
    },
    ReadEnum {
        type_name: String,
        underlying: PrimitiveKind,
        dst: LocalId,
    },
    WriteKnown {
        kind: KnownKind,
        src: Place,
    },
    ReadKnown {
        kind: KnownKind,
        dst: LocalId,
    },
    WriteBlittable {
        layout: Arc<BlitLayout>,
        src: Place,
    },
    ReadBlittable {
        layout: Arc<BlitLayout>,
        dst: LocalId,
    },
    /// Presence flag, then `body` with `bind` holding the non-null value.
    EncodeNullable {
        src: Place,
        bind: LocalId,
        wrapper: bool,
        body: Vec<Op>,
    },
    /// Presence flag; when set, `body` decodes into `inner`, then `dst = inner`.
    DecodeNullable {
        dst: LocalId,
        inner: LocalId,
        wrapper: bool,
        body: Vec<Op>,
    },
    /// `i32` element count, or one dimension length of a multi-rank array.
    WriteCount {
        src: Place,
        count: Count,
    },
    ReadCount {
        dst: LocalId,
    },
    ForEach {
        src: Place,
        item: LocalId,
        body: Vec<Op>,
    },
    ForEachEntry {
        src: Place,
        key: LocalId,
        value: LocalId,
        body: Vec<Op>,
    },
    NewCollection {
        dst: LocalId,
        type_name: String,
        init: InitKind,
    },
    Repeat {
        count: LocalId,
        index: LocalId,
        body: Vec<Op>,
    },
    Insert {
        collection: LocalId,
        method: InsertMethod,
        item: LocalId,
    },
    InsertEntry {
        collection: LocalId,
        key: LocalId,
        value: LocalId,
    },
    StoreElement {
        array: LocalId,
        indices: Vec<LocalId>,
        item: LocalId,
    },
    CallEncode {
        proc: ProcId,
        src: Place,
    },
    CallDecode {
        proc: ProcId,
        dst: LocalId,
    },
    CallDecodeInto {
        proc: ProcId,
        target: Place,
    },
    /// Empty instance receiving base-type members before construction.
    NewPartial {
        dst: LocalId,
        type_name: String,
    },
    CustomEncode {
        type_name: String,
        method: String,
        src: Place,
    },
    CustomDecode {
        type_name: String,
        method: String,
        dst: LocalId,
    },
    Convert {
        converter: String,
        direction: ConvertDirection,
        src: Place,
        dst: LocalId,
    },
    Gate {
        predicate: String,
        args: Vec<Place>,
        then: Vec<Op>,
        otherwise: Vec<Op>,
        /// Local the gated member decodes into (decode only).
        result: Option<LocalId>,
    },
    SetDefault {
        dst: LocalId,
        provider: String,
    },
    DynamicEncode {
        type_name: String,
        src: Place,
        cases: Vec<DynamicCase>,
        resolver: Option<ResolverCall>,
    },
    DynamicDecode {
        type_name: String,
        dst: LocalId,
        cases: Vec<DynamicCase>,
        resolver: Option<ResolverCall>,
    },
    Construct {
        dst: LocalId,
        type_name: String,
        ctor: Option<CtorCall>,
        assignments: Vec<Assignment>,
        base: Option<LocalId>,
    },
    AssignMember {
        target: Place,
        member: String,
        value: LocalId,
    },
}

impl Op {
    /// Nested bodies owned by this op.
    pub fn children(&self) -> Vec<&[Op]> {
        match self {
            Op::EncodeNullable { body, .. }
            | Op::DecodeNullable { body, .. }
            | Op::ForEach { body, .. }
            | Op::ForEachEntry { body, .. }
            | Op::Repeat { body, .. } => vec![body.as_slice()],
            Op::Gate {
                then, otherwise, ..
            } => vec![then.as_slice(), otherwise.as_slice()],
            Op::DynamicEncode { resolver, .. } | Op::DynamicDecode { resolver, .. } => resolver
                .as_ref()
                .map(|r| vec![r.body.as_slice()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Procedures this op calls directly.
    pub fn callees(&self) -> Vec<ProcId> {
        match self {
            Op::CallEncode { proc, .. }
            | Op::CallDecode { proc, .. }
            | Op::CallDecodeInto { proc, .. } => vec![*proc],
            Op::DynamicEncode { cases, .. } | Op::DynamicDecode { cases, .. } => {
                cases.iter().map(|c| c.proc).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Walk `ops` depth-first.
pub fn visit_ops<'a>(ops: &'a [Op], f: &mut dyn FnMut(&'a Op)) {
    for op in ops {
        f(op);
        for child in op.children() {
            visit_ops(child, f);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Generating,
    Sealed,
    Failed,
}

/// One generated procedure: a body for one type in one direction.
#[derive(Debug, Clone)]
pub struct GeneratedProcedure {
    pub id: ProcId,
    pub shape: TypeShape,
    pub key: TypeKey,
    pub direction: Direction,
    pub locals: Vec<LocalDecl>,
    pub body: Vec<Op>,
    /// Decode result local.
    pub result: Option<LocalId>,
    pub state: ProcState,
    pub failure: Option<String>,
}

impl GeneratedProcedure {
    pub fn local(&self, id: LocalId) -> Option<&LocalDecl> {
        self.locals.get(id.0 as usize)
    }

    pub fn local_name(&self, id: LocalId) -> &str {
        self.local(id).map_or("_", |l| l.name.as_str())
    }

    pub fn is_available(&self) -> bool {
        self.state == ProcState::Sealed
    }

    pub fn callees(&self) -> Vec<ProcId> {
        let mut out = Vec::new();
        visit_ops(&self.body, &mut |op| out.extend(op.callees()));
        out.sort();
        out.dedup();
        out
    }
}

/// Append-only op emission target.
pub trait OpSink {
    fn emit(&mut self, op: Op);

    /// Start collecting ops into a nested block.
    fn begin_block(&mut self);

    /// Finish the innermost block and return its ops.
    fn end_block(&mut self) -> Vec<Op>;

    /// Declare a local; the name gets a `__N` suffix when already taken.
    fn declare_local(&mut self, name: &str, type_name: &str) -> LocalId;

    fn local_name(&self, id: LocalId) -> &str;

    fn find_local(&self, name: &str) -> Option<LocalId>;
}

/// Builds one [`GeneratedProcedure`].
#[derive(Debug)]
pub struct ProcedureBuilder {
    proc: GeneratedProcedure,
    blocks: Vec<Vec<Op>>,
    taken: HashSet<String>,
}

/// Names reserved by generated procedure signatures.
const RESERVED: &[&str] = &["value", "writer", "reader", "target", "self"];

impl ProcedureBuilder {
    pub fn new(id: ProcId, shape: TypeShape, direction: Direction) -> Self {
        Self {
            proc: GeneratedProcedure {
                id,
                key: shape.key(),
                shape,
                direction,
                locals: Vec::new(),
                body: Vec::new(),
                result: None,
                state: ProcState::Generating,
                failure: None,
            },
            blocks: vec![Vec::new()],
            taken: RESERVED.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn id(&self) -> ProcId {
        self.proc.id
    }

    pub fn direction(&self) -> Direction {
        self.proc.direction
    }

    pub fn shape(&self) -> &TypeShape {
        &self.proc.shape
    }

    pub fn set_result(&mut self, local: LocalId) {
        self.proc.result = Some(local);
    }

    /// Mark failed; the first reason is kept.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.proc.failure.is_none() {
            self.proc.failure = Some(reason.into());
        }
        self.proc.state = ProcState::Failed;
    }

    pub fn is_failed(&self) -> bool {
        self.proc.state == ProcState::Failed
    }

    /// Close all blocks and freeze the body.
    pub fn seal(&mut self) {
        while self.blocks.len() > 1 {
            let inner = self.blocks.pop().unwrap_or_default();
            if let Some(outer) = self.blocks.last_mut() {
                outer.extend(inner);
            }
        }
        self.proc.body = self.blocks.pop().unwrap_or_default();
        self.blocks.push(Vec::new());
        if self.proc.state == ProcState::Generating {
            self.proc.state = ProcState::Sealed;
        }
    }

    pub fn finish(mut self) -> GeneratedProcedure {
        if self.proc.state == ProcState::Generating {
            self.seal();
        }
        self.proc
    }
}

impl OpSink for ProcedureBuilder {
    fn emit(&mut self, op: Op) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(op);
        }
    }

    fn begin_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    fn end_block(&mut self) -> Vec<Op> {
        if self.blocks.len() > 1 {
            self.blocks.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn declare_local(&mut self, name: &str, type_name: &str) -> LocalId {
        let base = sanitize(name);
        let mut unique = base.clone();
        let mut n = 1;
        while self.taken.contains(&unique) {
            unique = format!("{}__{}", base, n);
            n += 1;
        }
        self.taken.insert(unique.clone());
        let id = LocalId(self.proc.locals.len() as u32);
        self.proc.locals.push(LocalDecl {
            id,
            name: unique,
            type_name: type_name.to_string(),
        });
        id
    }

    fn local_name(&self, id: LocalId) -> &str {
        self.proc.local_name(id)
    }

    fn find_local(&self, name: &str) -> Option<LocalId> {
        self.proc
            .locals
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
    }
}

/// Lower-case identifier form of a member or type name.
pub(crate) fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if c.is_ascii_uppercase() && i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    match trimmed.chars().next() {
        None => "tmp".to_string(),
        Some(c) if c.is_ascii_digit() => format!("v_{}", trimmed),
        Some(_) => trimmed,
    }
}
