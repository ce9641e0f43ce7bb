// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Three layers fail differently:
//! - [`ShapeError`]: a shape description is malformed (bad nullability,
//!   unknown type, generic arity mismatch).
//! - [`GenerationError`]: generation cannot continue at all. Recoverable
//!   problems are reported as [`crate::Diagnostic`]s instead.
//! - [`CodecError`]: encoding or decoding a concrete value failed.

use thiserror::Error;

/// Malformed shape description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid nullability on '{shape}': {reason}")]
    InvalidNullability { shape: String, reason: String },

    #[error("generic arity mismatch for '{name}': expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid shape '{shape}': {reason}")]
    Invalid { shape: String, reason: String },

    #[error("failed to parse schema: {0}")]
    Parse(String),
}

/// Unrecoverable generation failure.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Annotation contradicts the member it sits on.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

pub type GenResult<T> = Result<T, GenerationError>;

/// Encode/decode failure on a concrete value or stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("unexpected end of stream at offset {offset}: need {need} bytes, have {have}")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("malformed 7-bit encoded integer at offset {offset}")]
    Malformed7Bit { offset: usize },

    #[error("invalid presence flag {flag} at offset {offset}")]
    InvalidFlag { flag: u8, offset: usize },

    #[error("negative length {len} at offset {offset}")]
    NegativeLength { len: i64, offset: usize },

    #[error("unsupported discriminant {discriminant} for dynamic type '{type_name}'")]
    UnsupportedDiscriminant { type_name: String, discriminant: i32 },

    #[error("no dynamic candidate of '{type_name}' accepts a value of type '{found}'")]
    NoDynamicCandidate { type_name: String, found: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("missing field '{field}' on '{type_name}'")]
    MissingField { type_name: String, field: String },

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("no {kind} registered under '{name}'")]
    MissingHook { kind: &'static str, name: String },

    #[error("hook '{name}' failed: {reason}")]
    Hook { name: String, reason: String },

    #[error("nesting depth exceeds limit {limit}")]
    DepthExceeded { limit: usize },

    #[error("no encoder available for '{type_name}'")]
    EncoderUnavailable { type_name: String },

    #[error("no decoder available for '{type_name}'")]
    DecoderUnavailable { type_name: String },

    #[error("codec generation failed for '{type_name}': {reason}")]
    Generation { type_name: String, reason: String },
}

pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn missing_hook(kind: &'static str, name: impl Into<String>) -> Self {
        Self::MissingHook {
            kind,
            name: name.into(),
        }
    }
}
