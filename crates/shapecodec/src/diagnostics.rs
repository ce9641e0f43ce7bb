// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generation diagnostics.
//!
//! A diagnostic never aborts generation: the offending member or procedure is
//! skipped and the rest of the type continues.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// No strategy accepts the shape.
    UnsupportedShape,
    /// No constructor can rebuild the decoded members.
    ReconstructionImpossible,
    /// An annotation cannot be honored (missing or ambiguous target, bad resolver).
    InvalidAnnotation,
    /// Strategy nesting exceeded the configured depth.
    RecursionLimit,
    /// Write-only member without a custom hook.
    UnreadableMember,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UnsupportedShape => "unsupported-shape",
            DiagnosticCode::ReconstructionImpossible => "reconstruction-impossible",
            DiagnosticCode::InvalidAnnotation => "invalid-annotation",
            DiagnosticCode::RecursionLimit => "recursion-limit",
            DiagnosticCode::UnreadableMember => "unreadable-member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Type whose procedure was being generated.
    pub type_name: String,
    pub member: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let severity = match code {
            DiagnosticCode::UnreadableMember => Severity::Warning,
            _ => Severity::Error,
        };
        Self {
            code,
            severity,
            type_name: type_name.into(),
            member: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn on_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.member {
            Some(member) => write!(
                f,
                "{}[{}]: {}.{}: {}",
                level,
                self.code.as_str(),
                self.type_name,
                member,
                self.message
            ),
            None => write!(
                f,
                "{}[{}]: {}: {}",
                level,
                self.code.as_str(),
                self.type_name,
                self.message
            ),
        }
    }
}

/// Ordered, de-duplicated diagnostic list.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.items.contains(&diagnostic) {
            return;
        }
        log::warn!("[diagnostics] {}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
