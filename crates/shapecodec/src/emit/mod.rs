// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Emission backends.
//!
//! Both consume the same [`crate::CodecUnit`]: [`text`] renders Rust source
//! for ahead-of-time code generation, [`compiled`] builds closures that run
//! directly over [`crate::Value`]. Procedures keep their op order in both, so
//! the two produce the same bytes for the same data.

pub mod compiled;
pub mod text;
