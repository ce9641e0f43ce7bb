// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging conventions.
//!
//! shapecodec logs through the [`log`] facade and never installs a logger
//! itself; binaries pick the backend (the `shapecodec-gen` tool uses
//! `tracing-subscriber`). Messages carry a bracketed component prefix such as
//! `[chain]` or `[RuntimeCodecs]` so they can be grepped per stage.
//!
//! Levels used:
//! - `warn!`  - a diagnostic was recorded (unsupported shape, bad annotation)
//! - `debug!` - a strategy fired, a procedure was registered or sealed
//! - `trace!` - function entry, only with the `trace` feature

/// Function entry trace.
///
/// Expands to a `log::trace!` call when compiled with the `trace` feature and
/// to nothing otherwise.
///
/// # Example
/// ```ignore
/// fn ensure_procedure(&mut self) {
///     crate::trace_fn!("CodecContext::ensure_procedure");
/// }
/// ```
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        log::trace!("[ENTER] {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
