// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Self-diagnostics: agentrace's own logging and health counters.
//!
//! - **Logging**: `tracing` events about the library itself, installed for
//!   host binaries by [`init_telemetry`]
//! - **Metrics**: [`DiagnosticsMetrics`], one per runtime, counting emitted
//!   records, spans, serializer fallbacks and per-output failures
//!
//! Neither feeds back into the `LogRecord` pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agentrace::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::development())?;
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard, LOG_ENV};
pub use metrics::{DiagnosticsMetrics, DiagnosticsSnapshot, Histogram};
