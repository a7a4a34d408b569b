// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentrace - tracing and structured logging for agent systems.
//!
//! Wraps agent, tool and LLM-client calls so that every invocation produces
//! an OpenTelemetry-compatible span and a set of correlated JSON log records,
//! without changing the wrapped code.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`serializer`] - Bounded conversion of any `Serialize` value to JSON
//! - [`schema`] - Log record shape, component kinds and event names
//! - [`output`] - Output backends (console, OTLP, JSON lines, memory) and fan-out
//! - [`tracer`] - Span factory and trace/span identifiers
//! - [`context`] - Task-local propagation of run metadata and span identity
//! - [`emitter`] - Builds log records and delivers them to outputs
//! - [`instrument`] - `Traced` / `TracedAsync` wrappers
//! - [`runtime`] - The `Observability` handle owning all of the above
//! - [`config`] - Layered configuration loading and validation
//! - [`telemetry`] - The crate's own diagnostics (logging, health counters)
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use agentrace::config::{load_config, CliOptions};
//! use agentrace::{traced_tool_async, Observability};
//!
//! let config = load_config(&workspace_root, CliOptions::default())?;
//! let obs = Observability::from_config(&config)?;
//!
//! let navigate = traced_tool_async(&obs, "navigate", |url: String| async move {
//!     browser.open(&url).await
//! });
//! let page = navigate.call("https://example.com".to_string()).await?;
//!
//! obs.shutdown();
//! ```

pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod instrument;
pub mod output;
pub mod runtime;
pub mod schema;
pub mod serializer;
pub mod telemetry;
pub mod tracer;

/// Crate version, reported as the instrumentation scope version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types at crate root
pub use context::ObservabilityContext;
pub use error::{ConfigError, ExportError, OutputError, Result};
pub use instrument::{
    traced_agent, traced_agent_async, traced_llm, traced_llm_async, traced_tool,
    traced_tool_async, HasUsageMetrics, Traced, TracedAsync, UsageMetrics,
};
pub use output::{
    ConsoleOutput, JsonLinesOutput, MemoryOutput, OtlpConfig, OtlpExporter, Output,
    OutputRegistry,
};
pub use runtime::{Observability, ObservabilityBuilder};
pub use schema::{ComponentType, LogLevel, LogRecord};
pub use tracer::{SpanData, SpanId, SpanStatus, TraceId, Tracer};
