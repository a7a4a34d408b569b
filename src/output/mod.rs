// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Output backends and the fan-out registry.
//!
//! This module defines:
//! - [`Output`], the trait every backend implements
//! - [`OutputRegistry`], which delivers each record and span to every backend
//!   and absorbs whatever goes wrong in one of them
//! - the bundled backends: [`ConsoleOutput`], [`OtlpExporter`],
//!   [`JsonLinesOutput`] and [`MemoryOutput`]
//!
//! # Example
//!
//! ```rust,ignore
//! use agentrace::output::{Output, OutputError};
//!
//! struct Stdout;
//!
//! impl Output for Stdout {
//!     fn name(&self) -> &str { "stdout" }
//!
//!     fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError> {
//!         println!("{}", record.to_json_line()?);
//!         Ok(())
//!     }
//!
//!     fn flush(&self) -> Result<(), OutputError> { Ok(()) }
//! }
//! ```

mod console;
mod jsonl;
mod memory;
pub mod otlp;

pub use console::{ConsoleOutput, ConsoleStream};
pub use jsonl::JsonLinesOutput;
pub use memory::MemoryOutput;
pub use otlp::{CollectorTransport, ExporterStatsSnapshot, HttpTransport, OtlpConfig, OtlpExporter};

pub use crate::error::OutputError;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::warn;

use crate::error::panic_message;
use crate::schema::LogRecord;
use crate::telemetry::metrics::DiagnosticsMetrics;
use crate::tracer::SpanData;

/// A destination for log records and closed spans.
///
/// Implementations must be cheap to call: anything slow (network, large
/// buffers) belongs behind a queue owned by the backend.
pub trait Output: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Deliver one log record.
    fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError>;

    /// Deliver one closed span. Backends that only handle logs ignore spans.
    fn write_span(&self, _span: &Arc<SpanData>) -> Result<(), OutputError> {
        Ok(())
    }

    /// Push buffered data to its destination.
    fn flush(&self) -> Result<(), OutputError>;

    /// Flush and release resources. Further writes may fail with
    /// [`OutputError::Closed`].
    fn close(&self) -> Result<(), OutputError> {
        self.flush()
    }
}

/// The fixed set of outputs a runtime delivers to.
///
/// Built once at startup and never mutated, so delivery takes no lock of
/// its own. Each call is isolated: an error or panic from one output is
/// counted and logged, and the remaining outputs still receive the item.
pub struct OutputRegistry {
    outputs: Vec<Arc<dyn Output>>,
    diagnostics: Arc<DiagnosticsMetrics>,
}

impl OutputRegistry {
    pub fn new(outputs: Vec<Arc<dyn Output>>, diagnostics: Arc<DiagnosticsMetrics>) -> Self {
        Self {
            outputs,
            diagnostics,
        }
    }

    /// A registry with no outputs.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Arc::new(DiagnosticsMetrics::new()))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Names of the registered outputs, in delivery order.
    pub fn names(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.name().to_string()).collect()
    }

    pub fn write_log(&self, record: &Arc<LogRecord>) {
        self.deliver("write_log", |output| output.write_log(record));
    }

    pub fn write_span(&self, span: &Arc<SpanData>) {
        self.deliver("write_span", |output| output.write_span(span));
    }

    pub fn flush(&self) {
        self.deliver("flush", |output| output.flush());
    }

    pub fn close(&self) {
        self.deliver("close", |output| output.close());
    }

    fn deliver(&self, op: &'static str, f: impl Fn(&dyn Output) -> Result<(), OutputError>) {
        for output in &self.outputs {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(output.as_ref())));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            self.diagnostics.record_output_failure(output.name());

            #[cfg(feature = "telemetry")]
            warn!(output = output.name(), op, error = %message, "Output failed");
            #[cfg(not(feature = "telemetry"))]
            let _ = (op, message);
        }
    }
}

impl std::fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("outputs", &self.names())
            .finish()
    }
}
