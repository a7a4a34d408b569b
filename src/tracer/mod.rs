// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span factory and source of truth for trace/span identity.
//!
//! The tracer never stores a process-wide "current span". The active span is
//! whatever [`ObservabilityContext`] is installed for the calling task (see
//! [`crate::context`]), so concurrent siblings cannot observe each other.
//!
//! Starting a span is pure bookkeeping: it cannot fail and never touches the
//! network. Closed spans are handed to every output through
//! [`OutputRegistry::write_span`], where delivery failures are absorbed.

mod ids;
mod span;

pub use ids::{IdParseError, SpanId, TraceId};
pub use span::{ActiveSpan, SpanContext, SpanData, SpanStatus};

use std::future::Future;
use std::sync::Arc;

use crate::context::ObservabilityContext;
use crate::output::OutputRegistry;
use crate::telemetry::metrics::DiagnosticsMetrics;

/// Creates, activates and closes spans.
pub struct Tracer {
    outputs: Arc<OutputRegistry>,
    diagnostics: Arc<DiagnosticsMetrics>,
    root: ObservabilityContext,
}

impl Tracer {
    /// Create a tracer delivering closed spans to `outputs`.
    ///
    /// `root` is the context reported when no context is installed.
    pub fn new(
        outputs: Arc<OutputRegistry>,
        diagnostics: Arc<DiagnosticsMetrics>,
        root: ObservabilityContext,
    ) -> Self {
        Self {
            outputs,
            diagnostics,
            root,
        }
    }

    /// Start a span under `parent`, or under the current span when `None`.
    ///
    /// With no parent and no current span the result is a root span in a
    /// brand-new trace.
    pub fn start_span(&self, name: impl Into<String>, parent: Option<&SpanContext>) -> ActiveSpan {
        let parent = parent.copied().or_else(|| self.current_span());
        let context = match parent {
            Some(parent) => parent.new_child(),
            None => SpanContext::new_root(),
        };
        self.diagnostics.record_span_started();
        ActiveSpan::new(name.into(), context)
    }

    /// Start a span in a new trace, ignoring any current span.
    pub fn start_root_span(&self, name: impl Into<String>) -> ActiveSpan {
        self.diagnostics.record_span_started();
        ActiveSpan::new(name.into(), SpanContext::new_root())
    }

    /// The span active for the calling task, if any.
    pub fn current_span(&self) -> Option<SpanContext> {
        ObservabilityContext::current().and_then(|ctx| ctx.span())
    }

    /// The context installed for the calling task, or the root context.
    pub fn current_context(&self) -> ObservabilityContext {
        ObservabilityContext::current().unwrap_or_else(|| self.root.clone())
    }

    pub fn root_context(&self) -> &ObservabilityContext {
        &self.root
    }

    /// Run `f` with `span` active, restoring the previous span afterwards.
    ///
    /// Restoration also happens when `f` panics.
    pub fn with_span<R>(&self, span: SpanContext, f: impl FnOnce() -> R) -> R {
        self.current_context().with_span(span).sync_scope(f)
    }

    /// Async counterpart of [`with_span`](Self::with_span).
    ///
    /// `span` is active whenever `fut` is being polled, and only then.
    pub fn with_span_async<F: Future>(
        &self,
        span: SpanContext,
        fut: F,
    ) -> impl Future<Output = F::Output> {
        self.current_context().with_span(span).scope(fut)
    }

    /// Close `span` and deliver it to every output.
    pub fn end_span(&self, span: ActiveSpan, status: SpanStatus) -> Arc<SpanData> {
        let data = Arc::new(span.finish(status));
        self.diagnostics.record_span_closed(status, data.duration_ms);
        self.outputs.write_span(&data);
        data
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("outputs", &self.outputs.len())
            .field("root", &self.root)
            .finish()
    }
}
