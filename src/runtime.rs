// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The runtime handle tying tracer, emitter and outputs together.
//!
//! An [`Observability`] is constructed once by the host, either from a
//! resolved [`ObservabilityConfig`] or through [`ObservabilityBuilder`], and
//! passed by clone to whatever needs it. There are no process-wide
//! singletons: two runtimes in one process never share state.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = agentrace::config::load_config(&root, CliOptions::default())?;
//! let obs = Observability::from_config(&config)?;
//!
//! let search = obs.wrap_async(ComponentType::Tool, "search", |q: String| async move {
//!     engine.search(&q).await
//! });
//! search.call("rust".into()).await?;
//!
//! obs.shutdown();
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
#[cfg(feature = "telemetry")]
use tracing::debug;
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::context::ObservabilityContext;
use crate::emitter::Emitter;
use crate::error::ConfigError;
use crate::instrument::{Traced, TracedAsync};
use crate::output::{
    ConsoleOutput, ExporterStatsSnapshot, JsonLinesOutput, OtlpExporter, Output, OutputRegistry,
};
use crate::schema::{ComponentType, LogLevel, LogRecord};
use crate::telemetry::metrics::{DiagnosticsMetrics, DiagnosticsSnapshot};
use crate::tracer::Tracer;

/// Cloneable handle to one observability runtime.
#[derive(Clone)]
pub struct Observability {
    inner: Arc<Inner>,
}

struct Inner {
    config: ObservabilityConfig,
    tracer: Tracer,
    emitter: Emitter,
    outputs: Arc<OutputRegistry>,
    diagnostics: Arc<DiagnosticsMetrics>,
    exporter: Option<Arc<OtlpExporter>>,
    shut_down: AtomicBool,
}

impl Inner {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.outputs.close();

        #[cfg(feature = "telemetry")]
        debug!(service = %self.config.service_name, "Observability runtime shut down");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Observability {
    pub fn builder() -> ObservabilityBuilder {
        ObservabilityBuilder::new()
    }

    /// Build a runtime with the outputs `config` describes.
    ///
    /// Fails when the configuration is invalid, an output cannot be opened,
    /// or the startup probe cannot reach the collector.
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, ConfigError> {
        Ok(ObservabilityBuilder::from_config(config)?.build())
    }

    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    pub fn emitter(&self) -> &Emitter {
        &self.inner.emitter
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.inner.outputs
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.inner.config
    }

    pub fn capture_backtrace(&self) -> bool {
        self.inner.config.capture_backtrace
    }

    /// Counters for this runtime's own health.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }

    /// Exporter queue and delivery counts, when a collector is configured.
    pub fn exporter_stats(&self) -> Option<ExporterStatsSnapshot> {
        self.inner.exporter.as_ref().map(|e| e.stats())
    }

    /// The context installed for the calling task, or the root context.
    pub fn current_context(&self) -> ObservabilityContext {
        self.inner.tracer.current_context()
    }

    pub fn root_context(&self) -> &ObservabilityContext {
        self.inner.tracer.root_context()
    }

    /// A root context for a new run: same session, fresh request id.
    ///
    /// Install it with [`ObservabilityContext::scope`] around the run.
    pub fn new_request(&self) -> ObservabilityContext {
        self.root_context()
            .clone()
            .with_request_id(Uuid::new_v4().to_string())
    }

    /// Bind `fut` to the context current at this call.
    ///
    /// Use it when handing work to `tokio::spawn`, which otherwise starts the
    /// task without a context:
    ///
    /// ```rust,ignore
    /// tokio::spawn(obs.propagate(async move { fetch.call(url).await }));
    /// ```
    pub fn propagate<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        self.current_context().scope(fut)
    }

    /// Serialize `value` with this runtime's depth bound.
    pub fn capture<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Value {
        self.inner.emitter.capture(value)
    }

    /// Emit a free-form record against the current context.
    pub fn log<D: Serialize + ?Sized>(
        &self,
        level: LogLevel,
        event: &str,
        data: &D,
    ) -> Arc<LogRecord> {
        self.inner
            .emitter
            .emit(level, event, &self.current_context(), data, None, None)
    }

    /// Wrap a synchronous callable.
    pub fn wrap<F>(&self, kind: ComponentType, name: impl Into<String>, f: F) -> Traced<F> {
        Traced::new(self, kind, name, f)
    }

    /// Wrap an async callable.
    pub fn wrap_async<F>(
        &self,
        kind: ComponentType,
        name: impl Into<String>,
        f: F,
    ) -> TracedAsync<F> {
        TracedAsync::new(self, kind, name, f)
    }

    /// Ask every output to push what it has buffered.
    pub fn flush(&self) {
        self.inner.outputs.flush();
    }

    /// Flush and close every output. Later calls do nothing.
    ///
    /// Also runs when the last handle is dropped.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("service_name", &self.inner.config.service_name)
            .field("outputs", &self.inner.outputs.names())
            .finish()
    }
}

/// Builder for an [`Observability`] runtime.
pub struct ObservabilityBuilder {
    config: ObservabilityConfig,
    outputs: Vec<Arc<dyn Output>>,
    exporter: Option<Arc<OtlpExporter>>,
}

impl ObservabilityBuilder {
    /// A builder with default settings and no outputs.
    pub fn new() -> Self {
        Self {
            config: ObservabilityConfig::default(),
            outputs: Vec::new(),
            exporter: None,
        }
    }

    /// A builder preloaded with the outputs `config` describes.
    ///
    /// More outputs can still be added before [`build`](Self::build).
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Self {
            config: config.clone(),
            outputs: Vec::new(),
            exporter: None,
        };

        if config.console.enabled {
            builder = builder.output(Arc::new(ConsoleOutput::for_stream(
                config.console.stream,
                config.console.color,
            )));
        }

        if let Some(path) = &config.jsonl_path {
            builder = builder.output(Arc::new(JsonLinesOutput::open(path)?));
        }

        if let Some(collector) = &config.collector {
            let otlp = collector.to_otlp(&config.service_name);
            if collector.probe_on_start {
                otlp.probe()?;
            }
            let exporter = Arc::new(OtlpExporter::new(otlp)?);
            builder.exporter = Some(exporter.clone());
            builder = builder.output(exporter);
        }

        Ok(builder)
    }

    /// Add an output.
    pub fn output<O: Output + 'static>(mut self, output: Arc<O>) -> Self {
        self.outputs.push(output);
        self
    }

    /// Add an already type-erased output.
    pub fn shared_output(mut self, output: Arc<dyn Output>) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Use a fixed session id instead of a fresh UUID.
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.session_id = Some(session_id.into());
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Include a backtrace in error records (default: on).
    pub fn capture_backtrace(mut self, capture: bool) -> Self {
        self.config.capture_backtrace = capture;
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Observability {
        let diagnostics = Arc::new(DiagnosticsMetrics::new());
        let outputs = Arc::new(OutputRegistry::new(self.outputs, diagnostics.clone()));

        let mut root = ObservabilityContext::root(self.config.service_name.clone());
        if let Some(session_id) = &self.config.session_id {
            root = root.with_session_id(session_id.clone());
        }

        #[cfg(feature = "telemetry")]
        debug!(
            service = %self.config.service_name,
            session_id = root.session_id(),
            outputs = ?outputs.names(),
            "Observability runtime started"
        );

        let tracer = Tracer::new(outputs.clone(), diagnostics.clone(), root);
        let emitter = Emitter::new(outputs.clone(), diagnostics.clone(), self.config.max_depth.max(1));

        Observability {
            inner: Arc::new(Inner {
                config: self.config,
                tracer,
                emitter,
                outputs,
                diagnostics,
                exporter: self.exporter,
                shut_down: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for ObservabilityBuilder {
    fn default() -> Self {
        Self::new()
    }
}
