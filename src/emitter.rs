// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Builds [`LogRecord`]s from a context and a payload, and fans them out.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::ObservabilityContext;
use crate::output::OutputRegistry;
use crate::schema::{LogLevel, LogRecord, Metrics, Tags};
use crate::serializer;
use crate::telemetry::metrics::DiagnosticsMetrics;

/// Turns emissions into records and hands them to every output.
///
/// There is no sampling and no level filter: every call produces exactly one
/// record. Emitting never fails.
pub struct Emitter {
    outputs: Arc<OutputRegistry>,
    diagnostics: Arc<DiagnosticsMetrics>,
    max_depth: usize,
}

impl Emitter {
    pub fn new(
        outputs: Arc<OutputRegistry>,
        diagnostics: Arc<DiagnosticsMetrics>,
        max_depth: usize,
    ) -> Self {
        Self {
            outputs,
            diagnostics,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Capture `value` with the bounded serializer, counting fallbacks.
    pub fn capture<T: Serialize + ?Sized>(&self, value: &T) -> Value {
        let (value, fallbacks) = serializer::serialize_with_report(value, self.max_depth);
        self.diagnostics.record_fallbacks(fallbacks);
        value
    }

    /// Emit `data` under `event`, stamped with the identity in `ctx`.
    ///
    /// `data` is captured with the bounded serializer. Objects become the
    /// record's `data`; anything else is wrapped as `{"value": ..}`.
    pub fn emit<D: Serialize + ?Sized>(
        &self,
        level: LogLevel,
        event: &str,
        ctx: &ObservabilityContext,
        data: &D,
        metrics: Option<Metrics>,
        tags: Option<Tags>,
    ) -> Arc<LogRecord> {
        let data = match self.capture(data) {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.emit_map(level, event, ctx, data, metrics, tags)
    }

    /// Emit an already-built `data` object.
    pub fn emit_map(
        &self,
        level: LogLevel,
        event: &str,
        ctx: &ObservabilityContext,
        data: Map<String, Value>,
        metrics: Option<Metrics>,
        tags: Option<Tags>,
    ) -> Arc<LogRecord> {
        let mut metrics = metrics.unwrap_or_default();
        metrics.retain(|_, v| v.is_finite());

        let record = Arc::new(LogRecord {
            timestamp: Utc::now(),
            trace_id: ctx.trace_id(),
            span_id: ctx.span_id(),
            parent_span_id: ctx.parent_span_id(),
            session_id: ctx.session_id().to_string(),
            request_id: ctx.request_id().to_string(),
            level,
            event: event.to_string(),
            component_type: ctx.component_type().clone(),
            component_name: ctx.component_name().to_string(),
            triggered_by: ctx.triggered_by().to_string(),
            data,
            metrics,
            tags: tags.unwrap_or_default(),
        });

        self.diagnostics.record_emitted();
        self.outputs.write_log(&record);
        record
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("outputs", &self.outputs.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemoryOutput, Output};
    use crate::schema::ComponentType;
    use crate::serializer::DEPTH_PLACEHOLDER;
    use crate::tracer::SpanContext;
    use serde_json::json;

    fn emitter(max_depth: usize) -> (Emitter, Arc<MemoryOutput>, Arc<DiagnosticsMetrics>) {
        let memory = Arc::new(MemoryOutput::new());
        let diagnostics = Arc::new(DiagnosticsMetrics::new());
        let outputs = Arc::new(OutputRegistry::new(
            vec![memory.clone() as Arc<dyn Output>],
            diagnostics.clone(),
        ));
        (
            Emitter::new(outputs, diagnostics.clone(), max_depth),
            memory,
            diagnostics,
        )
    }

    #[test]
    fn test_stamps_identity_from_context() {
        let (emitter, memory, _) = emitter(10);
        let root = ObservabilityContext::root("svc").with_session_id("s-1");
        let span = SpanContext::new_root();
        let agent = root.child(ComponentType::Agent, "planner", span);
        let tool_span = span.new_child();
        let tool = agent.child(ComponentType::Tool, "navigate", tool_span);

        emitter.emit(
            LogLevel::Info,
            "tool.output",
            &tool,
            &json!({"status": 200}),
            None,
            None,
        );

        let records = memory.records();
        let record = &records[0];
        assert_eq!(record.trace_id, Some(span.trace_id()));
        assert_eq!(record.span_id, Some(tool_span.span_id()));
        assert_eq!(record.parent_span_id, Some(span.span_id()));
        assert_eq!(record.session_id, "s-1");
        assert_eq!(record.component_type, ComponentType::Tool);
        assert_eq!(record.component_name, "navigate");
        assert_eq!(record.triggered_by, "planner");
        assert_eq!(record.data["status"], 200);
    }

    #[test]
    fn test_non_object_data_is_wrapped() {
        let (emitter, memory, _) = emitter(10);
        let ctx = ObservabilityContext::root("svc");
        emitter.emit(LogLevel::Debug, "agent.note", &ctx, "plain text", None, None);
        emitter.emit(LogLevel::Debug, "agent.note", &ctx, &(), None, None);

        let records = memory.records();
        assert_eq!(records[0].data["value"], "plain text");
        assert!(records[1].data.is_empty());
        assert!(records[0].trace_id.is_none());
        assert_eq!(records[0].triggered_by, "root");
    }

    #[test]
    fn test_non_finite_metrics_dropped() {
        let (emitter, memory, _) = emitter(10);
        let ctx = ObservabilityContext::root("svc");
        let metrics: Metrics = [
            ("duration_ms".to_string(), 4.5),
            ("ratio".to_string(), f64::NAN),
            ("cost".to_string(), f64::INFINITY),
        ]
        .into_iter()
        .collect();

        emitter.emit(LogLevel::Info, "tool.output", &ctx, &json!({}), Some(metrics), None);

        let records = memory.records();
        let record = &records[0];
        assert_eq!(record.metrics.len(), 1);
        assert_eq!(record.duration_ms(), Some(4.5));
        assert!(record.to_json_line().is_ok());
    }

    #[test]
    fn test_depth_bound_and_fallbacks_counted() {
        let (emitter, memory, diagnostics) = emitter(2);
        let ctx = ObservabilityContext::root("svc");
        emitter.emit(
            LogLevel::Info,
            "tool.output",
            &ctx,
            &json!({"a": {"b": {"c": 1}}}),
            None,
            Some(["tool".to_string()].into_iter().collect()),
        );

        let records = memory.records();
        let record = &records[0];
        assert_eq!(record.data["a"]["b"], DEPTH_PLACEHOLDER);
        assert!(record.tags.contains("tool"));
        assert_eq!(diagnostics.snapshot().serializer_fallbacks, 1);
        assert_eq!(diagnostics.snapshot().records_emitted, 1);
    }
}
