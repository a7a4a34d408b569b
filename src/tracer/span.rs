// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Open and closed spans.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{SpanId, TraceId};
use crate::schema::SpanEvent;

/// Final status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

impl SpanStatus {
    /// OTLP status code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Ok => 1,
            Self::Error => 2,
        }
    }
}

/// Identity of a span: what a context carries and a child links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
}

impl SpanContext {
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// A fresh root identity in a new trace.
    pub(crate) fn new_root() -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            parent_span_id: None,
        }
    }

    /// A fresh identity parented under `self`, in the same trace.
    pub(crate) fn new_child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::generate(),
            parent_span_id: Some(self.span_id),
        }
    }
}

/// A span that is still running.
///
/// Obtained from [`Tracer::start_span`](super::Tracer::start_span) and closed
/// with [`Tracer::end_span`](super::Tracer::end_span).
#[derive(Debug)]
pub struct ActiveSpan {
    context: SpanContext,
    name: String,
    start_time: DateTime<Utc>,
    started: Instant,
    attributes: Map<String, Value>,
    events: Vec<SpanEvent>,
    status_message: Option<String>,
}

impl ActiveSpan {
    pub(crate) fn new(name: String, context: SpanContext) -> Self {
        Self {
            context,
            name,
            start_time: Utc::now(),
            started: Instant::now(),
            attributes: Map::new(),
            events: Vec::new(),
            status_message: None,
        }
    }

    pub fn context(&self) -> SpanContext {
        self.context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn add_event(&mut self, name: impl Into<String>, attributes: Map<String, Value>) {
        self.events.push(SpanEvent::new(name, attributes));
    }

    /// Record a failure using the OpenTelemetry `exception` event convention.
    pub fn record_exception(&mut self, error_type: &str, message: &str, stack_trace: &str) {
        let mut attributes = Map::new();
        attributes.insert("exception.type".into(), error_type.into());
        attributes.insert("exception.message".into(), message.into());
        attributes.insert("exception.stacktrace".into(), stack_trace.into());
        self.add_event("exception", attributes);
        self.status_message = Some(format!("{error_type}: {message}"));
    }

    pub(crate) fn finish(self, status: SpanStatus) -> SpanData {
        let duration_ms = self.elapsed_ms();
        SpanData {
            trace_id: self.context.trace_id,
            span_id: self.context.span_id,
            parent_span_id: self.context.parent_span_id,
            name: self.name,
            start_time: self.start_time,
            end_time: Utc::now(),
            duration_ms,
            status,
            status_message: self.status_message,
            attributes: self.attributes,
            events: self.events,
        }
    }
}

/// A closed, immutable span as handed to outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub attributes: Map<String, Value>,
    pub events: Vec<SpanEvent>,
}
