// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process sink that keeps everything it receives.

use std::sync::{Arc, Mutex, PoisonError};

use super::{Output, OutputError};
use crate::schema::LogRecord;
use crate::tracer::{SpanData, TraceId};

/// Collects records and spans in memory, in arrival order.
///
/// Intended for tests and for hosts that inspect what a run produced.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    records: Mutex<Vec<Arc<LogRecord>>>,
    spans: Mutex<Vec<Arc<SpanData>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Arc<LogRecord>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn spans(&self) -> Vec<Arc<SpanData>> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records belonging to one trace.
    pub fn records_for_trace(&self, trace_id: TraceId) -> Vec<Arc<LogRecord>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.trace_id == Some(trace_id))
            .cloned()
            .collect()
    }

    /// Records with the given event name.
    pub fn records_named(&self, event: &str) -> Vec<Arc<LogRecord>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.event == event)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Output for MemoryOutput {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(record));
        Ok(())
    }

    fn write_span(&self, span: &Arc<SpanData>) -> Result<(), OutputError> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(span));
        Ok(())
    }

    fn flush(&self) -> Result<(), OutputError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{ActiveSpan, SpanContext, SpanStatus};
    use crate::schema::{ComponentType, LogLevel};
    use chrono::Utc;

    fn record(trace_id: Option<TraceId>, event: &str) -> Arc<LogRecord> {
        Arc::new(LogRecord {
            timestamp: Utc::now(),
            trace_id,
            span_id: None,
            parent_span_id: None,
            session_id: "s".to_string(),
            request_id: "r".to_string(),
            level: LogLevel::Debug,
            event: event.to_string(),
            component_type: ComponentType::Tool,
            component_name: "fetch".to_string(),
            triggered_by: "root".to_string(),
            data: Default::default(),
            metrics: Default::default(),
            tags: Default::default(),
        })
    }

    #[test]
    fn test_keeps_records_and_spans_in_order() {
        let memory = MemoryOutput::new();
        memory.write_log(&record(None, "tool.input")).unwrap();
        memory.write_log(&record(None, "tool.output")).unwrap();
        let span = ActiveSpan::new("tool.fetch".into(), SpanContext::new_root())
            .finish(SpanStatus::Ok);
        memory.write_span(&Arc::new(span)).unwrap();

        let events: Vec<_> = memory.records().iter().map(|r| r.event.clone()).collect();
        assert_eq!(events, vec!["tool.input", "tool.output"]);
        assert_eq!(memory.spans().len(), 1);
        assert_eq!(memory.records_named("tool.output").len(), 1);
    }

    #[test]
    fn test_records_for_trace() {
        let a = SpanContext::new_root().trace_id();
        let b = SpanContext::new_root().trace_id();
        let memory = MemoryOutput::new();
        memory.write_log(&record(Some(a), "agent.input")).unwrap();
        memory.write_log(&record(Some(b), "agent.input")).unwrap();
        memory.write_log(&record(Some(a), "agent.output")).unwrap();

        assert_eq!(memory.records_for_trace(a).len(), 2);
        assert_eq!(memory.records_for_trace(b).len(), 1);
    }

    #[test]
    fn test_clear() {
        let memory = MemoryOutput::new();
        memory.write_log(&record(None, "tool.input")).unwrap();
        memory.clear();
        assert!(memory.records().is_empty());
        assert!(memory.spans().is_empty());
    }
}
