// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Record types shared by the emitter, tracer and outputs.
//!
//! A [`LogRecord`] serializes to exactly the wire shape collectors and query
//! tools consume: hex trace/span ids, RFC 3339 timestamp, upper-case level and
//! component type, and free-form `data`/`metrics`/`tags`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::tracer::{SpanId, TraceId};

/// Severity attached to a record.
///
/// Purely informational: no component filters on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of component a record or span belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Agent,
    Tool,
    LlmClient,
    /// Host-defined kinds, e.g. `Custom("planner".into())`.
    Custom(String),
}

impl ComponentType {
    /// Lower-case prefix used in event and span names (`tool.input`).
    pub fn prefix(&self) -> String {
        match self {
            Self::Agent => "agent".to_string(),
            Self::Tool => "tool".to_string(),
            Self::LlmClient => "llm_client".to_string(),
            Self::Custom(kind) => kind.to_lowercase(),
        }
    }

    /// Upper-case wire label (`LLM_CLIENT`).
    pub fn label(&self) -> String {
        match self {
            Self::Agent => "AGENT".to_string(),
            Self::Tool => "TOOL".to_string(),
            Self::LlmClient => "LLM_CLIENT".to_string(),
            Self::Custom(kind) => kind.to_uppercase(),
        }
    }

    /// Parse a wire label or prefix; unknown kinds become `Custom`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Self::Agent,
            "tool" => Self::Tool,
            "llm_client" | "llm" => Self::LlmClient,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for ComponentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| Self::parse(&s))
    }
}

/// Lifecycle phase of a wrapped call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Input,
    Output,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Error => "error",
        }
    }

    /// Level a wrapped call records this phase at.
    pub fn level(&self) -> LogLevel {
        match self {
            Self::Input => LogLevel::Debug,
            Self::Output => LogLevel::Info,
            Self::Error => LogLevel::Error,
        }
    }
}

/// Event name for a component phase, e.g. `tool.output`.
pub fn event_name(kind: &ComponentType, phase: Phase) -> String {
    format!("{}.{}", kind.prefix(), phase.as_str())
}

/// Span name for a wrapped component, e.g. `agent.planner`.
pub fn span_name(kind: &ComponentType, name: &str) -> String {
    format!("{}.{}", kind.prefix(), name)
}

/// Well-known metric keys.
pub mod metric {
    pub const DURATION_MS: &str = "duration_ms";
    pub const INPUT_TOKENS: &str = "input_tokens";
    pub const OUTPUT_TOKENS: &str = "output_tokens";
    pub const TOTAL_TOKENS: &str = "total_tokens";
    pub const CACHED_TOKENS: &str = "cached_input_tokens";
    pub const COST_USD: &str = "cost_usd";
}

/// Numeric metrics attached to a record.
pub type Metrics = BTreeMap<String, f64>;

/// Ordered, de-duplicated tags.
pub type Tags = BTreeSet<String>;

/// One structured, correlated log emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub parent_span_id: Option<SpanId>,
    pub session_id: String,
    pub request_id: String,
    pub level: LogLevel,
    pub event: String,
    pub component_type: ComponentType,
    pub component_name: String,
    pub triggered_by: String,
    pub data: Map<String, Value>,
    pub metrics: Metrics,
    pub tags: Tags,
}

impl LogRecord {
    /// Duration metric, if the record carries one.
    pub fn duration_ms(&self) -> Option<f64> {
        self.metrics.get(metric::DURATION_MS).copied()
    }

    /// Serialize to a single JSON line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A timestamped event recorded on a span (e.g. `exception`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

impl SpanEvent {
    pub fn new(name: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> LogRecord {
        LogRecord {
            timestamp: "2026-01-02T03:04:05Z".parse().unwrap(),
            trace_id: Some("4bf92f3577b34da6a3ce929d0e0e4736".parse().unwrap()),
            span_id: Some("00f067aa0ba902b7".parse().unwrap()),
            parent_span_id: None,
            session_id: "s-1".to_string(),
            request_id: "r-1".to_string(),
            level: LogLevel::Info,
            event: "tool.output".to_string(),
            component_type: ComponentType::Tool,
            component_name: "navigate".to_string(),
            triggered_by: "crawler".to_string(),
            data: json!({"output": "ok"}).as_object().cloned().unwrap(),
            metrics: [("duration_ms".to_string(), 120.0)].into_iter().collect(),
            tags: ["tool".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_name(&ComponentType::Tool, Phase::Input), "tool.input");
        assert_eq!(event_name(&ComponentType::LlmClient, Phase::Output), "llm_client.output");
        assert_eq!(
            event_name(&ComponentType::Custom("Planner".into()), Phase::Error),
            "planner.error"
        );
        assert_eq!(span_name(&ComponentType::Agent, "crawler"), "agent.crawler");
    }

    #[test]
    fn test_phase_levels() {
        assert_eq!(Phase::Input.level(), LogLevel::Debug);
        assert_eq!(Phase::Output.level(), LogLevel::Info);
        assert_eq!(Phase::Error.level(), LogLevel::Error);
    }

    #[test]
    fn test_component_type_labels() {
        assert_eq!(ComponentType::LlmClient.label(), "LLM_CLIENT");
        assert_eq!(ComponentType::parse("LLM_CLIENT"), ComponentType::LlmClient);
        assert_eq!(ComponentType::parse("agent"), ComponentType::Agent);
        assert_eq!(
            ComponentType::parse("retriever"),
            ComponentType::Custom("retriever".to_string())
        );
    }

    #[test]
    fn test_record_wire_shape() {
        let value = serde_json::to_value(sample_record()).unwrap();

        assert_eq!(value["timestamp"], json!("2026-01-02T03:04:05Z"));
        assert_eq!(value["trace_id"], json!("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert_eq!(value["span_id"], json!("00f067aa0ba902b7"));
        assert_eq!(value["parent_span_id"], Value::Null);
        assert_eq!(value["level"], json!("INFO"));
        assert_eq!(value["component_type"], json!("TOOL"));
        assert_eq!(value["metrics"]["duration_ms"], json!(120.0));
        assert_eq!(value["tags"], json!(["tool"]));
    }

    #[test]
    fn test_record_parses_back() {
        let record = sample_record();
        let line = record.to_json_line().unwrap();
        let parsed: LogRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.duration_ms(), Some(120.0));
    }
}
