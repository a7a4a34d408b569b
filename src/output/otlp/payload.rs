// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP/JSON request bodies for `/v1/traces` and `/v1/logs`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::schema::{LogLevel, LogRecord, SpanEvent};
use crate::tracer::SpanData;

/// Instrumentation scope reported on every export.
const SCOPE_NAME: &str = "agentrace";

/// OTLP `SPAN_KIND_INTERNAL`.
const SPAN_KIND_INTERNAL: u8 = 1;

/// Body for a traces export request.
pub fn traces_payload(service_name: &str, spans: &[Arc<SpanData>]) -> Value {
    let spans: Vec<Value> = spans.iter().map(|s| span_json(s)).collect();
    json!({
        "resourceSpans": [{
            "resource": resource(service_name),
            "scopeSpans": [{
                "scope": scope(),
                "spans": spans,
            }],
        }],
    })
}

/// Body for a logs export request.
pub fn logs_payload(service_name: &str, records: &[Arc<LogRecord>]) -> Value {
    let records: Vec<Value> = records.iter().map(|r| log_json(r)).collect();
    json!({
        "resourceLogs": [{
            "resource": resource(service_name),
            "scopeLogs": [{
                "scope": scope(),
                "logRecords": records,
            }],
        }],
    })
}

fn resource(service_name: &str) -> Value {
    json!({ "attributes": [key_value("service.name", &Value::from(service_name))] })
}

fn scope() -> Value {
    json!({ "name": SCOPE_NAME, "version": crate::VERSION })
}

fn span_json(span: &SpanData) -> Value {
    let mut out = Map::new();
    out.insert("traceId".into(), span.trace_id.to_hex().into());
    out.insert("spanId".into(), span.span_id.to_hex().into());
    if let Some(parent) = span.parent_span_id {
        out.insert("parentSpanId".into(), parent.to_hex().into());
    }
    out.insert("name".into(), span.name.clone().into());
    out.insert("kind".into(), SPAN_KIND_INTERNAL.into());
    out.insert("startTimeUnixNano".into(), unix_nanos(&span.start_time).into());
    out.insert("endTimeUnixNano".into(), unix_nanos(&span.end_time).into());
    out.insert("attributes".into(), attributes(&span.attributes));
    out.insert(
        "events".into(),
        span.events.iter().map(event_json).collect::<Vec<_>>().into(),
    );

    let mut status = Map::new();
    status.insert("code".into(), span.status.code().into());
    if let Some(message) = &span.status_message {
        status.insert("message".into(), message.clone().into());
    }
    out.insert("status".into(), status.into());
    Value::Object(out)
}

fn event_json(event: &SpanEvent) -> Value {
    json!({
        "timeUnixNano": unix_nanos(&event.timestamp),
        "name": event.name,
        "attributes": attributes(&event.attributes),
    })
}

fn log_json(record: &LogRecord) -> Value {
    let mut attrs = vec![
        key_value("event.name", &Value::from(record.event.as_str())),
        key_value("session.id", &Value::from(record.session_id.as_str())),
        key_value("request.id", &Value::from(record.request_id.as_str())),
        key_value("component.type", &Value::from(record.component_type.label())),
        key_value("component.name", &Value::from(record.component_name.as_str())),
        key_value("triggered_by", &Value::from(record.triggered_by.as_str())),
    ];
    if !record.data.is_empty() {
        attrs.push(key_value("data", &Value::Object(record.data.clone())));
    }
    for (name, value) in &record.metrics {
        attrs.push(key_value(&format!("metric.{name}"), &Value::from(*value)));
    }
    if !record.tags.is_empty() {
        let tags: Vec<Value> = record.tags.iter().map(|t| Value::from(t.as_str())).collect();
        attrs.push(key_value("tags", &Value::Array(tags)));
    }

    let mut out = Map::new();
    let nanos = unix_nanos(&record.timestamp);
    out.insert("timeUnixNano".into(), nanos.clone().into());
    out.insert("observedTimeUnixNano".into(), nanos.into());
    out.insert("severityNumber".into(), severity_number(record.level).into());
    out.insert("severityText".into(), record.level.as_str().into());
    out.insert("body".into(), json!({ "stringValue": record.event }));
    out.insert("attributes".into(), Value::Array(attrs));
    if let Some(trace_id) = record.trace_id {
        out.insert("traceId".into(), trace_id.to_hex().into());
    }
    if let Some(span_id) = record.span_id {
        out.insert("spanId".into(), span_id.to_hex().into());
    }
    Value::Object(out)
}

/// OTLP severity numbers (the first of each range).
fn severity_number(level: LogLevel) -> u8 {
    match level {
        LogLevel::Debug => 5,
        LogLevel::Info => 9,
        LogLevel::Warning => 13,
        LogLevel::Error => 17,
    }
}

/// Nanoseconds since the epoch, as the decimal string OTLP/JSON expects.
fn unix_nanos(time: &DateTime<Utc>) -> String {
    time.timestamp_nanos_opt().unwrap_or_default().to_string()
}

fn attributes(map: &Map<String, Value>) -> Value {
    map.iter()
        .map(|(k, v)| key_value(k, v))
        .collect::<Vec<_>>()
        .into()
}

fn key_value(key: &str, value: &Value) -> Value {
    json!({ "key": key, "value": any_value(value) })
}

/// Map a JSON value onto an OTLP `AnyValue`.
fn any_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({}),
        Value::Bool(b) => json!({ "boolValue": b }),
        Value::Number(n) => match n.as_i64() {
            // 64-bit integers travel as strings in OTLP/JSON.
            Some(i) => json!({ "intValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(any_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let values: Vec<Value> = map.iter().map(|(k, v)| key_value(k, v)).collect();
            json!({ "kvlistValue": { "values": values } })
        }
    }
}
