// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lifecycle of one wrapped call: span, child context and records.

use std::any::type_name;
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use super::usage::{UsageMetrics, UsageProbe};
use crate::context::ObservabilityContext;
use crate::error::panic_message;
use crate::runtime::Observability;
use crate::schema::{event_name, metric, span_name, ComponentType, Metrics, Phase, Tags};
use crate::tracer::{ActiveSpan, SpanStatus};

/// `error_type` reported when the callable panics.
pub const PANIC_ERROR_TYPE: &str = "panic";

/// `error_type` reported when an async call is dropped before completing.
pub const CANCELLED_ERROR_TYPE: &str = "cancelled";

/// What an error record carries under `data.error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub error_type: String,
    pub error_message: String,
    pub stack_trace: String,
}

impl Failure {
    /// Describe an error returned by the callable.
    ///
    /// `error_type` is the short name of `E`. For type-erased errors
    /// (`Box<dyn Error>`, `anyhow::Error`) it is the concrete error's name
    /// when its `Debug` output starts with one, as in `ParseIntError { .. }`;
    /// otherwise the erased name (`Error`) is reported.
    pub fn from_error<E: Display + Debug>(err: &E, capture_backtrace: bool) -> Self {
        let error_type = error_type_name(err);
        let error_message = err.to_string();
        let stack_trace = stack_trace(&error_type, &error_message, Some(err), capture_backtrace);
        Self {
            error_type,
            error_message,
            stack_trace,
        }
    }

    fn new(error_type: &str, error_message: String, capture_backtrace: bool) -> Self {
        let stack_trace = stack_trace::<()>(error_type, &error_message, None, capture_backtrace);
        Self {
            error_type: error_type.to_string(),
            error_message,
            stack_trace,
        }
    }
}

fn stack_trace<E: Debug>(
    error_type: &str,
    message: &str,
    err: Option<&E>,
    capture_backtrace: bool,
) -> String {
    let mut trace = format!("{error_type}: {message}");
    if let Some(err) = err {
        trace.push_str(&format!("\n{err:?}"));
    }
    if capture_backtrace {
        trace.push_str(&format!("\nstack backtrace:\n{}", Backtrace::force_capture()));
    }
    trace
}

/// Error types whose `type_name` says nothing about the underlying error.
const ERASED_ERRORS: &[&str] = &["anyhow::Error"];

fn error_type_name<E: Debug>(err: &E) -> String {
    let full = type_name::<E>();
    let erased = match full.split_once("dyn ") {
        Some((_, inner)) => inner.split([' ', '>']).next().unwrap_or(inner),
        None if ERASED_ERRORS.contains(&full) => full,
        None => return short_type_name(full).to_string(),
    };
    let debug = format!("{err:?}");
    debug_type_name(&debug)
        .unwrap_or_else(|| short_type_name(erased))
        .to_string()
}

/// Leading type name of a derived `Debug` output (`Name { .. }`, `Name(..)`).
fn debug_type_name(debug: &str) -> Option<&str> {
    let end = debug
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(debug.len());
    let (name, rest) = debug.split_at(end);
    let rest = rest.trim_start();
    let is_type = name.starts_with(|c: char| c.is_ascii_uppercase())
        && (rest.starts_with('{') || rest.starts_with('('));
    is_type.then_some(name)
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// One in-flight wrapped call.
///
/// Created when the call begins; finished exactly once by
/// [`complete`](Self::complete) or [`panicked`](Self::panicked). If it is
/// dropped unfinished, the call is recorded as a failure: `panic` while
/// unwinding, `cancelled` otherwise.
pub(crate) struct Invocation {
    obs: Observability,
    kind: ComponentType,
    span: Option<ActiveSpan>,
    context: ObservabilityContext,
    started: Instant,
}

impl Invocation {
    /// Start a child span under the current span, build the child context
    /// from it and emit the input record.
    pub(crate) fn begin<A: Serialize + ?Sized>(
        obs: &Observability,
        kind: &ComponentType,
        name: &str,
        args: &A,
    ) -> Self {
        let parent = obs.current_context();
        let mut span = obs.tracer().start_span(span_name(kind, name), parent.span().as_ref());
        span.set_attribute("component.type", kind.label());
        span.set_attribute("component.name", name);
        span.set_attribute("session.id", parent.session_id());
        span.set_attribute("request.id", parent.request_id());

        let context = parent.child(kind.clone(), name, span.context());
        span.set_attribute("triggered_by", context.triggered_by());

        let mut input = Map::new();
        input.insert("args".to_string(), obs.emitter().capture(args));
        let mut data = Map::new();
        data.insert("input".to_string(), Value::Object(input));

        obs.emitter().emit_map(
            Phase::Input.level(),
            &event_name(kind, Phase::Input),
            &context,
            data,
            None,
            Some(tags(kind, false)),
        );

        Self {
            obs: obs.clone(),
            kind: kind.clone(),
            span: Some(span),
            context,
            started: Instant::now(),
        }
    }

    /// The child context to install while the callable runs.
    pub(crate) fn context(&self) -> &ObservabilityContext {
        &self.context
    }

    /// Record the callable's result. The result itself is left untouched.
    pub(crate) fn complete<T, E, U>(mut self, result: &Result<T, E>)
    where
        T: Serialize,
        E: Display + Debug,
        U: UsageProbe<T>,
    {
        match result {
            Ok(value) => self.succeed(value, U::probe(value)),
            Err(err) => {
                let failure = Failure::from_error(err, self.obs.capture_backtrace());
                self.fail(failure);
            }
        }
    }

    /// Record a panic caught from the callable.
    pub(crate) fn panicked(mut self, payload: &(dyn std::any::Any + Send)) {
        let failure = Failure::new(
            PANIC_ERROR_TYPE,
            panic_message(payload),
            self.obs.capture_backtrace(),
        );
        self.fail(failure);
    }

    fn succeed<T: Serialize>(&mut self, value: &T, usage: Option<UsageMetrics>) {
        let Some(mut span) = self.span.take() else {
            return;
        };
        let duration_ms = self.elapsed_ms();

        let mut metrics = Metrics::new();
        metrics.insert(metric::DURATION_MS.to_string(), duration_ms);
        if let Some(usage) = usage {
            usage.merge_into(&mut metrics);
            for (key, value) in &metrics {
                if key != metric::DURATION_MS {
                    span.set_attribute(format!("gen_ai.usage.{key}"), *value);
                }
            }
        }

        let mut data = Map::new();
        data.insert("output".to_string(), self.obs.emitter().capture(value));

        self.obs.tracer().end_span(span, SpanStatus::Ok);
        self.obs.emitter().emit_map(
            Phase::Output.level(),
            &event_name(&self.kind, Phase::Output),
            &self.context,
            data,
            Some(metrics),
            Some(tags(&self.kind, false)),
        );
    }

    fn fail(&mut self, failure: Failure) {
        let Some(mut span) = self.span.take() else {
            return;
        };
        let duration_ms = self.elapsed_ms();

        span.record_exception(
            &failure.error_type,
            &failure.error_message,
            &failure.stack_trace,
        );
        self.obs.tracer().end_span(span, SpanStatus::Error);

        let mut metrics = Metrics::new();
        metrics.insert(metric::DURATION_MS.to_string(), duration_ms);

        let mut data = Map::new();
        data.insert("error".to_string(), self.obs.emitter().capture(&failure));

        self.obs.emitter().emit_map(
            Phase::Error.level(),
            &event_name(&self.kind, Phase::Error),
            &self.context,
            data,
            Some(metrics),
            Some(tags(&self.kind, true)),
        );
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        if self.span.is_none() {
            return;
        }
        let capture = self.obs.capture_backtrace();
        let failure = if std::thread::panicking() {
            Failure::new(PANIC_ERROR_TYPE, "panicked while in flight".to_string(), capture)
        } else {
            Failure::new(
                CANCELLED_ERROR_TYPE,
                "dropped before completion".to_string(),
                capture,
            )
        };
        self.fail(failure);
    }
}

fn tags(kind: &ComponentType, failed: bool) -> Tags {
    let mut tags = Tags::new();
    tags.insert(kind.prefix());
    if failed {
        tags.insert("error".to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ValueError(String);

    impl Display for ValueError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for ValueError {}

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("my_crate::tools::ValueError"), "ValueError");
        assert_eq!(short_type_name("alloc::boxed::Box<dyn core::error::Error>"), "Box");
        assert_eq!(short_type_name("String"), "String");
    }

    #[test]
    fn test_failure_from_error() {
        let failure = Failure::from_error(&ValueError("boom".into()), false);
        assert_eq!(failure.error_type, "ValueError");
        assert_eq!(failure.error_message, "boom");
        assert!(failure.stack_trace.starts_with("ValueError: boom"));
        assert!(failure.stack_trace.contains("ValueError(\"boom\")"));
        assert!(!failure.stack_trace.contains("stack backtrace"));
    }

    #[test]
    fn test_erased_errors_report_concrete_type() {
        let parse_err = "x".parse::<u32>().unwrap_err();
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(parse_err.clone());
        assert_eq!(Failure::from_error(&boxed, false).error_type, "ParseIntError");

        let boxed: Box<dyn std::error::Error> = Box::new(ValueError("boom".into()));
        assert_eq!(Failure::from_error(&boxed, false).error_type, "ValueError");

        let boxed: Box<dyn std::error::Error> = "plain message".into();
        assert_eq!(Failure::from_error(&boxed, false).error_type, "Error");

        let any = anyhow::anyhow!("network down");
        assert_eq!(Failure::from_error(&any, false).error_type, "Error");
    }

    #[test]
    fn test_debug_type_name() {
        assert_eq!(debug_type_name("ParseIntError { kind: Empty }"), Some("ParseIntError"));
        assert_eq!(debug_type_name("Timeout(500)"), Some("Timeout"));
        assert_eq!(debug_type_name("\"plain\""), None);
        assert_eq!(debug_type_name("Connection refused"), None);
    }

    #[test]
    fn test_failure_with_backtrace() {
        let failure = Failure::from_error(&ValueError("boom".into()), true);
        assert!(failure.stack_trace.contains("stack backtrace:"));
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            tags(&ComponentType::Tool, true).into_iter().collect::<Vec<_>>(),
            vec!["error", "tool"]
        );
        assert_eq!(tags(&ComponentType::LlmClient, false).len(), 1);
    }
}
