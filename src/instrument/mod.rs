// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wrappers that trace and log a component call without touching its code.
//!
//! A wrapped callable keeps its argument and return types. Each call:
//!
//! 1. starts a child span `"{kind}.{name}"` under the current span,
//! 2. installs a child context built from that span,
//! 3. emits `"{kind}.input"` with `data.input.args`,
//! 4. runs the callable,
//! 5. closes the span and emits `"{kind}.output"` or `"{kind}.error"`,
//! 6. restores the previous context.
//!
//! Errors are returned unchanged and panics are resumed after being recorded.
//! An async call dropped before completion is recorded as `cancelled`.
//!
//! # Example
//!
//! ```rust,ignore
//! let navigate = traced_tool_async(&obs, "navigate", |(url,): (String,)| async move {
//!     browser.open(&url).await
//! });
//! let page = navigate.call((url,)).await?;
//! ```
//!
//! Arguments are a single `Serialize` value; use a tuple for several.

mod invocation;
mod usage;

pub use invocation::{Failure, CANCELLED_ERROR_TYPE, PANIC_ERROR_TYPE};
pub use usage::{HasUsageMetrics, NoUsage, ReportedUsage, UsageMetrics, UsageProbe};

use std::fmt::{Debug, Display};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use serde::Serialize;

use crate::runtime::Observability;
use crate::schema::ComponentType;
use invocation::Invocation;
use usage::ProbeMarker;

/// A traced synchronous callable.
pub struct Traced<F, U = NoUsage> {
    obs: Observability,
    kind: ComponentType,
    name: String,
    f: F,
    _usage: ProbeMarker<U>,
}

impl<F> Traced<F, NoUsage> {
    pub fn new(obs: &Observability, kind: ComponentType, name: impl Into<String>, f: F) -> Self {
        Self {
            obs: obs.clone(),
            kind,
            name: name.into(),
            f,
            _usage: ProbeMarker::default(),
        }
    }
}

impl<F, U> Traced<F, U> {
    /// Attach usage metrics reported by the result (see [`HasUsageMetrics`]).
    pub fn with_usage(self) -> Traced<F, ReportedUsage> {
        Traced {
            obs: self.obs,
            kind: self.kind,
            name: self.name,
            f: self.f,
            _usage: ProbeMarker::default(),
        }
    }

    pub fn kind(&self) -> &ComponentType {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callable inside its own span.
    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
        T: Serialize,
        E: Display + Debug,
        U: usage::UsageProbe<T>,
    {
        let invocation = Invocation::begin(&self.obs, &self.kind, &self.name, &args);
        let outcome = invocation
            .context()
            .clone()
            .sync_scope(|| panic::catch_unwind(AssertUnwindSafe(|| (self.f)(args))));

        match outcome {
            Ok(result) => {
                invocation.complete::<T, E, U>(&result);
                result
            }
            Err(payload) => {
                invocation.panicked(payload.as_ref());
                panic::resume_unwind(payload)
            }
        }
    }

    /// Turn the wrapper into a plain closure with the original signature.
    pub fn into_fn<A, T, E>(self) -> impl Fn(A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
        T: Serialize,
        E: Display + Debug,
        U: usage::UsageProbe<T>,
    {
        move |args| self.call(args)
    }
}

impl<F, U> Debug for Traced<F, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traced")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// A traced asynchronous callable.
pub struct TracedAsync<F, U = NoUsage> {
    obs: Observability,
    kind: ComponentType,
    name: String,
    f: F,
    _usage: ProbeMarker<U>,
}

impl<F> TracedAsync<F, NoUsage> {
    pub fn new(obs: &Observability, kind: ComponentType, name: impl Into<String>, f: F) -> Self {
        Self {
            obs: obs.clone(),
            kind,
            name: name.into(),
            f,
            _usage: ProbeMarker::default(),
        }
    }
}

impl<F, U> TracedAsync<F, U> {
    /// Attach usage metrics reported by the result (see [`HasUsageMetrics`]).
    pub fn with_usage(self) -> TracedAsync<F, ReportedUsage> {
        TracedAsync {
            obs: self.obs,
            kind: self.kind,
            name: self.name,
            f: self.f,
            _usage: ProbeMarker::default(),
        }
    }

    pub fn kind(&self) -> &ComponentType {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callable inside its own span.
    ///
    /// Nothing happens until the returned future is first polled. The child
    /// context is installed on every poll, so suspension never leaks it.
    pub fn call<'a, A: 'a, Fut: 'a, T: 'a, E: 'a>(
        &'a self,
        args: A,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Serialize,
        T: Serialize,
        E: Display + Debug,
        U: usage::UsageProbe<T>,
    {
        async move {
            let invocation = Invocation::begin(&self.obs, &self.kind, &self.name, &args);
            let body = AssertUnwindSafe(async move { (self.f)(args).await }).catch_unwind();
            let outcome = invocation.context().clone().scope(body).await;

            match outcome {
                Ok(result) => {
                    invocation.complete::<T, E, U>(&result);
                    result
                }
                Err(payload) => {
                    invocation.panicked(payload.as_ref());
                    panic::resume_unwind(payload)
                }
            }
        }
    }
}

impl<F, U> Debug for TracedAsync<F, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedAsync")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Wrap a synchronous agent.
pub fn traced_agent<F>(obs: &Observability, name: impl Into<String>, f: F) -> Traced<F> {
    Traced::new(obs, ComponentType::Agent, name, f)
}

/// Wrap a synchronous tool.
pub fn traced_tool<F>(obs: &Observability, name: impl Into<String>, f: F) -> Traced<F> {
    Traced::new(obs, ComponentType::Tool, name, f)
}

/// Wrap a synchronous LLM client. Usage reported by the result is recorded.
pub fn traced_llm<F>(
    obs: &Observability,
    name: impl Into<String>,
    f: F,
) -> Traced<F, ReportedUsage> {
    Traced::new(obs, ComponentType::LlmClient, name, f).with_usage()
}

/// Wrap an async agent.
pub fn traced_agent_async<F>(obs: &Observability, name: impl Into<String>, f: F) -> TracedAsync<F> {
    TracedAsync::new(obs, ComponentType::Agent, name, f)
}

/// Wrap an async tool.
pub fn traced_tool_async<F>(obs: &Observability, name: impl Into<String>, f: F) -> TracedAsync<F> {
    TracedAsync::new(obs, ComponentType::Tool, name, f)
}

/// Wrap an async LLM client. Usage reported by the result is recorded.
pub fn traced_llm_async<F>(
    obs: &Observability,
    name: impl Into<String>,
    f: F,
) -> TracedAsync<F, ReportedUsage> {
    TracedAsync::new(obs, ComponentType::LlmClient, name, f).with_usage()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use crate::schema::LogLevel;
    use crate::tracer::SpanStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn runtime() -> (Observability, Arc<MemoryOutput>) {
        let memory = Arc::new(MemoryOutput::new());
        let obs = Observability::builder()
            .service_name("tests")
            .capture_backtrace(false)
            .output(memory.clone())
            .build();
        (obs, memory)
    }

    #[test]
    fn test_success_emits_input_and_output() {
        let (obs, memory) = runtime();
        let add = traced_tool(&obs, "add", |(a, b): (i32, i32)| Ok::<_, String>(a + b));

        assert_eq!(add.call((2, 3)), Ok(5));

        let records = memory.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, "tool.input");
        assert_eq!(records[0].level, LogLevel::Debug);
        assert_eq!(records[0].data["input"]["args"], json!([2, 3]));
        assert_eq!(records[1].event, "tool.output");
        assert_eq!(records[1].level, LogLevel::Info);
        assert_eq!(records[1].data["output"], 5);
        assert!(records[1].duration_ms().unwrap() >= 0.0);
        assert!(records[1].tags.contains("tool"));

        let spans = memory.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "tool.add");
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(records[0].span_id, Some(spans[0].span_id));
    }

    #[test]
    fn test_error_returned_unchanged() {
        let (obs, memory) = runtime();
        let parse = traced_tool(&obs, "parse", |s: String| s.parse::<u32>());

        let err = parse.call("nope".to_string()).unwrap_err();
        assert_eq!(err, "nope".parse::<u32>().unwrap_err());

        let errors = memory.records_named("tool.error");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].level, LogLevel::Error);
        assert_eq!(errors[0].data["error"]["error_type"], "ParseIntError");
        assert!(!errors[0].data["error"]["stack_trace"]
            .as_str()
            .unwrap()
            .is_empty());
        assert!(errors[0].tags.contains("error"));
        assert_eq!(memory.spans()[0].status, SpanStatus::Error);
    }

    #[test]
    fn test_panic_recorded_and_resumed() {
        let (obs, memory) = runtime();
        let explode = traced_agent(&obs, "explode", |_: ()| -> Result<(), String> {
            panic!("kaboom")
        });

        let caught = panic::catch_unwind(AssertUnwindSafe(|| explode.call(())));
        assert!(caught.is_err());

        let errors = memory.records_named("agent.error");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].data["error"]["error_type"], PANIC_ERROR_TYPE);
        assert_eq!(errors[0].data["error"]["error_message"], "kaboom");
        assert!(obs.current_context().span().is_none());
    }

    #[test]
    fn test_llm_usage_merged() {
        let (obs, memory) = runtime();
        let summarize = traced_llm(&obs, "summarize", |text: String| {
            Ok::<_, String>(json!({
                "summary": &text[..4],
                "usage": {"input_tokens": 40, "output_tokens": 8, "cost_usd": 0.0005}
            }))
        });

        summarize.call("long text".to_string()).unwrap();

        let outputs = memory.records_named("llm_client.output");
        let output = &outputs[0];
        assert_eq!(output.metrics["input_tokens"], 40.0);
        assert_eq!(output.metrics["total_tokens"], 48.0);
        assert_eq!(output.metrics["cost_usd"], 0.0005);
        assert_eq!(
            memory.spans()[0].attributes["gen_ai.usage.input_tokens"],
            40.0
        );
    }

    #[test]
    fn test_into_fn_keeps_signature() {
        let (obs, memory) = runtime();
        let double = traced_tool(&obs, "double", |x: u8| Ok::<_, String>(x * 2)).into_fn();
        let results: Vec<_> = [1u8, 2, 3].into_iter().map(double).collect();

        assert_eq!(results, vec![Ok(2), Ok(4), Ok(6)]);
        assert_eq!(memory.spans().len(), 3);
    }

    #[tokio::test]
    async fn test_async_call_installs_child_context() {
        let (obs, memory) = runtime();
        let fetch = traced_tool_async(&obs, "fetch", |url: String| async move {
            tokio::task::yield_now().await;
            let ctx = crate::context::ObservabilityContext::current().unwrap();
            Ok::<_, String>(format!("{} via {}", url, ctx.component_name()))
        });

        let body = fetch.call("https://example.com".to_string()).await.unwrap();
        assert_eq!(body, "https://example.com via fetch");
        assert!(crate::context::ObservabilityContext::current().is_none());
        assert_eq!(memory.records().len(), 2);
    }

    #[tokio::test]
    async fn test_async_call_with_borrowed_args() {
        let (obs, memory) = runtime();
        let lookup = traced_tool_async(&obs, "lookup", |key: &str| {
            let key = key.to_uppercase();
            async move { Ok::<_, String>(key) }
        });

        let key = String::from("session");
        let pending = lookup.call(key.as_str());
        assert!(memory.records().is_empty());

        assert_eq!(pending.await, Ok("SESSION".to_string()));
        let records = memory.records();
        assert_eq!(records[0].data["input"]["args"], "session");
        assert_eq!(records[1].data["output"], "SESSION");
    }

    #[tokio::test]
    async fn test_dropped_future_recorded_as_cancelled() {
        let (obs, memory) = runtime();
        let slow = traced_tool_async(&obs, "slow", |_: ()| async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok::<_, String>(())
        });

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(10), slow.call(())).await;
        assert!(result.is_err());

        let errors = memory.records_named("tool.error");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].data["error"]["error_type"], CANCELLED_ERROR_TYPE);
        assert_eq!(memory.spans()[0].status, SpanStatus::Error);
    }
}
