// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Task-scoped propagation of business metadata and span identity.
//!
//! An [`ObservabilityContext`] bundles the run's session/request ids, the
//! component call stack, and the identity of the active span. The two halves
//! are installed together in a single task-local slot, so a record stamped
//! from the current context always names the span that was active when the
//! context was installed.
//!
//! Installation is always scoped:
//!
//! - [`ObservabilityContext::scope`] for futures: the context is swapped in on
//!   every poll and swapped out when the poll returns, so suspension never
//!   leaks it to other tasks sharing the worker thread.
//! - [`ObservabilityContext::sync_scope`] for synchronous code (works on any
//!   thread, with or without a tokio runtime).
//!
//! A task spawned with `tokio::spawn` starts without a context. Capture one
//! explicitly with [`ObservabilityContext::current`] (or
//! `Observability::propagate`) to keep parent linkage across the spawn.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::schema::ComponentType;
use crate::tracer::{SpanContext, SpanId, TraceId};

/// Reported as `triggered_by` for components with no caller in the stack.
pub const ROOT_SENTINEL: &str = "root";

tokio::task_local! {
    static CURRENT: ObservabilityContext;
}

/// Propagated metadata plus derived span identity.
///
/// Cheap to clone: ids and the stack are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityContext {
    session_id: Arc<str>,
    request_id: Arc<str>,
    component_stack: Arc<Vec<String>>,
    component_type: ComponentType,
    span: Option<SpanContext>,
}

impl ObservabilityContext {
    /// A root context with fresh session and request ids.
    ///
    /// `entry` becomes the single stack entry (usually the service name).
    pub fn root(entry: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string().into(),
            request_id: Uuid::new_v4().to_string().into(),
            component_stack: Arc::new(vec![entry.into()]),
            component_type: ComponentType::Custom("runtime".to_string()),
            span: None,
        }
    }

    /// Replace the session id. Only meaningful on a root context.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into().into();
        self
    }

    /// Replace the request id. Only meaningful on a root context.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into().into();
        self
    }

    /// The context installed for the calling task or thread, if any.
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// A child for `component_name`, identified by `span`.
    ///
    /// Ids are inherited; the parent is left untouched.
    pub fn child(
        &self,
        component_type: ComponentType,
        component_name: impl Into<String>,
        span: SpanContext,
    ) -> Self {
        let mut stack = Vec::with_capacity(self.component_stack.len() + 1);
        stack.extend(self.component_stack.iter().cloned());
        stack.push(component_name.into());
        Self {
            session_id: Arc::clone(&self.session_id),
            request_id: Arc::clone(&self.request_id),
            component_stack: Arc::new(stack),
            component_type,
            span: Some(span),
        }
    }

    /// Same metadata, different active span.
    pub(crate) fn with_span(&self, span: SpanContext) -> Self {
        Self {
            span: Some(span),
            ..self.clone()
        }
    }

    /// Run `f` with this context installed.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }

    /// Drive `fut` with this context installed on every poll.
    pub fn scope<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        CURRENT.scope(self, fut)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn component_stack(&self) -> &[String] {
        &self.component_stack
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    /// Name of the current component (top of the stack).
    pub fn component_name(&self) -> &str {
        self.component_stack
            .last()
            .map(String::as_str)
            .unwrap_or(ROOT_SENTINEL)
    }

    /// The component that invoked the current one.
    pub fn triggered_by(&self) -> &str {
        match self.component_stack.len() {
            0 | 1 => ROOT_SENTINEL,
            n => &self.component_stack[n - 2],
        }
    }

    pub fn span(&self) -> Option<SpanContext> {
        self.span
    }

    pub fn trace_id(&self) -> Option<TraceId> {
        self.span.map(|s| s.trace_id())
    }

    pub fn span_id(&self) -> Option<SpanId> {
        self.span.map(|s| s.span_id())
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.span.and_then(|s| s.parent_span_id())
    }
}
