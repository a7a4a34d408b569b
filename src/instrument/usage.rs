// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token and cost metrics reported by LLM-client results.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{metric, Metrics};

/// Usage reported by one LLM call. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl UsageMetrics {
    pub fn tokens(input: u64, output: u64) -> Self {
        Self {
            input_tokens: Some(input),
            output_tokens: Some(output),
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_cached(mut self, cached_input_tokens: u64) -> Self {
        self.cached_input_tokens = Some(cached_input_tokens);
        self
    }

    /// Total tokens, derived from input + output when not reported.
    pub fn total(&self) -> Option<u64> {
        self.total_tokens.or(match (self.input_tokens, self.output_tokens) {
            (Some(i), Some(o)) => Some(i + o),
            _ => None,
        })
    }

    /// Merge the reported fields into a record's metrics.
    pub fn merge_into(&self, metrics: &mut Metrics) {
        let mut put = |key: &str, value: Option<f64>| {
            if let Some(v) = value {
                metrics.insert(key.to_string(), v);
            }
        };
        put(metric::INPUT_TOKENS, self.input_tokens.map(|v| v as f64));
        put(metric::OUTPUT_TOKENS, self.output_tokens.map(|v| v as f64));
        put(metric::TOTAL_TOKENS, self.total().map(|v| v as f64));
        put(metric::CACHED_TOKENS, self.cached_input_tokens.map(|v| v as f64));
        put(metric::COST_USD, self.cost_usd);
    }
}

/// Implemented by results that can report LLM usage.
///
/// The default reports nothing, so opting in is a one-line `impl`. Missing
/// usage is never an error.
pub trait HasUsageMetrics {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        None
    }
}

impl HasUsageMetrics for UsageMetrics {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        Some(*self)
    }
}

/// Reads a `usage` object shaped like [`UsageMetrics`].
impl HasUsageMetrics for Value {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        let usage = self.get("usage")?;
        serde_json::from_value(usage.clone()).ok()
    }
}

impl<T: HasUsageMetrics> HasUsageMetrics for Option<T> {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        self.as_ref().and_then(HasUsageMetrics::usage_metrics)
    }
}

impl<T: HasUsageMetrics + ?Sized> HasUsageMetrics for &T {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        (**self).usage_metrics()
    }
}

impl<T: HasUsageMetrics + ?Sized> HasUsageMetrics for Box<T> {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        (**self).usage_metrics()
    }
}

impl HasUsageMetrics for String {}
impl HasUsageMetrics for str {}
impl HasUsageMetrics for () {}

/// Decides whether a wrapper looks for usage on a result of type `T`.
pub trait UsageProbe<T> {
    fn probe(value: &T) -> Option<UsageMetrics>;
}

/// Never looks for usage. The default for agents and tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUsage;

impl<T> UsageProbe<T> for NoUsage {
    fn probe(_value: &T) -> Option<UsageMetrics> {
        None
    }
}

/// Asks the result through [`HasUsageMetrics`]. Used for LLM clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedUsage;

impl<T: HasUsageMetrics> UsageProbe<T> for ReportedUsage {
    fn probe(value: &T) -> Option<UsageMetrics> {
        value.usage_metrics()
    }
}

/// Zero-sized marker carrying a probe choice through a wrapper's type.
pub(crate) type ProbeMarker<U> = PhantomData<fn() -> U>;
