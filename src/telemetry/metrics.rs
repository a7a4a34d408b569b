// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Self-diagnostic counters for the instrumentation pipeline.
//!
//! One [`DiagnosticsMetrics`] lives in each runtime. The per-call path only
//! touches atomics; the per-output failure map is written only when an
//! output actually fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::tracer::SpanStatus;

/// Counters describing what the pipeline did, and what it absorbed.
#[derive(Debug)]
pub struct DiagnosticsMetrics {
    records_emitted: AtomicU64,
    spans_started: AtomicU64,
    spans_closed: AtomicU64,
    spans_failed: AtomicU64,
    serializer_fallbacks: AtomicU64,

    /// Failures per output name.
    output_failures: RwLock<HashMap<String, u64>>,

    /// Latency of closed spans.
    span_latency: Histogram,

    start_time: Instant,
}

impl DiagnosticsMetrics {
    pub fn new() -> Self {
        Self {
            records_emitted: AtomicU64::new(0),
            spans_started: AtomicU64::new(0),
            spans_closed: AtomicU64::new(0),
            spans_failed: AtomicU64::new(0),
            serializer_fallbacks: AtomicU64::new(0),
            output_failures: RwLock::new(HashMap::new()),
            span_latency: Histogram::default(),
            start_time: Instant::now(),
        }
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_span_started(&self) {
        self.spans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_span_closed(&self, status: SpanStatus, duration_ms: f64) {
        self.spans_closed.fetch_add(1, Ordering::Relaxed);
        if status == SpanStatus::Error {
            self.spans_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.span_latency
            .record(Duration::from_secs_f64(duration_ms.max(0.0) / 1000.0));
    }

    pub fn record_fallbacks(&self, count: usize) {
        if count > 0 {
            self.serializer_fallbacks
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_output_failure(&self, output: &str) {
        let mut failures = self
            .output_failures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *failures.entry(output.to_string()).or_insert(0) += 1;
    }

    /// Failures recorded for one output.
    pub fn output_failures(&self, output: &str) -> u64 {
        self.output_failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(output)
            .copied()
            .unwrap_or(0)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            spans_started: self.spans_started.load(Ordering::Relaxed),
            spans_closed: self.spans_closed.load(Ordering::Relaxed),
            spans_failed: self.spans_failed.load(Ordering::Relaxed),
            serializer_fallbacks: self.serializer_fallbacks.load(Ordering::Relaxed),
            output_failures: self
                .output_failures
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            span_p50: self.span_latency.p50(),
            span_p99: self.span_latency.p99(),
            uptime: self.uptime(),
        }
    }
}

impl Default for DiagnosticsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`DiagnosticsMetrics`].
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    pub records_emitted: u64,
    pub spans_started: u64,
    pub spans_closed: u64,
    pub spans_failed: u64,
    pub serializer_fallbacks: u64,
    pub output_failures: HashMap<String, u64>,
    pub span_p50: Duration,
    pub span_p99: Duration,
    pub uptime: Duration,
}

impl DiagnosticsSnapshot {
    /// Spans started but not yet closed.
    pub fn spans_open(&self) -> u64 {
        self.spans_started.saturating_sub(self.spans_closed)
    }

    pub fn total_output_failures(&self) -> u64 {
        self.output_failures.values().sum()
    }
}

/// Lock-free histogram with fixed buckets for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow bucket.
    counts: Vec<AtomicU64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self { buckets, counts }
    }

    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile: the upper bound of the bucket holding it.
    pub fn percentile(&self, p: f64) -> Duration {
        let counts = self.counts();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(bound) => *bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us, 1ms, 10ms, 100ms, 1s, 10s
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}
