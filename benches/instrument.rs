// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for wrapped calls and bounded capture.
//!
//! Run with: `cargo bench --bench instrument`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::hint::black_box;

use agentrace::serializer::serialize;
use agentrace::{traced_tool, traced_tool_async, Observability};

/// A nested payload roughly the shape of a tool result.
fn payload(width: usize, depth: usize) -> Value {
    if depth == 0 {
        return json!({"text": "lorem ipsum dolor sit amet", "score": 0.42});
    }
    let children: Vec<Value> = (0..width).map(|_| payload(width, depth - 1)).collect();
    json!({"depth": depth, "children": children})
}

fn bench_sync_wrapper(c: &mut Criterion) {
    let obs = Observability::builder().capture_backtrace(false).build();
    let tool = traced_tool(&obs, "echo", |s: String| Ok::<_, String>(s));
    let failing = traced_tool(&obs, "fail", |_: ()| Err::<(), _>("boom".to_string()));

    let mut group = c.benchmark_group("sync_wrapper");
    group.throughput(Throughput::Elements(1));

    group.bench_function("bare_call", |b| {
        let f = |s: String| Ok::<_, String>(s);
        b.iter(|| f(black_box("hello".to_string())));
    });

    group.bench_function("traced_call", |b| {
        b.iter(|| tool.call(black_box("hello".to_string())));
    });

    group.bench_function("traced_error", |b| {
        b.iter(|| failing.call(black_box(())));
    });

    group.finish();
}

fn bench_async_wrapper(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let obs = Observability::builder().capture_backtrace(false).build();
    let tool = traced_tool_async(&obs, "fetch", |n: u64| async move { Ok::<_, String>(n * 2) });
    let inner = &tool;
    let outer = traced_tool_async(&obs, "outer", move |n: u64| async move {
        inner.call(n).await
    });

    let mut group = c.benchmark_group("async_wrapper");
    group.throughput(Throughput::Elements(1));

    group.bench_function("traced_call", |b| {
        b.to_async(&rt).iter(|| tool.call(black_box(21)));
    });

    group.bench_function("nested_call", |b| {
        b.to_async(&rt).iter(|| outer.call(black_box(21)));
    });

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for (width, depth) in [(2, 3), (4, 4), (8, 4)] {
        let value = payload(width, depth);
        let id = format!("{width}x{depth}");

        group.bench_with_input(BenchmarkId::new("within_budget", &id), &value, |b, v| {
            b.iter(|| serialize(black_box(v), 10));
        });

        group.bench_with_input(BenchmarkId::new("cut_at_2", &id), &value, |b, v| {
            b.iter(|| serialize(black_box(v), 2));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sync_wrapper,
    bench_async_wrapper,
    bench_serialize
);
criterion_main!(benches);
