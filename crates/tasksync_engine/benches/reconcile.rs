//! Reconciliation benchmarks.

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tasksync_engine::{reconcile, ScopeId, SyncRecord};
use tasksync_model::CommonTask;
use tasksync_testkit::{at, left_task, mirror, LEFT_LIST, RIGHT_PROJECT};

/// Builds `n` mapped pairs; every tenth left task was edited since.
fn mapped_snapshots(n: usize) -> (Vec<CommonTask>, Vec<CommonTask>, Vec<SyncRecord>) {
    let base = at("2026-01-20T09:00:00Z");
    let scope = ScopeId::new(LEFT_LIST, RIGHT_PROJECT);
    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);
    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let l = left_task(&format!("l{i}"), &format!("Task {i}")).with_modified_at(base);
        let r = mirror(&l, &format!("r{i}"));
        records.push(SyncRecord::new(&l.id, &r.id, scope.clone()).with_watermarks(Some(base), Some(base)));
        let l = if i % 10 == 0 {
            let mut edited = l.with_modified_at(base + Duration::hours(1));
            edited.title.push_str(" (edited)");
            edited
        } else {
            l
        };
        left.push(l);
        right.push(r);
    }
    (left, right, records)
}

/// Builds `n` unmapped tasks per side with matching titles.
fn unmapped_snapshots(n: usize) -> (Vec<CommonTask>, Vec<CommonTask>) {
    let left: Vec<_> = (0..n)
        .map(|i| left_task(&format!("l{i}"), &format!("Task {i}")))
        .collect();
    let right = left.iter().map(|t| mirror(t, &format!("r-{}", t.id))).collect();
    (left, right)
}

/// Benchmark reconciling mapped pairs.
fn bench_mapped(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_mapped");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (left, right, records) = mapped_snapshots(size);
            b.iter(|| {
                let plan = reconcile(black_box(&left), black_box(&right), black_box(&records));
                black_box(plan);
            });
        });
    }

    group.finish();
}

/// Benchmark auto-matching a first sync.
fn bench_auto_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_auto_match");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (left, right) = unmapped_snapshots(size);
            b.iter(|| {
                let plan = reconcile(black_box(&left), black_box(&right), &[]);
                black_box(plan);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mapped, bench_auto_match);
criterion_main!(benches);
