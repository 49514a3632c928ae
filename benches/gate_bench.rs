//! Benchmarks for the admission gate.
//!
//! Benchmarks cover:
//! - Uncontended admission (permit grant and release)
//! - Queued handoff between callers sharing the global slot
//! - Breaker check and failure-recording overhead
//! - Snapshot cost with many caller buckets

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use inference_gate::core::{
    AdmissionScheduler, AdmitLimits, BreakerSettings, CircuitBreaker,
};

fn scheduler(limits: AdmitLimits) -> AdmissionScheduler {
    AdmissionScheduler::new(
        limits,
        Arc::new(CircuitBreaker::new(BreakerSettings::default())),
    )
}

fn bench_uncontended_admission(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("uncontended_admission");
    group.throughput(Throughput::Elements(1));

    group.bench_function("schedule_ready_work", |b| {
        let sched = scheduler(AdmitLimits::default());
        b.to_async(&rt).iter(|| async {
            let out = sched.schedule("bench-caller", async { 1u64 }).await;
            black_box(out.unwrap())
        });
    });

    group.finish();
}

fn bench_queued_handoff(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("queued_handoff");

    for waiters in [2usize, 8, 32] {
        group.throughput(Throughput::Elements(waiters as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(waiters),
            &waiters,
            |b, &waiters| {
                b.to_async(&rt).iter(|| async move {
                    // One global slot; every waiter but the first parks and
                    // is woken through the release handoff chain.
                    let sched = Arc::new(scheduler(AdmitLimits {
                        per_caller_max_inflight: 1,
                        per_caller_max_queue: 1,
                        global_max_inflight: 1,
                        global_max_queue: 64,
                    }));
                    let mut handles = Vec::with_capacity(waiters);
                    for i in 0..waiters {
                        let sched = Arc::clone(&sched);
                        handles.push(tokio::spawn(async move {
                            let caller = format!("caller-{i}");
                            sched.schedule(&caller, async {}).await
                        }));
                    }
                    for h in handles {
                        h.await.unwrap().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("breaker");
    group.throughput(Throughput::Elements(1));

    group.bench_function("is_open_closed_breaker", |b| {
        let breaker = CircuitBreaker::new(BreakerSettings::default());
        b.iter(|| black_box(breaker.is_open()));
    });

    group.bench_function("record_failure_below_threshold", |b| {
        // Threshold high enough that the bench never trips it.
        let breaker = CircuitBreaker::new(BreakerSettings {
            window: Duration::from_millis(1),
            fails: usize::MAX,
            ..BreakerSettings::default()
        });
        b.iter(|| breaker.record_failure());
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("snapshot");

    for callers in [10usize, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(callers),
            &callers,
            |b, &callers| {
                let sched = scheduler(AdmitLimits {
                    global_max_inflight: 8,
                    ..AdmitLimits::default()
                });
                rt.block_on(async {
                    for i in 0..callers {
                        let caller = format!("caller-{i}");
                        sched.schedule(&caller, async {}).await.unwrap();
                    }
                });
                b.iter(|| black_box(sched.snapshot()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_admission,
    bench_queued_handoff,
    bench_breaker,
    bench_snapshot
);
criterion_main!(benches);
