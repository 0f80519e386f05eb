//! Accounting overhead benchmarks.
//!
//! Measures the per-call cost the hook and reservation protocol add to an
//! allocator's hot path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rss_guard::{
    admission, on_transition, ExtentPool, GlobalCounters, LocalBatch, MemoryLimiter,
    PageTransition, Reservation,
};

fn bench_transition_hook(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition_hook");
    let counters = GlobalCounters::new();

    group.throughput(Throughput::Elements(1));
    group.bench_function("global_mode", |b| {
        b.iter(|| {
            on_transition(&counters, PageTransition::DirtyToActive, black_box(4096));
        })
    });

    group.bench_function("thread_local_mode", |b| {
        let _region = Reservation::instrument(&counters);
        b.iter(|| {
            on_transition(&counters, PageTransition::DirtyToActive, black_box(4096));
        })
    });

    group.bench_function("admission_check", |b| {
        b.iter(|| black_box(admission::would_admit()))
    });

    group.finish();
}

fn bench_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservation");
    let counters = GlobalCounters::new();

    for (name, size) in [
        ("4kb", 4096usize),
        ("1mb", 1024 * 1024),
        ("64mb", 64 * 1024 * 1024),
    ] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::new("begin_finish", name), |b| {
            b.iter(|| {
                let reservation = Reservation::begin(&counters, black_box(size), Some(1 << 40));
                black_box(reservation.finish())
            })
        });
    }

    let batch = LocalBatch::new(&counters, 1024 * 1024);
    group.bench_function("begin_finish_batched", |b| {
        b.iter(|| {
            let reservation = Reservation::begin_batched(&batch, black_box(4096), Some(1 << 40));
            black_box(reservation.finish())
        })
    });

    group.finish();
}

fn bench_limited_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("limited_alloc_free");

    for pages in [1usize, 16, 256] {
        let counters = GlobalCounters::new();
        let pool = ExtentPool::new(&counters, 4096, 4096).unwrap();
        let limiter = MemoryLimiter::new(&counters, Some(1 << 30));
        let bytes = pages * 4096;

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_function(BenchmarkId::new("pool", pages), |b| {
            b.iter(|| {
                let a = limiter.try_run(bytes, || pool.alloc(black_box(bytes))).unwrap();
                limiter.run_free(|| pool.free(a)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_counter_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_reads");
    let counters = GlobalCounters::process();

    group.bench_function("read_resident", |b| {
        b.iter(|| black_box(counters.read_resident()))
    });

    group.bench_function("snapshot", |b| b.iter(|| black_box(counters.snapshot())));

    group.finish();
}

criterion_group!(
    benches,
    bench_transition_hook,
    bench_reservation,
    bench_limited_alloc_free,
    bench_counter_reads
);
criterion_main!(benches);
