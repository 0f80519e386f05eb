//! Concurrent alloc/free workloads against one shared pool.
//!
//! Whatever the interleaving, the global counters must end up equal to the
//! page-level ground truth of the pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rss_guard::{
    AccountingError, Allocation, CounterSnapshot, ExtentPool, GlobalCounters, LocalBatch,
    MemoryLimiter,
};

const PAGE: usize = 4096;
const THREADS: u64 = 8;
const OPS_PER_THREAD: usize = 2_000;

#[derive(Clone, Copy)]
enum Mode {
    Limited,
    Batched,
    Uninstrumented,
}

fn run_worker(
    seed: u64,
    mode: Mode,
    pool: &ExtentPool<'_>,
    limiter: &MemoryLimiter<'_>,
    rejections: &AtomicUsize,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let batch = LocalBatch::new(limiter.counters(), 64 * 1024);
    let mut live: Vec<Allocation> = Vec::new();

    for _ in 0..OPS_PER_THREAD {
        let free = !live.is_empty() && rng.gen_bool(0.45);
        if free {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            match mode {
                Mode::Uninstrumented => pool.free(victim).unwrap(),
                _ => limiter.run_free(|| pool.free(victim)).unwrap(),
            }
            continue;
        }

        let bytes = rng.gen_range(1..=16) * PAGE - rng.gen_range(0..PAGE);
        let result = match mode {
            Mode::Limited => limiter.try_run(bytes, || pool.alloc(bytes)),
            Mode::Batched => {
                let reservation =
                    rss_guard::Reservation::begin_batched(&batch, bytes, limiter.limit());
                let got = pool.alloc(bytes);
                reservation.finish();
                got
            }
            Mode::Uninstrumented => pool.alloc(bytes),
        };

        match result {
            Ok(allocation) => live.push(allocation),
            Err(AccountingError::AdmissionRejected { .. })
            | Err(AccountingError::OutOfAddressSpace { .. }) => {
                rejections.fetch_add(1, Ordering::Relaxed);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }

        if rng.gen_ratio(1, 200) {
            pool.purge();
        }
    }

    for allocation in live {
        limiter.run_free(|| pool.free(allocation)).unwrap();
    }
}

fn run_workload(limit: Option<u64>, modes: &[Mode]) -> (GlobalCounters, usize) {
    let counters = GlobalCounters::new();
    let rejections = AtomicUsize::new(0);
    {
        let pool = ExtentPool::new(&counters, PAGE, 16 * 1024).unwrap();
        let limiter = MemoryLimiter::new(&counters, limit);

        std::thread::scope(|s| {
            for (i, mode) in (0..THREADS).zip(modes.iter().cycle()) {
                let (pool, limiter, rejections) = (&pool, &limiter, &rejections);
                s.spawn(move || run_worker(0xC0FFEE + i, *mode, pool, limiter, rejections));
            }
        });

        let stats = pool.stats();
        assert_eq!(stats.active_bytes, 0);
        assert_eq!(counters.read_resident(), stats.resident_bytes() as i64);
        assert_eq!(counters.read_active(), 0);

        pool.purge();
    }
    let rejected = rejections.load(Ordering::Relaxed);
    (counters, rejected)
}

#[test]
fn unlimited_concurrent_workload_matches_ground_truth() {
    let (counters, _) = run_workload(None, &[Mode::Limited]);
    assert_eq!(counters.read_resident(), 0);
    assert_eq!(counters.read_active(), 0);
}

#[test]
fn limited_workload_rejects_but_never_skews_counters() {
    let (counters, rejected) = run_workload(Some(2 * 1024 * 1024), &[Mode::Limited]);
    assert!(rejected > 0);
    assert_eq!(counters.read_resident(), 0);
    assert_eq!(counters.read_active(), 0);
}

#[test]
fn mixed_modes_converge() {
    let (counters, _) = run_workload(
        Some(8 * 1024 * 1024),
        &[Mode::Limited, Mode::Batched, Mode::Uninstrumented],
    );
    assert_eq!(counters.snapshot(), CounterSnapshot::default());
}

#[test]
fn mid_workload_counters_match_pool_between_phases() {
    let counters = GlobalCounters::new();
    let pool = ExtentPool::new(&counters, PAGE, 4096).unwrap();
    let limiter = MemoryLimiter::new(&counters, None);

    let kept: Vec<Vec<Allocation>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let (pool, limiter) = (&pool, &limiter);
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    (0..50)
                        .filter_map(|_| {
                            let bytes = rng.gen_range(1..=4) * PAGE;
                            limiter.try_run(bytes, || pool.alloc(bytes)).ok()
                        })
                        .collect::<Vec<Allocation>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let stats = pool.stats();
    assert_eq!(counters.read_resident(), stats.resident_bytes() as i64);
    assert_eq!(counters.read_active(), stats.active_bytes as i64);
    assert_eq!(
        stats.active_bytes,
        kept.iter().flatten().map(Allocation::size).sum::<usize>()
    );
}
