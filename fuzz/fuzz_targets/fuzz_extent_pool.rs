//! Fuzz target for the reference extent pool.
//!
//! Arbitrary alloc/free/purge sequences, with and without a no-growth policy,
//! must keep the counters equal to the pool's page states.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rss_guard::{ExtentPool, GlobalCounters, MemoryLimiter};

#[derive(Debug, Arbitrary)]
enum Op {
    Alloc(u16),
    Free(u8),
    Purge,
    SetLimit(Option<u16>),
}

fuzz_target!(|ops: Vec<Op>| {
    let counters = GlobalCounters::new();
    let pool = match ExtentPool::new(&counters, 64, 256) {
        Ok(pool) => pool,
        Err(_) => return,
    };
    let limiter = MemoryLimiter::new(&counters, None);
    let mut live = Vec::new();

    for op in ops {
        match op {
            Op::Alloc(bytes) => {
                let bytes = usize::from(bytes);
                if let Ok(a) = limiter.try_run(bytes, || pool.alloc(bytes)) {
                    live.push(a);
                }
            }
            Op::Free(idx) if !live.is_empty() => {
                let a = live.swap_remove(usize::from(idx) % live.len());
                assert!(limiter.run_free(|| pool.free(a)).is_ok());
            }
            Op::Free(_) => {}
            Op::Purge => {
                pool.purge();
            }
            Op::SetLimit(limit) => limiter.set_limit(limit.map(u64::from)),
        }

        let stats = pool.stats();
        assert_eq!(counters.read_resident(), stats.resident_bytes() as i64);
        assert_eq!(counters.read_active(), stats.active_bytes as i64);
    }
});
