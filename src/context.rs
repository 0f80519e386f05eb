//! Per-thread accounting mode and delta counters.
//!
//! While `use_thread_local_stats` is set, page-state transitions on this
//! thread update the deltas here instead of the global counters. The deltas
//! have no absolute meaning: only the difference between two snapshots taken
//! around an instrumented call is valid.

use std::cell::Cell;

/// Per-thread accounting record. Owned by exactly one thread.
#[derive(Debug)]
pub struct ThreadAccounting {
    active_bytes_delta: Cell<i64>,
    dirty_bytes_delta: Cell<i64>,
    use_thread_local_stats: Cell<bool>,
    do_not_increase_rss: Cell<bool>,
}

thread_local! {
    static CONTEXT: ThreadAccounting = const { ThreadAccounting::new() };
}

impl ThreadAccounting {
    const fn new() -> Self {
        Self {
            active_bytes_delta: Cell::new(0),
            dirty_bytes_delta: Cell::new(0),
            use_thread_local_stats: Cell::new(false),
            do_not_increase_rss: Cell::new(false),
        }
    }

    #[inline]
    pub(crate) fn record(&self, active: i64, dirty: i64) {
        self.active_bytes_delta
            .set(self.active_bytes_delta.get().wrapping_add(active));
        self.dirty_bytes_delta
            .set(self.dirty_bytes_delta.get().wrapping_add(dirty));
    }

    pub fn use_thread_local_stats(&self) -> bool {
        self.use_thread_local_stats.get()
    }

    pub fn do_not_increase_rss(&self) -> bool {
        self.do_not_increase_rss.get()
    }

    pub fn deltas(&self) -> DeltaSnapshot {
        DeltaSnapshot {
            active: self.active_bytes_delta.get(),
            dirty: self.dirty_bytes_delta.get(),
        }
    }
}

/// Raw delta values at one instant on one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSnapshot {
    pub active: i64,
    pub dirty: i64,
}

impl DeltaSnapshot {
    /// Difference between this snapshot and an earlier baseline.
    pub fn since(&self, baseline: DeltaSnapshot) -> DeltaSnapshot {
        DeltaSnapshot {
            active: self.active.wrapping_sub(baseline.active),
            dirty: self.dirty.wrapping_sub(baseline.dirty),
        }
    }

    /// Resident change implied by this difference (active + dirty).
    pub fn resident(&self) -> i64 {
        self.active.wrapping_add(self.dirty)
    }
}

/// Run `f` with the calling thread's accounting record.
#[inline]
pub fn with<R>(f: impl FnOnce(&ThreadAccounting) -> R) -> R {
    CONTEXT.with(f)
}

/// Route this thread's transitions to the local deltas (`true`) or the globals (`false`).
pub fn set_mode(use_thread_local: bool) {
    with(|ctx| ctx.use_thread_local_stats.set(use_thread_local));
}

/// Block (`true`) or allow (`false`) resident growth for this thread's calls.
pub fn set_admission_policy(block_growth: bool) {
    with(|ctx| ctx.do_not_increase_rss.set(block_growth));
}

/// Snapshot of this thread's accumulated deltas.
pub fn snapshot() -> DeltaSnapshot {
    with(ThreadAccounting::deltas)
}

pub fn is_instrumented() -> bool {
    with(ThreadAccounting::use_thread_local_stats)
}

pub fn blocks_growth() -> bool {
    with(ThreadAccounting::do_not_increase_rss)
}

/// Clear both flags. Deltas are left untouched.
pub(crate) fn reset_flags() {
    with(|ctx| {
        ctx.use_thread_local_stats.set(false);
        ctx.do_not_increase_rss.set(false);
    });
}
