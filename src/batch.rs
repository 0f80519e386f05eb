//! Deferred flushing of reconciled corrections.
//!
//! A thread doing many small instrumented calls can collect the step-6
//! corrections here and push them to the global counters in one pair of
//! atomic adds once they reach a byte threshold. Dropping the batch flushes
//! whatever is left, so owning one per thread gives flush-on-thread-exit.

use std::cell::Cell;

use crate::counters::GlobalCounters;

/// Per-thread accumulator of pending counter corrections.
///
/// Not `Sync`: a batch belongs to the thread that fills it.
#[derive(Debug)]
pub struct LocalBatch<'a> {
    counters: &'a GlobalCounters,
    threshold: u64,
    pending_resident: Cell<i64>,
    pending_active: Cell<i64>,
}

impl<'a> LocalBatch<'a> {
    /// Create a batch that flushes once either pending magnitude reaches `threshold` bytes.
    /// A threshold of 0 flushes on every push.
    pub fn new(counters: &'a GlobalCounters, threshold: u64) -> Self {
        Self {
            counters,
            threshold,
            pending_resident: Cell::new(0),
            pending_active: Cell::new(0),
        }
    }

    pub fn counters(&self) -> &'a GlobalCounters {
        self.counters
    }

    /// Queue a correction, flushing if the threshold is reached.
    pub fn push(&self, resident: i64, active: i64) {
        let resident = self.pending_resident.get() + resident;
        let active = self.pending_active.get() + active;
        self.pending_resident.set(resident);
        self.pending_active.set(active);

        if resident.unsigned_abs() >= self.threshold || active.unsigned_abs() >= self.threshold {
            self.flush();
        }
    }

    /// Push all pending corrections to the global counters.
    pub fn flush(&self) {
        let resident = self.pending_resident.replace(0);
        let active = self.pending_active.replace(0);
        if resident != 0 || active != 0 {
            tracing::trace!(resident, active, "flushing accounting batch");
            self.counters.reconcile(resident, active);
        }
    }

    /// Corrections not yet visible in the global counters.
    pub fn pending(&self) -> (i64, i64) {
        (self.pending_resident.get(), self.pending_active.get())
    }
}

impl Drop for LocalBatch<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}
