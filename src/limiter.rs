//! Resident-memory limit enforcement for individual allocator calls.
//!
//! Wraps each call in a [`Reservation`] so concurrent large allocations share
//! one limit, and turns blocked growth into an ordinary recoverable error.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::counters::{self, CounterSnapshot, GlobalCounters};
use crate::error::AccountingError;
use crate::reservation::Reservation;
use crate::telemetry;

const UNLIMITED: u64 = u64::MAX;

/// Per-call admission control against a shared resident limit.
#[derive(Debug)]
pub struct MemoryLimiter<'a> {
    counters: &'a GlobalCounters,
    limit: AtomicU64,
}

impl<'a> MemoryLimiter<'a> {
    /// Create a limiter. `None` disables enforcement but keeps accounting.
    pub fn new(counters: &'a GlobalCounters, limit: Option<u64>) -> Self {
        Self {
            counters,
            limit: AtomicU64::new(limit.unwrap_or(UNLIMITED)),
        }
    }

    pub fn counters(&self) -> &'a GlobalCounters {
        self.counters
    }

    pub fn limit(&self) -> Option<u64> {
        match self.limit.load(Ordering::Relaxed) {
            UNLIMITED => None,
            limit => Some(limit),
        }
    }

    /// Change the limit. Calls already in flight keep the policy they started with.
    pub fn set_limit(&self, limit: Option<u64>) {
        self.limit.store(limit.unwrap_or(UNLIMITED), Ordering::Relaxed);
        tracing::info!(?limit, "resident memory limit updated");
    }

    /// Whether the current resident estimate is above the limit.
    pub fn over_limit(&self) -> bool {
        self.limit()
            .map(|limit| self.counters.read_resident() > counters::to_signed_u64(limit))
            .unwrap_or(false)
    }

    /// Run an allocator call that reports failure through `Result`.
    ///
    /// `requested` bytes are reserved for the duration of the call.
    pub fn try_run<T>(
        &self,
        requested: usize,
        call: impl FnOnce() -> Result<T, AccountingError>,
    ) -> Result<T, AccountingError> {
        let reservation = Reservation::begin(self.counters, requested, self.limit());
        let result = call();
        let reconciled = reservation.finish();

        if let Err(AccountingError::AdmissionRejected { .. }) = &result {
            self.report_rejection(requested, reconciled.blocked_growth);
        }
        result
    }

    /// Run a malloc-style call that signals failure with `None`.
    pub fn try_run_nullable<T>(
        &self,
        requested: usize,
        call: impl FnOnce() -> Option<T>,
    ) -> Result<T, AccountingError> {
        let reservation = Reservation::begin(self.counters, requested, self.limit());
        let blocked = reservation.blocks_growth();
        let result = call();
        reservation.finish();

        match result {
            Some(value) => Ok(value),
            None if blocked => {
                self.report_rejection(requested, blocked);
                Err(AccountingError::AdmissionRejected { requested })
            }
            None => Err(AccountingError::AllocationFailed { requested }),
        }
    }

    /// Run a deallocation (or any call that cannot grow memory) instrumented.
    pub fn run_free<T>(&self, call: impl FnOnce() -> T) -> T {
        let reservation = Reservation::instrument(self.counters);
        let value = call();
        reservation.finish();
        value
    }

    /// Publish the current counters through the metrics facade.
    pub fn export_metrics(&self) -> CounterSnapshot {
        let snapshot = self.counters.snapshot();
        telemetry::record_counters(&snapshot);
        snapshot
    }

    fn report_rejection(&self, requested: usize, blocked: bool) {
        tracing::warn!(
            requested,
            blocked,
            resident = self.counters.read_resident(),
            limit = ?self.limit(),
            "allocation rejected by resident memory limit"
        );
        telemetry::record_rejection(requested);
    }
}
