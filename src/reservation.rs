//! Speculative reservation protocol.
//!
//! Lets concurrent large allocations share one resident-memory limit without
//! a check-then-act race:
//!
//! 1. add the requested size to the global resident counter,
//! 2. snapshot this thread's deltas,
//! 3. block growth if the reserved total exceeds the limit and switch the
//!    thread to local accounting,
//! 4. run the allocator call,
//! 5. clear both flags,
//! 6. replace the reservation with the observed effect.
//!
//! [`Reservation`] performs 1-3 on construction and 5-6 on drop, so every exit
//! path of the instrumented call (early return, `?`, panic) reconciles exactly
//! once. Each thread only ever adds deltas derived from its own call, so the
//! final counters equal the sum of individual effects in any interleaving.

use std::marker::PhantomData;

use crate::batch::LocalBatch;
use crate::context::{self, DeltaSnapshot};
use crate::counters::{self, GlobalCounters};

/// Result of reconciling one instrumented region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Active/dirty change observed during the region.
    pub observed: DeltaSnapshot,
    /// Amount added to global resident: observed growth minus the reservation.
    pub resident_correction: i64,
    /// Whether growth was blocked for the region.
    pub blocked_growth: bool,
}

/// Scoped instrumented region with an optional speculative reservation.
///
/// Not `Send`: the deltas it reconciles live in the creating thread.
#[must_use = "dropping a reservation immediately ends the instrumented region"]
#[derive(Debug)]
pub struct Reservation<'a> {
    counters: &'a GlobalCounters,
    batch: Option<&'a LocalBatch<'a>>,
    requested: usize,
    reserved: i64,
    reserved_total: i64,
    baseline: DeltaSnapshot,
    blocked_growth: bool,
    settled: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> Reservation<'a> {
    /// Reserve `requested` bytes and enter an instrumented region.
    ///
    /// With `limit == None` growth is never blocked.
    pub fn begin(counters: &'a GlobalCounters, requested: usize, limit: Option<u64>) -> Self {
        Self::enter(counters, None, requested, limit)
    }

    /// Like [`begin`](Self::begin), but the step-6 correction goes through `batch`.
    pub fn begin_batched(batch: &'a LocalBatch<'a>, requested: usize, limit: Option<u64>) -> Self {
        Self::enter(batch.counters(), Some(batch), requested, limit)
    }

    /// Instrument a call without reserving or limiting (e.g. a free).
    pub fn instrument(counters: &'a GlobalCounters) -> Self {
        Self::enter(counters, None, 0, None)
    }

    fn enter(
        counters: &'a GlobalCounters,
        batch: Option<&'a LocalBatch<'a>>,
        requested: usize,
        limit: Option<u64>,
    ) -> Self {
        debug_assert!(
            !context::is_instrumented() && !context::blocks_growth(),
            "instrumented regions must not nest on one thread"
        );

        let (reserved, reserved_total) = if requested > 0 {
            counters.reserve_resident(counters::to_signed(requested))
        } else {
            (0, counters.read_resident())
        };
        let baseline = context::snapshot();
        let blocked_growth = limit
            .map(|limit| reserved_total > counters::to_signed_u64(limit))
            .unwrap_or(false);

        context::set_admission_policy(blocked_growth);
        context::set_mode(true);

        Self {
            counters,
            batch,
            requested,
            reserved,
            reserved_total,
            baseline,
            blocked_growth,
            settled: false,
            _not_send: PhantomData,
        }
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Global resident total right after the speculative add.
    pub fn reserved_total(&self) -> i64 {
        self.reserved_total
    }

    pub fn blocks_growth(&self) -> bool {
        self.blocked_growth
    }

    /// End the region now and report what was reconciled.
    pub fn finish(mut self) -> Reconciled {
        self.settle()
    }

    fn settle(&mut self) -> Reconciled {
        self.settled = true;
        context::reset_flags();

        let observed = context::snapshot().since(self.baseline);
        let resident_correction = observed.resident().saturating_sub(self.reserved);

        match self.batch {
            Some(batch) => batch.push(resident_correction, observed.active),
            None => self.counters.reconcile(resident_correction, observed.active),
        }

        Reconciled {
            observed,
            resident_correction,
            blocked_growth: self.blocked_growth,
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle();
        }
    }
}
