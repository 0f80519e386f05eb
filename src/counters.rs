//! Global resident/active byte counters.
//!
//! "Resident" means active + dirty and is a good estimate of RSS. Both totals
//! are signed: the two counters are updated independently, so a reader can
//! briefly observe a negative value or `active > resident` under churn.

use std::sync::atomic::{AtomicI64, Ordering};

static PROCESS: GlobalCounters = GlobalCounters::new();

/// Byte count as a signed delta, saturating at `i64::MAX`.
#[inline]
pub(crate) fn to_signed(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

#[inline]
pub(crate) fn to_signed_u64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Pair of wait-free byte counters shared by every thread of an accounting domain.
#[derive(Debug, Default)]
pub struct GlobalCounters {
    resident_bytes: AtomicI64,
    active_bytes: AtomicI64,
}

/// Point-in-time read of both counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub resident_bytes: i64,
    pub active_bytes: i64,
}

impl CounterSnapshot {
    /// Bytes that are resident but back no live allocation (purgeable).
    pub fn dirty_bytes(&self) -> i64 {
        self.resident_bytes - self.active_bytes
    }
}

impl GlobalCounters {
    /// Create an independent, zeroed counter pair.
    pub const fn new() -> Self {
        Self {
            resident_bytes: AtomicI64::new(0),
            active_bytes: AtomicI64::new(0),
        }
    }

    /// The process-wide counters fed by the host allocator.
    pub fn process() -> &'static GlobalCounters {
        &PROCESS
    }

    #[inline]
    pub fn add_resident(&self, delta: i64) {
        self.resident_bytes.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_active(&self, delta: i64) {
        self.active_bytes.fetch_add(delta, Ordering::Relaxed);
    }

    /// Add up to `delta` to resident and return `(applied, total_after)`.
    ///
    /// Used for speculative reservations, where the caller needs the
    /// reserved total to decide whether growth must be blocked. The total
    /// saturates at `i64::MAX`, so `applied` can be smaller than `delta` and
    /// is what the caller must later take back.
    pub fn reserve_resident(&self, delta: i64) -> (i64, i64) {
        let delta = delta.max(0);
        let update = self
            .resident_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some(old.saturating_add(delta))
            });
        let old = match update {
            Ok(old) | Err(old) => old,
        };
        let total = old.saturating_add(delta);
        (total - old, total)
    }

    /// Fold a reconciled correction into both counters.
    pub(crate) fn reconcile(&self, resident: i64, active: i64) {
        if resident != 0 {
            self.resident_bytes.fetch_add(resident, Ordering::AcqRel);
        }
        if active != 0 {
            self.active_bytes.fetch_add(active, Ordering::AcqRel);
        }
    }

    #[inline]
    pub fn read_resident(&self) -> i64 {
        self.resident_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn read_active(&self) -> i64 {
        self.active_bytes.load(Ordering::Relaxed)
    }

    /// Resident minus active. Derived from two separate loads.
    pub fn dirty_bytes(&self) -> i64 {
        self.snapshot().dirty_bytes()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            resident_bytes: self.read_resident(),
            active_bytes: self.read_active(),
        }
    }
}
