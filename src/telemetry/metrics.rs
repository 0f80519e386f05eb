//! Export of accounting counters through the `metrics` facade.
//!
//! No recorder is installed here; without one these calls are no-ops.

use crate::counters::CounterSnapshot;

pub const RESIDENT_BYTES: &str = "rss_guard_resident_bytes";
pub const ACTIVE_BYTES: &str = "rss_guard_active_bytes";
pub const DIRTY_BYTES: &str = "rss_guard_dirty_bytes";
pub const ADMISSION_REJECTIONS: &str = "rss_guard_admission_rejections_total";
pub const REJECTED_BYTES: &str = "rss_guard_rejected_bytes";

/// Publish a counter snapshot as gauges.
pub fn record_counters(snapshot: &CounterSnapshot) {
    metrics::gauge!(RESIDENT_BYTES).set(snapshot.resident_bytes as f64);
    metrics::gauge!(ACTIVE_BYTES).set(snapshot.active_bytes as f64);
    metrics::gauge!(DIRTY_BYTES).set(snapshot.dirty_bytes() as f64);
}

/// Count one rejected allocation of `requested` bytes.
pub fn record_rejection(requested: usize) {
    metrics::counter!(ADMISSION_REJECTIONS).increment(1);
    metrics::histogram!(REJECTED_BYTES).record(requested as f64);
}
