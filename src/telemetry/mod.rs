//! Telemetry for the accounting layer.
//!
//! Structured logging setup and metric export. Hot-path code only emits
//! `tracing` events at trace/debug level.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_counters, record_rejection, ACTIVE_BYTES, ADMISSION_REJECTIONS, DIRTY_BYTES,
    REJECTED_BYTES, RESIDENT_BYTES,
};
