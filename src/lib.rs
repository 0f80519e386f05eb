//! RSS Guard
//!
//! Synchronous resident-memory accounting and per-call admission control for
//! code embedded in a general-purpose allocator. Lets a host process degrade
//! gracefully (cancel work, shrink caches, retry) instead of being OOM-killed.
//!
//! # Model
//!
//! - **Counters**: two process-wide signed atomics, resident (active + dirty)
//!   and active bytes. Cheap to read on every allocation.
//! - **Thread context**: per-thread flags and deltas. While a call is
//!   instrumented, page-state transitions land in the deltas instead of the
//!   counters and cancel out locally.
//! - **Transition hook**: the host allocator reports every page-state change.
//! - **Admission check**: the host asks before growing resident memory; under
//!   a no-growth policy only reuse of active/dirty pages is allowed.
//! - **Reservation**: reserve the request size up front, run the call, then
//!   replace the reservation with the observed effect. Concurrent calls
//!   converge to the sum of their individual effects.
//!
//! Tracking covers every call that goes through the hook; enforcement is
//! opt-in per call so code that cannot handle allocation failure is untouched.
//!
//! # Example
//!
//! ```
//! use rss_guard::{admission, on_transition, GlobalCounters, MemoryLimiter, PageTransition};
//!
//! let counters = GlobalCounters::new();
//! let limiter = MemoryLimiter::new(&counters, Some(1 << 20));
//!
//! let got = limiter.try_run(4096, || {
//!     admission::admit_growth(4096)?;
//!     on_transition(&counters, PageTransition::RetainedToActive, 4096);
//!     Ok(())
//! });
//!
//! assert!(got.is_ok());
//! assert_eq!(counters.read_resident(), 4096);
//! ```

pub mod admission;
pub mod batch;
pub mod config;
pub mod context;
pub mod counters;
pub mod error;
pub mod extent;
pub mod limiter;
pub mod reservation;
pub mod telemetry;
pub mod transition;

pub use batch::LocalBatch;
pub use config::GuardConfig;
pub use context::DeltaSnapshot;
pub use counters::{CounterSnapshot, GlobalCounters};
pub use error::AccountingError;
pub use extent::{Allocation, ExtentPool, PageState, PoolStats};
pub use limiter::MemoryLimiter;
pub use reservation::{Reconciled, Reservation};
pub use transition::{on_transition, PageTransition, TransitionEffect};
