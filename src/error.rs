//! Error types for resident-memory accounting.
//!
//! Rejections are ordinary, recoverable failures: the caller frees memory,
//! shrinks caches or reports the over-limit condition upward.

use thiserror::Error;

/// Errors surfaced by admission control, the reference host and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("Admission rejected: {requested} bytes would grow resident memory")]
    AdmissionRejected { requested: usize },

    #[error("Allocation failed: {requested} bytes")]
    AllocationFailed { requested: usize },

    #[error("Out of address space: no extent can hold {requested} bytes")]
    OutOfAddressSpace { requested: usize },

    #[error("Unknown allocation handle: {0}")]
    UnknownAllocation(u64),

    #[error("Zero-sized request")]
    ZeroSizedRequest,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AccountingError {
    /// Returns true if retrying after freeing memory may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AdmissionRejected { .. }
                | Self::AllocationFailed { .. }
                | Self::OutOfAddressSpace { .. }
        )
    }

    /// Returns true if the error points at a caller bug rather than memory pressure.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::UnknownAllocation(_) | Self::ZeroSizedRequest)
    }
}
