//! Admission check consulted before the host grows resident memory.
//!
//! The host calls [`admit_growth`] right before committing to a
//! retained → active transition. It only ever rejects while the calling
//! thread has `do_not_increase_rss` set, so uninstrumented calls behave
//! exactly as they would without this crate.

use crate::context;
use crate::error::AccountingError;

/// Boolean form of [`admit_growth`].
#[inline]
pub fn would_admit() -> bool {
    !context::blocks_growth()
}

/// Decide whether `requested` bytes of new backing may be committed.
///
/// On rejection the host must fail the call instead of falling back to
/// fresh pages.
#[inline]
pub fn admit_growth(requested: usize) -> Result<(), AccountingError> {
    if would_admit() {
        return Ok(());
    }
    tracing::debug!(requested, "resident growth blocked");
    Err(AccountingError::AdmissionRejected { requested })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_when_not_opted_in() {
        assert!(would_admit());
        assert!(admit_growth(1 << 30).is_ok());
    }

    #[test]
    fn rejects_under_no_growth_policy() {
        context::set_admission_policy(true);
        let result = admit_growth(4096);
        context::set_admission_policy(false);

        assert_eq!(result, Err(AccountingError::AdmissionRejected { requested: 4096 }));
        assert!(admit_growth(4096).is_ok());
    }
}
