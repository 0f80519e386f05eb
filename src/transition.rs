//! Page-state transition hook.
//!
//! The host allocator calls [`on_transition`] every time a contiguous region
//! changes state. The effect is applied to the global counters, or to the
//! calling thread's deltas while that thread is instrumented.
//!
//! | Transition        | resident | active | dirty |
//! |-------------------|----------|--------|-------|
//! | retained → active | +size    | +size  | 0     |
//! | dirty → active    | 0        | +size  | −size |
//! | active → dirty    | 0        | −size  | +size |
//! | dirty → retained  | −size    | 0      | −size |

use crate::context;
use crate::counters::{self, GlobalCounters};

/// The four page-state changes the hook understands. There is no fifth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageTransition {
    RetainedToActive,
    DirtyToActive,
    ActiveToDirty,
    DirtyToRetained,
}

impl PageTransition {
    pub const ALL: [PageTransition; 4] = [
        PageTransition::RetainedToActive,
        PageTransition::DirtyToActive,
        PageTransition::ActiveToDirty,
        PageTransition::DirtyToRetained,
    ];

    /// Signed byte effect of moving `size` bytes through this transition.
    pub fn effect(self, size: usize) -> TransitionEffect {
        let size = counters::to_signed(size);
        match self {
            Self::RetainedToActive => TransitionEffect { resident: size, active: size, dirty: 0 },
            Self::DirtyToActive => TransitionEffect { resident: 0, active: size, dirty: -size },
            Self::ActiveToDirty => TransitionEffect { resident: 0, active: -size, dirty: size },
            Self::DirtyToRetained => TransitionEffect { resident: -size, active: 0, dirty: -size },
        }
    }

    /// True if the transition makes new pages resident.
    pub fn grows_resident(self) -> bool {
        matches!(self, Self::RetainedToActive)
    }
}

/// Signed byte changes produced by one transition. `resident == active + dirty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionEffect {
    pub resident: i64,
    pub active: i64,
    pub dirty: i64,
}

/// Apply a transition of `size` bytes on the calling thread.
///
/// The thread's mode is read on every call; a single allocator call may emit
/// several transitions (e.g. an extent split) and each is routed on its own.
#[inline]
pub fn on_transition(counters: &GlobalCounters, kind: PageTransition, size: usize) {
    let effect = kind.effect(size);
    let local = context::with(|ctx| {
        if ctx.use_thread_local_stats() {
            ctx.record(effect.active, effect.dirty);
            true
        } else {
            false
        }
    });

    if !local {
        if effect.resident != 0 {
            counters.add_resident(effect.resident);
        }
        if effect.active != 0 {
            counters.add_active(effect.active);
        }
    }

    tracing::trace!(?kind, size, local, "page transition");
}
