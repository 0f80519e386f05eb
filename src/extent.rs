//! Reference page-state machine driving the transition hook.
//!
//! Models a host allocator's address range as extents of whole pages, each
//! retained, dirty or active. It emits exactly the transitions a real host
//! would and consults the admission check before committing new pages, so
//! the accounting rules can be validated against page-level ground truth.
//!
//! Reusing a dirty extent activates the whole extent and then hands the
//! unused tail back as dirty, so one allocation can emit two transitions.

use parking_lot::Mutex;

use crate::admission;
use crate::counters::GlobalCounters;
use crate::error::AccountingError;
use crate::transition::{on_transition, PageTransition};

/// State of a run of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Address space reserved, no physical backing.
    Retained,
    /// Backed, previously used, backs no live allocation.
    Dirty,
    /// Backs a live allocation.
    Active,
}

#[derive(Debug, Clone)]
struct Extent {
    start: usize,
    pages: usize,
    state: PageState,
    handle: Option<u64>,
}

/// Handle to a live allocation in an [`ExtentPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    handle: u64,
    offset: usize,
    size: usize,
}

impl Allocation {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Byte offset of the allocation within the pool.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Page-rounded size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Bytes per page state, computed from the extent list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub active_bytes: usize,
    pub dirty_bytes: usize,
    pub retained_bytes: usize,
}

impl PoolStats {
    pub fn resident_bytes(&self) -> usize {
        self.active_bytes + self.dirty_bytes
    }
}

#[derive(Debug)]
struct PoolInner {
    extents: Vec<Extent>,
    next_handle: u64,
}

/// Address range of `pages * page_size` bytes, initially all retained.
#[derive(Debug)]
pub struct ExtentPool<'a> {
    counters: &'a GlobalCounters,
    page_size: usize,
    total_pages: usize,
    inner: Mutex<PoolInner>,
}

impl<'a> ExtentPool<'a> {
    pub fn new(
        counters: &'a GlobalCounters,
        page_size: usize,
        total_pages: usize,
    ) -> Result<Self, AccountingError> {
        let capacity = page_size.checked_mul(total_pages).filter(|&bytes| bytes > 0);
        if capacity.is_none() {
            return Err(AccountingError::Config(format!(
                "unusable extent pool geometry: {total_pages} pages of {page_size} bytes"
            )));
        }
        Ok(Self {
            counters,
            page_size,
            total_pages,
            inner: Mutex::new(PoolInner {
                extents: vec![Extent {
                    start: 0,
                    pages: total_pages,
                    state: PageState::Retained,
                    handle: None,
                }],
                next_handle: 1,
            }),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn capacity(&self) -> usize {
        self.page_size * self.total_pages
    }

    /// Allocate at least `bytes`, preferring dirty pages over fresh ones.
    ///
    /// Fresh (retained) pages are only used if the admission check passes.
    pub fn alloc(&self, bytes: usize) -> Result<Allocation, AccountingError> {
        if bytes == 0 {
            return Err(AccountingError::ZeroSizedRequest);
        }
        let pages = bytes.div_ceil(self.page_size);
        let mut inner = self.inner.lock();

        let idx = if let Some(idx) = find_fit(&inner.extents, PageState::Dirty, pages) {
            let whole = inner.extents[idx].pages;
            on_transition(self.counters, PageTransition::DirtyToActive, whole * self.page_size);
            if whole > pages {
                split(&mut inner.extents, idx, pages);
                on_transition(
                    self.counters,
                    PageTransition::ActiveToDirty,
                    (whole - pages) * self.page_size,
                );
            }
            idx
        } else if let Some(idx) = find_fit(&inner.extents, PageState::Retained, pages) {
            admission::admit_growth(bytes)?;
            split(&mut inner.extents, idx, pages);
            on_transition(
                self.counters,
                PageTransition::RetainedToActive,
                pages * self.page_size,
            );
            idx
        } else {
            return Err(AccountingError::OutOfAddressSpace { requested: bytes });
        };

        let handle = inner.next_handle;
        inner.next_handle += 1;
        let extent = &mut inner.extents[idx];
        extent.state = PageState::Active;
        extent.handle = Some(handle);

        tracing::trace!(handle, pages, start = extent.start, "extent allocated");
        Ok(Allocation {
            handle,
            offset: extent.start * self.page_size,
            size: pages * self.page_size,
        })
    }

    /// Release an allocation. Its pages become dirty.
    pub fn free(&self, allocation: Allocation) -> Result<(), AccountingError> {
        let mut inner = self.inner.lock();
        let idx = inner
            .extents
            .iter()
            .position(|e| e.handle == Some(allocation.handle))
            .ok_or(AccountingError::UnknownAllocation(allocation.handle))?;

        let extent = &mut inner.extents[idx];
        extent.state = PageState::Dirty;
        extent.handle = None;
        on_transition(
            self.counters,
            PageTransition::ActiveToDirty,
            extent.pages * self.page_size,
        );
        coalesce(&mut inner.extents);

        tracing::trace!(handle = allocation.handle, "extent freed");
        Ok(())
    }

    /// Return every dirty page to the OS. Returns the number of bytes purged.
    pub fn purge(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut purged = 0;
        for extent in inner.extents.iter_mut().filter(|e| e.state == PageState::Dirty) {
            let bytes = extent.pages * self.page_size;
            on_transition(self.counters, PageTransition::DirtyToRetained, bytes);
            extent.state = PageState::Retained;
            purged += bytes;
        }
        coalesce(&mut inner.extents);

        if purged > 0 {
            tracing::debug!(purged, "purged dirty pages");
        }
        purged
    }

    /// Page-level ground truth for the pool.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        inner.extents.iter().fold(PoolStats::default(), |mut stats, e| {
            let bytes = e.pages * self.page_size;
            match e.state {
                PageState::Active => stats.active_bytes += bytes,
                PageState::Dirty => stats.dirty_bytes += bytes,
                PageState::Retained => stats.retained_bytes += bytes,
            }
            stats
        })
    }

    /// Number of extents currently tracked (after coalescing).
    pub fn extent_count(&self) -> usize {
        self.inner.lock().extents.len()
    }
}

fn find_fit(extents: &[Extent], state: PageState, pages: usize) -> Option<usize> {
    extents
        .iter()
        .position(|e| e.state == state && e.pages >= pages)
}

/// Split `extents[idx]` so it holds exactly `pages`; the tail keeps the old state.
fn split(extents: &mut Vec<Extent>, idx: usize, pages: usize) {
    let extent = &mut extents[idx];
    if extent.pages == pages {
        return;
    }
    let tail = Extent {
        start: extent.start + pages,
        pages: extent.pages - pages,
        state: extent.state,
        handle: None,
    };
    extent.pages = pages;
    extents.insert(idx + 1, tail);
}

/// Merge adjacent free extents that share a state. Active extents never merge.
fn coalesce(extents: &mut Vec<Extent>) {
    let mut merged: Vec<Extent> = Vec::with_capacity(extents.len());
    for extent in extents.drain(..) {
        match merged.last_mut() {
            Some(prev)
                if prev.state == extent.state
                    && prev.state != PageState::Active
                    && prev.start + prev.pages == extent.start =>
            {
                prev.pages += extent.pages;
            }
            _ => merged.push(extent),
        }
    }
    *extents = merged;
}
