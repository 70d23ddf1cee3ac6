//! One render target per page
//!
//! The presentation layer creates a drawable surface for each page and binds
//! it here; the scheduler moves the page through its render statuses. Each
//! entry sits behind its own lock so different pages progress independently.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::renderer::SurfaceRef;

/// Page number of the `count`-th page, saturating at `u32::MAX`
pub(crate) fn page_number(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Render status of a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// No surface mounted yet
    Unbound,
    /// Surface mounted, nothing drawn
    Bound,
    Rendering,
    Rendered,
    /// Last render failed; eligible for retry on the next trigger
    Failed,
}

#[derive(Debug)]
struct PageEntry {
    page_number: u32,
    surface: Option<SurfaceRef>,
    status: PageStatus,
    failure: Option<String>,
}

impl PageEntry {
    fn new(page_number: u32) -> Self {
        Self {
            page_number,
            surface: None,
            status: PageStatus::Unbound,
            failure: None,
        }
    }
}

/// Point-in-time view of one page, for painting placeholders and badges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub page_number: u32,
    pub status: PageStatus,
    pub has_surface: bool,
    pub failure: Option<String>,
}

#[derive(Debug, Default)]
pub struct PageSurfaceRegistry {
    entries: RwLock<Vec<Arc<Mutex<PageEntry>>>>,
}

impl PageSurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all entries with unbound pages `1..=page_count`
    pub fn initialize(&self, page_count: usize) {
        let entries = (1..=page_number(page_count))
            .map(|page| Arc::new(Mutex::new(PageEntry::new(page))))
            .collect();
        *self.entries.write() = entries;
    }

    pub fn reset(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn entry(&self, page: u32) -> Option<Arc<Mutex<PageEntry>>> {
        let index = (page as usize).checked_sub(1)?;
        self.entries.read().get(index).cloned()
    }

    /// Record the surface for `page`. Already bound pages keep their surface.
    ///
    /// Returns `true` if the page moved from unbound to bound.
    pub fn bind_surface(&self, page: u32, surface: SurfaceRef) -> bool {
        let Some(entry) = self.entry(page) else {
            return false;
        };
        let mut entry = entry.lock();
        if entry.status != PageStatus::Unbound {
            return false;
        }
        entry.surface = Some(surface);
        entry.status = PageStatus::Bound;
        true
    }

    /// Bound or failed pages may start rendering
    pub fn mark_rendering(&self, page: u32) -> bool {
        self.transition(page, |entry| match entry.status {
            PageStatus::Bound | PageStatus::Failed => {
                entry.status = PageStatus::Rendering;
                entry.failure = None;
                true
            }
            _ => false,
        })
    }

    /// No-op unless the page is rendering
    pub fn mark_rendered(&self, page: u32) -> bool {
        self.transition(page, |entry| {
            if entry.status != PageStatus::Rendering {
                return false;
            }
            entry.status = PageStatus::Rendered;
            true
        })
    }

    /// No-op unless the page is rendering
    pub fn mark_failed(&self, page: u32, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.transition(page, move |entry| {
            if entry.status != PageStatus::Rendering {
                return false;
            }
            entry.status = PageStatus::Failed;
            entry.failure = Some(reason);
            true
        })
    }

    /// Move a rendered page back to bound so it can be drawn again
    pub fn mark_stale(&self, page: u32) -> bool {
        self.transition(page, |entry| {
            if entry.status != PageStatus::Rendered {
                return false;
            }
            entry.status = PageStatus::Bound;
            true
        })
    }

    fn transition(&self, page: u32, apply: impl FnOnce(&mut PageEntry) -> bool) -> bool {
        let Some(entry) = self.entry(page) else {
            return false;
        };
        let mut entry = entry.lock();
        apply(&mut entry)
    }

    pub fn status(&self, page: u32) -> Option<PageStatus> {
        let entry = self.entry(page)?;
        let status = entry.lock().status;
        Some(status)
    }

    pub fn surface(&self, page: u32) -> Option<SurfaceRef> {
        let entry = self.entry(page)?;
        let surface = entry.lock().surface.clone();
        surface
    }

    pub fn failure(&self, page: u32) -> Option<String> {
        let entry = self.entry(page)?;
        let failure = entry.lock().failure.clone();
        failure
    }

    pub fn snapshot(&self) -> Vec<PageSnapshot> {
        self.entries
            .read()
            .iter()
            .map(|entry| {
                let entry = entry.lock();
                PageSnapshot {
                    page_number: entry.page_number,
                    status: entry.status,
                    has_surface: entry.surface.is_some(),
                    failure: entry.failure.clone(),
                }
            })
            .collect()
    }
}
