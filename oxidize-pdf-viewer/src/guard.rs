//! Per-document render bookkeeping
//!
//! Tracks which pages have a completed render and which are currently being
//! rendered. A page is accepted for rendering only when it is in neither set,
//! so a page that is both in the eager lead window and visible in the viewport
//! is rendered once.
//!
//! Every document open bumps the generation. Tickets handed out under an
//! older generation are rejected on release, which keeps renders of a
//! superseded document from touching the new document's bookkeeping.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::StaleGeneration;

/// Monotonic document generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof that a page was accepted for rendering
///
/// Must be handed back through [`RenderGuard::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    page: u32,
    generation: Generation,
}

impl RenderTicket {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

#[derive(Debug, Default)]
struct GuardState {
    generation: Generation,
    rendered: BTreeSet<u32>,
    in_flight: BTreeSet<u32>,
}

/// Rendered and in-flight page sets for the current generation
///
/// Invariant: the two sets never share a page number.
#[derive(Debug, Default)]
pub struct RenderGuard {
    state: Mutex<GuardState>,
}

impl RenderGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `page` for rendering if it is neither rendered nor in flight
    pub fn try_acquire(&self, page: u32) -> Option<RenderTicket> {
        let mut state = self.state.lock();
        if state.rendered.contains(&page) || state.in_flight.contains(&page) {
            return None;
        }
        state.in_flight.insert(page);
        Some(RenderTicket {
            page,
            generation: state.generation,
        })
    }

    /// Return a ticket. On success the page moves to the rendered set.
    ///
    /// A ticket from an earlier generation leaves both sets untouched.
    pub fn release(&self, ticket: RenderTicket, succeeded: bool) -> Result<(), StaleGeneration> {
        self.release_with(ticket, succeeded, || ())
    }

    /// Like [`release`](Self::release), running `apply` in the same critical
    /// section. `apply` only runs for tickets of the current generation.
    pub fn release_with<R>(
        &self,
        ticket: RenderTicket,
        succeeded: bool,
        apply: impl FnOnce() -> R,
    ) -> Result<R, StaleGeneration> {
        let mut state = self.state.lock();
        if ticket.generation != state.generation {
            return Err(StaleGeneration {
                page: ticket.page,
                ticket: ticket.generation,
                current: state.generation,
            });
        }
        let result = apply();
        state.in_flight.remove(&ticket.page);
        if succeeded {
            state.rendered.insert(ticket.page);
        }
        Ok(result)
    }

    /// Run `apply` while no generation change can happen, if `generation` is
    /// still current
    pub fn with_current<R>(&self, generation: Generation, apply: impl FnOnce() -> R) -> Option<R> {
        let state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        Some(apply())
    }

    /// Start a new generation with empty sets
    pub fn reset_generation(&self) -> Generation {
        let mut state = self.state.lock();
        state.rendered.clear();
        state.in_flight.clear();
        state.generation = state.generation.next();
        state.generation
    }

    /// Drop `page` from the rendered set so the next trigger renders it again.
    ///
    /// Returns `true` if the page had been rendered.
    pub fn forget(&self, page: u32) -> bool {
        self.state.lock().rendered.remove(&page)
    }

    /// Drop every rendered page, returning how many were forgotten
    pub fn forget_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.rendered.len();
        state.rendered.clear();
        count
    }

    pub fn generation(&self) -> Generation {
        self.state.lock().generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    pub fn is_rendered(&self, page: u32) -> bool {
        self.state.lock().rendered.contains(&page)
    }

    pub fn is_in_flight(&self, page: u32) -> bool {
        self.state.lock().in_flight.contains(&page)
    }

    pub fn rendered(&self) -> BTreeSet<u32> {
        self.state.lock().rendered.clone()
    }

    pub fn in_flight(&self) -> BTreeSet<u32> {
        self.state.lock().in_flight.clone()
    }
}
