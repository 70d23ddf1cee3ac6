//! Render scheduling
//!
//! Pages are rendered in two ways: eagerly for a fixed lead window right after
//! a document opens, and on demand whenever they show up in a viewport
//! snapshot. Both paths go through the same acquire-and-render sequence, so a
//! page requested by both is rendered once.
//!
//! Each accepted page becomes an independent Tokio task. Completions may
//! arrive in any order; a completion whose generation has been superseded is
//! dropped without touching the registry.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn, Instrument};

use crate::config::ViewerConfig;
use crate::error::{RenderError, StaleGeneration};
use crate::guard::{Generation, RenderGuard, RenderTicket};
use crate::registry::{page_number, PageStatus, PageSurfaceRegistry};
use crate::renderer::{DocumentHandle, SurfaceRef};
use crate::scale::{available_width, compute_scale, scaled_size};
use crate::session::OpenDocument;
use crate::viewport::VisibleSet;

/// Scheduler's view of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    /// Accepted, waiting to start drawing
    Queued,
    Rendering,
    /// Terminal for the current generation
    Done,
    /// Re-queued on the next eager or visibility trigger
    Error,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PageRendered {
        page: u32,
        generation: Generation,
        scale: f32,
    },
    PageFailed {
        page: u32,
        generation: Generation,
        message: String,
    },
}

/// Result of a successful paint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPage {
    pub page: u32,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Render requests issued to the engine
    pub requested: u64,
    pub completed: u64,
    pub failed: u64,
    /// Completions dropped because their document was replaced
    pub discarded: u64,
}

impl SchedulerStats {
    pub fn pending(&self) -> u64 {
        self.requested
            .saturating_sub(self.completed + self.failed + self.discarded)
    }
}

struct Shared {
    guard: Arc<RenderGuard>,
    registry: Arc<PageSurfaceRegistry>,
    config: ViewerConfig,
    container_width: Mutex<Option<f32>>,
    permits: Option<Semaphore>,
    events: broadcast::Sender<ViewerEvent>,
    stats: Mutex<SchedulerStats>,
    last_failure: Mutex<Option<(Generation, String)>>,
}

/// Issues page renders and applies their outcomes
pub struct RenderScheduler {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RenderScheduler {
    pub fn new(
        guard: Arc<RenderGuard>,
        registry: Arc<PageSurfaceRegistry>,
        config: ViewerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let permits = config
            .max_concurrent_renders
            .map(|limit| Semaphore::new(limit.max(1)));
        Self {
            shared: Arc::new(Shared {
                guard,
                registry,
                config,
                container_width: Mutex::new(None),
                permits,
                events,
                stats: Mutex::new(SchedulerStats::default()),
                last_failure: Mutex::new(None),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Render pages `1..=min(lead_count, page_count)`
    ///
    /// Must be called from within a Tokio runtime. Returns the pages for which
    /// a render was actually requested.
    pub fn schedule_eager(&self, document: &OpenDocument, lead_count: usize) -> Vec<u32> {
        let last = page_number(lead_count.min(document.page_count()));
        self.schedule_pages(document, 1..=last, "eager")
    }

    /// Render every page in `visible` that is neither rendered nor in flight
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_visible(&self, document: &OpenDocument, visible: &VisibleSet) -> Vec<u32> {
        self.schedule_pages(document, visible.iter().copied(), "visible")
    }

    fn schedule_pages(
        &self,
        document: &OpenDocument,
        pages: impl IntoIterator<Item = u32>,
        trigger: &'static str,
    ) -> Vec<u32> {
        let mut requested = Vec::new();
        if !self.shared.guard.is_current(document.generation()) {
            debug!(generation = %document.generation(), trigger, "ignoring schedule for replaced document");
            return requested;
        }

        self.tasks.lock().retain(|task| !task.is_finished());

        for page in pages {
            if page == 0 || page as usize > document.page_count() {
                continue;
            }
            let Some(surface) = self.shared.registry.surface(page) else {
                trace!(page, trigger, "no surface bound");
                continue;
            };
            let Some(ticket) = self.shared.guard.try_acquire(page) else {
                trace!(page, trigger, "already rendered or in flight");
                continue;
            };
            if ticket.generation() != document.generation() {
                // A newer document opened while we were scheduling
                let _ = self.shared.guard.release(ticket, false);
                break;
            }

            self.shared.stats.lock().requested += 1;
            debug!(page, trigger, "render requested");
            self.spawn_render(document.handle().clone(), ticket, surface);
            requested.push(page);
        }

        requested
    }

    fn spawn_render(&self, handle: Arc<dyn DocumentHandle>, ticket: RenderTicket, surface: SurfaceRef) {
        let shared = Arc::clone(&self.shared);
        let span = tracing::debug_span!(
            "render_page",
            page = ticket.page(),
            generation = %ticket.generation()
        );
        let task = tokio::spawn(
            async move {
                let outcome = shared.render(handle, ticket, surface).await;
                let _ = shared.complete(ticket, outcome);
            }
            .instrument(span),
        );
        self.tasks.lock().push(task);
    }

    /// Apply the outcome of a render
    ///
    /// Tickets from a replaced document are rejected and leave every page
    /// untouched. Failures mark the page failed and are broadcast; they never
    /// affect other pages.
    pub fn on_render_complete(
        &self,
        ticket: RenderTicket,
        outcome: Result<RenderedPage, RenderError>,
    ) -> Result<PageStatus, StaleGeneration> {
        self.shared.complete(ticket, outcome)
    }

    /// Forget a rendered page so the next trigger draws it again
    pub fn invalidate(&self, page: u32) -> bool {
        // Leave the rendered set last so no trigger can acquire the page
        // while the registry still reports it as rendered.
        let stale = self.shared.registry.mark_stale(page);
        let forgotten = self.shared.guard.forget(page);
        stale && forgotten
    }

    /// Forget every rendered page, e.g. after the container width changed
    pub fn invalidate_all(&self) -> usize {
        self.shared
            .guard
            .rendered()
            .into_iter()
            .filter(|page| self.invalidate(*page))
            .count()
    }

    /// Width used for scale computation of renders started from now on
    pub fn set_container_width(&self, width: Option<f32>) {
        *self.shared.container_width.lock() = width;
    }

    pub fn render_state(&self, page: u32) -> RenderState {
        let in_flight = self.shared.guard.is_in_flight(page);
        match (in_flight, self.shared.registry.status(page)) {
            (true, Some(PageStatus::Rendering)) => RenderState::Rendering,
            (true, _) => RenderState::Queued,
            (false, Some(PageStatus::Rendered)) => RenderState::Done,
            (false, Some(PageStatus::Failed)) => RenderState::Error,
            (false, _) => RenderState::Idle,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.shared.events.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        *self.shared.stats.lock()
    }

    /// Message of the most recent page failure in the current document
    pub fn last_failure(&self) -> Option<String> {
        let (generation, message) = self.shared.last_failure.lock().clone()?;
        self.shared.guard.is_current(generation).then_some(message)
    }

    pub fn clear_last_failure(&self) {
        *self.shared.last_failure.lock() = None;
    }

    /// Wait for every render task spawned so far, including stale ones
    pub async fn wait_idle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(err) = task.await {
                    warn!(error = %err, "render task did not finish");
                }
            }
        }
    }
}

impl Shared {
    async fn render(
        &self,
        handle: Arc<dyn DocumentHandle>,
        ticket: RenderTicket,
        surface: SurfaceRef,
    ) -> Result<RenderedPage, RenderError> {
        let page = ticket.page();

        let _permit = match &self.permits {
            Some(permits) => Some(permits.acquire().await.map_err(|err| RenderError::Draw {
                page,
                reason: err.to_string(),
            })?),
            None => None,
        };

        let started = self
            .guard
            .with_current(ticket.generation(), || self.registry.mark_rendering(page));
        if started != Some(true) {
            return Err(RenderError::SurfaceUnavailable(page));
        }

        let content = handle.get_page(page).await?;
        let intrinsic = content.intrinsic_size();
        let container_width = *self.container_width.lock();
        let width = available_width(
            container_width,
            self.config.container_padding,
            self.config.fallback_container_width,
        );
        let scale = compute_scale(intrinsic.0, width, self.config.max_scale);
        let (width, height) = scaled_size(intrinsic, scale);

        let sized = self
            .guard
            .with_current(ticket.generation(), || surface.set_size(width, height));
        if sized.is_none() {
            return Err(RenderError::SurfaceUnavailable(page));
        }
        content.render_into(surface.as_ref(), scale).await?;

        Ok(RenderedPage {
            page,
            scale,
            width,
            height,
        })
    }

    fn complete(
        &self,
        ticket: RenderTicket,
        outcome: Result<RenderedPage, RenderError>,
    ) -> Result<PageStatus, StaleGeneration> {
        let page = ticket.page();
        let generation = ticket.generation();

        let applied = match &outcome {
            Ok(_) => self
                .guard
                .release_with(ticket, true, || self.registry.mark_rendered(page)),
            Err(err) => self
                .guard
                .release_with(ticket, false, || self.registry.mark_failed(page, err.to_string())),
        };
        if let Err(stale) = applied {
            self.stats.lock().discarded += 1;
            debug!(page, %stale, "discarding stale render");
            return Err(stale);
        }

        match outcome {
            Ok(rendered) => {
                self.stats.lock().completed += 1;
                debug!(page, scale = rendered.scale, "page rendered");
                let _ = self.events.send(ViewerEvent::PageRendered {
                    page,
                    generation,
                    scale: rendered.scale,
                });
                Ok(PageStatus::Rendered)
            }
            Err(err) => {
                self.stats.lock().failed += 1;
                let message = format!("Failed to render page: {}", err);
                warn!(page, error = %err, "page render failed");
                *self.last_failure.lock() = Some((generation, message.clone()));
                let _ = self.events.send(ViewerEvent::PageFailed {
                    page,
                    generation,
                    message,
                });
                Ok(PageStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::renderer::{PageHandle, RenderSurface};
    use async_trait::async_trait;

    struct Blank;

    #[async_trait]
    impl DocumentHandle for Blank {
        fn page_count(&self) -> usize {
            4
        }

        async fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PageError> {
            Err(PageError::NotFound {
                page: page_number,
                page_count: 4,
            })
        }
    }

    struct NullSurface;

    impl RenderSurface for NullSurface {
        fn set_size(&self, _width: u32, _height: u32) {}

        fn size(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    fn setup() -> (RenderScheduler, Arc<RenderGuard>, Arc<PageSurfaceRegistry>, OpenDocument) {
        let guard = Arc::new(RenderGuard::new());
        let registry = Arc::new(PageSurfaceRegistry::new());
        let generation = guard.reset_generation();
        registry.initialize(4);
        for page in 1..=4 {
            registry.bind_surface(page, Arc::new(NullSurface));
        }
        let document = OpenDocument::new(Arc::new(Blank), generation);
        let scheduler = RenderScheduler::new(guard.clone(), registry.clone(), ViewerConfig::default());
        (scheduler, guard, registry, document)
    }

    fn rendered(page: u32) -> RenderedPage {
        RenderedPage {
            page,
            scale: 1.0,
            width: 100,
            height: 100,
        }
    }

    #[test]
    fn test_render_state_follows_ticket() {
        let (scheduler, guard, registry, _) = setup();
        assert_eq!(scheduler.render_state(1), RenderState::Idle);

        let ticket = guard.try_acquire(1).unwrap();
        assert_eq!(scheduler.render_state(1), RenderState::Queued);

        registry.mark_rendering(1);
        assert_eq!(scheduler.render_state(1), RenderState::Rendering);

        assert_eq!(
            scheduler.on_render_complete(ticket, Ok(rendered(1))),
            Ok(PageStatus::Rendered)
        );
        assert_eq!(scheduler.render_state(1), RenderState::Done);
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_failure_is_recorded() {
        let (scheduler, guard, registry, _) = setup();
        let mut events = scheduler.subscribe();
        let ticket = guard.try_acquire(2).unwrap();
        registry.mark_rendering(2);

        let outcome = Err(RenderError::Draw {
            page: 2,
            reason: "canvas lost".into(),
        });
        assert_eq!(
            scheduler.on_render_complete(ticket, outcome),
            Ok(PageStatus::Failed)
        );
        assert_eq!(scheduler.render_state(2), RenderState::Error);
        assert_eq!(
            scheduler.last_failure().as_deref(),
            Some("Failed to render page: Failed to draw page 2: canvas lost")
        );
        assert!(matches!(
            events.try_recv(),
            Ok(ViewerEvent::PageFailed { page: 2, .. })
        ));
    }

    #[test]
    fn test_failure_of_replaced_document_is_hidden() {
        let (scheduler, guard, registry, _) = setup();
        let ticket = guard.try_acquire(2).unwrap();
        registry.mark_rendering(2);
        let outcome = Err(RenderError::Draw {
            page: 2,
            reason: "canvas lost".into(),
        });
        scheduler.on_render_complete(ticket, outcome).unwrap();
        assert!(scheduler.last_failure().is_some());

        guard.reset_generation();
        assert_eq!(scheduler.last_failure(), None);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let (scheduler, guard, registry, _) = setup();
        let ticket = guard.try_acquire(3).unwrap();
        registry.mark_rendering(3);

        guard.reset_generation();
        registry.initialize(4);
        registry.bind_surface(3, Arc::new(NullSurface));

        assert!(scheduler.on_render_complete(ticket, Ok(rendered(3))).is_err());
        assert_eq!(registry.status(3), Some(PageStatus::Bound));
        assert_eq!(scheduler.stats().discarded, 1);
    }

    #[test]
    fn test_invalidate() {
        let (scheduler, guard, registry, _) = setup();
        let ticket = guard.try_acquire(1).unwrap();
        registry.mark_rendering(1);
        scheduler.on_render_complete(ticket, Ok(rendered(1))).unwrap();

        assert!(scheduler.invalidate(1));
        assert!(!scheduler.invalidate(1));
        assert_eq!(scheduler.render_state(1), RenderState::Idle);
        assert_eq!(registry.status(1), Some(PageStatus::Bound));
    }

    /// Opening another document while this one's page is loading
    struct Replaced {
        guard: Arc<RenderGuard>,
    }

    struct Square;

    #[async_trait]
    impl PageHandle for Square {
        fn intrinsic_size(&self) -> (f32, f32) {
            (100.0, 100.0)
        }

        async fn render_into(&self, _surface: &dyn RenderSurface, _scale: f32) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentHandle for Replaced {
        fn page_count(&self) -> usize {
            1
        }

        async fn get_page(&self, _page_number: u32) -> Result<Arc<dyn PageHandle>, PageError> {
            self.guard.reset_generation();
            Ok(Arc::new(Square))
        }
    }

    #[derive(Default)]
    struct CountingSurface {
        resizes: std::sync::atomic::AtomicUsize,
    }

    impl RenderSurface for CountingSurface {
        fn set_size(&self, _width: u32, _height: u32) {
            self.resizes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn size(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    #[tokio::test]
    async fn test_generation_cut_during_load_leaves_surface_alone() {
        let guard = Arc::new(RenderGuard::new());
        let registry = Arc::new(PageSurfaceRegistry::new());
        let generation = guard.reset_generation();
        registry.initialize(1);
        let surface = Arc::new(CountingSurface::default());
        registry.bind_surface(1, surface.clone());
        let document = OpenDocument::new(
            Arc::new(Replaced {
                guard: guard.clone(),
            }),
            generation,
        );
        let scheduler = RenderScheduler::new(guard, registry, ViewerConfig::default());

        assert_eq!(scheduler.schedule_eager(&document, 1), vec![1]);
        scheduler.wait_idle().await;

        assert_eq!(surface.resizes.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(scheduler.stats().discarded, 1);
        assert_eq!(scheduler.stats().completed, 0);
    }

    #[tokio::test]
    async fn test_schedule_ignores_replaced_document() {
        let (scheduler, guard, _, document) = setup();
        guard.reset_generation();

        assert!(scheduler.schedule_eager(&document, 3).is_empty());
        assert_eq!(scheduler.stats().requested, 0);
    }

    #[tokio::test]
    async fn test_page_errors_mark_failed() {
        let (scheduler, _, registry, document) = setup();

        assert_eq!(scheduler.schedule_eager(&document, 10), vec![1, 2, 3, 4]);
        scheduler.wait_idle().await;

        assert_eq!(registry.status(4), Some(PageStatus::Failed));
        assert_eq!(scheduler.stats().failed, 4);
        assert_eq!(scheduler.stats().pending(), 0);
    }
}
