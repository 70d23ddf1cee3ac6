use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ViewerConfig;
use crate::error::OpenError;
use crate::guard::RenderGuard;
use crate::registry::{PageSnapshot, PageStatus, PageSurfaceRegistry};
use crate::renderer::{DocumentEngine, SurfaceRef};
use crate::scheduler::{RenderScheduler, RenderState, SchedulerStats, ViewerEvent};
use crate::session::{DocumentSession, SessionState};
use crate::source::DocumentSource;
use crate::viewport::{ContainerGeometry, ViewportEvent, ViewportTracker};

/// A scrollable, lazily rendered document view
///
/// Ties the session, scheduler and viewport tracker together for a
/// presentation layer: open a source, bind one surface per page, report
/// mounting and container events, and observe [`ViewerEvent`]s.
pub struct PdfViewer {
    config: ViewerConfig,
    session: DocumentSession,
    scheduler: RenderScheduler,
    tracker: ViewportTracker,
    registry: Arc<PageSurfaceRegistry>,
}

impl PdfViewer {
    pub fn new(engine: Arc<dyn DocumentEngine>, config: ViewerConfig) -> Self {
        let guard = Arc::new(RenderGuard::new());
        let registry = Arc::new(PageSurfaceRegistry::new());
        let session = DocumentSession::new(engine, Arc::clone(&guard), Arc::clone(&registry));
        let scheduler = RenderScheduler::new(guard, Arc::clone(&registry), config.clone());
        Self {
            config,
            session,
            scheduler,
            tracker: ViewportTracker::new(),
            registry,
        }
    }

    /// Open `source`, replacing whatever was shown before
    pub async fn open(&mut self, source: DocumentSource) -> Result<usize, OpenError> {
        self.tracker.detach();
        self.scheduler.clear_last_failure();
        self.session.open(source).await
    }

    pub fn close(&mut self) {
        self.tracker.detach();
        self.scheduler.clear_last_failure();
        self.session.close();
    }

    /// Record the surface the presentation layer created for `page`
    pub fn bind_surface(&self, page: u32, surface: SurfaceRef) -> bool {
        self.registry.bind_surface(page, surface)
    }

    /// Page surfaces are in place: render the lead window and whatever is
    /// already visible, then start following container events.
    ///
    /// Returns the pages for which a render was requested.
    pub fn surfaces_mounted(&mut self, geometry: &dyn ContainerGeometry) -> Vec<u32> {
        let Some(document) = self.session.document() else {
            return Vec::new();
        };
        self.scheduler.set_container_width(geometry.content_width());
        let mut requested = self
            .scheduler
            .schedule_eager(document, self.config.lead_count);

        self.tracker.attach();
        if let Some(visible) = self.tracker.handle(ViewportEvent::Mounted, geometry) {
            requested.extend(self.scheduler.schedule_visible(document, &visible));
        }
        requested
    }

    /// Scroll or resize of the container
    ///
    /// Resizing only affects pages rendered from now on; call
    /// [`invalidate_all`](Self::invalidate_all) to redraw rendered pages.
    pub fn handle_event(&self, event: ViewportEvent, geometry: &dyn ContainerGeometry) -> Vec<u32> {
        let Some(document) = self.session.document() else {
            return Vec::new();
        };
        if event == ViewportEvent::Resize {
            self.scheduler.set_container_width(geometry.content_width());
        }
        match self.tracker.handle(event, geometry) {
            Some(visible) => self.scheduler.schedule_visible(document, &visible),
            None => {
                debug!(?event, "viewport not attached");
                Vec::new()
            }
        }
    }

    /// Drop all rendered pages; the next event redraws the visible ones
    pub fn invalidate_all(&self) -> usize {
        self.scheduler.invalidate_all()
    }

    pub fn page_count(&self) -> usize {
        self.session.page_count()
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn render_state(&self, page: u32) -> RenderState {
        self.scheduler.render_state(page)
    }

    pub fn page_status(&self, page: u32) -> Option<PageStatus> {
        self.registry.status(page)
    }

    pub fn pages(&self) -> Vec<PageSnapshot> {
        self.registry.snapshot()
    }

    /// Error banner text: a failed open, or the latest page failure
    pub fn last_error(&self) -> Option<String> {
        match self.session.state() {
            SessionState::Failed { message } => Some(message.clone()),
            _ => self.scheduler.last_failure(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.scheduler.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await;
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }
}
