use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::OpenError;
use crate::guard::{Generation, RenderGuard};
use crate::registry::PageSurfaceRegistry;
use crate::renderer::{DocumentEngine, DocumentHandle};
use crate::source::DocumentSource;

/// A successfully opened document, tagged with its generation
#[derive(Clone)]
pub struct OpenDocument {
    handle: Arc<dyn DocumentHandle>,
    generation: Generation,
    page_count: usize,
}

impl OpenDocument {
    pub(crate) fn new(handle: Arc<dyn DocumentHandle>, generation: Generation) -> Self {
        let page_count = handle.page_count();
        Self {
            handle,
            generation,
            page_count,
        }
    }

    pub fn handle(&self) -> &Arc<dyn DocumentHandle> {
        &self.handle
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl fmt::Debug for OpenDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDocument")
            .field("generation", &self.generation)
            .field("page_count", &self.page_count)
            .finish()
    }
}

/// What the presentation layer should show for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No document; show the upload zone
    Empty,
    Loading,
    Ready { page_count: usize },
    /// Open failed; blocking error, no page list
    Failed { message: String },
}

/// Lifecycle of one loaded document
///
/// Opening a new source always cuts a new generation first, so nothing
/// rendered for the previous document can land on the new one.
pub struct DocumentSession {
    engine: Arc<dyn DocumentEngine>,
    guard: Arc<RenderGuard>,
    registry: Arc<PageSurfaceRegistry>,
    source: Option<DocumentSource>,
    document: Option<OpenDocument>,
    state: SessionState,
}

impl DocumentSession {
    pub fn new(
        engine: Arc<dyn DocumentEngine>,
        guard: Arc<RenderGuard>,
        registry: Arc<PageSurfaceRegistry>,
    ) -> Self {
        Self {
            engine,
            guard,
            registry,
            source: None,
            document: None,
            state: SessionState::Empty,
        }
    }

    /// Replace the current document with `source`
    ///
    /// The previous document is torn down before the new one is opened. If
    /// opening fails the session is left empty; the old document is not
    /// restored.
    pub async fn open(&mut self, source: DocumentSource) -> Result<usize, OpenError> {
        let generation = self.teardown();
        self.state = SessionState::Loading;
        info!(source = %source.describe(), %generation, "opening document");

        match self.engine.open(&source).await {
            Ok(handle) => {
                let document = OpenDocument::new(handle, generation);
                let page_count = document.page_count();
                self.registry.initialize(page_count);
                self.source = Some(source);
                self.document = Some(document);
                self.state = SessionState::Ready { page_count };
                info!(page_count, %generation, "document ready");
                Ok(page_count)
            }
            Err(err) => {
                error!(source = %source.describe(), error = %err, "failed to open document");
                self.state = SessionState::Failed {
                    message: format!("Failed to load PDF: {}", err),
                };
                Err(err)
            }
        }
    }

    /// Release the document and clear all derived state. Idempotent.
    pub fn close(&mut self) {
        if self.document.is_some() {
            let generation = self.teardown();
            info!(%generation, "document closed");
        }
        self.state = SessionState::Empty;
    }

    /// Generation cut: bump the guard first so in-flight completions for the
    /// old document are rejected before its entries disappear.
    fn teardown(&mut self) -> Generation {
        let generation = self.guard.reset_generation();
        self.registry.reset();
        self.document = None;
        self.source = None;
        generation
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    pub fn source(&self) -> Option<&DocumentSource> {
        self.source.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, OpenDocument::page_count)
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }
}
