#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use oxidize_pdf_viewer::{
    ContinuousLayout, DocumentEngine, DocumentHandle, DocumentSource, OpenError, PageError,
    PageHandle, PdfViewer, RenderError, RenderSurface, SurfaceRef, ViewerConfig,
};

pub const LETTER: (f32, f32) = (850.0, 1100.0);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oxidize_pdf_viewer=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

struct DocState {
    label: String,
    sizes: Vec<(f32, f32)>,
    /// Remaining scripted draw failures per page
    failures: Mutex<HashMap<u32, usize>>,
    /// Closed gate: `get_page` blocks until permits are added
    gate: Option<Semaphore>,
    requests: Mutex<HashMap<u32, usize>>,
    paints: Mutex<Vec<(u32, f32)>>,
}

/// Scripted in-memory document
#[derive(Clone)]
pub struct FakeDocument {
    state: Arc<DocState>,
}

impl FakeDocument {
    pub fn new(label: &str, page_count: usize) -> Self {
        Self::with_sizes(label, vec![LETTER; page_count])
    }

    pub fn with_sizes(label: &str, sizes: Vec<(f32, f32)>) -> Self {
        Self::build(label, sizes, None)
    }

    /// Every `get_page` waits until [`open_gate`](Self::open_gate) is called
    pub fn gated(label: &str, page_count: usize) -> Self {
        Self::build(label, vec![LETTER; page_count], Some(Semaphore::new(0)))
    }

    fn build(label: &str, sizes: Vec<(f32, f32)>, gate: Option<Semaphore>) -> Self {
        Self {
            state: Arc::new(DocState {
                label: label.to_string(),
                sizes,
                failures: Mutex::new(HashMap::new()),
                gate,
                requests: Mutex::new(HashMap::new()),
                paints: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn fail_page(&self, page: u32, times: usize) {
        self.state.failures.lock().insert(page, times);
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(1024);
        }
    }

    pub fn requests_for(&self, page: u32) -> usize {
        self.state.requests.lock().get(&page).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.state.requests.lock().values().sum()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.state.requests.lock().keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn paints(&self) -> Vec<(u32, f32)> {
        self.state.paints.lock().clone()
    }

    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.total_requests() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("timed out waiting for render requests");
    }
}

#[async_trait]
impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.state.sizes.len()
    }

    async fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PageError> {
        *self.state.requests.lock().entry(page_number).or_insert(0) += 1;

        if let Some(gate) = &self.state.gate {
            gate.acquire()
                .await
                .map_err(|err| PageError::Decode {
                    page: page_number,
                    reason: err.to_string(),
                })?
                .forget();
        }

        let index = page_number as usize - 1;
        let size = *self
            .state
            .sizes
            .get(index)
            .ok_or(PageError::NotFound {
                page: page_number,
                page_count: self.state.sizes.len(),
            })?;
        Ok(Arc::new(FakePage {
            number: page_number,
            size,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakePage {
    number: u32,
    size: (f32, f32),
    state: Arc<DocState>,
}

#[async_trait]
impl PageHandle for FakePage {
    fn intrinsic_size(&self) -> (f32, f32) {
        self.size
    }

    async fn render_into(&self, _surface: &dyn RenderSurface, scale: f32) -> Result<(), RenderError> {
        {
            let mut failures = self.state.failures.lock();
            if let Some(remaining) = failures.get_mut(&self.number) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RenderError::Draw {
                        page: self.number,
                        reason: format!("{} is corrupt", self.state.label),
                    });
                }
            }
        }
        self.state.paints.lock().push((self.number, scale));
        Ok(())
    }
}

/// Resolves remote locators to registered documents
#[derive(Default)]
pub struct FakeEngine {
    documents: Mutex<HashMap<String, FakeDocument>>,
    opens: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, locator: &str, document: FakeDocument) {
        self.documents.lock().insert(locator.to_string(), document);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentEngine for FakeEngine {
    async fn open(&self, source: &DocumentSource) -> Result<Arc<dyn DocumentHandle>, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match source {
            DocumentSource::Remote(locator) => {
                let document = self.documents.lock().get(locator).cloned();
                match document {
                    Some(document) => Ok(Arc::new(document)),
                    None => Err(OpenError::Fetch {
                        locator: locator.clone(),
                        reason: "404 Not Found".to_string(),
                    }),
                }
            }
            DocumentSource::Bytes(bytes) if bytes.starts_with(b"%PDF") => {
                Ok(Arc::new(FakeDocument::new("upload", 2)))
            }
            DocumentSource::Bytes(_) => Err(OpenError::Decode("missing %PDF header".to_string())),
        }
    }
}

/// Surface that records how often the viewer touched it
#[derive(Default)]
pub struct RecordingSurface {
    size: Mutex<(u32, u32)>,
    resizes: AtomicUsize,
}

impl RecordingSurface {
    pub fn mutations(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }
}

impl RenderSurface for RecordingSurface {
    fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
        self.resizes.fetch_add(1, Ordering::SeqCst);
    }

    fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }
}

/// Bind a fresh surface to every page of the open document
pub fn bind_all(viewer: &PdfViewer) -> Vec<Arc<RecordingSurface>> {
    (1..=viewer.page_count() as u32)
        .map(|page| {
            let surface = Arc::new(RecordingSurface::default());
            let handle: SurfaceRef = surface.clone();
            viewer.bind_surface(page, handle);
            surface
        })
        .collect()
}

/// Ten stacked pages of height 1000 with 20 units between them; an 800 tall
/// container at the top shows only page 1.
pub fn ten_page_layout() -> ContinuousLayout {
    ContinuousLayout::new(vec![1000.0; 10], 800.0)
        .with_spacing(20.0)
        .with_content_width(840.0)
}

pub fn viewer(engine: Arc<FakeEngine>) -> PdfViewer {
    viewer_with(engine, ViewerConfig::default())
}

pub fn viewer_with(engine: Arc<FakeEngine>, config: ViewerConfig) -> PdfViewer {
    init_tracing();
    PdfViewer::new(engine, config)
}
