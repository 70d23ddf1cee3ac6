use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::{OpenError, PageError, RenderError};
use crate::source::DocumentSource;

/// Decoding engine that turns a source into a document handle
///
/// The viewer never looks inside documents; pdfium, MuPDF or a pure-Rust
/// parser all fit behind this trait.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn open(&self, source: &DocumentSource) -> Result<Arc<dyn DocumentHandle>, OpenError>;
}

/// An opened document
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    fn page_count(&self) -> usize;

    /// Load a page by 1-based number
    async fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PageError>;
}

/// A single decoded page
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Width and height at scale 1.0
    fn intrinsic_size(&self) -> (f32, f32);

    /// Draw the page into `surface` at `scale`. The surface is already sized.
    async fn render_into(&self, surface: &dyn RenderSurface, scale: f32) -> Result<(), RenderError>;
}

/// Paintable 2D target owned by the presentation layer
///
/// Implementations use interior mutability; the viewer only holds shared
/// references and never paints the same surface from two tasks at once.
///
/// `set_size` runs while the viewer holds its render bookkeeping lock and
/// must not call back into the viewer.
pub trait RenderSurface: Send + Sync {
    fn set_size(&self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);
}

pub type SurfaceRef = Arc<dyn RenderSurface>;

impl fmt::Debug for dyn RenderSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        f.debug_struct("RenderSurface")
            .field("width", &width)
            .field("height", &height)
            .finish()
    }
}

impl fmt::Debug for dyn DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("page_count", &self.page_count())
            .finish()
    }
}
