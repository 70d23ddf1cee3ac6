//! Lazy, viewport-driven page rendering for scrollable PDF viewers
//!
//! The decoding engine stays behind the [`DocumentEngine`] trait; this crate
//! decides *when* each page is drawn and makes sure it is drawn once:
//!
//! - [`DocumentSession`] opens a source and cuts a new generation per document
//! - [`PageSurfaceRegistry`] holds one render target and status per page
//! - [`RenderGuard`] keeps the rendered and in-flight page sets disjoint
//! - [`ViewportTracker`] turns scroll and resize events into visible sets
//! - [`RenderScheduler`] renders the lead window eagerly and everything else
//!   when it becomes visible
//!
//! [`PdfViewer`] wires these together for a presentation layer.

pub mod config;
pub mod error;
pub mod guard;
pub mod pdf_viewer;
pub mod registry;
pub mod renderer;
pub mod scale;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod viewport;

pub use config::ViewerConfig;
pub use error::{OpenError, PageError, RenderError, SourceError, StaleGeneration};
pub use guard::{Generation, RenderGuard, RenderTicket};
pub use pdf_viewer::PdfViewer;
pub use registry::{PageSnapshot, PageStatus, PageSurfaceRegistry};
pub use renderer::{DocumentEngine, DocumentHandle, PageHandle, RenderSurface, SurfaceRef};
pub use scale::compute_scale;
pub use scheduler::{RenderScheduler, RenderState, RenderedPage, SchedulerStats, ViewerEvent};
pub use session::{DocumentSession, OpenDocument, SessionState};
pub use source::DocumentSource;
pub use viewport::{Bounds, ContainerGeometry, ContinuousLayout, ViewportEvent, ViewportTracker, VisibleSet};
