//! Visibility tracking for the scroll container
//!
//! A page is visible when its surface overlaps the container on the scroll
//! axis; touching edges count. The tracker keeps no page state of its own:
//! every scroll, resize or mount event yields a fresh snapshot computed from
//! geometry supplied by the presentation layer.

use std::collections::BTreeSet;

use crate::registry::page_number;

/// Page numbers whose surfaces intersect the container
pub type VisibleSet = BTreeSet<u32>;

/// Vertical extent of a box, in container coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn new(top: f32, bottom: f32) -> Self {
        Self { top, bottom }
    }

    pub fn with_height(top: f32, height: f32) -> Self {
        Self {
            top,
            bottom: top + height,
        }
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Overlap on the scroll axis, inclusive on touching edges
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.top <= other.bottom && self.bottom >= other.top
    }
}

/// Container notifications that can change the visible set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEvent {
    Scroll,
    Resize,
    /// Page surfaces were just mounted; catches pages visible without scrolling
    Mounted,
}

/// Geometry the presentation layer exposes to the viewer
pub trait ContainerGeometry {
    /// Visible box of the scroll container
    fn container_bounds(&self) -> Bounds;

    /// Content width of the container, `None` until measured
    fn content_width(&self) -> Option<f32>;

    /// Box of every mounted page surface, keyed by page number
    fn surface_bounds(&self) -> Vec<(u32, Bounds)>;
}

/// Turns container events into visible-set snapshots
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    attached: bool,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self { attached: false }
    }

    /// Start listening to container events
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop listening; later events produce no snapshot
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Snapshot for `event`, or `None` while detached
    pub fn handle(
        &self,
        event: ViewportEvent,
        geometry: &dyn ContainerGeometry,
    ) -> Option<VisibleSet> {
        if !self.attached {
            return None;
        }
        let visible = Self::compute_visible(geometry.container_bounds(), geometry.surface_bounds());
        tracing::trace!(?event, pages = ?visible, "viewport snapshot");
        Some(visible)
    }

    pub fn compute_visible(
        container: Bounds,
        surfaces: impl IntoIterator<Item = (u32, Bounds)>,
    ) -> VisibleSet {
        surfaces
            .into_iter()
            .filter(|(_, surface)| surface.intersects(&container))
            .map(|(page, _)| page)
            .collect()
    }
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Pages stacked top to bottom in a single scrolling column
///
/// A ready-made [`ContainerGeometry`] for hosts that lay pages out
/// continuously with fixed spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousLayout {
    page_heights: Vec<f32>,
    page_spacing: f32,
    scroll_offset: f32,
    viewport_height: f32,
    content_width: Option<f32>,
}

impl ContinuousLayout {
    const DEFAULT_SPACING: f32 = 16.0;

    pub fn new(page_heights: Vec<f32>, viewport_height: f32) -> Self {
        Self {
            page_heights,
            page_spacing: Self::DEFAULT_SPACING,
            scroll_offset: 0.0,
            viewport_height,
            content_width: None,
        }
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.page_spacing = spacing;
        self
    }

    pub fn with_content_width(mut self, width: f32) -> Self {
        self.content_width = Some(width);
        self
    }

    /// Scroll so the container's top edge sits at `offset`, clamped to the content
    pub fn scroll_to(&mut self, offset: f32) {
        let max = (self.content_height() - self.viewport_height).max(0.0);
        self.scroll_offset = offset.clamp(0.0, max);
    }

    /// Offset at which `page` starts
    pub fn page_offset(&self, page: u32) -> Option<f32> {
        let index = (page as usize).checked_sub(1)?;
        if index >= self.page_heights.len() {
            return None;
        }
        let offset: f32 = self.page_heights[..index]
            .iter()
            .map(|height| height + self.page_spacing)
            .sum();
        Some(offset)
    }

    pub fn resize(&mut self, viewport_height: f32, content_width: f32) {
        self.viewport_height = viewport_height;
        self.content_width = Some(content_width);
        self.scroll_to(self.scroll_offset);
    }

    pub fn content_height(&self) -> f32 {
        let pages: f32 = self.page_heights.iter().sum();
        let gaps = self.page_heights.len().saturating_sub(1) as f32 * self.page_spacing;
        pages + gaps
    }
}

impl ContainerGeometry for ContinuousLayout {
    fn container_bounds(&self) -> Bounds {
        Bounds::with_height(self.scroll_offset, self.viewport_height)
    }

    fn content_width(&self) -> Option<f32> {
        self.content_width
    }

    fn surface_bounds(&self) -> Vec<(u32, Bounds)> {
        let mut cursor = 0.0;
        self.page_heights
            .iter()
            .enumerate()
            .map(|(index, height)| {
                let bounds = Bounds::with_height(cursor, *height);
                cursor += height + self.page_spacing;
                (page_number(index + 1), bounds)
            })
            .collect()
    }
}
