use serde::Deserialize;

/// Tunables for lazy page rendering
///
/// Hosts can build this in code or deserialize it from their own settings
/// file; missing fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Pages rendered eagerly right after a document opens
    pub lead_count: usize,
    /// Upper bound on the fit-to-width scale
    pub max_scale: f32,
    /// Subtracted from the container width to avoid edge clipping
    pub container_padding: f32,
    /// Width assumed when the container has not been measured yet
    pub fallback_container_width: f32,
    /// Global cap on renders running at once; `None` means per-page limits only
    pub max_concurrent_renders: Option<usize>,
    /// Buffered viewer events per subscriber
    pub event_capacity: usize,
}

impl ViewerConfig {
    pub const DEFAULT_LEAD_COUNT: usize = 3;
    pub const DEFAULT_MAX_SCALE: f32 = 2.0;
    pub const DEFAULT_CONTAINER_PADDING: f32 = 40.0;
    pub const DEFAULT_FALLBACK_WIDTH: f32 = 800.0;
    const DEFAULT_EVENT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lead_count(mut self, lead_count: usize) -> Self {
        self.lead_count = lead_count;
        self
    }

    pub fn with_max_scale(mut self, max_scale: f32) -> Self {
        self.max_scale = max_scale;
        self
    }

    pub fn with_container_padding(mut self, padding: f32) -> Self {
        self.container_padding = padding;
        self
    }

    pub fn with_fallback_container_width(mut self, width: f32) -> Self {
        self.fallback_container_width = width;
        self
    }

    /// Cap concurrent renders across all pages. A limit of zero is treated as one.
    pub fn with_max_concurrent_renders(mut self, limit: usize) -> Self {
        self.max_concurrent_renders = Some(limit.max(1));
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            lead_count: Self::DEFAULT_LEAD_COUNT,
            max_scale: Self::DEFAULT_MAX_SCALE,
            container_padding: Self::DEFAULT_CONTAINER_PADDING,
            fallback_container_width: Self::DEFAULT_FALLBACK_WIDTH,
            max_concurrent_renders: None,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }
}
