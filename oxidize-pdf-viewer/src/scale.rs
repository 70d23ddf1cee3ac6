//! Fit-to-width scale computation

/// Smallest scale ever handed to the engine
pub const MIN_SCALE: f32 = 0.01;

/// Scale that fits a page of `page_intrinsic_width` into `container_width`,
/// capped at `max_scale`.
///
/// Degenerate page widths (zero, negative, NaN) produce `max_scale` instead of
/// an infinite or undefined scale. The result is never below [`MIN_SCALE`].
pub fn compute_scale(page_intrinsic_width: f32, container_width: f32, max_scale: f32) -> f32 {
    if page_intrinsic_width.is_nan() || page_intrinsic_width <= 0.0 {
        return max_scale.max(MIN_SCALE);
    }
    let scale = container_width / page_intrinsic_width;
    if scale.is_nan() {
        return max_scale.max(MIN_SCALE);
    }
    scale.min(max_scale).max(MIN_SCALE)
}

/// Width available for a page inside the scroll container.
///
/// An unmeasured container, or one no wider than `padding` (collapsed or
/// hidden), falls back to `fallback`.
pub fn available_width(content_width: Option<f32>, padding: f32, fallback: f32) -> f32 {
    match content_width.map(|width| width - padding) {
        Some(width) if width > 0.0 => width,
        _ => fallback,
    }
}

/// Pixel dimensions of a page drawn at `scale`.
pub fn scaled_size(intrinsic: (f32, f32), scale: f32) -> (u32, u32) {
    let (width, height) = intrinsic;
    (
        (width * scale).round().max(0.0) as u32,
        (height * scale).round().max(0.0) as u32,
    )
}
