//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Rounding
//!
//! Scaled dimensions use [`f64::round`]: round half away from zero, which for
//! positive sizes is round-half-up. Both axes go through the same helper and
//! every result is floored at 1 pixel.

use super::params::TargetSize;

/// Scale `len` by `scale`, rounding half up and flooring at 1.
fn scale_axis(len: u32, scale: f64) -> u32 {
    ((len as f64 * scale).round() as u32).max(1)
}

/// Calculate output dimensions for an aspect-preserving scale-to-fit.
///
/// # Arguments
/// * `source` - Upright source dimensions (width, height), after orientation
/// * `target` - Requested width and/or height
///
/// # Returns
/// * `(width, height)` - Output dimensions
///
/// | Requested | Result |
/// |---|---|
/// | neither | source dimensions unchanged |
/// | both | fit inside the box: `scale = min(tw/w, th/h)` on both axes |
/// | width only | width exactly `tw`, height scaled |
/// | height only | height exactly `th`, width scaled |
///
/// Upscaling is allowed; a box larger than the source enlarges it.
pub fn calculate_output_dimensions(source: (u32, u32), target: TargetSize) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }

    match (target.width, target.height) {
        (None, None) => source,
        (Some(tw), Some(th)) => {
            let scale = (tw as f64 / src_w as f64).min(th as f64 / src_h as f64);
            (scale_axis(src_w, scale), scale_axis(src_h, scale))
        }
        (Some(tw), None) => {
            let scale = tw as f64 / src_w as f64;
            (tw, scale_axis(src_h, scale))
        }
        (None, Some(th)) => {
            let scale = th as f64 / src_h as f64;
            (scale_axis(src_w, scale), th)
        }
    }
}
