//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides the
//! output geometry) and the [`backend`](super::backend) (which does the pixel
//! work). Keeping them separate lets the operation logic run against a mock
//! backend in tests.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–95, default 85). Clamped on construction.
//! - [`TargetSize`]: Optional target width/height for scale-to-fit.
//! - [`DecodeLimits`]: Per-call ceiling on decoded pixel count.
//! - [`TransformRequest`]: Everything one `transform` call needs.
//! - [`RenderParams`]: Resolved output geometry handed to the backend.

/// Lowest JPEG quality the encoder is ever asked for.
pub const MIN_QUALITY: u8 = 1;
/// Highest JPEG quality the encoder is ever asked for.
pub const MAX_QUALITY: u8 = 95;
/// Upper bound for a requested target width or height.
pub const MAX_TARGET_DIMENSION: u32 = 20_000;
/// Default pixel ceiling (50 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;

/// Quality setting for JPEG encoding (1-95).
///
/// Out-of-range requests are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: i64) -> Self {
        Self(value.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Requested output box. A zero on either axis means "not requested".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl TargetSize {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width: width.filter(|&w| w > 0),
            height: height.filter(|&h| h > 0),
        }
    }

    /// Keep the source dimensions.
    pub fn original() -> Self {
        Self::default()
    }

    pub fn width(width: u32) -> Self {
        Self::new(Some(width), None)
    }

    pub fn height(height: u32) -> Self {
        Self::new(None, Some(height))
    }

    pub fn bounded(width: u32, height: u32) -> Self {
        Self::new(Some(width), Some(height))
    }
}

/// Resource limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum `width * height` of the decoded source image.
    pub max_pixels: u64,
}

impl DecodeLimits {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub fn allows(&self, width: u32, height: u32) -> bool {
        (width as u64) * (height as u64) <= self.max_pixels
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PIXELS)
    }
}

/// A single transform call: source bytes plus the requested output.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub source: &'a [u8],
    /// Raw requested quality; clamped to [`MIN_QUALITY`]..=[`MAX_QUALITY`].
    pub quality: i64,
    pub target: TargetSize,
    pub limits: DecodeLimits,
}

impl<'a> TransformRequest<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            quality: Quality::default().value() as i64,
            target: TargetSize::original(),
            limits: DecodeLimits::default(),
        }
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_target(mut self, target: TargetSize) -> Self {
        self.target = target;
        self
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Fully resolved render job: the backend decodes `source`, applies EXIF
/// orientation, resizes to exactly `width`x`height` and encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams<'a> {
    pub source: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub limits: DecodeLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(-40).value(), 1);
        assert_eq!(Quality::new(85).value(), 85);
        assert_eq!(Quality::new(95).value(), 95);
        assert_eq!(Quality::new(200).value(), 95);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn zero_target_means_not_requested() {
        assert_eq!(TargetSize::new(Some(0), Some(0)), TargetSize::original());
        assert_eq!(TargetSize::new(Some(0), Some(300)), TargetSize::height(300));
    }

    #[test]
    fn decode_limits_compare_in_u64() {
        let limits = DecodeLimits::new(50_000_000);
        assert!(limits.allows(10_000, 5_000));
        assert!(!limits.allows(10_000, 5_001));
        // Would overflow u32 multiplication.
        assert!(!limits.allows(u32::MAX, u32::MAX));
    }

    #[test]
    fn request_builder_defaults() {
        let req = TransformRequest::new(b"abc");
        assert_eq!(req.quality, 85);
        assert_eq!(req.target, TargetSize::original());
        assert_eq!(req.limits.max_pixels, DEFAULT_MAX_PIXELS);
    }
}
