//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: `identify` (header-only read) and `render` (decode, orient,
//! resize, encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust with no system
//! libraries.

use super::params::{DecodeLimits, RenderParams};
use std::fmt;
use thiserror::Error;

/// The only two ways a transform can fail.
///
/// Callers may show the message but should branch on the variant only when
/// they need to; the engine makes no finer distinction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Unrecognized or corrupt input, or a decode-time pixel ceiling violation.
    #[error("unsupported or corrupted image: {0}")]
    Decode(String),
    /// Any other failure while converting, resizing or encoding.
    #[error("image processing failed: {0}")]
    Processing(String),
}

impl TransformError {
    pub fn decode(detail: impl fmt::Display) -> Self {
        Self::Decode(detail.to_string())
    }

    pub fn processing(detail: impl fmt::Display) -> Self {
        Self::Processing(detail.to_string())
    }
}

/// Container/codec the source bytes were detected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Unknown,
}

impl SourceFormat {
    /// Uppercase tag recorded alongside the stored image.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WEBP",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

/// Result of an identify operation: everything learned from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub format: SourceFormat,
    /// Stored dimensions, as encoded in the file.
    pub stored: Dimensions,
    /// Whether EXIF orientation swaps width and height (90°/270° rotations).
    pub swaps_axes: bool,
}

impl SourceInfo {
    /// Dimensions after EXIF orientation is applied.
    pub fn upright(&self) -> Dimensions {
        if self.swaps_axes {
            self.stored.swapped()
        } else {
            self.stored
        }
    }
}

/// Trait for image processing backends.
///
/// Backends hold no per-call state, so one instance can serve any number of
/// threads at once.
pub trait ImageBackend: Sync {
    /// Detect the format, dimensions and orientation without decoding pixels.
    /// Fails with [`TransformError::Decode`] when the stored dimensions exceed
    /// `limits`.
    fn identify(&self, source: &[u8], limits: DecodeLimits) -> Result<SourceInfo, TransformError>;

    /// Decode, orient, resize to exactly `params.width`x`params.height` and
    /// encode as progressive JPEG. Returns the encoded bytes.
    fn render(&self, params: &RenderParams<'_>) -> Result<Vec<u8>, TransformError>;
}
