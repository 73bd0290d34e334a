//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! request, compute the output geometry, and call the backend.

use super::backend::{ImageBackend, SourceFormat, SourceInfo, TransformError};
use super::calculations::calculate_output_dimensions;
use super::params::{Quality, RenderParams, TransformRequest};
use tracing::{debug, instrument};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// A normalized image: encoded JPEG plus the metadata derived on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub encoded: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// The quality actually used, after clamping.
    pub quality: Quality,
    pub source_format: SourceFormat,
}

/// Identify the source without decoding pixels.
pub fn inspect(backend: &impl ImageBackend, request: &TransformRequest<'_>) -> Result<SourceInfo> {
    backend.identify(request.source, request.limits)
}

/// Plan a transform without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_render<'a>(info: &SourceInfo, request: &TransformRequest<'a>) -> RenderParams<'a> {
    let upright = info.upright();
    let (width, height) =
        calculate_output_dimensions((upright.width, upright.height), request.target);

    RenderParams {
        source: request.source,
        width,
        height,
        quality: Quality::new(request.quality),
        limits: request.limits,
    }
}

/// Normalize an image to a bounded-size progressive JPEG.
///
/// 1. Identify format, dimensions and EXIF orientation; reject sources over
///    the pixel ceiling before any pixel data is decoded.
/// 2. Compute the scale-to-fit output size from the upright dimensions.
/// 3. Decode, orient, resize, convert to RGB and encode.
///
/// Either the whole pipeline succeeds or nothing is returned.
#[instrument(level = "debug", skip_all, fields(len = request.source.len()))]
pub fn transform(
    backend: &impl ImageBackend,
    request: &TransformRequest<'_>,
) -> Result<TransformResult> {
    let info = inspect(backend, request)?;
    let params = plan_render(&info, request);
    debug!(
        format = %info.format,
        width = params.width,
        height = params.height,
        quality = params.quality.value(),
        "planned render"
    );

    let encoded = backend.render(&params)?;

    Ok(TransformResult {
        encoded,
        width: params.width,
        height: params.height,
        quality: params.quality,
        source_format: info.format,
    })
}
