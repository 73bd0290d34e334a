//! Upload and retrieval service.
//!
//! Sits between a transport (the CLI here, an HTTP router elsewhere) and the
//! two collaborators that do the work: the transform engine and the image
//! store. The transport hands over raw form fields and bytes; the service
//! validates them, runs the engine, persists the result and answers with a
//! status code plus a JSON payload.
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | stored | 201 | [`UploadResponse`] |
//! | missing file, bad field, malformed id | 400 | `{"detail": …}` |
//! | unknown id | 404 | `{"detail": "Image not found"}` |
//! | upload over the size cap | 413 | `{"detail": …}` |
//! | engine rejected the bytes | 415 | `{"detail": "Invalid image: …"}` |
//! | storage failure | 500 | `{"detail": "Internal Server Error"}` |

use crate::config::Settings;
use crate::imaging::{
    DecodeLimits, ImageBackend, MAX_QUALITY, MAX_TARGET_DIMENSION, MIN_QUALITY, TargetSize,
    TransformRequest, transform,
};
use crate::store::{ImageRecord, ImageStore, StoreError};
use serde::Serialize;
use std::io::{self, Read};
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Status of a successful upload.
pub const CREATED: u16 = 201;

/// Filename recorded when the upload carries none.
pub const DEFAULT_FILENAME: &str = "upload";

/// Content is addressed by a fresh UUID and never rewritten.
pub const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Chunk size used while reading an upload body.
const READ_CHUNK: usize = 8192;

// =============================================================================
// Field validation
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Parse an optional integer form field.
///
/// Absent or empty input is `None`. Surrounding whitespace is ignored.
pub fn parse_optional_int(
    name: &str,
    raw: Option<&str>,
    min: i64,
    max: i64,
) -> Result<Option<i64>, ValidationError> {
    let raw = match raw {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError(format!("{name} must be integer")))?;
    if !(min..=max).contains(&value) {
        return Err(ValidationError(format!("{name} must be in range [{min}; {max}]")));
    }
    Ok(Some(value))
}

/// Read a whole upload body, giving up as soon as it exceeds `limit_mb` MiB.
///
/// The body is consumed in fixed-size chunks so an oversized upload is
/// rejected after at most one chunk past the cap, never buffered in full.
pub fn read_capped(mut reader: impl Read, limit_mb: u64) -> Result<Vec<u8>, ServiceError> {
    let limit = limit_mb.saturating_mul(1024 * 1024);
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ServiceError::Io(e)),
        };
        if (buf.len() + n) as u64 > limit {
            return Err(ServiceError::PayloadTooLarge(format!("file exceeds limit {limit_mb} MB")));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(buf)
}

// =============================================================================
// Requests and responses
// =============================================================================

/// Per-request context, recorded on the tracing span of every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub route: String,
}

impl RequestContext {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            route: route.into(),
        }
    }
}

/// Raw upload fields, exactly as received.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Vec<u8>,
    pub filename: Option<String>,
    pub quality: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl UploadForm {
    pub fn new(file: Vec<u8>) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_x(mut self, x: impl Into<String>) -> Self {
        self.x = Some(x.into());
        self
    }

    pub fn with_y(mut self, y: impl Into<String>) -> Self {
        self.y = Some(y.into());
        self
    }
}

/// Success payload of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub size_bytes: u64,
    pub content_type: String,
    pub source_format: String,
    pub filename: String,
}

impl UploadResponse {
    pub fn status(&self) -> u16 {
        CREATED
    }
}

/// Stored bytes handed back by [`ImageService::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    pub cache_control: &'static str,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::BadRequest(err.0)
    }
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::PayloadTooLarge(_) => 413,
            ServiceError::UnsupportedMediaType(_) => 415,
            ServiceError::Io(_) | ServiceError::Store(_) => 500,
        }
    }

    /// Message safe to show a client. Internal failures are not described.
    pub fn detail(&self) -> String {
        match self {
            ServiceError::Io(_) | ServiceError::Store(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    /// JSON error body: `{"detail": …}`.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "detail": self.detail() })
    }
}

// =============================================================================
// Service
// =============================================================================

/// Validates uploads, runs the transform engine and stores the result.
pub struct ImageService<B, S> {
    backend: B,
    store: S,
    settings: Settings,
}

impl<B: ImageBackend, S: ImageStore> ImageService<B, S> {
    pub fn new(backend: B, store: S, settings: Settings) -> Self {
        Self {
            backend,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read an upload body under the configured size cap.
    pub fn read_body(&self, reader: impl Read) -> Result<Vec<u8>, ServiceError> {
        read_capped(reader, self.settings.max_image_mb)
    }

    /// Normalize and persist one uploaded image.
    #[instrument(
        skip(self, form),
        fields(request_id = %ctx.request_id, route = %ctx.route, len = form.file.len())
    )]
    pub fn upload(
        &self,
        ctx: &RequestContext,
        form: UploadForm,
    ) -> Result<UploadResponse, ServiceError> {
        if form.file.is_empty() {
            return Err(ServiceError::BadRequest("file field is required".into()));
        }

        let quality = parse_optional_int(
            "quality",
            form.quality.as_deref(),
            MIN_QUALITY.into(),
            MAX_QUALITY.into(),
        )?
        .unwrap_or(self.settings.default_quality.into());
        let max_dim = i64::from(MAX_TARGET_DIMENSION);
        let width = parse_optional_int("x", form.x.as_deref(), 1, max_dim)?;
        let height = parse_optional_int("y", form.y.as_deref(), 1, max_dim)?;

        let request = TransformRequest::new(&form.file)
            .with_quality(quality)
            .with_target(TargetSize::new(
                width.and_then(|w| u32::try_from(w).ok()),
                height.and_then(|h| u32::try_from(h).ok()),
            ))
            .with_limits(DecodeLimits::new(self.settings.max_pixels));

        let result = transform(&self.backend, &request)
            .map_err(|e| ServiceError::UnsupportedMediaType(format!("Invalid image: {e}")))?;

        let id = Uuid::new_v4();
        let filename = form
            .filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let record = ImageRecord::from_transform(id, filename, result);
        let meta = record.meta.clone();

        self.store.insert(record).inspect_err(|e| {
            error!(error = %e, "failed to store image");
        })?;

        info!(
            %id,
            width = meta.width,
            height = meta.height,
            size_bytes = meta.size_bytes,
            "image stored"
        );

        Ok(UploadResponse {
            id: meta.id,
            width: meta.width,
            height: meta.height,
            quality: meta.quality,
            size_bytes: meta.size_bytes,
            content_type: meta.content_type,
            source_format: meta.source_format,
            filename: meta.filename,
        })
    }

    /// Return stored bytes verbatim by id.
    #[instrument(skip(self), fields(request_id = %ctx.request_id, route = %ctx.route))]
    pub fn fetch(&self, ctx: &RequestContext, id: &str) -> Result<FetchedImage, ServiceError> {
        let id = Uuid::parse_str(id).map_err(|_| ServiceError::BadRequest("invalid UUID".into()))?;

        let stored = self
            .store
            .get(id)
            .inspect_err(|e| error!(error = %e, "failed to read image"))?
            .ok_or_else(|| ServiceError::NotFound("Image not found".into()))?;

        let content_type = if stored.content_type.is_empty() {
            crate::store::JPEG_CONTENT_TYPE.to_string()
        } else {
            stored.content_type
        };

        Ok(FetchedImage {
            data: stored.data,
            content_type,
            cache_control: CACHE_CONTROL,
        })
    }
}
