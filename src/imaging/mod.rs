//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader` header read |
//! | **Truncation guard** | custom JPEG marker walker |
//! | **Orient + resize** | EXIF orientation + Lanczos3 |
//! | **Encode** | `jpeg-encoder`, progressive with optimized Huffman tables |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod jpeg_markers;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, ImageBackend, SourceFormat, SourceInfo, TransformError};
pub use calculations::calculate_output_dimensions;
pub use operations::{TransformResult, inspect, transform};
pub use params::{
    DEFAULT_MAX_PIXELS, DecodeLimits, MAX_QUALITY, MAX_TARGET_DIMENSION, MIN_QUALITY, Quality,
    RenderParams, TargetSize, TransformRequest,
};
pub use rust_backend::RustBackend;
