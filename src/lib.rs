//! # Image Depot
//!
//! Accepts uploaded images, normalizes them to a bounded-size progressive
//! JPEG, stores the result under a fresh identifier and serves it back.
//!
//! # Architecture: Engine, Service, Store
//!
//! ```text
//! bytes + form fields ──► upload::ImageService ──► imaging::transform ──► JPEG + metadata
//!                                   │
//!                                   └──► store::ImageStore (insert / get by id)
//! ```
//!
//! The transform engine is the only part with real algorithmic content. It
//! is a pure, synchronous function of its inputs:
//!
//! - **Safe decode**: the pixel ceiling is enforced from the image header,
//!   before any pixel data is decoded. Truncated files are rejected, never
//!   padded out.
//! - **Upright output**: EXIF orientation is applied, then discarded.
//! - **Scale to fit**: width, height or both; aspect ratio is preserved and
//!   upscaling is allowed. Resampling is Lanczos3.
//! - **Uniform encoding**: 8-bit RGB, quality clamped to 1-95, progressive
//!   JPEG with optimized Huffman tables, byte-for-byte deterministic.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Transform engine: identify, orient, resize, encode |
//! | [`upload`] | Field validation, size-capped reads, upload/fetch with status mapping |
//! | [`store`] | `ImageStore` trait with in-memory and filesystem implementations |
//! | [`config`] | `config.toml` + environment loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Decoding uses the `image` crate and encoding uses `jpeg-encoder`, both
//! pure Rust. There are no system libraries to install and every platform
//! produces the same bytes for the same input.
//!
//! ## Backend Trait
//!
//! The engine talks to pixels only through [`imaging::ImageBackend`]. Unit
//! tests swap in a recording mock, so geometry and parameter handling are
//! tested without encoding a single image.

pub mod config;
pub mod imaging;
pub mod output;
pub mod store;
pub mod upload;
