//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! beach.jpg → beach.out.jpg
//!     JPEG → 800x600 JPEG, quality 85
//!     Size: 48.2 KiB
//! ```
//!
//! ## Show
//!
//! ```text
//! 6f1c2a8e-… beach.jpg
//!     Dimensions: 800x600
//!     Quality: 85
//!     Size: 48.2 KiB (49352 bytes)
//!     Source format: JPEG
//!     Content type: image/jpeg
//! ```
//!
//! ## List
//!
//! ```text
//! 6f1c2a8e-… beach.jpg 800x600 q85 48.2 KiB
//! 7a03b1c4-… upload 20x40 q70 1.1 KiB
//!
//! 2 images
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::TransformResult;
use crate::store::ImageMeta;
use std::path::Path;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Convert
// ============================================================================

pub fn format_convert_output(input: &Path, output: &Path, result: &TransformResult) -> Vec<String> {
    vec![
        format!("{} → {}", file_name(input), output.display()),
        format!(
            "{}{} → {}x{} JPEG, quality {}",
            indent(1),
            result.source_format,
            result.width,
            result.height,
            result.quality.value()
        ),
        format!(
            "{}Size: {}",
            indent(1),
            format_size(result.encoded.len() as u64)
        ),
    ]
}

pub fn print_convert_output(input: &Path, output: &Path, result: &TransformResult) {
    for line in format_convert_output(input, output, result) {
        println!("{line}");
    }
}

// ============================================================================
// Show / list
// ============================================================================

pub fn format_image_meta(meta: &ImageMeta) -> Vec<String> {
    vec![
        format!("{} {}", meta.id, meta.filename),
        format!("{}Dimensions: {}x{}", indent(1), meta.width, meta.height),
        format!("{}Quality: {}", indent(1), meta.quality),
        format!(
            "{}Size: {} ({} bytes)",
            indent(1),
            format_size(meta.size_bytes),
            meta.size_bytes
        ),
        format!("{}Source format: {}", indent(1), meta.source_format),
        format!("{}Content type: {}", indent(1), meta.content_type),
    ]
}

pub fn print_image_meta(meta: &ImageMeta) {
    for line in format_image_meta(meta) {
        println!("{line}");
    }
}

pub fn format_image_list(metas: &[ImageMeta]) -> Vec<String> {
    let mut lines: Vec<String> = metas
        .iter()
        .map(|m| {
            format!(
                "{} {} {}x{} q{} {}",
                m.id,
                m.filename,
                m.width,
                m.height,
                m.quality,
                format_size(m.size_bytes)
            )
        })
        .collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    let noun = if metas.len() == 1 { "image" } else { "images" };
    lines.push(format!("{} {noun}", metas.len()));
    lines
}

pub fn print_image_list(metas: &[ImageMeta]) {
    for line in format_image_list(metas) {
        println!("{line}");
    }
}
