//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `image::ImageReader::with_guessed_format` |
//! | Decode (JPEG, PNG, WebP, GIF, BMP, TIFF) | `image` crate decoders |
//! | Truncation guard (JPEG) | [`jpeg_markers::is_complete`](super::jpeg_markers::is_complete) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Color normalization | `DynamicImage::into_rgb8` |
//! | Encode → JPEG | `jpeg_encoder::Encoder` (progressive, optimized Huffman) |
//!
//! ## Decode order
//!
//! The pixel ceiling is checked against the header dimensions once the
//! decoder exists and before any pixel data is read, so a decompression bomb
//! is rejected without allocating its frame buffer.

use super::backend::{Dimensions, ImageBackend, SourceFormat, SourceInfo, TransformError};
use super::jpeg_markers;
use super::params::{DecodeLimits, Quality, RenderParams};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Largest width or height a baseline/progressive JPEG frame can declare.
const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Pure Rust backend using the `image` crate for decoding and `jpeg-encoder`
/// for output.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn source_format(format: ImageFormat) -> SourceFormat {
    match format {
        ImageFormat::Jpeg => SourceFormat::Jpeg,
        ImageFormat::Png => SourceFormat::Png,
        ImageFormat::WebP => SourceFormat::WebP,
        ImageFormat::Gif => SourceFormat::Gif,
        ImageFormat::Bmp => SourceFormat::Bmp,
        ImageFormat::Tiff => SourceFormat::Tiff,
        _ => SourceFormat::Unknown,
    }
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Sniff the container, reject truncated JPEG streams, build a decoder and
/// enforce the pixel ceiling. Nothing past the header has been read when this
/// returns.
fn open_decoder(
    source: &[u8],
    limits: DecodeLimits,
) -> Result<(impl ImageDecoder + '_, SourceInfo, Orientation), TransformError> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(TransformError::decode)?;

    let Some(image_format) = reader.format() else {
        return Err(TransformError::decode("could not detect image format"));
    };

    if image_format == ImageFormat::Jpeg && !jpeg_markers::is_complete(source) {
        return Err(TransformError::decode("truncated JPEG stream"));
    }

    let mut decoder = reader.into_decoder().map_err(TransformError::decode)?;

    let (width, height) = decoder.dimensions();
    if !limits.allows(width, height) {
        return Err(TransformError::decode(format!(
            "{width}x{height} exceeds the limit of {} pixels",
            limits.max_pixels
        )));
    }

    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let info = SourceInfo {
        format: source_format(image_format),
        stored: Dimensions { width, height },
        swaps_axes: swaps_axes(orientation),
    };

    Ok((decoder, info, orientation))
}

/// Decode to an upright image. Fails on anything that is not a complete,
/// readable image within `limits`.
fn load_image(source: &[u8], limits: DecodeLimits) -> Result<DynamicImage, TransformError> {
    let (decoder, info, orientation) = open_decoder(source, limits)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(TransformError::decode)?;
    img.apply_orientation(orientation);
    debug!(
        format = %info.format,
        width = info.stored.width,
        height = info.stored.height,
        ?orientation,
        "decoded source"
    );
    Ok(img)
}

/// Encode 8-bit RGB pixels as a progressive JPEG with optimized Huffman tables.
///
/// No APPn segments besides JFIF are written, so the output never carries
/// EXIF orientation.
fn encode_jpeg(rgb: &RgbImage, quality: Quality) -> Result<Vec<u8>, TransformError> {
    let (width, height) = rgb.dimensions();
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(TransformError::processing(format!(
            "{width}x{height} exceeds the JPEG limit of {MAX_JPEG_DIMENSION} pixels per side"
        )));
    }

    let mut out = Vec::with_capacity((width as usize * height as usize / 4).max(4096));
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.value());
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(
            rgb.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .map_err(TransformError::processing)?;

    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8], limits: DecodeLimits) -> Result<SourceInfo, TransformError> {
        let (_, info, _) = open_decoder(source, limits)?;
        Ok(info)
    }

    fn render(&self, params: &RenderParams<'_>) -> Result<Vec<u8>, TransformError> {
        let img = load_image(params.source, params.limits)?;

        let img = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            debug!(
                from_width = img.width(),
                from_height = img.height(),
                to_width = params.width,
                to_height = params.height,
                "resizing"
            );
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };

        encode_jpeg(&img.into_rgb8(), params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageEncoder, Rgb, RgbaImage};

    /// Encode a gradient JPEG with the given dimensions.
    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn test_jpeg_pixels(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 128])
        })
    }

    fn test_png(img: &DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Minimal big-endian TIFF block with a single Orientation (0x0112) entry,
    /// wrapped in an APP1 segment and spliced in right after SOI.
    fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"Exif\0\0");
        tiff.extend_from_slice(b"MM\0\x2A");
        tiff.extend_from_slice(&8u32.to_be_bytes());
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((tiff.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&tiff);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn render(source: &[u8], width: u32, height: u32, quality: i64) -> Vec<u8> {
        RustBackend::new()
            .render(&RenderParams {
                source,
                width,
                height,
                quality: Quality::new(quality),
                limits: DecodeLimits::default(),
            })
            .unwrap()
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let info = RustBackend::new()
            .identify(&test_jpeg(200, 150), DecodeLimits::default())
            .unwrap();
        assert_eq!(info.format, SourceFormat::Jpeg);
        assert_eq!(info.stored, Dimensions { width: 200, height: 150 });
        assert!(!info.swaps_axes);
    }

    #[test]
    fn identify_png_format_tag() {
        let png = test_png(&DynamicImage::ImageRgb8(RgbImage::new(8, 4)));
        let info = RustBackend::new()
            .identify(&png, DecodeLimits::default())
            .unwrap();
        assert_eq!(info.format.tag(), "PNG");
    }

    #[test]
    fn identify_rejects_pixel_ceiling() {
        let err = RustBackend::new()
            .identify(&test_jpeg(20, 10), DecodeLimits::new(199))
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)), "{err:?}");

        // Exactly at the ceiling is fine.
        assert!(
            RustBackend::new()
                .identify(&test_jpeg(20, 10), DecodeLimits::new(200))
                .is_ok()
        );
    }

    #[test]
    fn render_rejects_pixel_ceiling() {
        let jpeg = test_jpeg(20, 10);
        let err = RustBackend::new()
            .render(&RenderParams {
                source: &jpeg,
                width: 2,
                height: 1,
                quality: Quality::default(),
                limits: DecodeLimits::new(100),
            })
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn identify_plain_text_is_decode_error() {
        let err = RustBackend::new()
            .identify(b"definitely not an image", DecodeLimits::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
        assert!(err.to_string().contains("unsupported or corrupted image"));
    }

    #[test]
    fn truncated_jpeg_is_decode_error() {
        let jpeg = test_jpeg(64, 64);
        let cut = &jpeg[..jpeg.len() * 2 / 3];
        let err = RustBackend::new()
            .render(&RenderParams {
                source: cut,
                width: 64,
                height: 64,
                quality: Quality::default(),
                limits: DecodeLimits::default(),
            })
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)), "{err:?}");
    }

    #[test]
    fn progressive_jpeg_cut_between_scans_is_decode_error() {
        let progressive = encode_jpeg(&test_jpeg_pixels(64, 64), Quality::new(85)).unwrap();
        assert!(jpeg_markers::is_progressive(&progressive));

        // Scan data stuffs every 0xFF, so FF DA only appears as a real SOS.
        let scans: Vec<usize> = progressive
            .windows(2)
            .enumerate()
            .filter(|(_, w)| *w == [0xFF, 0xDA])
            .map(|(i, _)| i)
            .collect();
        assert!(scans.len() >= 2, "expected several scans, got {}", scans.len());

        for &cut_at in &scans[1..] {
            let cut = &progressive[..cut_at];
            assert!(!jpeg_markers::is_complete(cut));
            let err = RustBackend::new()
                .identify(cut, DecodeLimits::default())
                .unwrap_err();
            assert!(matches!(err, TransformError::Decode(_)), "{err:?}");
        }
        assert!(jpeg_markers::is_complete(&progressive));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([x as u8 * 3, y as u8 * 3, 7]));
        let png = test_png(&DynamicImage::ImageRgb8(img));
        let cut = &png[..png.len() / 2];
        let err = RustBackend::new()
            .render(&RenderParams {
                source: cut,
                width: 64,
                height: 64,
                quality: Quality::default(),
                limits: DecodeLimits::default(),
            })
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)), "{err:?}");
    }

    #[test]
    fn render_resizes_and_encodes_progressive_jpeg() {
        let out = render(&test_jpeg(400, 300), 200, 150, 85);

        assert!(jpeg_markers::is_complete(&out));
        assert!(jpeg_markers::is_progressive(&out));
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 150));
    }

    #[test]
    fn render_without_resize_keeps_dimensions() {
        let out = render(&test_jpeg(123, 45), 123, 45, 85);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (123, 45));
    }

    #[test]
    fn render_upscales() {
        let out = render(&test_jpeg(50, 25), 200, 100, 85);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn grayscale_is_promoted_to_rgb() {
        let gray = GrayImage::from_fn(32, 32, |x, _| image::Luma([(x * 8) as u8]));
        let out = render(&test_png(&DynamicImage::ImageLuma8(gray)), 32, 32, 85);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn alpha_is_dropped() {
        let rgba = RgbaImage::from_pixel(16, 16, image::Rgba([10, 200, 30, 0]));
        let out = render(&test_png(&DynamicImage::ImageRgba8(rgba)), 16, 16, 85);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn exif_rotation_is_applied_and_stripped() {
        // Left half red, right half blue. Orientation 6 means "rotate 90° CW
        // to display", so the red half ends up on top.
        let img = RgbImage::from_fn(40, 20, |x, _| {
            if x < 20 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 95)
            .write_image(img.as_raw(), 40, 20, image::ExtendedColorType::Rgb8)
            .unwrap();
        let tagged = with_exif_orientation(&jpeg, 6);

        let info = RustBackend::new()
            .identify(&tagged, DecodeLimits::default())
            .unwrap();
        assert!(info.swaps_axes);
        assert_eq!(info.upright(), Dimensions { width: 20, height: 40 });

        let out = render(&tagged, 20, 40, 95);
        assert!(!jpeg_markers::has_exif_segment(&out));

        let decoded = image::load_from_memory(&out).unwrap().into_rgb8();
        assert_eq!(decoded.dimensions(), (20, 40));
        let top = decoded.get_pixel(10, 5);
        let bottom = decoded.get_pixel(10, 35);
        assert!(top[0] > 180 && top[2] < 80, "top pixel {top:?}");
        assert!(bottom[2] > 180 && bottom[0] < 80, "bottom pixel {bottom:?}");
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Corner {
        TopLeft,
        TopRight,
        BottomLeft,
        BottomRight,
    }

    #[test]
    fn every_exif_orientation_lands_upright() {
        // Red top-left quadrant on blue, 40x20 as stored.
        let img = RgbImage::from_fn(40, 20, |x, y| {
            if x < 20 && y < 10 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 95)
            .write_image(img.as_raw(), 40, 20, image::ExtendedColorType::Rgb8)
            .unwrap();

        let cases = [
            (1, (40, 20), Corner::TopLeft),
            (2, (40, 20), Corner::TopRight),
            (3, (40, 20), Corner::BottomRight),
            (4, (40, 20), Corner::BottomLeft),
            (5, (20, 40), Corner::TopLeft),
            (6, (20, 40), Corner::TopRight),
            (7, (20, 40), Corner::BottomRight),
            (8, (20, 40), Corner::BottomLeft),
        ];

        for (orientation, (w, h), red_corner) in cases {
            let tagged = with_exif_orientation(&jpeg, orientation);

            let info = RustBackend::new()
                .identify(&tagged, DecodeLimits::default())
                .unwrap();
            assert_eq!(info.swaps_axes, orientation >= 5, "orientation {orientation}");
            assert_eq!(info.upright(), Dimensions { width: w, height: h });

            let out = render(&tagged, w, h, 95);
            let decoded = image::load_from_memory(&out).unwrap().into_rgb8();
            assert_eq!(decoded.dimensions(), (w, h), "orientation {orientation}");

            let corners = [
                (Corner::TopLeft, w / 4, h / 4),
                (Corner::TopRight, 3 * w / 4, h / 4),
                (Corner::BottomLeft, w / 4, 3 * h / 4),
                (Corner::BottomRight, 3 * w / 4, 3 * h / 4),
            ];
            for (corner, x, y) in corners {
                let px = decoded.get_pixel(x, y);
                let red = px[0] > 180 && px[2] < 80;
                assert_eq!(
                    red,
                    corner == red_corner,
                    "orientation {orientation}, {corner:?} pixel {px:?}"
                );
            }
        }
    }

    #[test]
    fn render_is_deterministic() {
        let jpeg = test_jpeg(300, 200);
        assert_eq!(render(&jpeg, 150, 100, 80), render(&jpeg, 150, 100, 80));
    }

    #[test]
    fn encode_rejects_oversized_frame() {
        let wide = RgbImage::new(MAX_JPEG_DIMENSION + 1, 1);
        let err = encode_jpeg(&wide, Quality::default()).unwrap_err();
        assert!(matches!(err, TransformError::Processing(_)));
    }
}
