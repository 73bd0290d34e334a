//! Minimal JPEG marker walker.
//!
//! The decoders in the `image` crate are forgiving about JPEG streams that
//! stop early: a file cut off in the middle of its entropy-coded data can
//! decode "successfully" with the missing rows filled in. Uploads must never
//! produce a partial image, so JPEG input is checked here before decoding.
//!
//! Layout of a JPEG stream:
//!
//! ```text
//! FF D8                      SOI
//! FF Ex len ...              APPn segments (EXIF lives in APP1)
//! FF xx len ...              DQT / SOFn / DHT / DRI ...
//! FF DA len ... <scan data>  SOS followed by entropy-coded bytes
//! (more DHT/SOS for progressive files)
//! FF D9                      EOI
//! ```
//!
//! Inside scan data a literal `0xFF` is stuffed as `FF 00`, and restart
//! markers `FF D0`..`FF D7` carry no length, so neither can be mistaken for a
//! real marker.

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1;
const SOF2: u8 = 0xC2;
const TEM: u8 = 0x01;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// One marker segment: the marker byte and its payload (without the length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment<'a> {
    marker: u8,
    payload: &'a [u8],
}

/// Markers that stand alone without a length field.
fn is_standalone(marker: u8) -> bool {
    marker == SOI || marker == EOI || marker == TEM || (0xD0..=0xD7).contains(&marker)
}

/// Walk the stream, calling `visit` for every length-carrying segment.
///
/// Returns `true` when an EOI marker is reached after at least one scan, and
/// `false` if the data runs out first or a segment length points past the end.
fn walk(data: &[u8], mut visit: impl FnMut(Segment<'_>)) -> bool {
    if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
        return false;
    }

    let mut pos = 2;
    let mut seen_scan = false;

    while pos + 1 < data.len() {
        // Scan data (or padding) between markers
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        match marker {
            // Stuffed 0xFF inside scan data
            0x00 => pos += 2,
            // Fill byte before a marker
            0xFF => pos += 1,
            EOI => return seen_scan,
            m if is_standalone(m) => pos += 2,
            _ => {
                if pos + 3 >= data.len() {
                    return false;
                }
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                if len < 2 || pos + 2 + len > data.len() {
                    return false;
                }
                visit(Segment {
                    marker,
                    payload: &data[pos + 4..pos + 2 + len],
                });
                if marker == SOS {
                    seen_scan = true;
                }
                pos += 2 + len;
            }
        }
    }

    false
}

/// Whether a JPEG stream is structurally complete: it starts with SOI, every
/// segment fits in the buffer, and an EOI marker follows the scan data.
///
/// Bytes after EOI (camera trailers and the like) are ignored.
pub fn is_complete(data: &[u8]) -> bool {
    walk(data, |_| {})
}

/// Whether the stream carries an EXIF APP1 segment before its image data.
pub fn has_exif_segment(data: &[u8]) -> bool {
    let mut found = false;
    let mut in_header = true;
    walk(data, |seg| {
        if seg.marker == SOS {
            in_header = false;
        }
        if in_header && seg.marker == APP1 && seg.payload.starts_with(EXIF_HEADER) {
            found = true;
        }
    });
    found
}

/// Whether the frame header is SOF2 (progressive DCT, Huffman coded).
pub fn is_progressive(data: &[u8]) -> bool {
    let mut progressive = false;
    walk(data, |seg| progressive |= seg.marker == SOF2);
    progressive
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, one APPn segment, one SOS with a few bytes of scan data, EOI.
    fn skeleton(scan: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB]);
        out.extend_from_slice(&[0xFF, SOS, 0x00, 0x03, 0x01]);
        out.extend_from_slice(scan);
        out.extend_from_slice(&[0xFF, EOI]);
        out
    }

    #[test]
    fn empty_and_non_jpeg_are_incomplete() {
        assert!(!is_complete(&[]));
        assert!(!is_complete(b"\x89PNG\r\n\x1a\n"));
        assert!(!is_complete(b"hello world"));
    }

    #[test]
    fn complete_skeleton() {
        assert!(is_complete(&skeleton(&[0x12, 0x34, 0x56])));
    }

    #[test]
    fn stuffed_and_restart_bytes_are_not_markers() {
        let scan = [0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD3, 0x56];
        assert!(is_complete(&skeleton(&scan)));
    }

    #[test]
    fn truncated_scan_is_incomplete() {
        let full = skeleton(&[0x12, 0x34, 0x56, 0x78]);
        for cut in 4..full.len() - 1 {
            assert!(!is_complete(&full[..cut]), "cut at {cut} reported complete");
        }
    }

    #[test]
    fn eoi_before_any_scan_is_incomplete() {
        let data = [0xFF, SOI, 0xFF, 0xE0, 0x00, 0x02, 0xFF, EOI];
        assert!(!is_complete(&data));
    }

    #[test]
    fn eoi_inside_app_segment_is_skipped() {
        // An embedded thumbnail's EOI inside APP1 must not end the walk.
        let mut data = vec![0xFF, SOI, 0xFF, APP1, 0x00, 0x06, 0xFF, EOI, 0x00, 0x00];
        data.extend_from_slice(&[0xFF, SOS, 0x00, 0x02, 0x11, 0x22]);
        assert!(!is_complete(&data));
        data.extend_from_slice(&[0xFF, EOI]);
        assert!(is_complete(&data));
    }

    #[test]
    fn trailing_bytes_after_eoi_are_ignored() {
        let mut data = skeleton(&[0x01]);
        data.extend_from_slice(b"camera trailer");
        assert!(is_complete(&data));
    }

    #[test]
    fn segment_length_past_end_is_incomplete() {
        let data = [0xFF, SOI, 0xFF, 0xE0, 0x10, 0x00, 0x01, 0x02];
        assert!(!is_complete(&data));
    }

    #[test]
    fn detects_exif_app1() {
        let mut data = vec![0xFF, SOI, 0xFF, APP1, 0x00, 0x08];
        data.extend_from_slice(EXIF_HEADER);
        data.extend_from_slice(&[0xFF, SOS, 0x00, 0x02, 0x11, 0xFF, EOI]);
        assert!(has_exif_segment(&data));
        assert!(!has_exif_segment(&skeleton(&[0x11])));
    }
}
