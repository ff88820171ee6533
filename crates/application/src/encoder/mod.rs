//! Print job encoding.
//!
//! Every function here is pure: the same job and protocol always produce
//! the same bytes, and an invalid element fails the whole job before any
//! bytes are returned.

mod cpcl;
mod escpos;
mod tsc;

pub use escpos::EscPosBuilder;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use domain::printer::{ImageElement, PrintJob, Protocol};
use thiserror::Error;

/// Printer resolution used to convert millimetres to dots (203 dpi)
pub const DOTS_PER_MM: f32 = 8.0;

/// Dots advanced per "line" of feed on label printers
pub const LINE_DOTS: u32 = 24;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("{element} #{index}: content must not be empty")]
    EmptyContent { element: &'static str, index: usize },

    #[error("{element} #{index}: {reason}")]
    InvalidContent {
        element: &'static str,
        index: usize,
        reason: String,
    },

    #[error("image #{index}: {reason}")]
    InvalidImage { index: usize, reason: String },
}

/// Encode a job for `protocol`
pub fn encode(job: &PrintJob, protocol: Protocol) -> Result<Vec<u8>, EncodeError> {
    match protocol {
        Protocol::EscPos => escpos::encode(&job.config, &job.elements),
        Protocol::Tsc => tsc::encode(&job.config, &job.elements),
        Protocol::Cpcl => cpcl::encode(&job.config, &job.elements),
    }
}

/// Fixed self-test pattern for `protocol`
pub fn self_test(protocol: Protocol) -> Vec<u8> {
    match protocol {
        // GS ( A pL pH n m: execute test print, m = 2 (self-test page)
        Protocol::EscPos => vec![0x1D, 0x28, 0x41, 0x02, 0x00, 0x00, 0x02],
        Protocol::Tsc => b"SELFTEST\r\n".to_vec(),
        Protocol::Cpcl => b"! U1 SELFTEST\r\n".to_vec(),
    }
}

pub(crate) fn mm_to_dots(mm: f32) -> u32 {
    (mm.max(0.0) * DOTS_PER_MM).round() as u32
}

/// Decode and validate an image's packed 1-bpp rows
pub(crate) fn bitmap_rows(image: &ImageElement, index: usize) -> Result<Vec<u8>, EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidImage {
            index,
            reason: "width and height must be non-zero".to_string(),
        });
    }

    let data = STANDARD
        .decode(image.data.trim())
        .map_err(|e| EncodeError::InvalidImage {
            index,
            reason: format!("invalid base64: {}", e),
        })?;

    let expected = image.bytes_per_row() * image.height as usize;
    if data.len() != expected {
        return Err(EncodeError::InvalidImage {
            index,
            reason: format!(
                "expected {} bytes for {}x{} bitmap, got {}",
                expected,
                image.width,
                image.height,
                data.len()
            ),
        });
    }
    Ok(data)
}

/// Shared content checks for barcodes and QR codes
pub(crate) fn require_content(
    content: &str,
    element: &'static str,
    index: usize,
) -> Result<(), EncodeError> {
    if content.is_empty() {
        return Err(EncodeError::EmptyContent { element, index });
    }
    Ok(())
}

/// Label protocols are line oriented; a line break would end the command
pub(crate) fn require_single_line(
    content: &str,
    element: &'static str,
    index: usize,
) -> Result<(), EncodeError> {
    if content.contains(['\r', '\n']) {
        return Err(EncodeError::InvalidContent {
            element,
            index,
            reason: "line breaks are not allowed in label fields".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::printer::{Element, PrintConfig, TextElement};

    fn text(content: &str) -> Element {
        serde_json::from_value(serde_json::json!({"type": "text", "content": content})).unwrap()
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let job = PrintJob::new(PrintConfig::default(), vec![text("A"), text("B")]);
        for protocol in [Protocol::EscPos, Protocol::Tsc, Protocol::Cpcl] {
            assert_eq!(encode(&job, protocol), encode(&job, protocol));
        }
    }

    #[test]
    fn test_self_test_ignores_job() {
        assert_eq!(self_test(Protocol::Tsc), b"SELFTEST\r\n");
        assert_eq!(self_test(Protocol::EscPos)[..3], [0x1D, 0x28, 0x41]);
        assert!(self_test(Protocol::Cpcl).starts_with(b"! U1"));
    }

    #[test]
    fn test_mm_to_dots() {
        assert_eq!(mm_to_dots(40.0), 320);
        assert_eq!(mm_to_dots(2.5), 20);
        assert_eq!(mm_to_dots(-1.0), 0);
    }

    #[test]
    fn test_bitmap_length_is_checked() {
        let mut image = domain::printer::ImageElement {
            width: 8,
            height: 2,
            data: STANDARD.encode([0xFF]),
            align: None,
            x: 0,
            y: 0,
        };
        assert!(matches!(
            bitmap_rows(&image, 0),
            Err(EncodeError::InvalidImage { .. })
        ));

        image.data = STANDARD.encode([0xFF, 0x81]);
        assert_eq!(bitmap_rows(&image, 0).unwrap(), vec![0xFF, 0x81]);

        image.data = "***".to_string();
        assert!(bitmap_rows(&image, 0).is_err());
    }

    #[test]
    fn test_invalid_element_produces_no_bytes() {
        let job = PrintJob::new(
            PrintConfig::default(),
            vec![
                Element::Text(TextElement {
                    content: "fine".into(),
                    align: None,
                    bold: false,
                    underline: false,
                    width: 1,
                    height: 1,
                    linefeed: true,
                    x: 0,
                    y: 0,
                    font: None,
                    rotation: 0,
                }),
                serde_json::from_value(serde_json::json!({"type": "qrcode", "content": ""}))
                    .unwrap(),
            ],
        );
        for protocol in [Protocol::EscPos, Protocol::Tsc, Protocol::Cpcl] {
            assert_eq!(
                encode(&job, protocol),
                Err(EncodeError::EmptyContent {
                    element: "qrcode",
                    index: 1
                })
            );
        }
    }
}
