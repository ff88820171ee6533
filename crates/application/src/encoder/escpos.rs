use domain::printer::{
    Alignment, BarcodeElement, Element, ErrorLevel, Symbology, PrintConfig, QrCodeElement,
    TextElement,
};

use super::{EncodeError, bitmap_rows, require_content};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Raw ESC/POS command builder
#[derive(Debug, Default)]
pub struct EscPosBuilder {
    buffer: Vec<u8>,
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn initialize(mut self) -> Self {
        // ESC @: Initialize printer
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    pub fn codepage(mut self, table: u8) -> Self {
        // ESC t n: Select character code table
        self.buffer.extend_from_slice(&[ESC, 0x74, table]);
        self
    }

    pub fn align(mut self, align: Alignment) -> Self {
        // ESC a n: Align (0: Left, 1: Center, 2: Right)
        let n = match align {
            Alignment::Left => 0,
            Alignment::Center => 1,
            Alignment::Right => 2,
        };
        self.buffer.extend_from_slice(&[ESC, 0x61, n]);
        self
    }

    pub fn bold(mut self, on: bool) -> Self {
        // ESC E n
        self.buffer.extend_from_slice(&[ESC, 0x45, u8::from(on)]);
        self
    }

    pub fn underline(mut self, on: bool) -> Self {
        // ESC - n
        self.buffer.extend_from_slice(&[ESC, 0x2D, u8::from(on)]);
        self
    }

    pub fn size(mut self, width: u8, height: u8) -> Self {
        // GS ! n: high nibble width, low nibble height, both 0-based
        let w = width.clamp(1, 8) - 1;
        let h = height.clamp(1, 8) - 1;
        self.buffer.extend_from_slice(&[GS, 0x21, (w << 4) | h]);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.buffer.extend_from_slice(text.as_bytes());
        self
    }

    pub fn line_feed(mut self) -> Self {
        self.buffer.push(LF);
        self
    }

    pub fn feed(mut self, n: u8) -> Self {
        // ESC d n: Print and feed n lines
        self.buffer.extend_from_slice(&[ESC, 0x64, n]);
        self
    }

    pub fn cut(mut self, partial: bool) -> Self {
        // GS V m n: m = 65 full cut, 66 partial cut, after feeding n
        let m = if partial { 66 } else { 65 };
        self.buffer.extend_from_slice(&[GS, 0x56, m, 0]);
        self
    }

    pub fn barcode(mut self, symbology: Symbology, height: u16, narrow: u8, hri: bool, data: &[u8]) -> Self {
        let height = height.clamp(1, 255) as u8;
        // GS h n: bar height, GS w n: module width, GS H n: HRI position (0 none, 2 below)
        self.buffer.extend_from_slice(&[GS, 0x68, height]);
        self.buffer.extend_from_slice(&[GS, 0x77, narrow.clamp(1, 6)]);
        self.buffer.extend_from_slice(&[GS, 0x48, if hri { 2 } else { 0 }]);
        // GS k m n d1..dn (function B)
        self.buffer.extend_from_slice(&[GS, 0x6B, barcode_system(symbology), data.len() as u8]);
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn qrcode(mut self, size: u8, level: ErrorLevel, data: &[u8]) -> Self {
        // Model 2
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
        // Module size
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size.clamp(1, 16)]);
        // Error correction level, 48 = L .. 51 = H
        let level = match level {
            ErrorLevel::L => 48,
            ErrorLevel::M => 49,
            ErrorLevel::Q => 50,
            ErrorLevel::H => 51,
        };
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, level]);
        // Store data: length covers the three bytes "1 P 0"
        let len = data.len() + 3;
        self.buffer.extend_from_slice(&[
            GS,
            0x28,
            0x6B,
            (len & 0xFF) as u8,
            (len >> 8) as u8,
            0x31,
            0x50,
            0x30,
        ]);
        self.buffer.extend_from_slice(data);
        // Print stored symbol
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
        self
    }

    pub fn raster(mut self, bytes_per_row: u16, rows: u16, data: &[u8]) -> Self {
        // GS v 0 m xL xH yL yH d1..dk
        self.buffer.extend_from_slice(&[
            GS,
            0x76,
            0x30,
            0x00,
            (bytes_per_row & 0xFF) as u8,
            (bytes_per_row >> 8) as u8,
            (rows & 0xFF) as u8,
            (rows >> 8) as u8,
        ]);
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

fn barcode_system(symbology: Symbology) -> u8 {
    match symbology {
        Symbology::Upca => 65,
        Symbology::Ean13 => 67,
        Symbology::Ean8 => 68,
        Symbology::Code39 => 69,
        Symbology::Itf => 70,
        Symbology::Codabar => 71,
        Symbology::Code128 => 73,
    }
}

/// Print modes after ESC @; commands are only emitted when a mode changes
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mode {
    align: Alignment,
    bold: bool,
    underline: bool,
    size: (u8, u8),
}

impl Default for Mode {
    fn default() -> Self {
        Self {
            align: Alignment::Left,
            bold: false,
            underline: false,
            size: (1, 1),
        }
    }
}

struct Encoder {
    builder: EscPosBuilder,
    mode: Mode,
    default_align: Alignment,
}

impl Encoder {
    fn set_align(&mut self, align: Option<Alignment>) {
        let align = align.unwrap_or(self.default_align);
        if align != self.mode.align {
            self.builder = std::mem::take(&mut self.builder).align(align);
            self.mode.align = align;
        }
    }

    fn text(&mut self, text: &TextElement) {
        self.set_align(text.align);
        let mut b = std::mem::take(&mut self.builder);
        if text.bold != self.mode.bold {
            b = b.bold(text.bold);
            self.mode.bold = text.bold;
        }
        if text.underline != self.mode.underline {
            b = b.underline(text.underline);
            self.mode.underline = text.underline;
        }
        let size = (text.width.clamp(1, 8), text.height.clamp(1, 8));
        if size != self.mode.size {
            b = b.size(size.0, size.1);
            self.mode.size = size;
        }
        b = b.text(&text.content);
        if text.linefeed {
            b = b.line_feed();
        }
        self.builder = b;
    }

    fn barcode(&mut self, barcode: &BarcodeElement, index: usize) -> Result<(), EncodeError> {
        require_content(&barcode.content, "barcode", index)?;
        if barcode.symbology.is_numeric() && !barcode.content.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EncodeError::InvalidContent {
                element: "barcode",
                index,
                reason: format!("{:?} only encodes digits", barcode.symbology),
            });
        }

        let mut data = Vec::with_capacity(barcode.content.len() + 2);
        if barcode.symbology == Symbology::Code128 {
            // Select code set B
            data.extend_from_slice(b"{B");
        }
        data.extend_from_slice(barcode.content.as_bytes());
        if data.len() > 255 {
            return Err(EncodeError::InvalidContent {
                element: "barcode",
                index,
                reason: "content longer than 255 bytes".to_string(),
            });
        }

        self.set_align(barcode.align);
        self.builder = std::mem::take(&mut self.builder)
            .barcode(
                barcode.symbology,
                barcode.height,
                barcode.narrow,
                barcode.hri,
                &data,
            )
            .line_feed();
        Ok(())
    }

    fn qrcode(&mut self, qr: &QrCodeElement, index: usize) -> Result<(), EncodeError> {
        require_content(&qr.content, "qrcode", index)?;
        if qr.content.len() > 7089 {
            return Err(EncodeError::InvalidContent {
                element: "qrcode",
                index,
                reason: "content exceeds QR capacity".to_string(),
            });
        }
        self.set_align(qr.align);
        self.builder = std::mem::take(&mut self.builder)
            .qrcode(qr.size, qr.level, qr.content.as_bytes())
            .line_feed();
        Ok(())
    }
}

pub(super) fn encode(config: &PrintConfig, elements: &[Element]) -> Result<Vec<u8>, EncodeError> {
    let mut builder = EscPosBuilder::new().initialize();
    if let Some(table) = config.codepage {
        builder = builder.codepage(table);
    }

    let mut encoder = Encoder {
        builder,
        mode: Mode::default(),
        default_align: config.align,
    };

    for (index, element) in elements.iter().enumerate() {
        match element {
            Element::Text(text) => encoder.text(text),
            Element::Barcode(barcode) => encoder.barcode(barcode, index)?,
            Element::QrCode(qr) => encoder.qrcode(qr, index)?,
            Element::Image(image) => {
                let rows = bitmap_rows(image, index)?;
                encoder.set_align(image.align);
                encoder.builder = std::mem::take(&mut encoder.builder).raster(
                    image.bytes_per_row() as u16,
                    image.height,
                    &rows,
                );
            }
            Element::Feed(feed) => {
                encoder.builder = std::mem::take(&mut encoder.builder).feed(feed.lines);
            }
            Element::Cut(cut) => {
                encoder.builder = std::mem::take(&mut encoder.builder).cut(cut.partial);
            }
        }
    }

    Ok(encoder.builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn elements(value: serde_json::Value) -> Vec<Element> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_hello_is_init_text_and_line_feed() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "text", "value": "HELLO"}])),
        )
        .unwrap();

        let mut expected = vec![0x1B, 0x40];
        expected.extend_from_slice(b"HELLO");
        expected.push(0x0A);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_modes_only_emitted_on_change() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([
                {"type": "text", "content": "A", "align": "center", "bold": true},
                {"type": "text", "content": "B", "align": "center", "bold": true},
                {"type": "text", "content": "C"}
            ])),
        )
        .unwrap();

        let mut expected = vec![0x1B, 0x40];
        expected.extend_from_slice(&[0x1B, 0x61, 0x01, 0x1B, 0x45, 0x01]);
        expected.extend_from_slice(b"A\nB\n");
        expected.extend_from_slice(&[0x1B, 0x61, 0x00, 0x1B, 0x45, 0x00]);
        expected.extend_from_slice(b"C\n");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_codepage_and_size() {
        let config: PrintConfig = serde_json::from_value(json!({"codepage": 16})).unwrap();
        let bytes = encode(
            &config,
            &elements(json!([{"type": "text", "content": "X", "width": 2, "height": 3, "linefeed": false}])),
        )
        .unwrap();
        assert_eq!(
            bytes,
            vec![0x1B, 0x40, 0x1B, 0x74, 16, 0x1D, 0x21, 0x12, b'X']
        );
    }

    #[test]
    fn test_feed_and_cut() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "feed", "lines": 3}, {"type": "cut", "partial": true}])),
        )
        .unwrap();
        assert_eq!(bytes, vec![0x1B, 0x40, 0x1B, 0x64, 3, 0x1D, 0x56, 66, 0]);
    }

    #[test]
    fn test_code128_barcode() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "barcode", "content": "AB12", "height": 60, "hri": 1}])),
        )
        .unwrap();

        let mut expected = vec![0x1B, 0x40];
        expected.extend_from_slice(&[0x1D, 0x68, 60, 0x1D, 0x77, 2, 0x1D, 0x48, 2]);
        expected.extend_from_slice(&[0x1D, 0x6B, 73, 6]);
        expected.extend_from_slice(b"{BAB12\n");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_numeric_barcode_rejects_letters() {
        let result = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "barcode", "content": "12A4", "symbology": "ean8"}])),
        );
        assert!(matches!(
            result,
            Err(EncodeError::InvalidContent { index: 0, .. })
        ));
    }

    #[test]
    fn test_qrcode_store_length() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "qrcode", "content": "hi", "size": 4, "level": "L"}])),
        )
        .unwrap();

        let store = [0x1D, 0x28, 0x6B, 5, 0, 0x31, 0x50, 0x30, b'h', b'i'];
        assert!(bytes.windows(store.len()).any(|w| w == store));
        assert!(bytes.windows(3).any(|w| w == [0x31, 0x45, 48]));
        assert!(bytes.windows(3).any(|w| w == [0x31, 0x43, 4]));
    }

    #[test]
    fn test_raster_image_header() {
        // 10 px wide -> 2 bytes per row, 2 rows
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "image", "width": 10, "height": 2, "data": "/8D/wA=="}])),
        )
        .unwrap();
        assert_eq!(
            bytes,
            vec![0x1B, 0x40, 0x1D, 0x76, 0x30, 0, 2, 0, 2, 0, 0xFF, 0xC0, 0xFF, 0xC0]
        );
    }

    #[test]
    fn test_no_cut_without_cut_element() {
        let bytes = encode(
            &PrintConfig::default(),
            &elements(json!([{"type": "text", "content": "no cut"}])),
        )
        .unwrap();
        assert!(!bytes.windows(2).any(|w| w == [0x1D, 0x56]));
    }
}
