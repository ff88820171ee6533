use std::fmt::Write;

use domain::printer::{Alignment, Element, PrintConfig, Symbology, TextElement};

use super::{EncodeError, LINE_DOTS, bitmap_rows, mm_to_dots, require_content, require_single_line};

fn barcode_type(symbology: Symbology) -> &'static str {
    match symbology {
        Symbology::Code128 => "128",
        Symbology::Code39 => "39",
        Symbology::Ean13 => "EAN13",
        Symbology::Ean8 => "EAN8",
        Symbology::Upca => "UPCA",
        Symbology::Itf => "I2OF5",
        Symbology::Codabar => "CODABAR",
    }
}

fn text_command(rotation: u16) -> &'static str {
    match rotation {
        90 => "TEXT90",
        180 => "TEXT180",
        270 => "TEXT270",
        _ => "TEXT",
    }
}

#[derive(Default)]
struct Page {
    out: String,
    align: Alignment,
    mag: (u8, u8),
    bold: bool,
    underline: bool,
}

impl Page {
    fn line(&mut self, command: &str) {
        self.out.push_str(command);
        self.out.push_str("\r\n");
    }

    fn set_align(&mut self, align: Alignment) {
        if align != self.align {
            self.line(match align {
                Alignment::Left => "LEFT",
                Alignment::Center => "CENTER",
                Alignment::Right => "RIGHT",
            });
            self.align = align;
        }
    }

    fn text(&mut self, text: &TextElement) {
        let mag = (text.width.clamp(1, 16), text.height.clamp(1, 16));
        if mag != self.mag {
            self.line(&format!("SETMAG {} {}", mag.0, mag.1));
            self.mag = mag;
        }
        if text.bold != self.bold {
            self.line(&format!("SETBOLD {}", u8::from(text.bold)));
            self.bold = text.bold;
        }
        if text.underline != self.underline {
            self.line(if text.underline { "UNDERLINE ON" } else { "UNDERLINE OFF" });
            self.underline = text.underline;
        }
        let font = text.font.as_deref().unwrap_or("4");
        self.line(&format!(
            "{} {} 0 {} {} {}",
            text_command(text.rotation),
            font,
            text.x,
            text.y,
            text.content
        ));
    }
}

pub(super) fn encode(config: &PrintConfig, elements: &[Element]) -> Result<Vec<u8>, EncodeError> {
    let mut page = Page {
        mag: (1, 1),
        ..Page::default()
    };

    page.line(&format!(
        "! 0 200 200 {} {}",
        mm_to_dots(config.height),
        config.copies.max(1)
    ));
    page.line(&format!("PAGE-WIDTH {}", mm_to_dots(config.width)));

    for (index, element) in elements.iter().enumerate() {
        match element {
            Element::Text(text) => {
                require_single_line(&text.content, "text", index)?;
                page.set_align(text.align.unwrap_or(config.align));
                page.text(text);
            }
            Element::Barcode(barcode) => {
                require_content(&barcode.content, "barcode", index)?;
                require_single_line(&barcode.content, "barcode", index)?;
                page.set_align(barcode.align.unwrap_or(config.align));
                if barcode.hri {
                    page.line("BARCODE-TEXT 7 0 5");
                }
                // Wide-to-narrow ratio; 128 ignores it
                let ratio = if barcode.symbology == Symbology::Code128 { 1 } else { 2 };
                page.line(&format!(
                    "BARCODE {} {} {} {} {} {} {}",
                    barcode_type(barcode.symbology),
                    barcode.narrow,
                    ratio,
                    barcode.height,
                    barcode.x,
                    barcode.y,
                    barcode.content
                ));
                if barcode.hri {
                    page.line("BARCODE-TEXT OFF");
                }
            }
            Element::QrCode(qr) => {
                require_content(&qr.content, "qrcode", index)?;
                require_single_line(&qr.content, "qrcode", index)?;
                page.set_align(qr.align.unwrap_or(config.align));
                page.line(&format!("B QR {} {} M 2 U {}", qr.x, qr.y, qr.size.clamp(1, 32)));
                page.line(&format!("{}A,{}", qr.level.as_char(), qr.content));
                page.line("ENDQR");
            }
            Element::Image(image) => {
                let rows = bitmap_rows(image, index)?;
                let mut command = format!(
                    "EG {} {} {} {} ",
                    image.bytes_per_row(),
                    image.height,
                    image.x,
                    image.y
                );
                for byte in rows {
                    let _ = write!(command, "{:02X}", byte);
                }
                page.line(&command);
            }
            Element::Feed(feed) => {
                page.line(&format!("POSTFEED {}", u32::from(feed.lines) * LINE_DOTS));
            }
            Element::Cut(_) => page.line("FORM"),
        }
    }

    page.line("PRINT");
    Ok(page.out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(config: serde_json::Value, data: serde_json::Value) -> String {
        let config: PrintConfig = serde_json::from_value(config).unwrap();
        let elements: Vec<Element> = serde_json::from_value(data).unwrap();
        String::from_utf8(encode(&config, &elements).unwrap()).unwrap()
    }

    #[test]
    fn test_header_uses_dots() {
        let out = encode_json(json!({"width": 50, "height": 30, "copies": 2}), json!([]));
        assert_eq!(out, "! 0 200 200 240 2\r\nPAGE-WIDTH 400\r\nPRINT\r\n");
    }

    #[test]
    fn test_text_modes_and_rotation() {
        let out = encode_json(
            json!({}),
            json!([
                {"type": "text", "content": "Title", "align": "center", "bold": true, "width": 2, "height": 2},
                {"type": "text", "content": "Side", "rotation": 90, "x": 5, "y": 7}
            ]),
        );

        let expected = [
            "CENTER",
            "SETMAG 2 2",
            "SETBOLD 1",
            "TEXT 4 0 0 0 Title",
            "LEFT",
            "SETMAG 1 1",
            "SETBOLD 0",
            "TEXT90 4 0 5 7 Side",
        ]
        .join("\r\n");
        assert!(out.contains(&expected), "{}", out);
    }

    #[test]
    fn test_barcode_with_hri() {
        let out = encode_json(
            json!({}),
            json!([{"type": "barcode", "content": "ABC", "symbology": "code39", "hri": 1, "height": 40}]),
        );
        assert!(out.contains("BARCODE-TEXT 7 0 5\r\nBARCODE 39 2 2 40 0 0 ABC\r\nBARCODE-TEXT OFF\r\n"));
    }

    #[test]
    fn test_qr_image_feed_form() {
        let out = encode_json(
            json!({}),
            json!([
                {"type": "qrcode", "content": "hello", "level": "H", "size": 5},
                {"type": "image", "width": 16, "height": 1, "data": "qlU="},
                {"type": "feed", "lines": 1},
                {"type": "cut"}
            ]),
        );
        assert!(out.contains("B QR 0 0 M 2 U 5\r\nHA,hello\r\nENDQR\r\n"));
        assert!(out.contains("EG 2 1 0 0 AA55\r\n"));
        assert!(out.contains("POSTFEED 24\r\n"));
        assert!(out.ends_with("FORM\r\nPRINT\r\n"));
    }
}
