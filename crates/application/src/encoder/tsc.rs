use std::fmt::Write;

use domain::printer::{Alignment, Element, PrintConfig, Symbology};

use super::{EncodeError, LINE_DOTS, bitmap_rows, require_content, require_single_line};

/// TSPL command text, one command per CRLF terminated line
struct Script {
    out: Vec<u8>,
}

impl Script {
    fn line(&mut self, command: &str) {
        self.out.extend_from_slice(command.as_bytes());
        self.out.extend_from_slice(b"\r\n");
    }
}

/// Quote a string argument; embedded quotes use the `\["]` escape
fn quoted(content: &str) -> String {
    format!("\"{}\"", content.replace('"', "\\[\"]"))
}

fn barcode_type(symbology: Symbology) -> &'static str {
    match symbology {
        Symbology::Code128 => "128",
        Symbology::Code39 => "39",
        Symbology::Ean13 => "EAN13",
        Symbology::Ean8 => "EAN8",
        Symbology::Upca => "UPCA",
        Symbology::Itf => "25",
        Symbology::Codabar => "CODA",
    }
}

pub(super) fn encode(config: &PrintConfig, elements: &[Element]) -> Result<Vec<u8>, EncodeError> {
    let mut script = Script { out: Vec::new() };

    script.line(&format!("SIZE {} mm,{} mm", config.width, config.height));
    script.line(&format!("GAP {} mm,0 mm", config.gap));
    if let Some(density) = config.density {
        script.line(&format!("DENSITY {}", density));
    }
    if let Some(speed) = config.speed {
        script.line(&format!("SPEED {}", speed));
    }
    if let Some(direction) = config.direction {
        script.line(&format!("DIRECTION {}", direction));
    }
    script.line("CLS");

    for (index, element) in elements.iter().enumerate() {
        match element {
            Element::Text(text) => {
                require_single_line(&text.content, "text", index)?;
                let font = text.font.as_deref().unwrap_or("3");
                let mut command = format!(
                    "TEXT {},{},{},{},{},{}",
                    text.x,
                    text.y,
                    quoted(font),
                    text.rotation,
                    text.width.clamp(1, 10),
                    text.height.clamp(1, 10)
                );
                match text.align.unwrap_or(config.align) {
                    Alignment::Left => {}
                    Alignment::Center => command.push_str(",2"),
                    Alignment::Right => command.push_str(",3"),
                }
                let _ = write!(command, ",{}", quoted(&text.content));
                script.line(&command);
            }
            Element::Barcode(barcode) => {
                require_content(&barcode.content, "barcode", index)?;
                require_single_line(&barcode.content, "barcode", index)?;
                script.line(&format!(
                    "BARCODE {},{},\"{}\",{},{},0,{},{},{}",
                    barcode.x,
                    barcode.y,
                    barcode_type(barcode.symbology),
                    barcode.height,
                    u8::from(barcode.hri),
                    barcode.narrow,
                    u16::from(barcode.narrow) * 2,
                    quoted(&barcode.content)
                ));
            }
            Element::QrCode(qr) => {
                require_content(&qr.content, "qrcode", index)?;
                require_single_line(&qr.content, "qrcode", index)?;
                script.line(&format!(
                    "QRCODE {},{},{},{},A,0,{}",
                    qr.x,
                    qr.y,
                    qr.level.as_char(),
                    qr.size.clamp(1, 10),
                    quoted(&qr.content)
                ));
            }
            Element::Image(image) => {
                let rows = bitmap_rows(image, index)?;
                // BITMAP treats a set bit as white
                script.out.extend_from_slice(
                    format!(
                        "BITMAP {},{},{},{},0,",
                        image.x,
                        image.y,
                        image.bytes_per_row(),
                        image.height
                    )
                    .as_bytes(),
                );
                script.out.extend(rows.iter().map(|b| !b));
                script.out.extend_from_slice(b"\r\n");
            }
            Element::Feed(feed) => {
                script.line(&format!("FEED {}", u32::from(feed.lines) * LINE_DOTS));
            }
            Element::Cut(cut) => {
                if cut.partial {
                    script.line("SET PARTIAL_CUTTER ON");
                } else {
                    script.line("SET CUTTER 1");
                }
            }
        }
    }

    script.line(&format!("PRINT {},1", config.copies.max(1)));
    Ok(script.out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(config: serde_json::Value, data: serde_json::Value) -> Result<String, EncodeError> {
        let config: PrintConfig = serde_json::from_value(config).unwrap();
        let elements: Vec<Element> = serde_json::from_value(data).unwrap();
        encode(&config, &elements).map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    #[test]
    fn test_label_setup_and_print() {
        let out = encode_json(json!({"width": 50, "height": 25, "density": 8}), json!([])).unwrap();
        assert_eq!(
            out,
            "SIZE 50 mm,25 mm\r\nGAP 2 mm,0 mm\r\nDENSITY 8\r\nCLS\r\nPRINT 1,1\r\n"
        );
    }

    #[test]
    fn test_text_with_alignment_and_quotes() {
        let out = encode_json(
            json!({}),
            json!([{"type": "text", "content": "say \"hi\"", "x": 10, "y": 20, "align": "center"}]),
        )
        .unwrap();
        assert!(out.contains("TEXT 10,20,\"3\",0,1,1,2,\"say \\[\"]hi\\[\"]\"\r\n"));
    }

    #[test]
    fn test_barcode_qr_feed_and_cut() {
        let out = encode_json(
            json!({"copies": 3}),
            json!([
                {"type": "barcode", "content": "12345678", "symbology": "ean8", "height": 50, "hri": true},
                {"type": "qrcode", "content": "abc", "level": "Q", "size": 4, "x": 5, "y": 6},
                {"type": "feed", "lines": 2},
                {"type": "cut"}
            ]),
        )
        .unwrap();

        assert!(out.contains("BARCODE 0,0,\"EAN8\",50,1,0,2,4,\"12345678\"\r\n"));
        assert!(out.contains("QRCODE 5,6,Q,4,A,0,\"abc\"\r\n"));
        assert!(out.contains("FEED 48\r\n"));
        assert!(out.contains("SET CUTTER 1\r\n"));
        assert!(out.ends_with("PRINT 3,1\r\n"));
    }

    #[test]
    fn test_bitmap_is_inverted() {
        let config = PrintConfig::default();
        let elements: Vec<Element> = serde_json::from_value(
            json!([{"type": "image", "width": 8, "height": 1, "data": "8A=="}]),
        )
        .unwrap();
        let bytes = encode(&config, &elements).unwrap();

        let header = b"BITMAP 0,0,1,1,0,";
        let start = bytes
            .windows(header.len())
            .position(|w| w == header)
            .unwrap();
        assert_eq!(bytes[start + header.len()], 0x0F);
    }

    #[test]
    fn test_line_break_rejected() {
        let result = encode_json(json!({}), json!([{"type": "text", "content": "a\nb"}]));
        assert!(matches!(
            result,
            Err(EncodeError::InvalidContent { element: "text", index: 0, .. })
        ));
    }
}
