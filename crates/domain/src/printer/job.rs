use serde::{Deserialize, Serialize};

use crate::error::PrinterError;

/// Horizontal alignment. Accepts names or the numeric codes 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "AlignValue")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AlignValue {
    Code(u8),
    Name(String),
}

impl TryFrom<AlignValue> for Alignment {
    type Error = String;

    fn try_from(value: AlignValue) -> Result<Self, Self::Error> {
        match value {
            AlignValue::Code(0) => Ok(Self::Left),
            AlignValue::Code(1) => Ok(Self::Center),
            AlignValue::Code(2) => Ok(Self::Right),
            AlignValue::Code(n) => Err(format!("invalid alignment code {}", n)),
            AlignValue::Name(name) => match name.to_ascii_lowercase().as_str() {
                "left" => Ok(Self::Left),
                "center" | "centre" => Ok(Self::Center),
                "right" => Ok(Self::Right),
                other => Err(format!("invalid alignment '{}'", other)),
            },
        }
    }
}

/// Job-wide options. Unrecognised options are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintConfig {
    /// Label width in millimetres
    #[serde(default = "default_width")]
    pub width: f32,
    /// Label height in millimetres
    #[serde(default = "default_height")]
    pub height: f32,
    /// Gap between labels in millimetres
    #[serde(default = "default_gap")]
    pub gap: f32,
    #[serde(default = "default_copies")]
    pub copies: u16,
    #[serde(default)]
    pub density: Option<u8>,
    #[serde(default)]
    pub speed: Option<u8>,
    #[serde(default)]
    pub direction: Option<u8>,
    /// ESC/POS character code table (ESC t n)
    #[serde(default)]
    pub codepage: Option<u8>,
    /// Default alignment for elements that do not set one
    #[serde(default)]
    pub align: Alignment,
}

fn default_width() -> f32 {
    40.0
}
fn default_height() -> f32 {
    30.0
}
fn default_gap() -> f32 {
    2.0
}
fn default_copies() -> u16 {
    1
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            gap: default_gap(),
            copies: default_copies(),
            density: None,
            speed: None,
            direction: None,
            codepage: None,
            align: Alignment::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(alias = "value")]
    pub content: String,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default, alias = "weight", deserialize_with = "flag")]
    pub bold: bool,
    #[serde(default, deserialize_with = "flag")]
    pub underline: bool,
    /// Horizontal magnification, 1-8
    #[serde(default = "one")]
    pub width: u8,
    /// Vertical magnification, 1-8
    #[serde(default = "one")]
    pub height: u8,
    #[serde(default = "yes", deserialize_with = "flag")]
    pub linefeed: bool,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub rotation: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    #[default]
    Code128,
    Code39,
    Ean13,
    Ean8,
    Upca,
    Itf,
    Codabar,
}

impl Symbology {
    /// Symbologies that only encode digits
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Ean13 | Self::Ean8 | Self::Upca | Self::Itf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeElement {
    #[serde(alias = "value")]
    pub content: String,
    #[serde(default)]
    pub symbology: Symbology,
    /// Bar height in dots
    #[serde(default = "barcode_height")]
    pub height: u16,
    /// Narrow bar width in dots
    #[serde(default = "barcode_narrow")]
    pub narrow: u8,
    /// Print the human readable line
    #[serde(default, deserialize_with = "flag")]
    pub hri: bool,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ErrorLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorLevel {
    pub fn as_char(&self) -> char {
        match self {
            Self::L => 'L',
            Self::M => 'M',
            Self::Q => 'Q',
            Self::H => 'H',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrCodeElement {
    #[serde(alias = "value")]
    pub content: String,
    /// Module size in dots
    #[serde(default = "qr_size")]
    pub size: u8,
    #[serde(default)]
    pub level: ErrorLevel,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

/// Monochrome bitmap: base64 rows of `ceil(width / 8)` bytes, MSB first,
/// set bit = black dot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    pub width: u16,
    pub height: u16,
    #[serde(alias = "content")]
    pub data: String,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

impl ImageElement {
    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedElement {
    #[serde(default = "one")]
    pub lines: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CutElement {
    #[serde(default, deserialize_with = "flag")]
    pub partial: bool,
}

/// One structured unit of print content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Barcode(BarcodeElement),
    #[serde(alias = "qr")]
    QrCode(QrCodeElement),
    Image(ImageElement),
    Feed(FeedElement),
    Cut(CutElement),
}

/// A print job. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PrintJob {
    #[serde(default)]
    pub config: PrintConfig,
    #[serde(alias = "data")]
    pub elements: Vec<Element>,
}

impl PrintJob {
    pub fn new(config: PrintConfig, elements: Vec<Element>) -> Self {
        Self { config, elements }
    }

    /// Build a job from the loosely typed `config` / `data` request fields
    pub fn from_values(
        config: serde_json::Value,
        data: serde_json::Value,
    ) -> Result<Self, PrinterError> {
        let config: PrintConfig = serde_json::from_value(config)
            .map_err(|e| PrinterError::InvalidArgument(format!("invalid config: {}", e)))?;

        let items = match data {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(PrinterError::InvalidArgument(format!(
                    "data must be a list of elements, got {}",
                    other
                )));
            }
        };

        let elements = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<Element>(item).map_err(|e| {
                    PrinterError::InvalidArgument(format!("element {}: {}", index, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, elements })
    }
}

fn one() -> u8 {
    1
}
fn yes() -> bool {
    true
}
fn barcode_height() -> u16 {
    80
}
fn barcode_narrow() -> u8 {
    2
}
fn qr_size() -> u8 {
    6
}

/// Accept `true`/`false` as well as the 0/1 integers host apps tend to send
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}
