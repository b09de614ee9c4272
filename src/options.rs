//! Report/export options as they arrive from the client.
//!
//! The JSON shape mirrors what the report designer posts: camelCase keys,
//! booleans that may be real booleans or form strings (`"on"`, `"oui"`,
//! `"1"`), and margins that may be numbers or numeric strings. Parsing is
//! total: a value that cannot be understood is treated as absent, which
//! leaves the renderer on its own default for that setting.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Html2PdfError;

/// Paper size keyword that switches to explicit width/height.
pub const CUSTOM_PAPER_SIZE: &str = "Custom";

/// Everything the client can ask of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionOptions {
    /// Render a separate, margin-less cover page in front of the content.
    #[serde(rename = "coverpage", deserialize_with = "lenient_bool")]
    pub has_cover_page: bool,

    pub page: PageOptions,

    #[serde(deserialize_with = "lenient_bool")]
    pub grayscale: bool,

    /// `false` asks the renderer to skip PDF stream compression.
    #[serde(rename = "pdfCompression", deserialize_with = "lenient_bool")]
    pub compression_enabled: bool,

    #[serde(deserialize_with = "lenient_bool")]
    pub outline: bool,

    #[serde(deserialize_with = "lenient_bool")]
    pub background_graphics: bool,

    pub header: HeaderFooter,

    pub footer: HeaderFooter,

    #[serde(rename = "toc", alias = "tableOfContents", deserialize_with = "lenient_bool")]
    pub table_of_contents: bool,

    /// Rasterise the final PDF into one PNG per page.
    #[serde(deserialize_with = "lenient_bool")]
    pub render_to_images: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            has_cover_page: false,
            page: PageOptions::default(),
            grayscale: false,
            // Compression on is the renderer default.
            compression_enabled: true,
            outline: false,
            background_graphics: true,
            header: HeaderFooter::default(),
            footer: HeaderFooter::default(),
            table_of_contents: false,
            render_to_images: false,
        }
    }
}

/// Page geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPageOptions", into = "RawPageOptions")]
pub struct PageOptions {
    /// `Portrait` / `Landscape`; empty leaves the renderer default.
    pub orientation: String,
    pub paper: PaperSize,
    pub margins: Margins,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            orientation: "Portrait".to_string(),
            paper: PaperSize::Named("A4".to_string()),
            margins: Margins::default(),
        }
    }
}

/// Either a named paper size or explicit dimensions, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    /// Renderer keyword such as `A4` or `Letter`.
    Named(String),
    /// Explicit size in millimetres. A missing side falls back to the
    /// renderer default for that side.
    Custom {
        width: Option<f64>,
        height: Option<f64>,
    },
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    #[serde(deserialize_with = "lenient_number")]
    pub top: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub bottom: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub left: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub right: Option<f64>,
}

impl Margins {
    pub fn uniform(mm: f64) -> Self {
        Self {
            top: Some(mm),
            bottom: Some(mm),
            left: Some(mm),
            right: Some(mm),
        }
    }
}

/// Header or footer text slots plus the separator-line switch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooter {
    #[serde(deserialize_with = "lenient_string")]
    pub left: String,
    #[serde(deserialize_with = "lenient_string")]
    pub center: String,
    #[serde(deserialize_with = "lenient_string")]
    pub right: String,
    #[serde(
        rename = "showLine",
        alias = "displayHeaderLine",
        alias = "displayFooterLine",
        deserialize_with = "lenient_bool"
    )]
    pub show_line: bool,
}

impl HeaderFooter {
    /// True when at least one of the three text slots is non-empty.
    pub fn has_text(&self) -> bool {
        !(self.left.is_empty() && self.center.is_empty() && self.right.is_empty())
    }
}

/// Flat wire form of [`PageOptions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPageOptions {
    #[serde(deserialize_with = "lenient_string")]
    orientation: String,
    #[serde(deserialize_with = "lenient_string")]
    paper_size: String,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    margins: Margins,
}

impl From<RawPageOptions> for PageOptions {
    fn from(raw: RawPageOptions) -> Self {
        let paper = if raw.paper_size == CUSTOM_PAPER_SIZE {
            PaperSize::Custom {
                width: raw.width,
                height: raw.height,
            }
        } else {
            PaperSize::Named(raw.paper_size)
        };
        Self {
            orientation: raw.orientation,
            paper,
            margins: raw.margins,
        }
    }
}

impl From<PageOptions> for RawPageOptions {
    fn from(page: PageOptions) -> Self {
        let (paper_size, width, height) = match page.paper {
            PaperSize::Named(name) => (name, None, None),
            PaperSize::Custom { width, height } => (CUSTOM_PAPER_SIZE.to_string(), width, height),
        };
        Self {
            orientation: page.orientation,
            paper_size,
            width,
            height,
            margins: page.margins,
        }
    }
}

/// The body posted by the report viewer.
///
/// Both HTML payloads are base64 so arbitrary markup survives form encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionRequest {
    #[serde(rename = "CoverPage", skip_serializing_if = "Option::is_none")]
    pub cover_page: Option<String>,

    #[serde(rename = "HTML")]
    pub html: String,

    #[serde(rename = "PDFOptions")]
    pub options: ConversionOptions,

    #[serde(rename = "ConvertToImages", deserialize_with = "lenient_bool")]
    pub convert_to_images: bool,
}

impl ConversionRequest {
    /// Parse a request body.
    pub fn from_json(body: &str) -> Result<Self, Html2PdfError> {
        serde_json::from_str(body).map_err(|e| Html2PdfError::InvalidOptions(e.to_string()))
    }

    /// Decode the content payload. Fails when it is empty or not base64.
    pub fn decode_content(&self) -> Result<Vec<u8>, Html2PdfError> {
        let trimmed = self.html.trim();
        if trimmed.is_empty() {
            return Err(Html2PdfError::MissingInput {
                reason: "request has no HTML payload".into(),
            });
        }
        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|e| Html2PdfError::InvalidBase64 {
                field: "HTML".into(),
                detail: e.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(Html2PdfError::MissingInput {
                reason: "HTML payload decodes to nothing".into(),
            });
        }
        Ok(bytes)
    }

    /// Decode the cover payload if the options ask for a cover page.
    ///
    /// `Ok(None)` means no cover was requested or supplied.
    pub fn decode_cover(&self) -> Result<Option<Vec<u8>>, Html2PdfError> {
        if !self.options.has_cover_page {
            return Ok(None);
        }
        let Some(raw) = self.cover_page.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let bytes = STANDARD
            .decode(raw)
            .map_err(|e| Html2PdfError::InvalidBase64 {
                field: "CoverPage".into(),
                detail: e.to_string(),
            })?;
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}

// ── Lenient field parsers ────────────────────────────────────────────────

const TRUE_WORDS: &[&str] = &["1", "y", "o", "yes", "true", "oui", "vrai", "on", "checked"];

/// Interpret a loosely-typed JSON value as a boolean.
pub fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            TRUE_WORDS.contains(&s.as_str())
        }
        _ => false,
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_bool(&value))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}
