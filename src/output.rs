//! Output types returned by the conversion entry points.

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The artifact a successful conversion produced.
///
/// Failure is not a variant: a run that produced nothing returns
/// [`crate::error::Html2PdfError::NoOutputProduced`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConversionResult {
    /// Path of the merged PDF. The caller owns the file and deletes it.
    Pdf(PathBuf),
    /// One `data:image/png;base64,…` URI per page, in page order.
    Images(Vec<String>),
}

impl ConversionResult {
    pub fn pdf_path(&self) -> Option<&PathBuf> {
        match self {
            ConversionResult::Pdf(p) => Some(p),
            ConversionResult::Images(_) => None,
        }
    }

    pub fn images(&self) -> Option<&[String]> {
        match self {
            ConversionResult::Pdf(_) => None,
            ConversionResult::Images(v) => Some(v),
        }
    }
}

/// Result plus what degraded along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub result: ConversionResult,

    /// Non-fatal failures, in the order they happened.
    pub stage_errors: Vec<StageError>,

    pub stats: ConversionStats,
}

/// Timing and bookkeeping for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// A cover page was supplied and rendered (or at least attempted).
    pub had_cover_page: bool,
    /// The cover page contributed to the final PDF.
    pub cover_included: bool,
    /// External tool invocations attempted.
    pub tool_invocations: usize,
    /// Invocations that exited non-zero, timed out, or failed to start.
    pub failed_invocations: usize,
    /// PNG pages produced by the rasterizer.
    pub page_images: usize,
    pub render_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub raster_duration_ms: u64,
    pub total_duration_ms: u64,
}
