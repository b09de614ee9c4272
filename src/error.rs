//! Error types for the edgequake-html2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Html2PdfError`] — **Fatal**: the conversion cannot proceed at all
//!   (content HTML missing, workspace could not be created) or finished
//!   without producing anything. Returned as `Err(Html2PdfError)` from the
//!   top-level `convert*` functions.
//!
//! * [`StageError`] — **Non-fatal**: one external tool invocation failed or a
//!   stylesheet could not be loaded, but the pipeline kept going against
//!   whatever files exist. Stored inside
//!   [`crate::output::ConversionOutput::stage_errors`] so callers can see what
//!   degraded without losing a usable artifact.
//!
//! Exit codes of external tools never decide success. Only the existence of
//! the expected output files does.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-html2pdf library.
///
/// Tool-level failures use [`StageError`] and are stored in
/// [`crate::output::ConversionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Html2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The content HTML is absent or empty. Raised before any tool runs.
    #[error("Content HTML is missing: {reason}")]
    MissingInput { reason: String },

    /// A payload that must be base64 could not be decoded.
    #[error("Field '{field}' is not valid base64: {detail}")]
    InvalidBase64 { field: String, detail: String },

    /// The request body or options JSON could not be parsed.
    #[error("Invalid conversion options: {0}")]
    InvalidOptions(String),

    // ── Workspace errors ──────────────────────────────────────────────────
    /// The per-conversion temporary directory could not be created.
    #[error("Failed to create workspace under '{root}': {source}")]
    WorkspaceFailed {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTML page shell could not be written into the workspace.
    #[error("Failed to write input file '{path}': {source}")]
    InputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The final PDF could not be moved or copied to its destination.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Terminal outcome ──────────────────────────────────────────────────
    /// Every stage ran, but neither a final PDF nor any page image exists.
    #[error("No output produced ({failed_invocations} of {invocations} tool invocations failed)")]
    NoOutputProduced {
        invocations: usize,
        failed_invocations: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error raised by one pipeline stage.
///
/// The pipeline logs it, records it, and moves on; downstream stages check
/// for the files they need instead of looking at these.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The tool ran and exited with a non-zero status.
    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// The tool could not be spawned (not installed, not executable).
    #[error("{tool} could not be started: {detail}")]
    ToolNotFound { tool: String, detail: String },

    /// The tool was killed after exceeding the configured timeout.
    #[error("{tool} timed out after {secs}s")]
    ToolTimedOut { tool: String, secs: u64 },

    /// A stage finished but its expected artifact is not on disk.
    #[error("Stage '{stage}' produced no artifact at '{path}'")]
    MissingArtifact { stage: String, path: PathBuf },

    /// A stylesheet for the page shell could not be loaded.
    #[error("Stylesheet '{source_ref}' unavailable: {reason}")]
    StylesheetUnavailable { source_ref: String, reason: String },

    /// The cover-page payload was supplied but could not be used.
    #[error("Cover page skipped: {reason}")]
    CoverSkipped { reason: String },
}
