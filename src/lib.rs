//! # edgequake-html2pdf
//!
//! Turn report-viewer HTML into a PDF (optionally with a cover page) or into
//! one PNG per page, by orchestrating a small set of external tools.
//!
//! ## Why this crate?
//!
//! Browser-grade HTML layout is hard; `wkhtmltopdf` already does it. What is
//! left is plumbing: wrapping fragments in a styled page shell, translating
//! loosely-typed client options into the renderer's command-line grammar,
//! rendering a full-bleed cover separately from the content, keeping only
//! the cover's first page, merging, and rasterising. Each of those steps may
//! fail without sinking the export; the crate reports what exists at the end.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (base64 HTML + options)
//!  │
//!  ├─ 1. Input    page shell + inlined stylesheets, written to a temp workspace
//!  ├─ 2. Cover    wkhtmltopdf, zero margins, zoom 1.25        (optional)
//!  ├─ 3. Content  wkhtmltopdf, requested margins, zoom 1.2
//!  ├─ 4. Merge    pdfseparate (cover page 1) + pdfunite
//!  ├─ 5. Raster   pdftoppm -png → data:image/png;base64,…     (optional)
//!  └─ 6. Output   persisted PDF path or page images + stage errors + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_html2pdf::{convert, ConversionConfig, ConversionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let body = std::fs::read_to_string("request.json")?;
//!     let request = ConversionRequest::from_json(&body)?;
//!     let config = ConversionConfig::default();
//!     let output = convert(&request, &config).await?;
//!     if let Some(pdf) = output.result.pdf_path() {
//!         println!("{}", pdf.display());
//!     }
//!     for err in &output.stage_errors {
//!         eprintln!("degraded: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2pdf` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-html2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Role | Default program | Used for |
//! |------|-----------------|----------|
//! | renderer       | `wkhtmltopdf` | HTML → PDF (cover and content passes) |
//! | page extractor | `pdfseparate` | first page of the cover |
//! | merger         | `pdfunite`    | cover page + content → final PDF |
//! | rasterizer     | `pdftoppm`    | final PDF → PNG per page |
//!
//! Every program path is configurable; the renderer can also run inside a
//! Docker image (see [`ExecutionMode`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod flags;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ExecutionMode, ToolPaths};
pub use convert::{convert, convert_html, convert_sync, convert_to_file, run};
pub use error::{Html2PdfError, StageError};
pub use flags::{translate, FlagSet, FlagValue};
pub use options::{
    value_to_bool, ConversionOptions, ConversionRequest, HeaderFooter, Margins, PageOptions,
    PaperSize,
};
pub use output::{ConversionOutput, ConversionResult, ConversionStats};
pub use pipeline::tool::{ProcessRunner, ToolInvocation, ToolOutcome, ToolRunner};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
