//! Pipeline stages for HTML-to-PDF conversion.
//!
//! Each submodule implements exactly one step. Stages run strictly in
//! sequence; each one checks for the files it needs instead of trusting the
//! exit status of the previous tool.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render(cover) ──▶ render(content) ──▶ merge ──▶ raster
//! (shell)   (wkhtmltopdf)     (wkhtmltopdf)       (pdfseparate,   (pdftoppm,
//!                                                  pdfunite)       base64)
//! ```
//!
//! 1. [`workspace`] — the exclusive temp directory all stages write into
//! 2. [`input`]     — wrap HTML fragments in the page shell, inline stylesheets
//! 3. [`render`]    — one renderer invocation per pass (cover, content)
//! 4. [`merge`]     — first cover page + content → final PDF
//! 5. [`raster`]    — optional PNG per page, as data-URIs
//!
//! [`tool`] is the seam every subprocess goes through.

pub mod input;
pub mod merge;
pub mod raster;
pub mod render;
pub mod tool;
pub mod workspace;
