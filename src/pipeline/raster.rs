//! Rasterisation: final PDF → one base64 PNG data-URI per page.
//!
//! The rasterizer writes `<prefix>-<n>.png` into the workspace, zero-padding
//! `n` to the width of the page count. Pages are ordered by that embedded
//! number, so the order holds whether or not the tool pads.
//!
//! PNG is kept as produced; the bytes are only inspected for their
//! dimensions (debug logging) and then base64-wrapped.

use crate::config::ConversionConfig;
use crate::pipeline::tool::{ToolInvocation, ToolOutcome};
use crate::pipeline::workspace::Workspace;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scheme prefix of every page image.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)\.png$").unwrap());

/// Run the rasterizer over `pdf`. Returns the outcome; pages are collected
/// separately with [`collect_pages`].
pub async fn rasterize(pdf: &Path, ws: &Workspace, config: &ConversionConfig) -> ToolOutcome {
    let inv = ToolInvocation::new("rasterizer", config.tools.rasterizer.as_str())
        .arg("-png")
        .arg(pdf.display().to_string())
        .arg(ws.page_image_prefix().display().to_string())
        .timeout(config.tool_timeout_secs.map(Duration::from_secs));
    info!("Rasterising {}", pdf.display());
    config.runner.run(&inv).await
}

/// Sort key for a rasterised page: its embedded page number, then its name.
fn page_key(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let num = PAGE_NUMBER
        .captures(&name)
        .and_then(|c| c[1].parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    (num, name)
}

/// PNG files in `dir`, in page order.
pub async fn list_pages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_png = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png {
            pages.push(path);
        }
    }
    pages.sort_by_cached_key(|p| page_key(p));
    Ok(pages)
}

/// Wrap PNG bytes in a data-URI.
pub fn encode_png(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded page image → {} bytes base64", b64.len());
    format!("{PNG_DATA_URI_PREFIX}{b64}")
}

/// Read and encode every rasterised page in the workspace.
///
/// Unreadable files are skipped with a warning.
pub async fn collect_pages(ws: &Workspace) -> Vec<String> {
    let pages = match list_pages(ws.path()).await {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not list rasterised pages: {}", e);
            return Vec::new();
        }
    };

    let mut images = Vec::with_capacity(pages.len());
    for path in pages {
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                log_dimensions(&path, &bytes);
                images.push(encode_png(&bytes));
            }
            Err(e) => warn!("Skipping unreadable page {}: {}", path.display(), e),
        }
    }
    images
}

fn log_dimensions(path: &Path, bytes: &[u8]) {
    let dims = image::ImageReader::with_format(Cursor::new(bytes), image::ImageFormat::Png)
        .into_dimensions();
    match dims {
        Ok((w, h)) => debug!("Page image {} → {}x{} px", path.display(), w, h),
        Err(e) => warn!("Page image {} is not a readable PNG: {}", path.display(), e),
    }
}
