//! Input preparation: wrap HTML fragments in the page shell and write them
//! into the workspace.
//!
//! The report designer posts body fragments, not documents. Each fragment is
//! wrapped in the same minimal shell whose `<style>` block inlines the
//! configured stylesheets, so the renderer never needs network access while
//! it runs. Stylesheets are loaded once per conversion and shared by the
//! cover and content shells. One that cannot be fetched degrades styling and
//! is reported as a [`StageError::StylesheetUnavailable`]; it never aborts
//! the conversion.

use crate::error::{Html2PdfError, StageError};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Check if a stylesheet reference is a URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load every stylesheet and concatenate them in order.
///
/// Returns the combined CSS plus one [`StageError`] per sheet that could not
/// be loaded.
pub async fn load_stylesheets(sources: &[String], timeout_secs: u64) -> (String, Vec<StageError>) {
    let mut css = String::new();
    let mut errors = Vec::new();

    let needs_http = sources.iter().any(|s| is_url(s));
    let client = if needs_http {
        match reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
        {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("HTTP client unavailable, remote stylesheets skipped: {}", e);
                None
            }
        }
    } else {
        None
    };

    for source in sources {
        let loaded = if is_url(source) {
            match &client {
                Some(client) => fetch_remote(client, source, timeout_secs).await,
                None => Err("HTTP client unavailable".to_string()),
            }
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| e.to_string())
        };

        match loaded {
            Ok(sheet) => {
                debug!("Stylesheet loaded: {} ({} bytes)", source, sheet.len());
                css.push_str(&sheet);
                css.push('\n');
            }
            Err(reason) => {
                warn!("Stylesheet {} unavailable: {}", source, reason);
                errors.push(StageError::StylesheetUnavailable {
                    source_ref: source.clone(),
                    reason,
                });
            }
        }
    }

    (css, errors)
}

async fn fetch_remote(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<String, String> {
    info!("Fetching stylesheet: {}", url);
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        }
    })?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.text().await.map_err(|e| e.to_string())
}

/// Wrap a body fragment in the page shell.
///
/// The fragment bytes are spliced in unchanged, whatever their encoding.
pub fn page_shell(css: &str, body: &[u8]) -> Vec<u8> {
    const HEAD: &str =
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\" />\n<style>\n";
    const OPEN_BODY: &str = "</style>\n</head>\n<body style=\"background-color:#fff;\">\n";
    const TAIL: &str = "</body>\n</html>\n";

    let mut page =
        Vec::with_capacity(HEAD.len() + css.len() + OPEN_BODY.len() + body.len() + TAIL.len());
    page.extend_from_slice(HEAD.as_bytes());
    page.extend_from_slice(css.as_bytes());
    page.extend_from_slice(OPEN_BODY.as_bytes());
    page.extend_from_slice(body);
    page.extend_from_slice(TAIL.as_bytes());
    page
}

/// Write a page shell for `body` to `path`.
pub async fn write_page(path: &Path, css: &str, body: &[u8]) -> Result<(), Html2PdfError> {
    let page = page_shell(css, body);
    tokio::fs::write(path, &page)
        .await
        .map_err(|source| Html2PdfError::InputWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Wrote page shell {} ({} bytes)", path.display(), page.len());
    Ok(())
}
