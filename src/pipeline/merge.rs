//! Merge stage: cover contribution + content → final PDF.
//!
//! Only the first page of the cover render is kept (the renderer may spill
//! a tall cover onto extra pages). If extraction fails the full cover is used
//! instead. The merge tool runs only when there is something to merge; a
//! single artifact is copied byte-for-byte.

use crate::config::ConversionConfig;
use crate::pipeline::tool::{ToolInvocation, ToolOutcome};
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the merge stage did.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Files fed into the final PDF, in order.
    pub inputs: Vec<PathBuf>,
    /// Outcomes of every tool run during the stage.
    pub outcomes: Vec<(&'static str, ToolOutcome)>,
    /// The cover contributed to the inputs.
    pub cover_included: bool,
}

pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Pick the cover contribution, extracting its first page when possible.
async fn cover_contribution(
    ws: &Workspace,
    config: &ConversionConfig,
    report: &mut MergeReport,
) -> Option<PathBuf> {
    let cover = ws.cover_pdf();
    if !exists(&cover).await {
        return None;
    }

    let first_page = ws.cover_first_page_pdf();
    let inv = ToolInvocation::new("page extractor", config.tools.page_extractor.as_str())
        .args(["-f", "1", "-l", "1"])
        .arg(cover.display().to_string())
        .arg(first_page.display().to_string())
        .timeout(config.tool_timeout_secs.map(Duration::from_secs));
    let outcome = config.runner.run(&inv).await;
    report.outcomes.push(("page extractor", outcome));

    if exists(&first_page).await {
        debug!("Using first page of cover: {}", first_page.display());
        Some(first_page)
    } else {
        warn!("First-page extraction produced nothing, using full cover");
        Some(cover)
    }
}

/// Build the final PDF from whatever the render passes left behind.
pub async fn merge(ws: &Workspace, config: &ConversionConfig) -> MergeReport {
    let mut report = MergeReport::default();

    if let Some(cover) = cover_contribution(ws, config, &mut report).await {
        report.inputs.push(cover);
        report.cover_included = true;
    }
    let content = ws.content_pdf();
    if exists(&content).await {
        report.inputs.push(content);
    }

    let final_pdf = ws.final_pdf();
    match report.inputs.len() {
        0 => warn!("Nothing to merge: no cover or content PDF was produced"),
        1 => {
            let only = &report.inputs[0];
            info!("Single artifact, copying {} → final", only.display());
            if let Err(e) = tokio::fs::copy(only, &final_pdf).await {
                warn!("Copy to {} failed: {}", final_pdf.display(), e);
            }
        }
        n => {
            info!("Merging {} PDFs", n);
            let inv = ToolInvocation::new("merger", config.tools.merger.as_str())
                .args(report.inputs.iter().map(|p| p.display().to_string()))
                .arg(final_pdf.display().to_string())
                .timeout(config.tool_timeout_secs.map(Duration::from_secs));
            let outcome = config.runner.run(&inv).await;
            report.outcomes.push(("merger", outcome));
        }
    }

    report
}
