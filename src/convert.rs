//! Conversion entry points.
//!
//! Three layers, each one a thin wrapper over the next:
//!
//! * [`convert`]      — a decoded-on-demand [`ConversionRequest`] (base64 payloads)
//! * [`convert_html`] — raw HTML bytes plus [`ConversionOptions`]
//! * [`run`]          — raw HTML bytes plus an already translated [`FlagSet`]
//!
//! The run itself is one sequential pass through the stages in
//! [`crate::pipeline`]. Tool failures are absorbed and recorded; the only
//! thing that decides success is whether a final PDF or page images exist at
//! the end.

use crate::config::ConversionConfig;
use crate::error::{Html2PdfError, StageError};
use crate::flags::{translate, FlagSet};
use crate::options::{ConversionOptions, ConversionRequest};
use crate::output::{ConversionOutput, ConversionResult, ConversionStats};
use crate::pipeline::merge::{exists, merge};
use crate::pipeline::render::RenderJob;
use crate::pipeline::tool::ToolOutcome;
use crate::pipeline::workspace::Workspace;
use crate::pipeline::{input, raster};
use crate::progress::Stage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a request as posted by the report viewer.
///
/// # Errors
/// - [`Html2PdfError::MissingInput`] / [`Html2PdfError::InvalidBase64`] when
///   the content payload is unusable (before any tool runs)
/// - [`Html2PdfError::NoOutputProduced`] when every stage ran and nothing
///   usable exists
///
/// An undecodable cover payload is not fatal: the cover is dropped and a
/// [`StageError::CoverSkipped`] is recorded.
pub async fn convert(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2PdfError> {
    let content = request.decode_content()?;

    let mut early = Vec::new();
    let cover = match request.decode_cover() {
        Ok(c) => c,
        Err(e) => {
            warn!("Cover page unusable, continuing without it: {}", e);
            early.push(StageError::CoverSkipped {
                reason: e.to_string(),
            });
            None
        }
    };

    let flags = translate(&request.options);
    let images = request.convert_to_images || request.options.render_to_images;
    run_with(cover.as_deref(), &content, &flags, images, config, early).await
}

/// Convert raw HTML fragments.
///
/// `cover` is used only when `options.has_cover_page` is set.
pub async fn convert_html(
    cover: Option<&[u8]>,
    content: &[u8],
    options: &ConversionOptions,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2PdfError> {
    let cover = cover.filter(|_| options.has_cover_page);
    let flags = translate(options);
    run(cover, content, &flags, options.render_to_images, config).await
}

/// Run the pipeline against pre-translated flags.
pub async fn run(
    cover: Option<&[u8]>,
    content: &[u8],
    flags: &FlagSet,
    render_to_images: bool,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2PdfError> {
    run_with(cover, content, flags, render_to_images, config, Vec::new()).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Html2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(request, config))
}

/// Convert to a PDF and write it to `output_path`.
///
/// Image rendering is ignored. Uses atomic write (temp file + rename) to
/// prevent partial files.
pub async fn convert_to_file(
    request: &ConversionRequest,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Html2PdfError> {
    let mut request = request.clone();
    request.convert_to_images = false;
    request.options.render_to_images = false;

    let output = convert(&request, config).await?;
    let ConversionResult::Pdf(pdf) = output.result else {
        return Err(Html2PdfError::Internal(
            "PDF conversion returned images".into(),
        ));
    };

    let path = output_path.as_ref();
    let write_err = |source| Html2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::copy(&pdf, &tmp_path).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::remove_file(&pdf).await {
        debug!("Could not remove intermediate {}: {}", pdf.display(), e);
    }

    Ok(output.stats)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Counts invocations and collects non-fatal errors.
#[derive(Default)]
struct Tally {
    stats: ConversionStats,
    errors: Vec<StageError>,
}

impl Tally {
    fn record(&mut self, tool: &str, outcome: &ToolOutcome) {
        self.stats.tool_invocations += 1;
        if let Some(err) = outcome.stage_error(tool) {
            self.stats.failed_invocations += 1;
            self.errors.push(err);
        }
    }

    fn missing(&mut self, stage: Stage, path: &Path) {
        warn!("{} produced no artifact at {}", stage, path.display());
        self.errors.push(StageError::MissingArtifact {
            stage: stage.to_string(),
            path: path.to_path_buf(),
        });
    }
}

async fn run_with(
    cover: Option<&[u8]>,
    content: &[u8],
    flags: &FlagSet,
    render_to_images: bool,
    config: &ConversionConfig,
    early_errors: Vec<StageError>,
) -> Result<ConversionOutput, Html2PdfError> {
    let total_start = Instant::now();

    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(Html2PdfError::MissingInput {
            reason: "content HTML is empty".into(),
        });
    }
    let cover = cover.filter(|c| !c.iter().all(u8::is_ascii_whitespace));

    let mut tally = Tally {
        errors: early_errors,
        ..Default::default()
    };
    tally.stats.had_cover_page = cover.is_some();

    let cb = config.progress_callback.as_ref();
    let stage_start = |stage: Stage| {
        debug!("Stage {} started", stage);
        if let Some(cb) = cb {
            cb.on_stage_start(stage);
        }
    };
    let stage_done = |stage: Stage, produced: bool| {
        debug!("Stage {} finished (artifact: {})", stage, produced);
        if let Some(cb) = cb {
            cb.on_stage_complete(stage, produced);
        }
    };

    let stages = 3 + usize::from(cover.is_some()) + usize::from(render_to_images);
    if let Some(cb) = cb {
        cb.on_conversion_start(stages);
    }
    info!(
        "Starting conversion: cover={}, images={}, sandboxed={}",
        cover.is_some(),
        render_to_images,
        config.sandbox.is_sandboxed()
    );

    // ── Step 1: Materialise inputs ───────────────────────────────────────
    stage_start(Stage::PrepareInput);
    let (css, css_errors) =
        input::load_stylesheets(&config.stylesheets, config.stylesheet_timeout_secs).await;
    tally.errors.extend(css_errors);

    let ws = Workspace::create(&config.workspace_root, config.keep_workspace)?;
    input::write_page(&ws.content_html(), &css, content).await?;
    if let Some(cover) = cover {
        input::write_page(&ws.cover_html(), &css, cover).await?;
    }
    stage_done(Stage::PrepareInput, true);

    // ── Step 2: Render cover page ────────────────────────────────────────
    let render_start = Instant::now();
    if cover.is_some() {
        stage_start(Stage::RenderCover);
        let job = RenderJob::cover(&ws);
        let outcome = job.run(flags, config, &ws).await;
        tally.record("renderer", &outcome);
        let produced = exists(&job.output).await;
        if !produced {
            tally.missing(Stage::RenderCover, &job.output);
        }
        stage_done(Stage::RenderCover, produced);
    }

    // ── Step 3: Render content ───────────────────────────────────────────
    stage_start(Stage::RenderContent);
    let job = RenderJob::content(&ws);
    let outcome = job.run(flags, config, &ws).await;
    tally.record("renderer", &outcome);
    let produced = exists(&job.output).await;
    if !produced {
        tally.missing(Stage::RenderContent, &job.output);
    }
    stage_done(Stage::RenderContent, produced);
    tally.stats.render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 4: Merge ────────────────────────────────────────────────────
    stage_start(Stage::Merge);
    let merge_start = Instant::now();
    let report = merge(&ws, config).await;
    for (tool, outcome) in &report.outcomes {
        tally.record(tool, outcome);
    }
    tally.stats.cover_included = report.cover_included;
    let final_pdf = ws.final_pdf();
    let have_final = exists(&final_pdf).await;
    if !have_final {
        tally.missing(Stage::Merge, &final_pdf);
    }
    tally.stats.merge_duration_ms = merge_start.elapsed().as_millis() as u64;
    stage_done(Stage::Merge, have_final);

    // ── Step 5: Rasterise ────────────────────────────────────────────────
    let mut images = Vec::new();
    if render_to_images {
        stage_start(Stage::Rasterize);
        let raster_start = Instant::now();
        if have_final {
            let outcome = raster::rasterize(&final_pdf, &ws, config).await;
            tally.record("rasterizer", &outcome);
            images = raster::collect_pages(&ws).await;
            if images.is_empty() {
                tally.missing(Stage::Rasterize, &ws.page_image_prefix());
            }
        } else {
            debug!("Skipping rasterisation: no final PDF");
        }
        tally.stats.page_images = images.len();
        tally.stats.raster_duration_ms = raster_start.elapsed().as_millis() as u64;
        stage_done(Stage::Rasterize, !images.is_empty());
    }

    // ── Step 6: Result + cleanup ─────────────────────────────────────────
    let result = if !images.is_empty() {
        Some(ConversionResult::Images(images))
    } else if have_final {
        match ws.persist(&final_pdf, &config.output_dir).await {
            Ok(path) => Some(ConversionResult::Pdf(path)),
            Err(e) => {
                ws.close();
                if let Some(cb) = cb {
                    cb.on_conversion_complete(false);
                }
                return Err(e);
            }
        }
    } else {
        None
    };
    ws.close();

    if let Some(cb) = cb {
        cb.on_conversion_complete(result.is_some());
    }

    let Some(result) = result else {
        warn!(
            "Conversion produced nothing ({} of {} tool invocations failed)",
            tally.stats.failed_invocations, tally.stats.tool_invocations
        );
        return Err(Html2PdfError::NoOutputProduced {
            invocations: tally.stats.tool_invocations,
            failed_invocations: tally.stats.failed_invocations,
        });
    };

    tally.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} in {}ms ({} degraded steps)",
        match &result {
            ConversionResult::Pdf(p) => p.display().to_string(),
            ConversionResult::Images(v) => format!("{} page images", v.len()),
        },
        tally.stats.total_duration_ms,
        tally.errors.len()
    );

    Ok(ConversionOutput {
        result,
        stage_errors: tally.errors,
        stats: tally.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_failures_only_once() {
        let mut tally = Tally::default();
        tally.record("renderer", &ToolOutcome::Success);
        tally.record(
            "merger",
            &ToolOutcome::NotFound {
                detail: "missing".into(),
            },
        );
        assert_eq!(tally.stats.tool_invocations, 2);
        assert_eq!(tally.stats.failed_invocations, 1);
        assert!(matches!(
            tally.errors[0],
            StageError::ToolNotFound { ref tool, .. } if tool == "merger"
        ));
    }

    #[test]
    fn convert_sync_rejects_empty_request() {
        let err = convert_sync(&ConversionRequest::default(), &ConversionConfig::default())
            .unwrap_err();
        assert!(matches!(err, Html2PdfError::MissingInput { .. }));
    }

    #[test]
    fn whitespace_content_is_missing_input() {
        let config = ConversionConfig::default();
        let err = tokio_test::block_on(run(None, b" \n\t", &FlagSet::new(), false, &config))
            .unwrap_err();
        assert!(matches!(err, Html2PdfError::MissingInput { .. }));
    }
}
