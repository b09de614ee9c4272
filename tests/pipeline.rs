//! Pipeline integration tests.
//!
//! Every external tool is replaced by [`ScriptedTools`], a [`ToolRunner`]
//! that imitates wkhtmltopdf / pdfseparate / pdfunite / pdftoppm closely
//! enough for the orchestration to be exercised end to end: it writes the
//! files the real tools would write, where they would write them.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_html2pdf::{
    convert, convert_html, convert_to_file, ConversionConfig, ConversionOptions,
    ConversionProgressCallback, ConversionRequest, ConversionResult, Html2PdfError, Margins,
    Stage, StageError, ToolInvocation, ToolOutcome, ToolRunner,
};
use futures::future::BoxFuture;
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Scripted tools ───────────────────────────────────────────────────────────

/// Fake toolchain. The renderer writes `PDF[<input stem>]`, the extractor
/// prefixes `P1:`, the merger concatenates, the rasterizer emits
/// `raster_pages` real PNGs.
#[derive(Default)]
struct ScriptedTools {
    calls: Mutex<Vec<ToolInvocation>>,
    /// Tools (by role) that behave as if not installed.
    missing: HashSet<&'static str>,
    /// Tools (by role) that exit non-zero without writing anything.
    failing: HashSet<&'static str>,
    raster_pages: usize,
}

impl ScriptedTools {
    fn new() -> Self {
        Self {
            raster_pages: 2,
            ..Default::default()
        }
    }

    fn missing(mut self, tool: &'static str) -> Self {
        self.missing.insert(tool);
        self
    }

    fn failing(mut self, tool: &'static str) -> Self {
        self.failing.insert(tool);
        self
    }

    fn calls_to(&self, tool: &str) -> Vec<ToolInvocation> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tool == tool)
            .cloned()
            .collect()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

impl ToolRunner for ScriptedTools {
    fn run<'a>(&'a self, inv: &'a ToolInvocation) -> BoxFuture<'a, ToolOutcome> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(inv.clone());

            if self.missing.contains(inv.tool) {
                return ToolOutcome::NotFound {
                    detail: format!("{}: No such file or directory", inv.program),
                };
            }
            if self.failing.contains(inv.tool) {
                return ToolOutcome::Failed {
                    status: 1,
                    stderr: "scripted failure".into(),
                };
            }

            let n = inv.args.len();
            match inv.tool {
                "renderer" => {
                    let input = inv
                        .args
                        .iter()
                        .find(|a| a.ends_with(".html"))
                        .map(|a| Path::new(a).file_stem().unwrap().to_string_lossy().into_owned())
                        .unwrap_or_default();
                    std::fs::write(&inv.args[n - 1], format!("PDF[{input}]")).unwrap();
                }
                "page extractor" => {
                    let data = std::fs::read(&inv.args[n - 2]).unwrap();
                    std::fs::write(&inv.args[n - 1], [&b"P1:"[..], data.as_slice()].concat())
                        .unwrap();
                }
                "merger" => {
                    let mut out = Vec::new();
                    for input in &inv.args[..n - 1] {
                        out.extend(std::fs::read(input).unwrap());
                    }
                    std::fs::write(&inv.args[n - 1], out).unwrap();
                }
                "rasterizer" => {
                    let prefix = &inv.args[n - 1];
                    for page in 1..=self.raster_pages {
                        std::fs::write(format!("{prefix}-{page}.png"), png(8, 11)).unwrap();
                    }
                }
                other => panic!("unexpected tool {other}"),
            }
            ToolOutcome::Success
        })
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    tools: Arc<ScriptedTools>,
    config: ConversionConfig,
    workspace_root: tempfile::TempDir,
    output_dir: tempfile::TempDir,
}

fn harness(tools: ScriptedTools) -> Harness {
    let tools = Arc::new(tools);
    let workspace_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .runner(tools.clone())
        .stylesheets(Vec::<String>::new())
        .workspace_root(workspace_root.path())
        .output_dir(output_dir.path())
        .build()
        .expect("valid config");
    Harness {
        tools,
        config,
        workspace_root,
        output_dir,
    }
}

fn arg_after<'a>(inv: &'a ToolInvocation, flag: &str) -> Option<&'a str> {
    let i = inv.args.iter().position(|a| a == flag)?;
    inv.args.get(i + 1).map(String::as_str)
}

fn renderer_call_for<'a>(calls: &'a [ToolInvocation], html: &str) -> &'a ToolInvocation {
    calls
        .iter()
        .find(|c| c.args.iter().any(|a| a.ends_with(html)))
        .unwrap_or_else(|| panic!("no renderer call for {html}"))
}

fn read_pdf(result: &ConversionResult) -> (PathBuf, String) {
    let path = result.pdf_path().expect("expected a PDF result").clone();
    let body = std::fs::read_to_string(&path).unwrap();
    (path, body)
}

fn scenario_options() -> ConversionOptions {
    serde_json::from_str(
        r#"{
            "coverpage": false,
            "page": {
                "orientation": "Portrait",
                "paperSize": "A4",
                "margins": {"top": 10, "bottom": 10, "left": 10, "right": 10}
            },
            "grayscale": false,
            "pdfCompression": true,
            "outline": false,
            "backgroundGraphics": true,
            "header": {"left": "", "center": "", "right": ""},
            "footer": {"left": "", "center": "", "right": ""}
        }"#,
    )
    .expect("scenario options parse")
}

fn request(cover: Option<&str>, html: &str, options: ConversionOptions) -> ConversionRequest {
    ConversionRequest {
        cover_page: cover.map(|c| STANDARD.encode(c)),
        html: STANDARD.encode(html),
        options,
        convert_to_images: false,
    }
}

// ── Content only ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn content_only_returns_the_rendered_pdf() {
    let h = harness(ScriptedTools::new());
    let req = request(None, "<p>Hello</p>", scenario_options());

    let out = convert(&req, &h.config).await.expect("conversion succeeds");
    let (path, body) = read_pdf(&out.result);

    assert!(path.starts_with(h.output_dir.path()));
    assert_eq!(body, "PDF[PDFContent]");
    assert!(out.result.images().is_none());
    assert!(h.tools.calls_to("merger").is_empty());
    assert!(h.tools.calls_to("page extractor").is_empty());
    assert_eq!(out.stats.tool_invocations, 1);
    assert!(out.stage_errors.is_empty(), "{:?}", out.stage_errors);
}

#[tokio::test]
async fn scenario_flags_reach_the_renderer() {
    let h = harness(ScriptedTools::new());
    let req = request(None, "<p>Hello</p>", scenario_options());
    convert(&req, &h.config).await.unwrap();

    let calls = h.tools.calls_to("renderer");
    assert_eq!(calls.len(), 1);
    let inv = &calls[0];
    assert_eq!(arg_after(inv, "--orientation"), Some("Portrait"));
    assert_eq!(arg_after(inv, "--page-size"), Some("A4"));
    assert_eq!(arg_after(inv, "--margin-top"), Some("10mm"));
    assert_eq!(arg_after(inv, "--zoom"), Some("1.2"));
    assert!(inv.args.contains(&"--print-media-type".to_string()));
    assert!(inv.args.contains(&"--background".to_string()));
    assert!(inv.args.contains(&"--no-outline".to_string()));
    assert!(!inv.args.contains(&"--no-pdf-compression".to_string()));
    assert!(!inv.args.iter().any(|a| a.contains("header") || a.contains("footer")));

    // global flags come before the input, page flags after it
    let input = inv.args.iter().position(|a| a.ends_with("PDFContent.html")).unwrap();
    let orientation = inv.args.iter().position(|a| a == "--orientation").unwrap();
    let zoom = inv.args.iter().position(|a| a == "--zoom").unwrap();
    assert!(orientation < input && input < zoom);
}

#[tokio::test]
async fn content_page_shell_is_written() {
    let tools = Arc::new(ScriptedTools::new());
    let root = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .runner(tools.clone())
        .stylesheets(Vec::<String>::new())
        .workspace_root(root.path())
        .output_dir(root.path().join("out"))
        .keep_workspace(true)
        .build()
        .unwrap();

    convert_html(None, b"<p>Hello</p>", &ConversionOptions::default(), &config)
        .await
        .unwrap();

    let calls = tools.calls_to("renderer");
    let html = calls[0].args.iter().find(|a| a.ends_with(".html")).unwrap();
    let shell = std::fs::read_to_string(html).expect("workspace kept");
    assert!(shell.starts_with("<!DOCTYPE html>"));
    assert!(shell.contains(r#"<body style="background-color:#fff;">"#));
    assert!(shell.contains("<p>Hello</p>"));
}

// ── Cover page ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn cover_first_page_is_merged_before_content() {
    let h = harness(ScriptedTools::new());
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", opts);

    let out = convert(&req, &h.config).await.unwrap();

    let extractor = h.tools.calls_to("page extractor");
    assert_eq!(extractor.len(), 1);
    assert_eq!(&extractor[0].args[..4], &["-f", "1", "-l", "1"]);

    let merger = h.tools.calls_to("merger");
    assert_eq!(merger.len(), 1);
    let inputs = &merger[0].args[..merger[0].args.len() - 1];
    assert_eq!(inputs.len(), 2);
    assert!(inputs[0].ends_with("PDFCover.pdf.p1.pdf"));
    assert!(inputs[1].ends_with("PDFContent.pdf"));

    let (_, body) = read_pdf(&out.result);
    assert_eq!(body, "P1:PDF[PDFCover]PDF[PDFContent]");
    assert!(out.stats.had_cover_page);
    assert!(out.stats.cover_included);
}

#[tokio::test]
async fn cover_pass_bleeds_and_zooms() {
    let h = harness(ScriptedTools::new());
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    opts.page.margins = Margins::uniform(15.0);
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", opts);
    convert(&req, &h.config).await.unwrap();

    let calls = h.tools.calls_to("renderer");
    assert_eq!(calls.len(), 2);
    // cover renders first
    assert!(calls[0].args.iter().any(|a| a.ends_with("PDFCover.html")));

    let cover = renderer_call_for(&calls, "PDFCover.html");
    for side in ["top", "bottom", "left", "right"] {
        assert_eq!(arg_after(cover, &format!("--margin-{side}")), Some("0mm"));
    }
    assert_eq!(arg_after(cover, "--zoom"), Some("1.25"));

    let content = renderer_call_for(&calls, "PDFContent.html");
    assert_eq!(arg_after(content, "--margin-left"), Some("15mm"));
    assert_eq!(arg_after(content, "--zoom"), Some("1.2"));
}

#[tokio::test]
async fn cover_bleeds_when_margins_are_omitted() {
    let h = harness(ScriptedTools::new());
    let opts: ConversionOptions = serde_json::from_str(
        r#"{"coverpage": true, "page": {"orientation": "Portrait", "paperSize": "A4"}}"#,
    )
    .unwrap();
    assert_eq!(opts.page.margins, Margins::default());
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", opts);
    convert(&req, &h.config).await.unwrap();

    let calls = h.tools.calls_to("renderer");
    let cover = renderer_call_for(&calls, "PDFCover.html");
    for side in ["top", "bottom", "left", "right"] {
        assert_eq!(arg_after(cover, &format!("--margin-{side}")), Some("0mm"));
    }

    let content = renderer_call_for(&calls, "PDFContent.html");
    assert!(!content.args.iter().any(|a| a.starts_with("--margin-")));
}

#[tokio::test]
async fn cover_ignored_without_flag() {
    let h = harness(ScriptedTools::new());
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", scenario_options());

    let out = convert(&req, &h.config).await.unwrap();
    assert_eq!(h.tools.calls_to("renderer").len(), 1);
    assert!(!out.stats.had_cover_page);
}

#[tokio::test]
async fn undecodable_cover_is_skipped_not_fatal() {
    let h = harness(ScriptedTools::new());
    let mut req = request(None, "<p>Body</p>", scenario_options());
    req.options.has_cover_page = true;
    req.cover_page = Some("%%% not base64 %%%".into());

    let out = convert(&req, &h.config).await.unwrap();
    assert_eq!(h.tools.calls_to("renderer").len(), 1);
    assert!(out
        .stage_errors
        .iter()
        .any(|e| matches!(e, StageError::CoverSkipped { .. })));
}

#[tokio::test]
async fn failed_extraction_uses_whole_cover() {
    let h = harness(ScriptedTools::new().failing("page extractor"));
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", opts);

    let out = convert(&req, &h.config).await.unwrap();
    let (_, body) = read_pdf(&out.result);
    assert_eq!(body, "PDF[PDFCover]PDF[PDFContent]");
    assert_eq!(out.stats.failed_invocations, 1);
}

#[tokio::test]
async fn failed_content_render_falls_back_to_cover() {
    let tools = ScriptedTools::new();
    let h = harness(tools);
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let req = request(Some("<h1>Cover</h1>"), "<p>Body</p>", opts);

    // Let only the cover render succeed.
    struct CoverOnly(Arc<ScriptedTools>);
    impl ToolRunner for CoverOnly {
        fn run<'a>(&'a self, inv: &'a ToolInvocation) -> BoxFuture<'a, ToolOutcome> {
            if inv.tool == "renderer" && inv.args.iter().any(|a| a.ends_with("PDFContent.html")) {
                return Box::pin(async {
                    ToolOutcome::Failed {
                        status: 1,
                        stderr: "content broke".into(),
                    }
                });
            }
            self.0.run(inv)
        }
    }
    let mut config = h.config.clone();
    config.runner = Arc::new(CoverOnly(h.tools.clone()));

    let out = convert(&req, &config).await.unwrap();
    let (_, body) = read_pdf(&out.result);
    assert_eq!(body, "P1:PDF[PDFCover]");
    assert!(h.tools.calls_to("merger").is_empty());
    assert!(out.stage_errors.iter().any(|e| matches!(
        e,
        StageError::MissingArtifact { stage, .. } if stage == "render-content"
    )));
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_page_pdf_gives_two_images_in_order() {
    let h = harness(ScriptedTools::new());
    let mut req = request(None, "<p>Hello</p>", scenario_options());
    req.convert_to_images = true;

    let out = convert(&req, &h.config).await.unwrap();
    let images = out.result.images().expect("image result");
    assert_eq!(images.len(), 2);
    for img in images {
        let b64 = img.strip_prefix("data:image/png;base64,").expect("data URI");
        let bytes = STANDARD.decode(b64).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
    assert_eq!(out.stats.page_images, 2);

    let raster = h.tools.calls_to("rasterizer");
    assert_eq!(raster.len(), 1);
    assert_eq!(raster[0].args[0], "-png");
    assert!(raster[0].args[1].ends_with("PDFFinal.pdf"));

    // the PDF stays in the workspace and is removed with it
    assert_eq!(std::fs::read_dir(h.output_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_rasterisation_falls_back_to_pdf() {
    let mut tools = ScriptedTools::new();
    tools.raster_pages = 0;
    let h = harness(tools);
    let mut opts = scenario_options();
    opts.render_to_images = true;
    let req = request(None, "<p>Hello</p>", opts);

    let out = convert(&req, &h.config).await.unwrap();
    assert!(out.result.pdf_path().is_some());
    assert!(out.stage_errors.iter().any(|e| matches!(
        e,
        StageError::MissingArtifact { stage, .. } if stage == "rasterize"
    )));
}

// ── Failure modes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn all_tools_missing_reports_no_output() {
    let h = harness(
        ScriptedTools::new()
            .missing("renderer")
            .missing("page extractor")
            .missing("merger")
            .missing("rasterizer"),
    );
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let mut req = request(Some("<h1>Cover</h1>"), "<p>Hello</p>", opts);
    req.convert_to_images = true;

    let err = convert(&req, &h.config).await.unwrap_err();
    match err {
        Html2PdfError::NoOutputProduced {
            invocations,
            failed_invocations,
        } => {
            // cover + content renders; nothing downstream has input
            assert_eq!(invocations, 2);
            assert_eq!(failed_invocations, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_dir(h.workspace_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_content_fails_before_any_tool() {
    let h = harness(ScriptedTools::new());
    let req = request(None, "", scenario_options());

    let err = convert(&req, &h.config).await.unwrap_err();
    assert!(matches!(err, Html2PdfError::MissingInput { .. }));
    assert_eq!(h.tools.total_calls(), 0);

    let err = convert_html(None, b"  \n", &ConversionOptions::default(), &h.config)
        .await
        .unwrap_err();
    assert!(matches!(err, Html2PdfError::MissingInput { .. }));
    assert_eq!(h.tools.total_calls(), 0);
}

#[tokio::test]
async fn invalid_content_base64_is_rejected() {
    let h = harness(ScriptedTools::new());
    let mut req = request(None, "x", scenario_options());
    req.html = "@@not-base64@@".into();

    let err = convert(&req, &h.config).await.unwrap_err();
    assert!(matches!(err, Html2PdfError::InvalidBase64 { .. }));
    assert_eq!(h.tools.total_calls(), 0);
}

// ── Workspace + output ───────────────────────────────────────────────────────

#[tokio::test]
async fn workspace_is_removed_after_success() {
    let h = harness(ScriptedTools::new());
    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let req = request(Some("<h1>Cover</h1>"), "<p>Hello</p>", opts);

    let out = convert(&req, &h.config).await.unwrap();
    assert_eq!(std::fs::read_dir(h.workspace_root.path()).unwrap().count(), 0);
    assert!(out.result.pdf_path().unwrap().exists());
}

#[tokio::test]
async fn convert_to_file_writes_target() {
    let h = harness(ScriptedTools::new());
    let mut req = request(None, "<p>Hello</p>", scenario_options());
    req.convert_to_images = true;
    let target = h.output_dir.path().join("nested/report.pdf");

    let stats = convert_to_file(&req, &target, &h.config).await.unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "PDF[PDFContent]");
    assert!(!target.with_extension("pdf.tmp").exists());
    assert!(h.tools.calls_to("rasterizer").is_empty());
    assert_eq!(stats.page_images, 0);
}

#[tokio::test]
async fn request_body_round_trip_from_json() {
    let h = harness(ScriptedTools::new());
    let body = serde_json::json!({
        "CoverPage": STANDARD.encode("<h1>Cover</h1>"),
        "HTML": STANDARD.encode("<p>Hello</p>"),
        "PDFOptions": {
            "coverpage": "oui",
            "grayscale": 1,
            "pdfCompression": "false",
            "header": {"center": "Report", "displayHeaderLine": "checked"}
        },
        "ConvertToImages": "no"
    })
    .to_string();
    let req = ConversionRequest::from_json(&body).unwrap();

    let out = convert(&req, &h.config).await.unwrap();
    assert!(out.result.pdf_path().is_some());

    let content = renderer_call_for(&h.tools.calls_to("renderer"), "PDFContent.html").clone();
    assert!(content.args.contains(&"--grayscale".to_string()));
    assert!(content.args.contains(&"--no-pdf-compression".to_string()));
    assert_eq!(arg_after(&content, "--header-center"), Some("Report"));
    assert!(content.args.contains(&"--header-line".to_string()));
    assert!(!content.args.iter().any(|a| a.contains("footer")));
    assert!(content.display.as_deref().unwrap().contains("--header-center='Report'"));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, stages: usize) {
        self.events.lock().unwrap().push(format!("start:{stages}"));
    }
    fn on_stage_complete(&self, stage: Stage, produced: bool) {
        self.events.lock().unwrap().push(format!("{stage}:{produced}"));
    }
    fn on_conversion_complete(&self, success: bool) {
        self.events.lock().unwrap().push(format!("done:{success}"));
    }
}

#[tokio::test]
async fn progress_reports_each_stage() {
    let h = harness(ScriptedTools::new());
    let recorder = Arc::new(Recorder::default());
    let mut config = h.config.clone();
    config.progress_callback = Some(recorder.clone());

    let mut opts = scenario_options();
    opts.has_cover_page = true;
    let mut req = request(Some("<h1>Cover</h1>"), "<p>Hello</p>", opts);
    req.convert_to_images = true;
    convert(&req, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start:5",
            "prepare-input:true",
            "render-cover:true",
            "render-content:true",
            "merge:true",
            "rasterize:true",
            "done:true",
        ]
    );
}
