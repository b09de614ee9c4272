//! CLI binary for edgequake-html2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use edgequake_html2pdf::{
    convert, convert_to_file, ConversionConfig, ConversionOptions, ConversionProgressCallback,
    ConversionRequest, ConversionResult, ExecutionMode, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner plus one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:20.green/238}] {pos}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            degraded: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, stages: usize) {
        self.bar.set_length(stages as u64);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting conversion ({stages} stages)…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        *self.started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage, produced: bool) {
        let elapsed_ms = self
            .started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        let mark = if produced {
            green("✓")
        } else {
            self.degraded.fetch_add(1, Ordering::SeqCst);
            red("✗")
        };
        self.bar.println(format!(
            "  {} {:<16}  {}",
            mark,
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, success: bool) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        match (success, degraded) {
            (true, 0) => eprintln!("{} conversion succeeded", green("✔")),
            (true, n) => eprintln!(
                "{} conversion succeeded  ({} stages without output)",
                cyan("⚠"),
                red(&n.to_string())
            ),
            (false, _) => eprintln!("{} conversion produced nothing", red("✘")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Content only, PDF path printed on stdout
  html2pdf report.html

  # Cover page + content, written to a file
  html2pdf report.html --cover cover.html -o report.pdf

  # Page options from a JSON file (same shape as PDFOptions)
  html2pdf report.html --options options.json -o report.pdf

  # Replay a request body as posted by the report viewer
  html2pdf --request body.json --json

  # One PNG per page, written into a directory
  html2pdf report.html --images -o pages/

  # Run the renderer inside a container
  html2pdf report.html --docker-image html2pdf-renderer -o report.pdf

OPTIONS JSON:
  {
    "coverpage": true,
    "page": {
      "orientation": "Landscape",
      "paperSize": "A4",
      "margins": { "top": 10, "bottom": 10, "left": 15, "right": 15 }
    },
    "header": { "center": "Quarterly report", "displayHeaderLine": "yes" },
    "footer": { "right": "[page]/[topage]" },
    "toc": true,
    "pdfCompression": false
  }

  Boolean fields accept 1, y, o, yes, true, oui, vrai, on, checked.

EXTERNAL TOOLS:
  wkhtmltopdf   renderer
  pdfseparate   page extractor (poppler-utils)
  pdfunite      merger         (poppler-utils)
  pdftoppm      rasterizer     (poppler-utils)
"#;

/// Convert HTML reports to PDF or per-page PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "html2pdf",
    version,
    about = "Convert HTML reports to PDF or per-page PNG images",
    long_about = "Convert HTML report fragments to a PDF (with an optional full-bleed cover page) \
or to one PNG per page, using wkhtmltopdf and poppler-utils.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Content HTML file.
    #[arg(required_unless_present = "request")]
    input: Option<PathBuf>,

    /// Cover page HTML file (rendered full-bleed, first page kept).
    #[arg(long, env = "HTML2PDF_COVER", conflicts_with = "request")]
    cover: Option<PathBuf>,

    /// JSON file with page options.
    #[arg(long, env = "HTML2PDF_OPTIONS", conflicts_with = "request")]
    options: Option<PathBuf>,

    /// JSON request body (CoverPage, HTML, PDFOptions, ConvertToImages).
    #[arg(long, env = "HTML2PDF_REQUEST")]
    request: Option<PathBuf>,

    /// Write the PDF to this file (or, with --images, PNGs into this directory).
    #[arg(short, long, env = "HTML2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Rasterise the final PDF to one PNG per page.
    #[arg(long, env = "HTML2PDF_IMAGES")]
    images: bool,

    /// Output structured JSON (ConversionOutput).
    #[arg(long, env = "HTML2PDF_JSON")]
    json: bool,

    /// Renderer program.
    #[arg(long, env = "HTML2PDF_RENDERER", default_value = "wkhtmltopdf")]
    renderer: String,

    /// Page extractor program.
    #[arg(long, env = "HTML2PDF_PAGE_EXTRACTOR", default_value = "pdfseparate")]
    page_extractor: String,

    /// Merger program.
    #[arg(long, env = "HTML2PDF_MERGER", default_value = "pdfunite")]
    merger: String,

    /// Rasterizer program.
    #[arg(long, env = "HTML2PDF_RASTERIZER", default_value = "pdftoppm")]
    rasterizer: String,

    /// XSL style sheet for the table of contents.
    #[arg(long, env = "HTML2PDF_TOC_XSL")]
    toc_xsl: Option<PathBuf>,

    /// Stylesheet URL or path to inline (repeatable; replaces the defaults).
    #[arg(long = "stylesheet", env = "HTML2PDF_STYLESHEETS", value_delimiter = ',')]
    stylesheets: Vec<String>,

    /// Inline no stylesheets at all.
    #[arg(long, conflicts_with = "stylesheets")]
    no_stylesheets: bool,

    /// Run the renderer inside this Docker image.
    #[arg(long, env = "HTML2PDF_DOCKER_IMAGE")]
    docker_image: Option<String>,

    /// Directory for the per-conversion workspace.
    #[arg(long, env = "HTML2PDF_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Kill any tool that runs longer than this many seconds.
    #[arg(long, env = "HTML2PDF_TOOL_TIMEOUT")]
    tool_timeout: Option<u64>,

    /// Leave the workspace on disk after the run.
    #[arg(long, env = "HTML2PDF_KEEP_WORKSPACE")]
    keep_workspace: bool,

    /// Disable progress output.
    #[arg(long, env = "HTML2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request + config ───────────────────────────────────────────
    let request = build_request(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let wants_images = request.convert_to_images || request.options.render_to_images;

    // ── Run conversion ───────────────────────────────────────────────────
    if let (Some(output_path), false) = (&cli.output, wants_images) {
        let stats = convert_to_file(&request, output_path, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} tool runs ({} failed)  {}ms  →  {}",
                if stats.failed_invocations == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.tool_invocations,
                stats.failed_invocations,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = convert(&request, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        match (&output.result, &cli.output) {
            (ConversionResult::Images(pages), Some(dir)) => {
                let written = write_pages(pages, dir).await?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} pages  →  {}",
                        green("✔"),
                        written,
                        bold(&dir.display().to_string())
                    );
                }
            }
            (ConversionResult::Images(pages), None) => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                for page in pages {
                    writeln!(handle, "{page}").context("Failed to write to stdout")?;
                }
            }
            (ConversionResult::Pdf(path), Some(dir)) if wants_images => {
                let placed = copy_pdf_into(path, dir).await?;
                if !cli.quiet {
                    eprintln!(
                        "{} rasterisation produced nothing, PDF written to {}",
                        cyan("⚠"),
                        bold(&dir.display().to_string())
                    );
                }
                println!("{}", placed.display());
            }
            (ConversionResult::Pdf(path), _) => {
                if wants_images && !cli.quiet {
                    eprintln!("{} rasterisation produced nothing, returning the PDF", cyan("⚠"));
                }
                println!("{}", path.display());
            }
        }
    }

    if !cli.quiet && !cli.json {
        for err in &output.stage_errors {
            eprintln!("  {} {}", cyan("⚠"), dim(&err.to_string()));
        }
        if !show_progress {
            eprintln!(
                "Converted in {}ms ({} tool runs, {} failed)",
                output.stats.total_duration_ms,
                output.stats.tool_invocations,
                output.stats.failed_invocations
            );
        }
    }

    Ok(())
}

/// Read the request body, or assemble one from the HTML files.
async fn build_request(cli: &Cli) -> Result<ConversionRequest> {
    let mut request = if let Some(ref path) = cli.request {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request from {:?}", path))?;
        ConversionRequest::from_json(&body).context("Invalid request body")?
    } else {
        let input = cli
            .input
            .as_ref()
            .context("Either an input HTML file or --request is required")?;
        let options = match cli.options {
            Some(ref path) => read_options(path).await?,
            None => ConversionOptions::default(),
        };
        let mut request = ConversionRequest {
            html: STANDARD.encode(read_file(input, "content HTML").await?),
            options,
            ..Default::default()
        };
        if let Some(ref cover) = cli.cover {
            request.cover_page = Some(STANDARD.encode(read_file(cover, "cover HTML").await?));
            request.options.has_cover_page = true;
        }
        request
    };

    if cli.images {
        request.convert_to_images = true;
    }
    Ok(request)
}

async fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {what} from {:?}", path))
}

async fn read_options(path: &Path) -> Result<ConversionOptions> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read options from {:?}", path))?;
    serde_json::from_str(&body).with_context(|| format!("Invalid options JSON in {:?}", path))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .renderer(cli.renderer.as_str())
        .page_extractor(cli.page_extractor.as_str())
        .merger(cli.merger.as_str())
        .rasterizer(cli.rasterizer.as_str())
        .keep_workspace(cli.keep_workspace);

    if cli.no_stylesheets {
        builder = builder.stylesheets(Vec::<String>::new());
    } else if !cli.stylesheets.is_empty() {
        builder = builder.stylesheets(cli.stylesheets.clone());
    }
    if let Some(ref xsl) = cli.toc_xsl {
        builder = builder.toc_xsl_path(xsl);
    }
    if let Some(ref image) = cli.docker_image {
        builder = builder.sandbox(ExecutionMode::docker(image.as_str()));
    }
    if let Some(ref dir) = cli.workspace {
        builder = builder.workspace_root(dir);
    }
    if let Some(secs) = cli.tool_timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Decode page data-URIs into `dir/page-<n>.png`.
async fn write_pages(pages: &[String], dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;

    let width = pages.len().to_string().len();
    for (i, page) in pages.iter().enumerate() {
        let b64 = page
            .split_once(',')
            .map(|(_, data)| data)
            .context("Page image is not a data URI")?;
        let bytes = STANDARD.decode(b64).context("Page image is not valid base64")?;
        let path = dir.join(format!("page-{:0width$}.png", i + 1));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    Ok(pages.len())
}

/// Copy a PDF into `dir`, keeping its file name.
async fn copy_pdf_into(pdf: &Path, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;
    let name = pdf
        .file_name()
        .with_context(|| format!("PDF path has no file name: {:?}", pdf))?;
    let target = dir.join(name);
    tokio::fs::copy(pdf, &target)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", pdf, target))?;
    Ok(target)
}
