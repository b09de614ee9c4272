//! Configuration for the HTML-to-PDF pipeline.
//!
//! [`ConversionConfig`] describes the *environment* a conversion runs in:
//! which binaries to call, where temporary files live, which stylesheets the
//! page shell inlines, and whether the renderer runs inside a container.
//! What the document should look like travels separately, in
//! [`crate::options::ConversionOptions`].
//!
//! Built via [`ConversionConfig::builder()`], same as the rest of the
//! edgequake crates.

use crate::error::Html2PdfError;
use crate::pipeline::tool::{ProcessRunner, ToolRunner};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Stylesheets inlined into every page shell by default.
pub const DEFAULT_STYLESHEETS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/bootstrap@5.2.3/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/gh/metadocx/reporting@latest/dist/metadocx.min.css",
];

/// Configuration for an HTML-to-PDF conversion.
///
/// # Example
/// ```rust
/// use edgequake_html2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .renderer("/usr/local/bin/wkhtmltopdf")
///     .stylesheets(Vec::<String>::new())
///     .tool_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// External binaries.
    pub tools: ToolPaths,

    /// Stylesheet URLs or local paths inlined into the page shell, in order.
    /// One that cannot be loaded is skipped with a warning.
    pub stylesheets: Vec<String>,

    /// XSL style sheet passed with the `toc` page object.
    pub toc_xsl_path: Option<PathBuf>,

    /// Parent directory of each per-conversion workspace. Default: system temp dir.
    pub workspace_root: PathBuf,

    /// Directory the final PDF is moved into. Default: system temp dir.
    pub output_dir: PathBuf,

    /// Native or containerised renderer execution.
    pub sandbox: ExecutionMode,

    /// Timeout for fetching one remote stylesheet. Default: 30.
    pub stylesheet_timeout_secs: u64,

    /// Kill an external tool after this many seconds. Default: `None`.
    ///
    /// Without a timeout a hung tool hangs the whole conversion.
    pub tool_timeout_secs: Option<u64>,

    /// Leave the workspace on disk after the run (debugging).
    pub keep_workspace: bool,

    /// Executes tool invocations. Default: [`ProcessRunner`].
    pub runner: Arc<dyn ToolRunner>,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            stylesheets: DEFAULT_STYLESHEETS.iter().map(|s| s.to_string()).collect(),
            toc_xsl_path: None,
            workspace_root: std::env::temp_dir(),
            output_dir: std::env::temp_dir(),
            sandbox: ExecutionMode::Native,
            stylesheet_timeout_secs: 30,
            tool_timeout_secs: None,
            keep_workspace: false,
            runner: Arc::new(ProcessRunner),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("tools", &self.tools)
            .field("stylesheets", &self.stylesheets)
            .field("toc_xsl_path", &self.toc_xsl_path)
            .field("workspace_root", &self.workspace_root)
            .field("output_dir", &self.output_dir)
            .field("sandbox", &self.sandbox)
            .field("stylesheet_timeout_secs", &self.stylesheet_timeout_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("keep_workspace", &self.keep_workspace)
            .field("runner", &"<dyn ToolRunner>")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Program names (or paths) of the four external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// HTML → PDF renderer. Default: `wkhtmltopdf`.
    pub renderer: String,
    /// Single-page extractor, called as `-f 1 -l 1 <in> <out>`. Default: `pdfseparate`.
    pub page_extractor: String,
    /// PDF concatenation, called as `<in>... <out>`. Default: `pdfunite`.
    pub merger: String,
    /// PDF → PNG, called as `-png <in> <prefix>`. Default: `pdftoppm`.
    pub rasterizer: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            renderer: "wkhtmltopdf".into(),
            page_extractor: "pdfseparate".into(),
            merger: "pdfunite".into(),
            rasterizer: "pdftoppm".into(),
        }
    }
}

/// How the renderer is launched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Run the renderer directly on the host.
    #[default]
    Native,
    /// Run the renderer in a throwaway container with the workspace mounted.
    Docker {
        /// Docker executable. Usually `docker`.
        docker: String,
        /// Image that provides the renderer.
        image: String,
        /// Where the workspace is mounted inside the container.
        mount_point: String,
    },
}

impl ExecutionMode {
    /// Docker sandbox with the conventional `/tmp/data` mount.
    pub fn docker(image: impl Into<String>) -> Self {
        ExecutionMode::Docker {
            docker: "docker".into(),
            image: image.into(),
            mount_point: "/tmp/data".into(),
        }
    }

    pub fn is_sandboxed(&self) -> bool {
        matches!(self, ExecutionMode::Docker { .. })
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn renderer(mut self, program: impl Into<String>) -> Self {
        self.config.tools.renderer = program.into();
        self
    }

    pub fn page_extractor(mut self, program: impl Into<String>) -> Self {
        self.config.tools.page_extractor = program.into();
        self
    }

    pub fn merger(mut self, program: impl Into<String>) -> Self {
        self.config.tools.merger = program.into();
        self
    }

    pub fn rasterizer(mut self, program: impl Into<String>) -> Self {
        self.config.tools.rasterizer = program.into();
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn stylesheets<S: Into<String>>(mut self, sheets: impl IntoIterator<Item = S>) -> Self {
        self.config.stylesheets = sheets.into_iter().map(Into::into).collect();
        self
    }

    pub fn toc_xsl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.toc_xsl_path = Some(path.into());
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn sandbox(mut self, mode: ExecutionMode) -> Self {
        self.config.sandbox = mode;
        self
    }

    pub fn stylesheet_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stylesheet_timeout_secs = secs.max(1);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = Some(secs);
        self
    }

    pub fn keep_workspace(mut self, v: bool) -> Self {
        self.config.keep_workspace = v;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.config.runner = runner;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Html2PdfError> {
        let c = &self.config;
        for (what, program) in [
            ("renderer", &c.tools.renderer),
            ("page extractor", &c.tools.page_extractor),
            ("merger", &c.tools.merger),
            ("rasterizer", &c.tools.rasterizer),
        ] {
            if program.trim().is_empty() {
                return Err(Html2PdfError::InvalidConfig(format!(
                    "{what} program must not be empty"
                )));
            }
        }
        if c.tool_timeout_secs == Some(0) {
            return Err(Html2PdfError::InvalidConfig(
                "Tool timeout must be ≥ 1s".into(),
            ));
        }
        if let ExecutionMode::Docker {
            image, mount_point, ..
        } = &c.sandbox
        {
            if image.trim().is_empty() {
                return Err(Html2PdfError::InvalidConfig(
                    "Docker sandbox needs an image".into(),
                ));
            }
            if !mount_point.starts_with('/') {
                return Err(Html2PdfError::InvalidConfig(format!(
                    "Docker mount point must be absolute, got '{mount_point}'"
                )));
            }
        }
        Ok(self.config)
    }
}
