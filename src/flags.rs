//! Option translation: [`ConversionOptions`] → renderer flags → argv.
//!
//! [`translate`] is total. It never fails; anything it cannot express is
//! simply left out so the renderer falls back to its own default.
//!
//! Turning a [`FlagSet`] into a command line is a separate step because the
//! renderer cares about *where* a flag sits: global options must come before
//! the input file, page options after it. The same flag set is rendered
//! twice per conversion, once for the cover pass (margins forced to zero,
//! zoom 1.25) and once for the content pass.

use std::fmt;
use std::path::Path;

use crate::options::{ConversionOptions, HeaderFooter, PaperSize};

/// Zoom applied to the content pass.
pub const CONTENT_ZOOM: f64 = 1.2;

/// Zoom applied to the cover pass.
pub const COVER_ZOOM: f64 = 1.25;

/// Pseudo-flag that requests a table of contents page object.
pub const TOC_FLAG: &str = "toc";

/// Renderer options that must precede the input file.
const GLOBAL_FLAGS: &[&str] = &[
    "collate", "no-collate", "cookie-jar", "copies", "dpi", "extended-help", "grayscale",
    "help", "htmldoc", "image-dpi", "image-quality", "license", "log-level", "lowquality",
    "manpage", "margin-bottom", "margin-left", "margin-right", "margin-top", "orientation",
    "page-height", "page-size", "page-width", "no-pdf-compression", "quiet",
    "read-args-from-stdin", "readme", "title", "use-xserver", "version",
    // outline options are global in the renderer's grammar
    "dump-default-toc-xsl", "dump-outline", "outline", "no-outline", "outline-depth",
];

/// Renderer options that follow the input file.
const PAGE_FLAGS: &[&str] = &[
    "allow", "background", "no-background", "bypass-proxy-for", "cache-dir",
    "checkbox-checked-svg", "checkbox-svg", "cookie", "custom-header",
    "custom-header-propagation", "no-custom-header-propagation", "debug-javascript",
    "no-debug-javascript", "default-header", "encoding", "disable-external-links",
    "enable-external-links", "disable-forms", "enable-forms", "images", "no-images",
    "disable-internal-links", "enable-internal-links", "disable-javascript",
    "enable-javascript", "javascript-delay", "keep-relative-links", "load-error-handling",
    "load-media-error-handling", "disable-local-file-access", "enable-local-file-access",
    "minimum-font-size", "exclude-from-outline", "include-in-outline", "page-offset",
    "password", "disable-plugins", "enable-plugins", "post", "post-file", "print-media-type",
    "no-print-media-type", "proxy", "proxy-hostname-lookup", "radiobutton-checked-svg",
    "radiobutton-svg", "resolve-relative-links", "run-script", "disable-smart-shrinking",
    "enable-smart-shrinking", "ssl-crt-path", "ssl-key-password", "ssl-key-path",
    "stop-slow-scripts", "no-stop-slow-scripts", "disable-toc-back-links",
    "enable-toc-back-links", "user-style-sheet", "username", "viewport-size",
    "window-status", "zoom",
];

/// Flags whose value is free text, shown quoted and dropped when empty.
const TEXT_FLAGS: &[&str] = &[
    "header-left", "header-center", "header-right",
    "footer-left", "footer-center", "footer-right",
];

/// Flags that carry a length in millimetres.
const SIZE_FLAGS: &[&str] = &[
    "page-width", "page-height", "margin-top", "margin-bottom", "margin-left", "margin-right",
];

const MARGIN_FLAGS: &[&str] = &["margin-top", "margin-bottom", "margin-left", "margin-right"];

/// Where a flag goes relative to the input file argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagScope {
    Global,
    Page,
}

impl FlagScope {
    /// Scope of a flag name. Unknown names are page options; a name listed
    /// as both is global.
    pub fn of(name: &str) -> Self {
        if GLOBAL_FLAGS.contains(&name) {
            FlagScope::Global
        } else {
            FlagScope::Page
        }
    }
}

/// Value attached to a flag.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    /// Bare switch. `false` is still emitted: negative switches carry their
    /// meaning in the name (`no-outline`).
    Switch(bool),
    Text(String),
    Number(f64),
    Millimeters(f64),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Switch(b) => write!(f, "{b}"),
            FlagValue::Text(s) => f.write_str(s),
            FlagValue::Number(n) | FlagValue::Millimeters(n) => write!(f, "{n}"),
        }
    }
}

/// Ordered, name-unique collection of renderer flags.
///
/// Setting a name that already exists replaces its value in place, so the
/// first insertion fixes the position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSet {
    entries: Vec<(String, FlagValue)>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: FlagValue) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn switch(&mut self, name: &str) -> &mut Self {
        self.set(name, FlagValue::Switch(true))
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set(name, FlagValue::Text(value.into()))
    }

    pub fn number(&mut self, name: &str, value: f64) -> &mut Self {
        self.set(name, FlagValue::Number(value))
    }

    pub fn millimeters(&mut self, name: &str, value: f64) -> &mut Self {
        self.set(name, FlagValue::Millimeters(value))
    }

    pub fn remove(&mut self, name: &str) -> Option<FlagValue> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the table-of-contents pseudo-flag is present.
    pub fn wants_toc(&self) -> bool {
        self.contains(TOC_FLAG)
    }
}

/// Map export options onto renderer flags.
pub fn translate(options: &ConversionOptions) -> FlagSet {
    let mut flags = FlagSet::new();

    flags.switch("print-media-type");
    flags.number("zoom", CONTENT_ZOOM);

    let page = &options.page;
    if !page.orientation.trim().is_empty() {
        flags.text("orientation", page.orientation.trim());
    }
    match &page.paper {
        PaperSize::Named(name) => {
            if !name.trim().is_empty() {
                flags.text("page-size", name.trim());
            }
        }
        PaperSize::Custom { width, height } => {
            if let Some(w) = width {
                flags.millimeters("page-width", *w);
            }
            if let Some(h) = height {
                flags.millimeters("page-height", *h);
            }
        }
    }

    let m = &page.margins;
    for (name, value) in [
        ("margin-top", m.top),
        ("margin-bottom", m.bottom),
        ("margin-left", m.left),
        ("margin-right", m.right),
    ] {
        if let Some(v) = value {
            flags.millimeters(name, v);
        }
    }

    if options.grayscale {
        flags.switch("grayscale");
    }
    if !options.compression_enabled {
        flags.switch("no-pdf-compression");
    }
    flags.switch(if options.outline { "outline" } else { "no-outline" });
    flags.switch(if options.background_graphics {
        "background"
    } else {
        "no-background"
    });

    band_flags(&mut flags, "header", &options.header);
    band_flags(&mut flags, "footer", &options.footer);

    if options.table_of_contents {
        flags.switch(TOC_FLAG);
    }

    flags
}

fn band_flags(flags: &mut FlagSet, band: &str, hf: &HeaderFooter) {
    if !hf.has_text() {
        return;
    }
    for (slot, text) in [("left", &hf.left), ("center", &hf.center), ("right", &hf.right)] {
        if !text.is_empty() {
            flags.text(&format!("{band}-{slot}"), text.as_str());
        }
    }
    let line = if hf.show_line {
        format!("{band}-line")
    } else {
        format!("no-{band}-line")
    };
    flags.switch(&line);
}

// ── Command-line rendering ───────────────────────────────────────────────

/// Which renderer pass a command line is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// Cover page: zero margins, zoom [`COVER_ZOOM`].
    Cover,
    /// Main content: configured margins and zoom.
    Content,
}

/// One rendered flag: a name and an optional value token.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub value: Option<String>,
    /// Shown as `--name='value'` in logs.
    pub quoted: bool,
}

impl Arg {
    /// Tokens handed to the process.
    pub fn tokens(&self) -> Vec<String> {
        let mut out = vec![format!("--{}", self.name)];
        if let Some(v) = &self.value {
            out.push(v.clone());
        }
        out
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.quoted) {
            (None, _) => write!(f, "--{}", self.name),
            (Some(v), true) => write!(f, "--{}='{}'", self.name, v),
            (Some(v), false) => write!(f, "--{} {}", self.name, v),
        }
    }
}

/// Render the flags belonging to `scope` for the given pass.
///
/// The cover pass always carries all four margins at zero, whether or not
/// the set names them.
pub fn render_scope(flags: &FlagSet, scope: FlagScope, pass: RenderPass) -> Vec<Arg> {
    let mut flags = flags.clone();
    if pass == RenderPass::Cover {
        for margin in MARGIN_FLAGS {
            flags.millimeters(margin, 0.0);
        }
    }
    flags
        .iter()
        .filter(|(name, _)| *name != TOC_FLAG && FlagScope::of(name) == scope)
        .filter_map(|(name, value)| render_flag(name, value, pass))
        .collect()
}

fn render_flag(name: &str, value: &FlagValue, pass: RenderPass) -> Option<Arg> {
    let mut value = value.clone();
    if pass == RenderPass::Cover && name == "zoom" {
        value = FlagValue::Number(COVER_ZOOM);
    }

    if let FlagValue::Switch(_) = value {
        return Some(Arg {
            name: name.to_string(),
            value: None,
            quoted: false,
        });
    }

    if TEXT_FLAGS.contains(&name) {
        let text = value.to_string();
        if text.is_empty() {
            return None;
        }
        return Some(Arg {
            name: name.to_string(),
            value: Some(text),
            quoted: true,
        });
    }

    let mut rendered = value.to_string();
    if SIZE_FLAGS.contains(&name) || matches!(value, FlagValue::Millimeters(_)) {
        rendered.push_str("mm");
    }
    Some(Arg {
        name: name.to_string(),
        value: Some(rendered),
        quoted: false,
    })
}

/// Full argument list for one renderer invocation:
/// `[global] [toc …] <input> [page] <output>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererArgs {
    pub global: Vec<Arg>,
    /// `toc [--xsl-style-sheet <path>]` page object, content pass only.
    pub toc: Option<Vec<String>>,
    pub input: String,
    pub page: Vec<Arg>,
    pub output: String,
}

impl RendererArgs {
    pub fn build(
        flags: &FlagSet,
        pass: RenderPass,
        input: &Path,
        output: &Path,
        toc_xsl: Option<&Path>,
    ) -> Self {
        let toc = (pass == RenderPass::Content && flags.wants_toc()).then(|| {
            let mut t = vec![TOC_FLAG.to_string()];
            if let Some(xsl) = toc_xsl {
                t.push("--xsl-style-sheet".to_string());
                t.push(xsl.display().to_string());
            }
            t
        });
        Self {
            global: render_scope(flags, FlagScope::Global, pass),
            toc,
            input: input.display().to_string(),
            page: render_scope(flags, FlagScope::Page, pass),
            output: output.display().to_string(),
        }
    }

    /// Process argv (program name excluded).
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv: Vec<String> = self.global.iter().flat_map(Arg::tokens).collect();
        if let Some(toc) = &self.toc {
            argv.extend(toc.iter().cloned());
        }
        argv.push(self.input.clone());
        argv.extend(self.page.iter().flat_map(Arg::tokens));
        argv.push(self.output.clone());
        argv
    }

    /// Rewrite the input/output paths (sandboxed execution).
    pub fn map_paths(mut self, f: impl Fn(&str) -> String) -> Self {
        self.input = f(&self.input);
        self.output = f(&self.output);
        if let Some(toc) = self.toc.as_mut() {
            if toc.len() == 3 {
                toc[2] = f(&toc[2]);
            }
        }
        self
    }
}

impl fmt::Display for RendererArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.global.iter().map(Arg::to_string).collect();
        if let Some(toc) = &self.toc {
            parts.push(toc.join(" "));
        }
        parts.push(self.input.clone());
        parts.extend(self.page.iter().map(Arg::to_string));
        parts.push(self.output.clone());
        f.write_str(&parts.join(" "))
    }
}
