//! Renderer invocation: one [`RenderJob`] per pass.
//!
//! The cover page and the content are rendered separately because the cover
//! has to bleed to the page edge: its pass forces every margin to zero and
//! uses a slightly larger zoom. The two passes run one after the other.
//!
//! In sandboxed mode the renderer is started through `docker run` with the
//! workspace mounted, and every workspace path on its command line is
//! rewritten to the mount point. A TOC stylesheet is bind-mounted read-only
//! at [`CONTAINER_TOC_XSL`].

use crate::config::{ConversionConfig, ExecutionMode};
use crate::flags::{FlagSet, RenderPass, RendererArgs};
use crate::pipeline::tool::{ToolInvocation, ToolOutcome};
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Where a TOC stylesheet from outside the workspace appears in the container.
pub const CONTAINER_TOC_XSL: &str = "/etc/html2pdf/toc.xsl";

/// A single renderer invocation. Built, run, and dropped.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pass: RenderPass,
}

impl RenderJob {
    pub fn cover(ws: &Workspace) -> Self {
        Self {
            input: ws.cover_html(),
            output: ws.cover_pdf(),
            pass: RenderPass::Cover,
        }
    }

    pub fn content(ws: &Workspace) -> Self {
        Self {
            input: ws.content_html(),
            output: ws.content_pdf(),
            pass: RenderPass::Content,
        }
    }

    /// Build the invocation for this job.
    pub fn invocation(
        &self,
        flags: &FlagSet,
        config: &ConversionConfig,
        ws: &Workspace,
    ) -> ToolInvocation {
        let args = RendererArgs::build(
            flags,
            self.pass,
            &self.input,
            &self.output,
            config.toc_xsl_path.as_deref(),
        );
        let timeout = config.tool_timeout_secs.map(Duration::from_secs);
        let renderer = &config.tools.renderer;

        match &config.sandbox {
            ExecutionMode::Native => ToolInvocation::new("renderer", renderer.as_str())
                .args(args.to_argv())
                .display(args.to_string())
                .timeout(timeout),
            ExecutionMode::Docker {
                docker,
                image,
                mount_point,
            } => {
                let mut prefix = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "-v".to_string(),
                    format!("{}:{}", ws.path().display(), mount_point),
                ];

                // The stylesheet lives outside the workspace; mount it on its own.
                let xsl_host = args
                    .toc
                    .as_ref()
                    .and_then(|toc| toc.get(2))
                    .filter(|p| !Path::new(p).starts_with(ws.path()))
                    .cloned();
                if let Some(host) = &xsl_host {
                    let host = std::path::absolute(host).unwrap_or_else(|_| PathBuf::from(host));
                    prefix.push("-v".to_string());
                    prefix.push(format!("{}:{}:ro", host.display(), CONTAINER_TOC_XSL));
                }
                prefix.push(image.clone());
                prefix.push(renderer.clone());

                let args = args.map_paths(|p| match &xsl_host {
                    Some(host) if host == p => CONTAINER_TOC_XSL.to_string(),
                    _ => ws.remap(p, mount_point),
                });
                ToolInvocation::new("renderer", docker.as_str())
                    .args(prefix.iter().cloned())
                    .args(args.to_argv())
                    .display(format!("{} {}", prefix.join(" "), args))
                    .timeout(timeout)
            }
        }
    }

    /// Run the renderer. Returns the outcome; the caller checks the output file.
    pub async fn run(
        &self,
        flags: &FlagSet,
        config: &ConversionConfig,
        ws: &Workspace,
    ) -> ToolOutcome {
        let inv = self.invocation(flags, config, ws);
        info!(
            "Rendering {:?} pass: {} → {}",
            self.pass,
            self.input.display(),
            self.output.display()
        );
        config.runner.run(&inv).await
    }
}
