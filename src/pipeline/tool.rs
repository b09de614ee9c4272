//! External tool execution.
//!
//! Every subprocess the pipeline starts goes through a [`ToolRunner`]. The
//! default [`ProcessRunner`] spawns the program with `tokio::process`, passing
//! the argument vector directly (no shell). Tests swap in a scripted runner
//! that emulates the tools on disk.
//!
//! A runner never returns an error: a tool that is missing, crashes or exits
//! non-zero is reported through [`ToolOutcome`] and the pipeline decides what
//! to do from the files it finds afterwards.

use futures::future::BoxFuture;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StageError;

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Logical name used in logs and errors (`renderer`, `merger`, …).
    pub tool: &'static str,
    pub program: String,
    pub args: Vec<String>,
    /// Human-readable command line for logs. Defaults to program + args.
    pub display: Option<String>,
    /// Kill the process after this long.
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(tool: &'static str, program: impl Into<String>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            display: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display {
            Some(d) => write!(f, "{} {}", self.program, d),
            None => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// What happened when a tool ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Exit status 0.
    Success,
    /// Non-zero exit, or killed by a signal (`status` = -1).
    Failed { status: i32, stderr: String },
    /// Could not be spawned.
    NotFound { detail: String },
    TimedOut { secs: u64 },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success)
    }

    /// The non-fatal error to record, if any.
    pub fn stage_error(&self, tool: &str) -> Option<StageError> {
        match self {
            ToolOutcome::Success => None,
            ToolOutcome::Failed { status, stderr } => Some(StageError::ToolFailed {
                tool: tool.to_string(),
                status: *status,
                stderr: stderr.clone(),
            }),
            ToolOutcome::NotFound { detail } => Some(StageError::ToolNotFound {
                tool: tool.to_string(),
                detail: detail.clone(),
            }),
            ToolOutcome::TimedOut { secs } => Some(StageError::ToolTimedOut {
                tool: tool.to_string(),
                secs: *secs,
            }),
        }
    }
}

/// Executes external tool invocations.
pub trait ToolRunner: Send + Sync {
    fn run<'a>(&'a self, invocation: &'a ToolInvocation) -> BoxFuture<'a, ToolOutcome>;
}

/// Runs tools as real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run<'a>(&'a self, invocation: &'a ToolInvocation) -> BoxFuture<'a, ToolOutcome> {
        Box::pin(run_process(invocation))
    }
}

/// Longest stderr excerpt kept in a [`ToolOutcome::Failed`].
const STDERR_EXCERPT: usize = 2000;

async fn run_process(inv: &ToolInvocation) -> ToolOutcome {
    debug!("{}", inv);

    let mut cmd = tokio::process::Command::new(&inv.program);
    cmd.args(&inv.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("{} could not be started ({}): {}", inv.tool, inv.program, e);
            return ToolOutcome::NotFound {
                detail: e.to_string(),
            };
        }
    };

    let output = match inv.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(res) => res,
            Err(_) => {
                // Dropping the future kills the child (kill_on_drop).
                warn!("{} timed out after {}s", inv.tool, limit.as_secs());
                return ToolOutcome::TimedOut {
                    secs: limit.as_secs(),
                };
            }
        },
        None => child.wait_with_output().await,
    };

    match output {
        Ok(out) if out.status.success() => ToolOutcome::Success,
        Ok(out) => {
            let status = out.status.code().unwrap_or(-1);
            let mut stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            if stderr.len() > STDERR_EXCERPT {
                let mut cut = STDERR_EXCERPT;
                while !stderr.is_char_boundary(cut) {
                    cut -= 1;
                }
                stderr.truncate(cut);
                stderr.push('…');
            }
            warn!("{} exited with status {}", inv.tool, status);
            ToolOutcome::Failed { status, stderr }
        }
        Err(e) => {
            warn!("{} failed while running: {}", inv.tool, e);
            ToolOutcome::Failed {
                status: -1,
                stderr: e.to_string(),
            }
        }
    }
}
