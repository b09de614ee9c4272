//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use edgequake_html2pdf::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     produced: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, produced: bool) {
//!         if produced {
//!             self.produced.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("{stage} done (artifact: {produced})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     produced: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    PrepareInput,
    RenderCover,
    RenderContent,
    Merge,
    Rasterize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PrepareInput => "prepare-input",
            Stage::RenderCover => "render-cover",
            Stage::RenderContent => "render-content",
            Stage::Merge => "merge",
            Stage::Rasterize => "rasterize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the conversion pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run one after another, never concurrently.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the inputs were validated.
    ///
    /// # Arguments
    /// * `stages` — number of stages that will run for this request
    fn on_conversion_start(&self, stages: usize) {
        let _ = stages;
    }

    /// Called before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a stage finished.
    ///
    /// # Arguments
    /// * `stage`    — the stage that ran
    /// * `produced` — whether its expected artifact exists on disk
    fn on_stage_complete(&self, stage: Stage, produced: bool) {
        let _ = (stage, produced);
    }

    /// Called once at the end.
    ///
    /// # Arguments
    /// * `success` — whether a PDF or at least one page image was produced
    fn on_conversion_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
