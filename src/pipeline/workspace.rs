//! Per-conversion workspace: one exclusive temporary directory.
//!
//! Every intermediate file of a run (HTML shells, cover/content PDFs, the
//! merged PDF, rasterised pages) lives inside a [`tempfile::TempDir`] with a
//! random, unique name. Concurrent conversions therefore never share a path,
//! and dropping the [`Workspace`] removes everything, whichever stage the run
//! stopped at. The final PDF is moved out with [`Workspace::persist`] before
//! that happens.

use crate::error::Html2PdfError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of workspace directories and persisted PDFs.
pub const WORKSPACE_PREFIX: &str = "PDF";

/// Prefix handed to the rasterizer; pages come back as `<prefix>-<n>.png`.
pub const PAGE_IMAGE_PREFIX: &str = "PDF";

/// Owns the temporary directory of one conversion.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    keep: bool,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create(root: &Path, keep: bool) -> Result<Self, Html2PdfError> {
        std::fs::create_dir_all(root).map_err(|source| Html2PdfError::WorkspaceFailed {
            root: root.to_path_buf(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|source| Html2PdfError::WorkspaceFailed {
                root: root.to_path_buf(),
                source,
            })?;
        debug!("Workspace created: {}", dir.path().display());
        Ok(Self { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cover_html(&self) -> PathBuf {
        self.path().join("PDFCover.html")
    }

    pub fn content_html(&self) -> PathBuf {
        self.path().join("PDFContent.html")
    }

    pub fn cover_pdf(&self) -> PathBuf {
        self.path().join("PDFCover.pdf")
    }

    /// First page of the cover render.
    pub fn cover_first_page_pdf(&self) -> PathBuf {
        self.path().join("PDFCover.pdf.p1.pdf")
    }

    pub fn content_pdf(&self) -> PathBuf {
        self.path().join("PDFContent.pdf")
    }

    pub fn final_pdf(&self) -> PathBuf {
        self.path().join("PDFFinal.pdf")
    }

    /// Filename prefix for rasterised pages.
    pub fn page_image_prefix(&self) -> PathBuf {
        self.path().join(PAGE_IMAGE_PREFIX)
    }

    /// Map a workspace path to where it appears under `mount_point`.
    /// Paths outside the workspace are returned unchanged.
    pub fn remap(&self, path: &str, mount_point: &str) -> String {
        match Path::new(path).strip_prefix(self.path()) {
            Ok(rel) => Path::new(mount_point).join(rel).display().to_string(),
            Err(_) => path.to_string(),
        }
    }

    /// Move `file` out of the workspace into `dest_dir` under a unique name
    /// and return the new path. The caller owns the result.
    pub async fn persist(&self, file: &Path, dest_dir: &Path) -> Result<PathBuf, Html2PdfError> {
        let write_err = |path: &Path, source: std::io::Error| Html2PdfError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| write_err(dest_dir, e))?;

        // Reserve a unique name, then replace the placeholder.
        let target = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .suffix(".pdf")
            .tempfile_in(dest_dir)
            .map_err(|e| write_err(dest_dir, e))?
            .into_temp_path()
            .keep()
            .map_err(|e| write_err(dest_dir, e.error))?;

        if tokio::fs::rename(file, &target).await.is_err() {
            // Different filesystem: fall back to copy.
            tokio::fs::copy(file, &target)
                .await
                .map_err(|e| write_err(&target, e))?;
        }
        debug!("Persisted {} → {}", file.display(), target.display());
        Ok(target)
    }

    /// Release the directory. Removal errors are logged, not returned.
    pub fn close(self) {
        if self.keep {
            let path = self.dir.keep();
            debug!("Workspace kept at {}", path.display());
            return;
        }
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}
