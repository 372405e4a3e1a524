//! Scratch directory lifecycle and scoped staging of transient artifacts.
//!
//! ## Why a guard type?
//!
//! Every HTML payload and every PDF buffer handed to a backend is first
//! written to a file in the scratch directory. [`StagedArtifact`] owns that
//! file: it is removed when the guard is released or dropped, whichever comes
//! first, including on early `?` returns and panics. Removal failures are
//! logged and swallowed so they never replace the outcome of the conversion
//! that used the file.

use crate::error::PdftikError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tracing::{debug, warn};

/// The shared directory in which artifacts are staged.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and prove it is writable.
    ///
    /// Idempotent. The probe file has a unique name so concurrent callers
    /// never delete each other's probe.
    pub async fn ensure(&self) -> Result<PathBuf, PdftikError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.storage_error(e))?;

        let dir = self.dir.clone();
        let probe = tokio::task::spawn_blocking(move || -> io::Result<()> {
            let file = tempfile::Builder::new()
                .prefix(".probe-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            file.close()
        })
        .await
        .map_err(|e| PdftikError::Internal(format!("Probe task panicked: {e}")))?;
        probe.map_err(|e| self.storage_error(e))?;

        debug!("Scratch space ready: {}", self.dir.display());
        Ok(self.dir.clone())
    }

    /// Recursively remove the scratch directory.
    ///
    /// A missing directory counts as success. Any other failure is logged,
    /// never returned: teardown usually runs during shutdown.
    pub async fn teardown(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!("Removed scratch space {}", self.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cleanup of {} failed: {}", self.dir.display(), e),
        }
    }

    /// Write `bytes` to a fresh, uniquely named file.
    ///
    /// The name is `temp_<unix-millis>_<position>_<random><extension>`.
    pub async fn stage(
        &self,
        position: usize,
        extension: &str,
        bytes: &[u8],
    ) -> Result<StagedArtifact, PdftikError> {
        let prefix = format!("temp_{}_{}_", unix_millis(), position);
        let pattern = self.dir.join(format!("{prefix}*{extension}"));

        let dir = self.dir.clone();
        let suffix = extension.to_string();
        let created = tokio::task::spawn_blocking(move || -> io::Result<TempPath> {
            let file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| PdftikError::Internal(format!("Staging task panicked: {e}")))?;
        let temp = created.map_err(|e| PdftikError::Stage {
            path: pattern,
            source: e,
        })?;

        // From here on the guard removes the file on every exit path.
        let artifact = StagedArtifact::new(temp);

        tokio::fs::write(artifact.path(), bytes)
            .await
            .map_err(|e| PdftikError::Stage {
                path: artifact.path().to_path_buf(),
                source: e,
            })?;

        debug!("Staged {} ({} bytes)", artifact.path().display(), bytes.len());
        Ok(artifact)
    }

    fn storage_error(&self, source: io::Error) -> PdftikError {
        PdftikError::Storage {
            path: self.dir.clone(),
            source,
        }
    }
}

/// A staged file, exclusively owned by one conversion call.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    guard: Option<TempPath>,
}

impl StagedArtifact {
    fn new(guard: TempPath) -> Self {
        Self {
            path: guard.to_path_buf(),
            guard: Some(guard),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now rather than at end of scope.
    ///
    /// The removal runs on the blocking pool. Dropping the artifact instead
    /// removes it synchronously.
    pub async fn release(mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || guard.close()).await {
            Ok(result) => log_removal(&path, result),
            Err(e) => warn!("Cleanup task for {} failed: {}", path.display(), e),
        }
    }

    fn remove(&mut self) {
        if let Some(guard) = self.guard.take() {
            log_removal(&self.path, guard.close());
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!("Removed {}", path.display()),
        // The backend may have consumed the file itself.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete temp file {}: {}", path.display(), e),
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        self.remove();
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
