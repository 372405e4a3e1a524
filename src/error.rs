//! Error types for the pdftik library.
//!
//! Every public operation returns [`PdftikError`]. The variants group into
//! the failure classes a caller actually reacts to:
//!
//! * **Configuration**: [`PdftikError::InvalidConfig`]. Raised by the
//!   config builder before any I/O; fatal, no retry.
//! * **Content**: [`PdftikError::EmptyContent`],
//!   [`PdftikError::ContentTooLarge`], [`PdftikError::Encoding`]. Raised per
//!   item before it is staged, so nothing needs cleaning up.
//! * **Storage**: [`PdftikError::Storage`]. The scratch directory cannot be
//!   created or written; surfaced before any conversion is attempted.
//! * **Conversion**: [`PdftikError::ConversionFailed`],
//!   [`PdftikError::BatchFailed`], [`PdftikError::ExportFailed`]. Wrappers
//!   that keep the underlying cause reachable through
//!   [`std::error::Error::source`].
//!
//! Failing to delete a staged artifact is not an error value at all: it is
//! logged with `tracing::warn!` and never replaces the primary outcome.

use crate::backend::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdftik library.
#[derive(Debug, Error)]
pub enum PdftikError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or option-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Content errors ────────────────────────────────────────────────────
    /// The item carried no HTML (absent or empty string).
    #[error("Invalid HTML content: content is missing or empty")]
    EmptyContent,

    /// The item is larger than `max_file_size`.
    #[error("HTML content exceeds maximum file size ({size} > {max} bytes)")]
    ContentTooLarge { size: usize, max: usize },

    /// The content cannot be represented in the configured text encoding.
    #[error("Content cannot be encoded as {encoding}: {detail}")]
    Encoding { encoding: String, detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// A batch manifest or buffer list had the wrong shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// The scratch directory could not be created or is not writable.
    #[error("Scratch directory '{path}' is not writable: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a staged artifact failed.
    #[error("Failed to stage '{path}': {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The conversion backend rejected or failed on a staged document.
    #[error("Backend '{backend}' failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },

    // ── Wrappers ──────────────────────────────────────────────────────────
    /// A single-document conversion failed.
    #[error("PDF generation failed: {source}")]
    ConversionFailed {
        #[source]
        source: Box<PdftikError>,
    },

    /// An item of a batch failed; no results are returned for the batch.
    #[error("Batch conversion failed at item {index}: {source}")]
    BatchFailed {
        index: usize,
        #[source]
        source: Box<PdftikError>,
    },

    /// Spreadsheet export failed.
    #[error("Spreadsheet export failed: {source}")]
    ExportFailed {
        #[source]
        source: Box<PdftikError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdftikError {
    /// True for errors raised by item validation (nothing was staged).
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            PdftikError::EmptyContent
                | PdftikError::ContentTooLarge { .. }
                | PdftikError::Encoding { .. }
        )
    }

    /// Strip the conversion/batch/export wrappers and return the root cause.
    pub fn root_cause(&self) -> &PdftikError {
        match self {
            PdftikError::ConversionFailed { source }
            | PdftikError::BatchFailed { source, .. }
            | PdftikError::ExportFailed { source } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn conversion(source: PdftikError) -> Self {
        PdftikError::ConversionFailed {
            source: Box::new(source),
        }
    }

    pub(crate) fn batch(index: usize, source: PdftikError) -> Self {
        PdftikError::BatchFailed {
            index,
            source: Box::new(source),
        }
    }

    pub(crate) fn export(source: PdftikError) -> Self {
        PdftikError::ExportFailed {
            source: Box::new(source),
        }
    }
}
