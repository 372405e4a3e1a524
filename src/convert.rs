//! The [`Converter`]: staged, chunked, fail-fast HTML conversion.
//!
//! ## Flow of one item
//!
//! ```text
//! validate ──▶ encode ──▶ stage ──▶ backend.render ──▶ release
//! (size)      (charset)  (temp_*.html)   (bytes)       (always)
//! ```
//!
//! Validation and encoding run before anything is written, so a bad item
//! never leaves a file behind. Once staged, the artifact guard removes the
//! file whatever the backend returns.
//!
//! ## Batches
//!
//! [`Converter::convert_batch`] splits the items into `chunk_size` chunks.
//! All items of a chunk run concurrently and the chunk is awaited as a whole
//! before the next one starts. Results are collected by position, not by
//! completion order. The first failing item (lowest index) fails the batch,
//! no later chunk is started, and no partial list is returned.

use crate::backend::{PassthroughBackend, PdfBackend, RenderOptions, SpreadsheetBackend};
use crate::config::ConverterConfig;
use crate::error::PdftikError;
use crate::scratch::ScratchSpace;
use crate::validate::validate_item;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One entry of a batch. `content: None` is rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub content: Option<String>,
}

impl BatchItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Parse a JSON array of `{"content": "<html>"}` objects.
    ///
    /// Anything other than an array of such objects is
    /// [`PdftikError::InvalidInput`]. `null` content is accepted here and
    /// rejected later, per item, by the converter.
    pub fn list_from_json(json: &str) -> Result<Vec<BatchItem>, PdftikError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| PdftikError::InvalidInput(format!("batch manifest is not JSON: {e}")))?;
        if !value.is_array() {
            return Err(PdftikError::InvalidInput("Items must be an array".into()));
        }
        serde_json::from_value(value)
            .map_err(|e| PdftikError::InvalidInput(format!("malformed batch item: {e}")))
    }
}

impl From<&str> for BatchItem {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BatchItem {
    fn from(s: String) -> Self {
        Self { content: Some(s) }
    }
}

/// HTML → PDF converter with a scratch directory and pluggable backends.
///
/// Construction only validates the configuration; the scratch directory is
/// created lazily by the first operation that needs it.
///
/// # Example
/// ```rust,no_run
/// use pdftik::{BatchItem, Converter, ConverterConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(ConverterConfig::default())?;
/// let pdf = converter.convert_one("<h1>Hello World</h1>").await?;
///
/// let items = vec![BatchItem::new("<h1>Doc 1</h1>"), BatchItem::new("<h1>Doc 2</h1>")];
/// let pdfs = converter.convert_batch(&items).await?;
/// assert_eq!(pdfs.len(), 2);
///
/// converter.teardown().await;
/// # let _ = pdf;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Converter {
    config: ConverterConfig,
    options: RenderOptions,
    scratch: ScratchSpace,
    pdf_backend: Arc<dyn PdfBackend>,
    sheet_backend: Arc<dyn SpreadsheetBackend>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("pdf_backend", &self.pdf_backend.name())
            .field("sheet_backend", &self.sheet_backend.name())
            .finish()
    }
}

impl Converter {
    /// Build a converter backed by [`PassthroughBackend`].
    pub fn new(config: ConverterConfig) -> Result<Self, PdftikError> {
        Self::with_backends(
            config,
            Arc::new(PassthroughBackend),
            Arc::new(PassthroughBackend),
        )
    }

    /// Build a converter with explicit PDF and spreadsheet engines.
    pub fn with_backends(
        config: ConverterConfig,
        pdf_backend: Arc<dyn PdfBackend>,
        sheet_backend: Arc<dyn SpreadsheetBackend>,
    ) -> Result<Self, PdftikError> {
        config.validate()?;
        Ok(Self {
            options: RenderOptions::from(&config),
            scratch: ScratchSpace::new(config.scratch_dir.clone()),
            config,
            pdf_backend,
            sheet_backend,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Create the scratch directory if missing and verify it is writable.
    pub async fn ensure_scratch_space(&self) -> Result<PathBuf, PdftikError> {
        self.scratch.ensure().await
    }

    /// Remove the scratch directory and everything in it. Never fails.
    pub async fn teardown(&self) {
        self.scratch.teardown().await
    }

    /// Convert one HTML document to PDF bytes.
    ///
    /// # Errors
    /// Every failure is returned as [`PdftikError::ConversionFailed`] with the
    /// cause (content, storage, staging, or backend error) as its source.
    pub async fn convert_one(&self, html: &str) -> Result<Vec<u8>, PdftikError> {
        let start = Instant::now();
        let result = async {
            let html = validate_item(Some(html), self.config.max_file_size)?;
            self.scratch.ensure().await?;
            self.stage_and_render(0, html).await
        }
        .await;

        match result {
            Ok(pdf) => {
                debug!(
                    "Converted document ({} bytes) in {}ms",
                    pdf.len(),
                    start.elapsed().as_millis()
                );
                Ok(pdf)
            }
            Err(e) => Err(PdftikError::conversion(e)),
        }
    }

    /// Convert a list of HTML documents, returning PDFs in input order.
    ///
    /// # Errors
    /// * [`PdftikError::Storage`] if the scratch directory is unusable
    ///   (checked once, before any item).
    /// * [`PdftikError::BatchFailed`] carrying the index and cause of the
    ///   first failing item. Items of the failing chunk all run to completion
    ///   and are cleaned up; later chunks are not started.
    pub async fn convert_batch(&self, items: &[BatchItem]) -> Result<Vec<Vec<u8>>, PdftikError> {
        let total_start = Instant::now();
        let total = items.len();
        let chunk_size = self.config.chunk_size;
        info!(
            "Starting batch conversion: {} items, chunk size {}",
            total, chunk_size
        );

        self.scratch.ensure().await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut results: Vec<Vec<u8>> = Vec::with_capacity(total);

        for (chunk_index, chunk) in items.chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;
            debug!(
                "Dispatching chunk {} (items {}..{})",
                chunk_index,
                base,
                base + chunk.len()
            );
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_chunk_start(chunk_index, chunk.len());
            }

            let outcomes = join_all(chunk.iter().enumerate().map(|(offset, item)| {
                self.convert_batch_item(base + offset, total, item.content.as_deref())
            }))
            .await;

            let mut first_error: Option<(usize, PdftikError)> = None;
            for (offset, outcome) in outcomes.into_iter().enumerate() {
                match outcome {
                    Ok(pdf) => results.push(pdf),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some((base + offset, e));
                        }
                    }
                }
            }

            if let Some((index, error)) = first_error {
                warn!("Batch aborted at item {}: {}", index, error);
                // Nothing converted so far is handed back.
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_batch_complete(total, 0);
                }
                return Err(PdftikError::batch(index, error));
            }
        }

        info!(
            "Batch complete: {} items in {}ms",
            results.len(),
            total_start.elapsed().as_millis()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, results.len());
        }

        Ok(results)
    }

    /// Stage PDF buffers and hand them to the spreadsheet backend.
    ///
    /// Buffers are staged in order as `temp_*.pdf`; every staged file is
    /// removed before this returns.
    pub async fn export_to_spreadsheet(&self, pdfs: &[Vec<u8>]) -> Result<Vec<u8>, PdftikError> {
        let result = async {
            self.scratch.ensure().await?;

            let mut staged = Vec::with_capacity(pdfs.len());
            for (index, pdf) in pdfs.iter().enumerate() {
                staged.push(self.scratch.stage(index, ".pdf", pdf).await?);
            }
            let paths: Vec<PathBuf> = staged.iter().map(|a| a.path().to_path_buf()).collect();

            let exported = self.sheet_backend.export(&paths).await;
            for artifact in staged {
                artifact.release().await;
            }
            exported.map_err(|source| PdftikError::Backend {
                backend: self.sheet_backend.name().to_string(),
                source,
            })
        }
        .await;

        match result {
            Ok(sheet) => {
                info!("Exported {} PDFs to spreadsheet ({} bytes)", pdfs.len(), sheet.len());
                Ok(sheet)
            }
            Err(e) => Err(PdftikError::export(e)),
        }
    }

    /// Convert one document and write the PDF to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    /// Returns the number of bytes written.
    pub async fn convert_to_file(
        &self,
        html: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<usize, PdftikError> {
        let pdf = self.convert_one(html).await?;
        let path = output_path.as_ref();
        write_atomic(path, &pdf).await?;
        Ok(pdf.len())
    }

    /// Synchronous wrapper around [`Converter::convert_one`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn convert_sync(&self, html: &str) -> Result<Vec<u8>, PdftikError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| PdftikError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert_one(html))
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn convert_batch_item(
        &self,
        index: usize,
        total: usize,
        content: Option<&str>,
    ) -> Result<Vec<u8>, PdftikError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_start(index, total);
        }

        let result = match validate_item(content, self.config.max_file_size) {
            Ok(html) => self.stage_and_render(index, html).await,
            Err(e) => Err(e),
        };

        if let Some(ref cb) = self.config.progress_callback {
            match &result {
                Ok(pdf) => cb.on_item_complete(index, total, pdf.len()),
                Err(e) => cb.on_item_error(index, total, &e.to_string()),
            }
        }
        result
    }

    /// Encode, stage, render, release. The artifact never outlives this call.
    async fn stage_and_render(&self, position: usize, html: &str) -> Result<Vec<u8>, PdftikError> {
        let bytes = self.config.encoding.encode(html)?;
        let artifact = self.scratch.stage(position, ".html", &bytes).await?;

        let rendered = self.pdf_backend.render(artifact.path(), &self.options).await;
        artifact.release().await;

        rendered.map_err(|source| PdftikError::Backend {
            backend: self.pdf_backend.name().to_string(),
            source,
        })
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdftikError> {
    let write_err = |e: std::io::Error| PdftikError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
