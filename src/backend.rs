//! Conversion backends: the engines that turn staged files into bytes.
//!
//! pdftik never renders anything itself. It stages input to disk and hands
//! the path to a [`PdfBackend`] (HTML → PDF) or a [`SpreadsheetBackend`]
//! (PDFs → spreadsheet). A headless browser or a native library can sit
//! behind these traits without changes to staging or cleanup.
//!
//! [`PassthroughBackend`] is the built-in default. It performs no rendering
//! and is meant for wiring, tests, and dry runs.

use crate::config::{ConverterConfig, Margins, TextEncoding};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Page options forwarded to the PDF backend with every document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub page_size: String,
    pub margins: Margins,
    pub enable_images: bool,
    pub encoding: TextEncoding,
}

impl From<&ConverterConfig> for RenderOptions {
    fn from(config: &ConverterConfig) -> Self {
        Self {
            page_size: config.page_size.clone(),
            margins: config.margins,
            enable_images: config.enable_images,
            encoding: config.encoding,
        }
    }
}

/// Failure reported by a backend. The engine's own error, when it has one,
/// stays reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying engine error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::with_source(e.to_string(), e)
    }
}

/// Renders one staged HTML document to PDF bytes.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    /// Short identifier used in error messages and logs.
    fn name(&self) -> &str;

    /// Render the HTML file at `staged`. The file exists for the duration of
    /// the call and is removed afterwards by the caller.
    async fn render(&self, staged: &Path, options: &RenderOptions) -> Result<Vec<u8>, BackendError>;
}

/// Builds one spreadsheet from a list of staged PDF files.
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `staged` is in the caller's input order.
    async fn export(&self, staged: &[PathBuf]) -> Result<Vec<u8>, BackendError>;
}

/// Placeholder engine: the "PDF" is the staged HTML bytes as written, and
/// the "spreadsheet" is a CSV manifest with one row per input PDF.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBackend;

#[async_trait]
impl PdfBackend for PassthroughBackend {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn render(&self, staged: &Path, options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
        let bytes = tokio::fs::read(staged).await?;
        debug!(
            "passthrough render {} ({}, {} bytes)",
            staged.display(),
            options.page_size,
            bytes.len()
        );
        Ok(bytes)
    }
}

#[async_trait]
impl SpreadsheetBackend for PassthroughBackend {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn export(&self, staged: &[PathBuf]) -> Result<Vec<u8>, BackendError> {
        let mut csv = String::from("index,bytes\n");
        for (index, path) in staged.iter().enumerate() {
            let len = tokio::fs::metadata(path).await?.len();
            csv.push_str(&format!("{index},{len}\n"));
        }
        Ok(csv.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn passthrough_render_returns_staged_bytes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.html");
        std::fs::write(&file, "<h1>Hi</h1>").unwrap();

        let options = RenderOptions::from(&ConverterConfig::default());
        let pdf = PassthroughBackend.render(&file, &options).await.unwrap();
        assert_eq!(pdf, b"<h1>Hi</h1>");
    }

    #[tokio::test]
    async fn passthrough_render_missing_file_is_error() {
        let options = RenderOptions::from(&ConverterConfig::default());
        let err = PassthroughBackend
            .render(Path::new("/definitely/not/here.html"), &options)
            .await
            .unwrap_err();
        assert!(!err.message.is_empty());
        let io = err
            .source
            .as_ref()
            .and_then(|s| s.downcast_ref::<std::io::Error>())
            .expect("io error kept as source");
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn passthrough_export_lists_inputs_in_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"12345").unwrap();
        std::fs::write(&b, b"1").unwrap();

        let out = PassthroughBackend.export(&[a, b]).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "index,bytes\n0,5\n1,1\n");
    }

    #[test]
    fn render_options_follow_config() {
        let config = ConverterConfig::builder()
            .page_size("Letter")
            .enable_images(false)
            .build()
            .unwrap();
        let options = RenderOptions::from(&config);
        assert_eq!(options.page_size, "Letter");
        assert!(!options.enable_images);
        assert_eq!(options.margins, config.margins);
    }
}
