//! # pdftik
//!
//! Stage HTML documents to a scratch directory and hand them to a PDF
//! conversion backend, one at a time or in chunked concurrent batches, with
//! every temporary file removed whatever the outcome.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 1. Validate  non-empty, within max_file_size
//!  ├─ 2. Scratch   create + probe the scratch directory
//!  ├─ 3. Stage     encode and write temp_<ms>_<pos>_*.html
//!  ├─ 4. Render    PdfBackend::render(staged path) → bytes
//!  └─ 5. Release   remove the staged file (always)
//! ```
//!
//! Batches run steps 1–5 for every item of a chunk concurrently, then move
//! on to the next chunk. The first failing item fails the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftik::{BatchItem, Converter, ConverterConfig, Margins};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder()
//!         .page_size("A4")
//!         .margins(Margins::uniform(10.0))
//!         .build()?;
//!     let converter = Converter::new(config)?;
//!
//!     let pdfs = converter
//!         .convert_batch(&[BatchItem::new("<h1>Doc 1</h1>"), BatchItem::new("<h1>Doc 2</h1>")])
//!         .await?;
//!     let sheet = converter.export_to_spreadsheet(&pdfs).await?;
//!     eprintln!("{} PDFs, {} byte spreadsheet", pdfs.len(), sheet.len());
//!
//!     converter.teardown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! Rendering is delegated to implementations of [`PdfBackend`] and
//! [`SpreadsheetBackend`]. The default [`PassthroughBackend`] performs no
//! rendering; plug a real engine in with [`Converter::with_backends`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftik` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod progress;
pub mod scratch;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, PassthroughBackend, PdfBackend, RenderOptions, SpreadsheetBackend};
pub use config::{ConverterConfig, ConverterConfigBuilder, Margins, TextEncoding};
pub use convert::{BatchItem, Converter};
pub use error::PdftikError;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use scratch::{ScratchSpace, StagedArtifact};
pub use validate::validate_item;
