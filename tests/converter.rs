//! Integration tests for the public `Converter` API.
//!
//! Each test gets its own scratch directory under a `TempDir`, so the
//! "no leftover artifacts" checks can list the directory directly.

use async_trait::async_trait;
use pdftik::{
    BackendError, BatchItem, BatchProgressCallback, Converter, ConverterConfig, Margins,
    PassthroughBackend, PdfBackend, PdftikError, RenderOptions, SpreadsheetBackend,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_in(dir: &TempDir) -> pdftik::ConverterConfigBuilder {
    ConverterConfig::builder()
        .scratch_dir(dir.path().join("temp"))
        .page_size("A4")
        .margins(Margins::uniform(10.0))
        .enable_images(true)
        .max_file_size(1024 * 1024)
}

fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}

/// Sleeps longer for earlier documents so completion order is the reverse of
/// input order, and records how many renders overlap.
struct SlowBackend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen_options: Mutex<Vec<RenderOptions>>,
}

impl SlowBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen_options: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PdfBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    async fn render(&self, staged: &Path, options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen_options.lock().unwrap().push(options.clone());

        let html = tokio::fs::read_to_string(staged).await?;
        let n: u64 = html
            .trim_start_matches("<h1>Doc ")
            .trim_end_matches("</h1>")
            .parse()
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(n * 4))).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("%PDF-1.7 {html}").into_bytes())
    }
}

/// Spreadsheet backend that always fails after seeing its inputs.
struct BrokenSheet {
    seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SpreadsheetBackend for BrokenSheet {
    fn name(&self) -> &str {
        "broken-sheet"
    }

    async fn export(&self, staged: &[PathBuf]) -> Result<Vec<u8>, BackendError> {
        for path in staged {
            assert!(path.exists(), "staged PDF must exist during export");
        }
        self.seen.lock().unwrap().extend_from_slice(staged);
        Err(BackendError::new("workbook writer unavailable"))
    }
}

#[derive(Default)]
struct Recorder {
    chunks: Mutex<Vec<usize>>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    final_success: AtomicUsize,
}

impl BatchProgressCallback for Recorder {
    fn on_chunk_start(&self, _chunk_index: usize, chunk_len: usize) {
        self.chunks.lock().unwrap().push(chunk_len);
    }

    fn on_item_complete(&self, _index: usize, _total: usize, _pdf_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_item_error(&self, _index: usize, _total: usize, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _total: usize, success_count: usize) {
        self.final_success.store(success_count, Ordering::SeqCst);
    }
}

// ── Initialization ───────────────────────────────────────────────────────────

#[test]
fn default_and_custom_options_construct() {
    assert!(Converter::new(ConverterConfig::default()).is_ok());

    let config = ConverterConfig::builder()
        .page_size("Letter")
        .margins(Margins::uniform(20.0))
        .build()
        .unwrap();
    assert!(Converter::new(config).is_ok());
}

#[test]
fn invalid_options_are_rejected() {
    let err = ConverterConfig::from_json(r#"{"pageSize": 123}"#).unwrap_err();
    assert!(matches!(err, PdftikError::InvalidConfig(_)));

    let err = ConverterConfig::from_json(r#"{"margins": {"top": "invalid"}}"#).unwrap_err();
    assert!(matches!(err, PdftikError::InvalidConfig(_)));

    for side in 0..4 {
        let mut m = Margins::uniform(1.0);
        match side {
            0 => m.top = -0.5,
            1 => m.right = -0.5,
            2 => m.bottom = -0.5,
            _ => m.left = -0.5,
        }
        let err = ConverterConfig::builder().margins(m).build().unwrap_err();
        assert!(err.to_string().contains("Invalid margins configuration"));
    }
}

// ── Single document ──────────────────────────────────────────────────────────

#[tokio::test]
async fn converts_html_with_css() {
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(config_in(&dir).build().unwrap()).unwrap();

    let html = r#"
        <style>
            .container { color: blue; padding: 20px; }
        </style>
        <div class="container">
            <h1>Test</h1>
        </div>
    "#;
    let pdf = converter.convert_one(html).await.unwrap();
    assert_eq!(pdf, html.as_bytes());
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

#[tokio::test]
async fn oversized_content_leaves_no_artifacts() {
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(config_in(&dir).build().unwrap()).unwrap();

    let huge = "x".repeat(2 * 1024 * 1024);
    let err = converter.convert_one(&huge).await.unwrap_err();
    assert!(err.to_string().contains("exceeds maximum file size"));
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

#[tokio::test]
async fn backend_receives_configured_options() {
    let dir = TempDir::new().unwrap();
    let backend = SlowBackend::new();
    let config = config_in(&dir)
        .page_size("Letter")
        .margins(Margins {
            top: 1.0,
            right: 2.0,
            bottom: 3.0,
            left: 4.0,
        })
        .enable_images(false)
        .build()
        .unwrap();
    let converter = Converter::with_backends(
        config,
        Arc::clone(&backend) as Arc<dyn PdfBackend>,
        Arc::new(PassthroughBackend),
    )
    .unwrap();

    converter.convert_one("<h1>Doc 1</h1>").await.unwrap();
    let seen = backend.seen_options.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].page_size, "Letter");
    assert_eq!(seen[0].margins.left, 4.0);
    assert!(!seen[0].enable_images);
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_returns_two_buffers_for_two_docs() {
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(config_in(&dir).build().unwrap()).unwrap();

    let items = vec![BatchItem::new("<h1>Doc 1</h1>"), BatchItem::new("<h1>Doc 2</h1>")];
    let pdfs = converter.convert_batch(&items).await.unwrap();
    assert_eq!(pdfs, vec![b"<h1>Doc 1</h1>".to_vec(), b"<h1>Doc 2</h1>".to_vec()]);
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

#[tokio::test]
async fn batch_order_is_input_order_not_completion_order() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let backend = SlowBackend::new();
    let recorder = Arc::new(Recorder::default());
    let config = config_in(&dir)
        .chunk_size(4)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let converter = Converter::with_backends(
        config,
        Arc::clone(&backend) as Arc<dyn PdfBackend>,
        Arc::new(PassthroughBackend),
    )
    .unwrap();

    let items: Vec<BatchItem> = (0..10).map(|i| BatchItem::new(format!("<h1>Doc {i}</h1>"))).collect();
    let pdfs = converter.convert_batch(&items).await.unwrap();

    assert_eq!(pdfs.len(), 10);
    for (i, pdf) in pdfs.iter().enumerate() {
        assert_eq!(pdf, format!("%PDF-1.7 <h1>Doc {i}</h1>").as_bytes());
    }
    let peak = backend.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "chunk size bounds concurrency, peak was {peak}");
    assert_eq!(*recorder.chunks.lock().unwrap(), vec![4, 4, 2]);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 10);
    assert_eq!(recorder.final_success.load(Ordering::SeqCst), 10);
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

#[tokio::test]
async fn batch_with_null_item_returns_no_partial_results() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = config_in(&dir)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let items = vec![
        BatchItem::new("<h1>Valid</h1>"),
        BatchItem { content: None },
        BatchItem::new("<h1>Also Valid</h1>"),
    ];
    let result = converter.convert_batch(&items).await;

    let err = result.expect_err("batch with a null item must fail");
    assert!(matches!(err, PdftikError::BatchFailed { index: 1, .. }));
    // The rest of the chunk still ran to completion before the batch failed.
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.failed.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.final_success.load(Ordering::SeqCst), 0);
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

#[tokio::test]
async fn batch_failing_in_second_chunk_reports_no_successes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = config_in(&dir)
        .chunk_size(2)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let items = vec![
        BatchItem::new("<p>0</p>"),
        BatchItem::new("<p>1</p>"),
        BatchItem::new("<p>2</p>"),
        BatchItem { content: None },
    ];
    let err = converter.convert_batch(&items).await.unwrap_err();
    assert!(matches!(err, PdftikError::BatchFailed { index: 3, .. }), "{err:?}");
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.final_success.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backend_io_failure_keeps_cause_chain() {
    use std::error::Error as _;

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.pdf");

    let wrapped = PdftikError::Backend {
        backend: "passthrough".into(),
        source: PassthroughBackend.export(&[missing]).await.unwrap_err(),
    };
    let cause = wrapped
        .source()
        .and_then(|s| s.source())
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .expect("io error reachable from the backend error");
    assert_eq!(cause.kind(), std::io::ErrorKind::NotFound);
}

#[tokio::test]
async fn batch_manifest_round_trip() {
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(config_in(&dir).build().unwrap()).unwrap();

    let items = BatchItem::list_from_json(
        r#"[{"content": "<h1>Doc 1</h1>"}, {"content": "<h1>Doc 2</h1>"}]"#,
    )
    .unwrap();
    assert_eq!(converter.convert_batch(&items).await.unwrap().len(), 2);

    let err = BatchItem::list_from_json(r#""not a list""#).unwrap_err();
    assert!(matches!(err, PdftikError::InvalidInput(_)));
}

#[tokio::test]
async fn batch_surfaces_storage_error_before_any_item() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = ConverterConfig::builder()
        .scratch_dir(&blocker)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let err = converter
        .convert_batch(&[BatchItem::new("<p>x</p>")])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftikError::Storage { .. }), "got {err:?}");
    assert!(recorder.chunks.lock().unwrap().is_empty());
}

// ── Spreadsheet export ───────────────────────────────────────────────────────

#[tokio::test]
async fn export_failure_still_removes_staged_pdfs() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let sheet = Arc::new(BrokenSheet {
        seen: Mutex::new(Vec::new()),
    });
    let converter = Converter::with_backends(
        config_in(&dir).build().unwrap(),
        Arc::new(PassthroughBackend),
        Arc::clone(&sheet) as Arc<dyn SpreadsheetBackend>,
    )
    .unwrap();

    let err = converter
        .export_to_spreadsheet(&[b"%PDF-a".to_vec(), b"%PDF-b".to_vec()])
        .await
        .unwrap_err();
    assert!(matches!(err, PdftikError::ExportFailed { .. }));
    assert!(err.to_string().contains("workbook writer unavailable"));

    let seen = sheet.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| p.extension().is_some_and(|e| e == "pdf")));
    assert!(seen.iter().all(|p| !p.exists()));
    assert!(leftover_files(converter.scratch_dir()).is_empty());
}

// ── File system handling ─────────────────────────────────────────────────────

#[tokio::test]
async fn scratch_space_lifecycle() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let converter = Converter::new(config_in(&dir).build().unwrap()).unwrap();
    assert!(!converter.scratch_dir().exists(), "construction must not touch storage");

    let first = converter.ensure_scratch_space().await.unwrap();
    let second = converter.ensure_scratch_space().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(leftover_files(dir.path()).len(), 1);

    converter.teardown().await;
    assert!(!first.exists());

    converter.ensure_scratch_space().await.unwrap();
    assert!(first.is_dir());
    converter.convert_one("<h1>Test</h1>").await.unwrap();
    assert!(leftover_files(&first).is_empty());
}
