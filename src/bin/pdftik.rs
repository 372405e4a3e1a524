//! CLI binary for pdftik.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and writes results to disk.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdftik::{
    BatchItem, BatchProgressCallback, Converter, ConverterConfig, Margins, ProgressCallback,
    TextEncoding,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for batch conversion. Items of a chunk complete
/// out of order, so the bar only counts; per-item lines carry the index.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            started: Instant::now(),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
        self.bar.reset_eta();
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_chunk_start(&self, chunk_index: usize, chunk_len: usize) {
        self.bar
            .set_message(format!("chunk {} ({} docs)", chunk_index + 1, chunk_len));
    }

    fn on_item_complete(&self, index: usize, total: usize, pdf_len: usize) {
        self.bar.println(format!(
            "  {} Doc {:>4}/{:<4}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{pdf_len:>8} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Doc {:>4}/{:<4}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.errors.load(Ordering::SeqCst) == 0 && success_count == total_items {
            eprintln!(
                "{} {} documents converted  {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("{elapsed:.1}s")),
            );
        } else {
            eprintln!(
                "{} batch aborted after {} failure(s); none of the {} documents were written",
                red("✘"),
                bold(&self.errors.load(Ordering::SeqCst).to_string()),
                total_items,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document
  pdftik convert page.html -o out/

  # Convert several documents concurrently (chunks of 50)
  pdftik convert a.html b.html c.html -o out/

  # Convert a JSON manifest: [{"content": "<h1>Doc 1</h1>"}, ...]
  pdftik batch items.json -o out/ --chunk-size 20

  # Combine PDFs into a spreadsheet
  pdftik export out/*.pdf -o report.csv

  # Options from a JSON file (camelCase keys, same as the library)
  pdftik --config options.json convert page.html -o out/

  # Remove the scratch directory
  pdftik clean

ENVIRONMENT VARIABLES:
  PDFTIK_PAGE_SIZE        Page size (A4, Letter, ...)
  PDFTIK_MARGIN           Margins: "10" or "top,right,bottom,left"
  PDFTIK_ENCODING         utf-8, utf-16le, latin1
  PDFTIK_MAX_FILE_SIZE    Maximum HTML size in bytes
  PDFTIK_CHUNK_SIZE       Documents dispatched concurrently per chunk
  PDFTIK_SCRATCH_DIR      Directory for staged temp files
  RUST_LOG                Override log filter (e.g. pdftik=debug)
"#;

/// Stage HTML documents and convert them to PDF through a conversion backend.
#[derive(Parser, Debug)]
#[command(
    name = "pdftik",
    version,
    about = "Convert HTML documents to PDF in chunked batches with guaranteed temp-file cleanup",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    options: ConfigArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFTIK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFTIK_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFTIK_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON option file; flags below override its values.
    #[arg(long, global = true, env = "PDFTIK_CONFIG")]
    config: Option<PathBuf>,

    /// Page size passed to the backend.
    #[arg(long, global = true, env = "PDFTIK_PAGE_SIZE")]
    page_size: Option<String>,

    /// Margins: one value for all sides or "top,right,bottom,left".
    #[arg(long, global = true, env = "PDFTIK_MARGIN")]
    margin: Option<Margins>,

    /// Ask the backend not to render images.
    #[arg(long, global = true, env = "PDFTIK_NO_IMAGES")]
    no_images: bool,

    /// Encoding used when staging HTML.
    #[arg(long, global = true, env = "PDFTIK_ENCODING")]
    encoding: Option<TextEncoding>,

    /// Maximum HTML size per document, in bytes.
    #[arg(long, global = true, env = "PDFTIK_MAX_FILE_SIZE")]
    max_file_size: Option<usize>,

    /// Documents dispatched concurrently per chunk.
    #[arg(long, global = true, env = "PDFTIK_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Scratch directory for staged files.
    #[arg(long, global = true, env = "PDFTIK_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert HTML files to PDF (one PDF per input, same file stem).
    Convert {
        /// HTML files to convert.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Convert every item of a JSON manifest; PDFs are named 0001.pdf, 0002.pdf, ...
    Batch {
        /// JSON array of {"content": "<html>"} objects.
        manifest: PathBuf,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Combine PDF files into one spreadsheet.
    Export {
        /// PDF files, in sheet order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Spreadsheet output path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove the scratch directory.
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli.options, progress).await?;
    let converter = Converter::new(config).context("Invalid configuration")?;

    match cli.command {
        Command::Convert { inputs, output } => {
            let names = output_paths(&inputs, &output)?;
            let mut items = Vec::with_capacity(inputs.len());
            for path in &inputs {
                let html = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                items.push(BatchItem::new(html));
            }
            run_batch(&converter, &items, &names, cli.quiet).await?;
        }
        Command::Batch { manifest, output } => {
            let json = tokio::fs::read_to_string(&manifest)
                .await
                .with_context(|| format!("Failed to read {}", manifest.display()))?;
            let items = BatchItem::list_from_json(&json).context("Invalid batch manifest")?;
            let names: Vec<PathBuf> = (1..=items.len())
                .map(|i| output.join(format!("{i:04}.pdf")))
                .collect();
            run_batch(&converter, &items, &names, cli.quiet).await?;
        }
        Command::Export { inputs, output } => {
            let mut pdfs = Vec::with_capacity(inputs.len());
            for path in &inputs {
                pdfs.push(
                    tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                );
            }
            let sheet = converter
                .export_to_spreadsheet(&pdfs)
                .await
                .context("Export failed")?;
            write_output(&output, &sheet).await?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} PDFs  →  {}",
                    green("✔"),
                    pdfs.len(),
                    bold(&output.display().to_string())
                );
            }
        }
        Command::Clean => {
            converter.teardown().await;
            if !cli.quiet {
                eprintln!(
                    "{}  removed {}",
                    green("✔"),
                    converter.scratch_dir().display()
                );
            }
        }
    }

    Ok(())
}

/// Convert `items` and write each PDF to the matching entry of `outputs`.
async fn run_batch(
    converter: &Converter,
    items: &[BatchItem],
    outputs: &[PathBuf],
    quiet: bool,
) -> Result<()> {
    let start = Instant::now();
    let pdfs = converter
        .convert_batch(items)
        .await
        .context("Conversion failed")?;

    for (pdf, path) in pdfs.iter().zip(outputs) {
        write_output(path, pdf).await?;
    }

    if !quiet {
        eprintln!(
            "Converted {} documents in {}ms",
            pdfs.len(),
            start.elapsed().as_millis()
        );
    }
    Ok(())
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// `docs/page.html` → `page.pdf`
fn pdf_name_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(format!("{stem}.pdf"))
}

/// One output path per input. Two inputs that share a file stem would
/// write the same PDF, so that is refused before anything is converted.
fn output_paths(inputs: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::with_capacity(inputs.len());
    let mut paths = Vec::with_capacity(inputs.len());
    for input in inputs {
        let target = output.join(pdf_name_for(input));
        if let Some(first) = seen.insert(target.clone(), input) {
            bail!(
                "{} and {} would both be written to {}; convert them into separate output directories",
                first.display(),
                input.display(),
                target.display()
            );
        }
        paths.push(target);
    }
    Ok(paths)
}

/// Map CLI args (and an optional option file) to `ConverterConfig`.
async fn build_config(args: &ConfigArgs, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let base = if let Some(ref path) = args.config {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read option file {:?}", path))?;
        ConverterConfig::from_json(&json).context("Invalid option file")?
    } else {
        ConverterConfig::default()
    };

    let mut builder = ConverterConfig::builder()
        .page_size(args.page_size.clone().unwrap_or(base.page_size))
        .margins(args.margin.unwrap_or(base.margins))
        .enable_images(base.enable_images && !args.no_images)
        .encoding(args.encoding.unwrap_or(base.encoding))
        .max_file_size(args.max_file_size.unwrap_or(base.max_file_size))
        .chunk_size(args.chunk_size.unwrap_or(base.chunk_size))
        .scratch_dir(args.scratch_dir.clone().unwrap_or(base.scratch_dir));

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
