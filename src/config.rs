//! Configuration types for HTML conversion.
//!
//! All converter behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`] or parsed from a JSON option file with
//! [`ConverterConfig::from_json`]. Both paths end in the same
//! [`ConverterConfig::validate`] call, so an invalid configuration can never
//! reach a [`crate::Converter`].

use crate::error::PdftikError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default largest accepted HTML payload: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Default number of items dispatched together in a batch.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Default inset applied to every page edge.
pub const DEFAULT_MARGIN: f64 = 10.0;

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use pdftik::{ConverterConfig, Margins};
///
/// let config = ConverterConfig::builder()
///     .page_size("Letter")
///     .margins(Margins::uniform(20.0))
///     .max_file_size(1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 50);
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Page size name handed to the backend, e.g. "A4", "Letter". Default: "A4".
    pub page_size: String,

    /// Page insets. Every side must be finite and non-negative. Default: 10 on each side.
    pub margins: Margins,

    /// Whether the backend should render images. Default: true.
    pub enable_images: bool,

    /// Encoding used when staging HTML to disk. Default: UTF-8.
    pub encoding: TextEncoding,

    /// Maximum accepted HTML payload in bytes. Must be > 0. Default: 50 MiB.
    pub max_file_size: usize,

    /// Number of batch items dispatched concurrently. Default: 50.
    ///
    /// Items within a chunk run concurrently; chunks run one after the other.
    /// This bounds the number of staged files and open descriptors alive at
    /// any moment to `chunk_size`.
    pub chunk_size: usize,

    /// Directory where transient artifacts are staged. Default: `<tmp>/pdftik`.
    ///
    /// Shared between concurrent items as a namespace only; every artifact
    /// gets a unique file name.
    pub scratch_dir: PathBuf,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            margins: Margins::default(),
            enable_images: true,
            encoding: TextEncoding::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scratch_dir: default_scratch_dir(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("page_size", &self.page_size)
            .field("margins", &self.margins)
            .field("enable_images", &self.enable_images)
            .field("encoding", &self.encoding)
            .field("max_file_size", &self.max_file_size)
            .field("chunk_size", &self.chunk_size)
            .field("scratch_dir", &self.scratch_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parse a JSON option object (camelCase keys) and validate it.
    ///
    /// Absent keys take their defaults, and so does a blank `pageSize`.
    /// `maxFileSize` and `chunkSize` accept any whole JSON number (`1e6`,
    /// `1048576.0`). A key with the wrong JSON type
    /// (`"pageSize": 123`, `"maxFileSize": "big"`, a margin that is not a
    /// number) or a `margins` object missing one of its four sides is an
    /// [`PdftikError::InvalidConfig`].
    ///
    /// ```rust
    /// use pdftik::ConverterConfig;
    ///
    /// let cfg = ConverterConfig::from_json(r#"{"pageSize": "Letter"}"#).unwrap();
    /// assert_eq!(cfg.page_size, "Letter");
    /// assert!(ConverterConfig::from_json(r#"{"pageSize": 123}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, PdftikError> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| PdftikError::InvalidConfig(format!("option file: {e}")))?;
        file.into_config()
    }

    /// Check every invariant of the configuration.
    pub fn validate(&self) -> Result<(), PdftikError> {
        if self.page_size.trim().is_empty() {
            return Err(PdftikError::InvalidConfig(
                "page size must be a non-empty string".into(),
            ));
        }
        self.margins.validate()?;
        if self.max_file_size == 0 {
            return Err(PdftikError::InvalidConfig(
                "max file size must be > 0".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(PdftikError::InvalidConfig(
                "chunk size must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn page_size(mut self, size: impl Into<String>) -> Self {
        self.config.page_size = size.into();
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn enable_images(mut self, v: bool) -> Self {
        self.config.enable_images = v;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Items dispatched together per chunk. `0` fails [`Self::build`].
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, PdftikError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("pdftik")
}

// ── Margins ──────────────────────────────────────────────────────────────

/// Page insets, one per edge. Units are the backend's (millimetres for the
/// built-in defaults).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN)
    }
}

impl Margins {
    /// Same inset on every edge.
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    /// Fail unless every side is a finite, non-negative number.
    pub fn validate(&self) -> Result<(), PdftikError> {
        let sides = [
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
            ("left", self.left),
        ];
        for (name, value) in sides {
            if !value.is_finite() || value < 0.0 {
                return Err(PdftikError::InvalidConfig(format!(
                    "Invalid margins configuration: {name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for Margins {
    type Err = PdftikError;

    /// Accepts `"10"` (all sides) or `"top,right,bottom,left"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |p: &str| {
            p.trim().parse::<f64>().map_err(|_| {
                PdftikError::InvalidConfig(format!("Invalid margin value: '{}'", p.trim()))
            })
        };
        let parts: Vec<&str> = s.split(',').collect();
        let margins = match parts.as_slice() {
            [all] => Margins::uniform(parse(all)?),
            [top, right, bottom, left] => Margins {
                top: parse(top)?,
                right: parse(right)?,
                bottom: parse(bottom)?,
                left: parse(left)?,
            },
            _ => {
                return Err(PdftikError::InvalidConfig(format!(
                    "Invalid margins '{s}': expected one value or four comma-separated values"
                )))
            }
        };
        margins.validate()?;
        Ok(margins)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Text encoding used when staging HTML to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    /// UTF-8 (default).
    #[default]
    Utf8,
    /// UTF-16, little endian, no BOM.
    Utf16Le,
    /// ISO-8859-1. Characters above U+00FF are rejected.
    Latin1,
}

impl TextEncoding {
    /// Canonical label, e.g. `"UTF-8"`.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Encode `text` into bytes for staging.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, PdftikError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| PdftikError::Encoding {
                        encoding: self.label().to_string(),
                        detail: format!("character {c:?} (U+{:04X}) is out of range", u32::from(c)),
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = PdftikError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-16le" | "utf16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "iso-8859-1" | "binary" => Ok(TextEncoding::Latin1),
            other => Err(PdftikError::InvalidConfig(format!(
                "unsupported encoding '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = PdftikError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TextEncoding> for String {
    fn from(e: TextEncoding) -> Self {
        e.label().to_string()
    }
}

// ── Option file ──────────────────────────────────────────────────────────

/// On-disk / JSON shape of the options. Every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    page_size: Option<String>,
    margins: Option<Margins>,
    enable_images: Option<bool>,
    encoding: Option<TextEncoding>,
    max_file_size: Option<serde_json::Number>,
    chunk_size: Option<serde_json::Number>,
    scratch_dir: Option<PathBuf>,
}

impl ConfigFile {
    fn into_config(self) -> Result<ConverterConfig, PdftikError> {
        let defaults = ConverterConfig::default();
        let max_file_size = match self.max_file_size {
            Some(n) => whole_number("maxFileSize", &n)?,
            None => defaults.max_file_size,
        };
        let chunk_size = match self.chunk_size {
            Some(n) => whole_number("chunkSize", &n)?,
            None => defaults.chunk_size,
        };
        let config = ConverterConfig {
            page_size: self
                .page_size
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.page_size),
            margins: self.margins.unwrap_or(defaults.margins),
            enable_images: self.enable_images.unwrap_or(defaults.enable_images),
            encoding: self.encoding.unwrap_or(defaults.encoding),
            max_file_size,
            chunk_size,
            scratch_dir: self.scratch_dir.unwrap_or(defaults.scratch_dir),
            progress_callback: None,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Accept `1048576`, `1e6` and `1048576.0`; reject fractions and negatives.
fn whole_number(field: &str, n: &serde_json::Number) -> Result<usize, PdftikError> {
    if let Some(v) = n.as_u64() {
        return usize::try_from(v)
            .map_err(|_| PdftikError::InvalidConfig(format!("{field} is too large: {n}")));
    }
    match n.as_f64() {
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= usize::MAX as f64 => Ok(v as usize),
        _ => Err(PdftikError::InvalidConfig(format!(
            "{field} must be a whole non-negative number, got {n}"
        ))),
    }
}
