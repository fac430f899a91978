//! Configuration types for an OCR job.
//!
//! All job behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. The per-document repair switches live in
//! [`JobOptions`] so they can be logged or serialised on their own.
//!
//! Where the values come from (CLI flags, environment, a settings file) is
//! the caller's business; the library only needs them handed over here.

use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pages per result file requested from the batch annotate call.
pub const RESULT_BATCH_SIZE: u32 = 100;

/// Scan-repair switches for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Split landscape "spread" pages into two portrait pages before upload.
    /// Only applies to PDF sources. Default: false.
    pub split_spread: bool,

    /// Reading order used when splitting spreads. Default: true.
    ///
    /// Right-to-left puts the right half first, which is the order of
    /// vertically typeset Japanese books.
    pub right_to_left: bool,

    /// Drop ruby/furigana glyphs based on glyph height. Default: false.
    pub remove_ruby: bool,

    /// Treat in-paragraph line breaks as visual wrapping and separate
    /// paragraphs with a blank line. Default: false.
    pub normalize_line_breaks: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            split_spread: false,
            right_to_left: true,
            remove_ruby: false,
            normalize_line_breaks: false,
        }
    }
}

/// Configuration for an OCR job.
///
/// Built via [`JobConfig::builder()`].
///
/// # Example
/// ```rust
/// use edgequake_ocr2md::JobConfig;
///
/// let config = JobConfig::builder()
///     .bucket("my-scans")
///     .output_dir("out")
///     .polling_interval_ms(2_000)
///     .remove_ruby(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.bucket, "my-scans");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Cloud Storage bucket used for input upload and batch output.
    /// Required for PDF, TIFF and GIF sources; unused for single images.
    pub bucket: String,

    /// Directory the Markdown file is written to. Default: current directory.
    pub output_dir: PathBuf,

    /// Fixed delay between two status polls, in milliseconds. Default: 5000.
    pub polling_interval_ms: u64,

    /// Overall limit for the batch operation to finish, in milliseconds.
    /// Default: 30 minutes.
    pub timeout_ms: u64,

    /// Result files downloaded at once. Default: 4.
    pub download_concurrency: usize,

    /// BCP-47 language hints forwarded to the OCR service, e.g. `["ja"]`.
    /// Empty lets the service detect the language.
    pub language_hints: Vec<String>,

    /// Scan-repair switches.
    pub options: JobOptions,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            output_dir: PathBuf::from("."),
            polling_interval_ms: 5_000,
            timeout_ms: 30 * 60 * 1_000,
            download_concurrency: 4,
            language_hints: Vec::new(),
            options: JobOptions::default(),
        }
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn polling_interval_ms(mut self, ms: u64) -> Self {
        self.config.polling_interval_ms = ms;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn download_concurrency(mut self, n: usize) -> Self {
        self.config.download_concurrency = n.max(1);
        self
    }

    pub fn language_hints(mut self, hints: Vec<String>) -> Self {
        self.config.language_hints = hints;
        self
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn split_spread(mut self, v: bool) -> Self {
        self.config.options.split_spread = v;
        self
    }

    pub fn right_to_left(mut self, v: bool) -> Self {
        self.config.options.right_to_left = v;
        self
    }

    pub fn remove_ruby(mut self, v: bool) -> Self {
        self.config.options.remove_ruby = v;
        self
    }

    pub fn normalize_line_breaks(mut self, v: bool) -> Self {
        self.config.options.normalize_line_breaks = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, OcrError> {
        let c = &self.config;
        if c.bucket != c.bucket.trim() {
            return Err(OcrError::InvalidConfig(format!(
                "bucket name '{}' has surrounding whitespace",
                c.bucket
            )));
        }
        if c.polling_interval_ms == 0 {
            return Err(OcrError::InvalidConfig(
                "polling interval must be ≥ 1ms".into(),
            ));
        }
        if c.timeout_ms == 0 {
            return Err(OcrError::InvalidConfig("timeout must be ≥ 1ms".into()));
        }
        if c.download_concurrency == 0 {
            return Err(OcrError::InvalidConfig(
                "download concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
