//! # edgequake-ocr2md
//!
//! Turn scanned documents (PDF, TIFF, GIF, PNG, JPEG) into Markdown with a
//! cloud OCR service.
//!
//! ## Why this crate?
//!
//! Cloud OCR is good at reading scans but its output is a deep JSON tree
//! spread across many result files in object storage, ordered by name
//! rather than by page. This crate drives the whole job (upload, batch
//! recognition, polling, download) and rebuilds the text in page order,
//! with two repairs for scanned books: removal of ruby (furigana) glyphs
//! and splitting of two-page spreads before recognition.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source
//!  │
//!  ├─ 1. Input    classify by extension → Sync (png/jpg) or Batch (pdf/tiff/gif)
//!  ├─ 2. Split    optional: landscape spreads → two portrait pages (lopdf)
//!  ├─ 3. Remote   upload → batch annotate → poll → list → download
//!  ├─ 4. Order    sort result files by start page
//!  ├─ 5. Extract  page text, optionally without ruby / with paragraph joins
//!  └─ 6. Output   "# Page N" sections → <output_dir>/<stem>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{Credentials, JobConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JobConfig::builder()
//!         .bucket("my-scans")
//!         .output_dir("out")
//!         .remove_ruby(true)
//!         .build()?;
//!     // Reads GOOGLE_OAUTH_ACCESS_TOKEN
//!     let credentials = Credentials::from_env()?;
//!     let mut job = Orchestrator::connect(config, credentials)?;
//!     let output = job.run("book.pdf").await?;
//!     println!("{} pages → {}", output.page_count, output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod remote;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, JobOptions, RESULT_BATCH_SIZE};
pub use error::{OcrError, ResultFileError};
pub use orchestrator::{JobState, Orchestrator};
pub use output::JobOutput;
pub use pipeline::input::ProcessingStrategy;
pub use progress::{event_channel, event_stream, JobEvent, JobEventStream, Phase, ProgressSender};
pub use remote::{Credentials, GcsStorage, OcrClient, StorageClient, VisionClient};
