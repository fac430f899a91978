//! Error types for the edgequake-ocr2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`] - **Fatal**: the job cannot proceed (bucket missing,
//!   upload rejected, operation timed out, output not writable). Returned as
//!   `Err(OcrError)` from [`crate::orchestrator::Orchestrator::run`] and
//!   carried by the single terminal `Failed` event.
//!
//! * [`ResultFileError`] - **Non-fatal**: one downloaded result file could not
//!   be parsed. The job skips it and continues; it only escalates to
//!   [`OcrError::ResultParseFailure`] when no file at all could be parsed.
//!
//! Nothing in this crate retries a failed remote call. Retry policy, if
//! wanted, belongs inside a [`crate::remote::StorageClient`] or
//! [`crate::remote::OcrClient`] implementation.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr2md library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// The file extension (or content) is not one the OCR service accepts.
    #[error("Unsupported format '{extension}' for '{path}'\nSupported: pdf, tif, tiff, gif, png, jpg, jpeg.")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The spread splitter could not read or rewrite the PDF.
    #[error("Failed to split spread pages in '{path}': {detail}")]
    SplitFailed { path: PathBuf, detail: String },

    // ── Remote service errors ─────────────────────────────────────────────
    /// Credentials were missing or rejected (HTTP 401/403).
    #[error("Authentication failed: {detail}\nSet GOOGLE_OAUTH_ACCESS_TOKEN or pass --access-token.")]
    AuthenticationFailure { detail: String },

    /// The configured bucket does not exist (checked before any upload).
    #[error("Bucket '{bucket}' not found.\nCreate it or pass a different --bucket.")]
    BucketNotFound { bucket: String },

    /// Uploading the source document failed.
    #[error("Failed to upload '{path}' to '{destination}': {reason}")]
    UploadFailed {
        path: PathBuf,
        destination: String,
        reason: String,
    },

    /// Downloading or listing result files failed.
    #[error("Failed to download '{source_path}': {reason}")]
    DownloadFailed { source_path: String, reason: String },

    /// The OCR API rejected a request, or the operation reported an error.
    #[error("OCR API error: {message}")]
    ApiRequestFailed { message: String },

    /// The batch operation did not finish before the configured timeout.
    ///
    /// Kept separate from [`OcrError::ApiRequestFailed`] so callers can tell
    /// "slow" apart from "broken".
    #[error("OCR operation '{operation}' did not finish within {timeout_ms}ms")]
    OperationTimeout { operation: String, timeout_ms: u64 },

    // ── Result errors ─────────────────────────────────────────────────────
    /// The output prefix contained no result files.
    #[error("No result files found under '{prefix}'")]
    NoResults { prefix: String },

    /// Every downloaded result file failed to parse.
    #[error("None of the {total} result files could be parsed.\nFirst error: {first_error}")]
    ResultParseFailure { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Short machine-friendly name of the error kind, used as `details` in
    /// the terminal `Failed` event.
    pub fn kind(&self) -> &'static str {
        match self {
            OcrError::SourceNotFound { .. } => "source_not_found",
            OcrError::UnsupportedFormat { .. } => "unsupported_format",
            OcrError::SplitFailed { .. } => "split_failed",
            OcrError::AuthenticationFailure { .. } => "authentication_failure",
            OcrError::BucketNotFound { .. } => "bucket_not_found",
            OcrError::UploadFailed { .. } => "upload_failure",
            OcrError::DownloadFailed { .. } => "download_failure",
            OcrError::ApiRequestFailed { .. } => "api_request_failure",
            OcrError::OperationTimeout { .. } => "operation_timeout",
            OcrError::NoResults { .. } => "no_results",
            OcrError::ResultParseFailure { .. } => "result_parse_failure",
            OcrError::FileWriteFailed { .. } => "file_write_failure",
            OcrError::InvalidConfig(_) => "invalid_config",
            OcrError::Internal(_) => "internal",
        }
    }
}

/// A non-fatal error for a single downloaded result file.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ResultFileError {
    /// The file could not be read from the job's temp directory.
    #[error("{file}: read failed: {detail}")]
    ReadFailed { file: String, detail: String },

    /// The file is not a valid recognition-response document.
    #[error("{file}: invalid recognition JSON: {detail}")]
    InvalidJson { file: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let e = OcrError::OperationTimeout {
            operation: "operations/abc".into(),
            timeout_ms: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("100ms"), "got: {msg}");
        assert!(msg.contains("operations/abc"));
        assert_eq!(e.kind(), "operation_timeout");
    }

    #[test]
    fn bucket_not_found_display() {
        let e = OcrError::BucketNotFound {
            bucket: "scans".into(),
        };
        assert!(e.to_string().contains("'scans'"));
    }

    #[test]
    fn parse_failure_display() {
        let e = OcrError::ResultParseFailure {
            total: 3,
            first_error: "output-1-to-100.json: invalid recognition JSON: eof".into(),
        };
        assert!(e.to_string().contains("3 result files"));
        assert!(e.to_string().contains("output-1-to-100.json"));
    }

    #[test]
    fn result_file_error_display() {
        let e = ResultFileError::InvalidJson {
            file: "output-101-to-200.json".into(),
            detail: "expected value".into(),
        };
        assert!(e.to_string().starts_with("output-101-to-200.json"));
    }
}
