//! Remote collaborators: object storage and the OCR service.
//!
//! The orchestrator only talks to the two traits defined here, so tests can
//! swap in in-memory fakes and other backends can be plugged in without
//! touching the job flow.
//!
//! ## Ready handles only
//!
//! Neither bundled client has an "uninitialized" state. [`GcsStorage::connect`]
//! and [`VisionClient::connect`] take already-validated [`Credentials`] and
//! return a ready handle; there is no value on which an operation could be
//! called before setup. A missing or empty token fails earlier, as
//! [`OcrError::AuthenticationFailure`] from [`Credentials::from_env`].
//!
//! Implementations must not buffer whole files for upload or download.
//! Retries, if wanted, belong inside an implementation; the orchestrator
//! never retries.

pub mod auth;
pub mod gcs;
pub mod model;
pub mod vision;

use crate::error::OcrError;
use async_trait::async_trait;
use model::{AnnotateImageResponse, RpcStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Limit on establishing a connection to either service.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub use auth::Credentials;
pub use gcs::GcsStorage;
pub use vision::VisionClient;

/// Object-storage operations the orchestrator needs.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stream a local file to `bucket/dest_path`.
    async fn upload(&self, local_path: &Path, bucket: &str, dest_path: &str) -> Result<(), OcrError>;

    /// Stream `bucket/src_path` into a local file.
    async fn download(&self, bucket: &str, src_path: &str, local_path: &Path) -> Result<(), OcrError>;

    /// Names of all objects under `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, OcrError>;

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, OcrError>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OcrError>;
}

/// OCR-service operations the orchestrator needs.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Start an asynchronous batch annotation; returns its operation handle.
    async fn submit_batch(&self, request: &BatchRequest) -> Result<OperationHandle, OcrError>;

    /// Current status of a batch operation.
    async fn poll_status(&self, operation: &OperationHandle) -> Result<OperationStatus, OcrError>;

    /// Synchronously annotate one PNG/JPEG image.
    async fn annotate_image(
        &self,
        image_path: &Path,
        language_hints: &[String],
    ) -> Result<AnnotateImageResponse, OcrError>;
}

#[async_trait]
impl<T: StorageClient + ?Sized> StorageClient for Arc<T> {
    async fn upload(&self, local_path: &Path, bucket: &str, dest_path: &str) -> Result<(), OcrError> {
        (**self).upload(local_path, bucket, dest_path).await
    }

    async fn download(&self, bucket: &str, src_path: &str, local_path: &Path) -> Result<(), OcrError> {
        (**self).download(bucket, src_path, local_path).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, OcrError> {
        (**self).list(bucket, prefix).await
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, OcrError> {
        (**self).exists(bucket, path).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OcrError> {
        (**self).bucket_exists(bucket).await
    }
}

#[async_trait]
impl<T: OcrClient + ?Sized> OcrClient for Arc<T> {
    async fn submit_batch(&self, request: &BatchRequest) -> Result<OperationHandle, OcrError> {
        (**self).submit_batch(request).await
    }

    async fn poll_status(&self, operation: &OperationHandle) -> Result<OperationStatus, OcrError> {
        (**self).poll_status(operation).await
    }

    async fn annotate_image(
        &self,
        image_path: &Path,
        language_hints: &[String],
    ) -> Result<AnnotateImageResponse, OcrError> {
        (**self).annotate_image(image_path, language_hints).await
    }
}

/// Parameters of one asynchronous batch annotate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// `gs://bucket/input/...` of the uploaded source.
    pub input_uri: String,
    /// `gs://bucket/output/<ts>/`, trailing slash included.
    pub output_uri_prefix: String,
    pub mime_type: String,
    /// Pages per result file.
    pub batch_size: u32,
    pub language_hints: Vec<String>,
}

/// Opaque identifier of an in-flight batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a batch operation as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<RpcStatus>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl OperationStatus {
    /// The service's own progress state (`RUNNING`, `DONE`, …) when present.
    pub fn state(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("state")?.as_str()
    }
}

/// `gs://bucket/path`.
pub fn gs_uri(bucket: &str, path: &str) -> String {
    format!("gs://{}/{}", bucket, path)
}

/// Map a non-success HTTP status to the right error kind.
///
/// 401/403 are always authentication failures, whatever the operation.
pub(crate) fn status_error(
    status: reqwest::StatusCode,
    body: String,
    otherwise: impl FnOnce(String) -> OcrError,
) -> OcrError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        OcrError::AuthenticationFailure {
            detail: format!("HTTP {}: {}", status, body.trim()),
        }
    } else {
        otherwise(format!("HTTP {}: {}", status, body.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_status_parses() {
        let json = r#"{
            "name": "projects/p/operations/123",
            "metadata": {"@type": "type.googleapis.com/google.cloud.vision.v1.OperationMetadata", "state": "RUNNING"}
        }"#;
        let s: OperationStatus = serde_json::from_str(json).unwrap();
        assert!(!s.done);
        assert_eq!(s.state(), Some("RUNNING"));

        let json = r#"{"done": true, "error": {"code": 3, "message": "bad input"}}"#;
        let s: OperationStatus = serde_json::from_str(json).unwrap();
        assert!(s.done);
        assert_eq!(s.error.unwrap().message, "bad input");
    }

    #[test]
    fn uri_format() {
        assert_eq!(gs_uri("b", "output/1/"), "gs://b/output/1/");
    }

    #[test]
    fn auth_status_mapping() {
        let e = status_error(reqwest::StatusCode::FORBIDDEN, "denied".into(), |m| {
            OcrError::ApiRequestFailed { message: m }
        });
        assert!(matches!(e, OcrError::AuthenticationFailure { .. }));

        let e = status_error(reqwest::StatusCode::BAD_REQUEST, "oops".into(), |m| {
            OcrError::ApiRequestFailed { message: m }
        });
        match e {
            OcrError::ApiRequestFailed { message } => assert!(message.contains("400")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn handle_display() {
        let h = OperationHandle::new("projects/p/operations/9");
        assert_eq!(h.to_string(), "projects/p/operations/9");
        assert_eq!(h.as_str(), "projects/p/operations/9");
    }
}
