//! Cloud Vision client: async file batch annotation plus the synchronous
//! single-image call.

use super::auth::Credentials;
use super::model::AnnotateImageResponse;
use super::{status_error, BatchRequest, CONNECT_TIMEOUT, OcrClient, OperationHandle, OperationStatus};
use crate::error::OcrError;
use crate::pipeline::encode::encode_image_file;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Public Vision endpoint.
pub const VISION_ENDPOINT: &str = "https://vision.googleapis.com";

/// Feature requested for every call. Dense-text detection gives the
/// page → block → paragraph → word → symbol hierarchy the extractor needs.
const FEATURE_TYPE: &str = "DOCUMENT_TEXT_DETECTION";

/// Limit on a whole Vision request, inline image upload included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A ready Vision handle.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct BatchAnnotateImagesResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationName {
    #[serde(default)]
    name: Option<String>,
}

impl VisionClient {
    pub fn connect(credentials: Credentials) -> Result<Self, OcrError> {
        Self::connect_to(credentials, VISION_ENDPOINT)
    }

    pub fn connect_to(credentials: Credentials, endpoint: &str) -> Result<Self, OcrError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| OcrError::InvalidConfig(format!("vision endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(OcrError::InvalidConfig(format!(
                "vision endpoint '{endpoint}' cannot be a base URL"
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OcrError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            credentials,
            endpoint,
        })
    }

    /// `endpoint/v1/<path>`; `/` in `path` separates segments.
    fn url(&self, path: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("v1").extend(path.split('/'));
        }
        url
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<reqwest::Response, OcrError> {
        let url = self.url(path);
        let response = self
            .credentials
            .apply(self.http.post(url.clone()))
            .json(body)
            .send()
            .await
            .map_err(|e| OcrError::ApiRequestFailed {
                message: format!("POST {url}: {e}"),
            })?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, OcrError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body, |message| {
        OcrError::ApiRequestFailed { message }
    }))
}

fn image_context(language_hints: &[String]) -> Option<Value> {
    (!language_hints.is_empty()).then(|| json!({ "languageHints": language_hints }))
}

/// Body of `files:asyncBatchAnnotate`.
pub(crate) fn batch_request_body(request: &BatchRequest) -> Value {
    let mut file_request = json!({
        "inputConfig": {
            "gcsSource": { "uri": request.input_uri },
            "mimeType": request.mime_type,
        },
        "features": [{ "type": FEATURE_TYPE }],
        "outputConfig": {
            "gcsDestination": { "uri": request.output_uri_prefix },
            "batchSize": request.batch_size,
        },
    });
    if let Some(ctx) = image_context(&request.language_hints) {
        file_request["imageContext"] = ctx;
    }
    json!({ "requests": [file_request] })
}

/// Body of `images:annotate` for one inline image.
pub(crate) fn image_request_body(content: &str, language_hints: &[String]) -> Value {
    let mut image_request = json!({
        "image": { "content": content },
        "features": [{ "type": FEATURE_TYPE }],
    });
    if let Some(ctx) = image_context(language_hints) {
        image_request["imageContext"] = ctx;
    }
    json!({ "requests": [image_request] })
}

#[async_trait]
impl OcrClient for VisionClient {
    async fn submit_batch(&self, request: &BatchRequest) -> Result<OperationHandle, OcrError> {
        info!(
            "Submitting batch annotation {} → {}",
            request.input_uri, request.output_uri_prefix
        );
        let response = self
            .post_json("files:asyncBatchAnnotate", &batch_request_body(request))
            .await?;
        let op: OperationName = response.json().await.map_err(|e| OcrError::ApiRequestFailed {
            message: format!("invalid operation response: {e}"),
        })?;
        match op.name {
            Some(name) if !name.is_empty() => {
                debug!("Batch operation started: {}", name);
                Ok(OperationHandle::new(name))
            }
            _ => Err(OcrError::ApiRequestFailed {
                message: "batch annotate response carried no operation name".into(),
            }),
        }
    }

    async fn poll_status(&self, operation: &OperationHandle) -> Result<OperationStatus, OcrError> {
        let url = self.url(operation.as_str());
        let response = self
            .credentials
            .apply(self.http.get(url.clone()))
            .send()
            .await
            .map_err(|e| OcrError::ApiRequestFailed {
                message: format!("GET {url}: {e}"),
            })?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(|e| OcrError::ApiRequestFailed {
            message: format!("invalid operation status: {e}"),
        })
    }

    async fn annotate_image(
        &self,
        image_path: &Path,
        language_hints: &[String],
    ) -> Result<AnnotateImageResponse, OcrError> {
        let encoded = encode_image_file(image_path).await?;
        info!(
            "Annotating {} ({:?}) synchronously",
            image_path.display(),
            encoded.format
        );

        let response = self
            .post_json("images:annotate", &image_request_body(&encoded.content, language_hints))
            .await?;
        let batch: BatchAnnotateImagesResponse =
            response.json().await.map_err(|e| OcrError::ApiRequestFailed {
                message: format!("invalid annotate response: {e}"),
            })?;

        let first = batch.responses.into_iter().next().unwrap_or_default();
        if let Some(err) = &first.error {
            return Err(OcrError::ApiRequestFailed {
                message: format!("annotate error {}: {}", err.code, err.message),
            });
        }
        Ok(first)
    }
}
