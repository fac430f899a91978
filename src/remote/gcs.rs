//! Cloud Storage client over the JSON API.
//!
//! Uploads stream the local file through [`ReaderStream`] and downloads
//! write `bytes_stream()` chunks straight to disk, so memory use does not
//! grow with document size.

use super::auth::Credentials;
use super::{status_error, StorageClient, CONNECT_TIMEOUT};
use crate::error::OcrError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Public Cloud Storage endpoint.
pub const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// A ready Cloud Storage handle.
#[derive(Debug, Clone)]
pub struct GcsStorage {
    http: reqwest::Client,
    credentials: Credentials,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStorage {
    /// Create a handle against the public endpoint.
    pub fn connect(credentials: Credentials) -> Result<Self, OcrError> {
        Self::connect_to(credentials, STORAGE_ENDPOINT)
    }

    /// Create a handle against a custom endpoint (emulators, proxies).
    pub fn connect_to(credentials: Credentials, endpoint: &str) -> Result<Self, OcrError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| OcrError::InvalidConfig(format!("storage endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(OcrError::InvalidConfig(format!(
                "storage endpoint '{endpoint}' cannot be a base URL"
            )));
        }
        // No overall request limit: uploads and downloads scale with the document
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| OcrError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            credentials,
            endpoint,
        })
    }

    /// `endpoint/<segments…>` with every segment percent-encoded, so object
    /// names containing `/` stay a single segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn bucket_url(&self, bucket: &str) -> Url {
        self.url(&["storage", "v1", "b", bucket])
    }

    fn object_url(&self, bucket: &str, object: &str) -> Url {
        self.url(&["storage", "v1", "b", bucket, "o", object])
    }

    fn upload_url(&self, bucket: &str) -> Url {
        self.url(&["upload", "storage", "v1", "b", bucket, "o"])
    }

    /// GET `url`; `Ok(true)` on 2xx, `Ok(false)` on 404.
    async fn probe(&self, url: Url) -> Result<bool, OcrError> {
        let response = self
            .credentials
            .apply(self.http.get(url.clone()))
            .send()
            .await
            .map_err(|e| OcrError::ApiRequestFailed {
                message: format!("GET {url}: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body, |message| {
            OcrError::ApiRequestFailed { message }
        }))
    }
}

#[async_trait]
impl StorageClient for GcsStorage {
    async fn upload(&self, local_path: &Path, bucket: &str, dest_path: &str) -> Result<(), OcrError> {
        let upload_err = |reason: String| OcrError::UploadFailed {
            path: local_path.to_path_buf(),
            destination: super::gs_uri(bucket, dest_path),
            reason,
        };

        let file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| upload_err(e.to_string()))?
            .len();
        info!("Uploading {} ({} bytes) → gs://{}/{}", local_path.display(), len, bucket, dest_path);

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .credentials
            .apply(self.http.post(self.upload_url(bucket)))
            .query(&[("uploadType", "media"), ("name", dest_path)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, upload_err));
        }
        Ok(())
    }

    async fn download(&self, bucket: &str, src_path: &str, local_path: &Path) -> Result<(), OcrError> {
        let download_err = |reason: String| OcrError::DownloadFailed {
            source_path: super::gs_uri(bucket, src_path),
            reason,
        };

        let response = self
            .credentials
            .apply(self.http.get(self.object_url(bucket, src_path)))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, download_err));
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| download_err(format!("create {}: {e}", local_path.display())))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
            written += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| download_err(e.to_string()))?;
        }
        file.flush().await.map_err(|e| download_err(e.to_string()))?;

        debug!("Downloaded gs://{}/{} ({} bytes)", bucket, src_path, written);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, OcrError> {
        let list_err = |reason: String| OcrError::DownloadFailed {
            source_path: super::gs_uri(bucket, prefix),
            reason,
        };

        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .credentials
                .apply(self.http.get(self.url(&["storage", "v1", "b", bucket, "o"])))
                .query(&[("prefix", prefix), ("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(|e| list_err(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, body, list_err));
            }

            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| list_err(format!("invalid listing: {e}")))?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} objects under gs://{}/{}", names.len(), bucket, prefix);
        Ok(names)
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, OcrError> {
        self.probe(self.object_url(bucket, path)).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OcrError> {
        self.probe(self.bucket_url(bucket)).await
    }
}
