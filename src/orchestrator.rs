//! Job orchestration: one source document in, one Markdown file out.
//!
//! ```text
//! source ─ classify ─┬─ Sync  ── annotate image ─────────────────────────┐
//!        (split PDF) └─ Batch ── bucket check → upload → submit → poll   │
//!                                → list → download (parallel, barrier)   │
//!                                → order → parse (skip bad files) ───────┤
//!                                                       extract → compose → write
//! ```
//!
//! Every fatal error stops the job at the step where it happened; nothing is
//! retried here. The caller sees the error twice: as the `Err` returned by
//! [`Orchestrator::run`] and as the single terminal
//! [`JobEvent::Failed`](crate::progress::JobEvent::Failed) event.

use crate::config::{JobConfig, RESULT_BATCH_SIZE};
use crate::error::{OcrError, ResultFileError};
use crate::output::JobOutput;
use crate::pipeline::compose::compose_markdown;
use crate::pipeline::extract::{extract_page, extract_pages, ExtractOptions};
use crate::pipeline::input::{resolve_source, ProcessingStrategy, SourceDocument};
use crate::pipeline::ranges::sort_result_files;
use crate::pipeline::split::split_spreads;
use crate::progress::{JobEvent, Phase, ProgressSender};
use crate::remote::model::AnnotateFileResponse;
use crate::remote::{
    gs_uri, BatchRequest, Credentials, GcsStorage, OcrClient, OperationHandle, StorageClient,
    VisionClient,
};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a job is in its lifecycle.
///
/// ```text
/// Idle → Uploading → Requesting → Polling ⟲ → Downloading → Parsing → Saving → Complete
/// Idle → Requesting → Parsing → Saving → Complete              (single image)
/// any non-terminal state → Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Uploading,
    Requesting,
    Polling,
    Downloading,
    Parsing,
    Saving,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// Whether `self → next` is a legal step.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Uploading)
                | (Idle, Requesting)
                | (Uploading, Requesting)
                | (Requesting, Polling)
                | (Requesting, Parsing)
                | (Polling, Polling)
                | (Polling, Downloading)
                | (Downloading, Parsing)
                | (Parsing, Saving)
                | (Saving, Complete)
        )
    }

    /// Progress phase reported for work done in this state.
    pub fn phase(self) -> Phase {
        match self {
            JobState::Idle | JobState::Uploading => Phase::Upload,
            JobState::Requesting => Phase::ApiRequest,
            JobState::Polling => Phase::Polling,
            JobState::Downloading => Phase::Download,
            JobState::Parsing => Phase::Parse,
            JobState::Saving | JobState::Complete | JobState::Failed => Phase::Save,
        }
    }
}

/// Runs OCR jobs against a storage backend and an OCR service.
///
/// One instance runs one job at a time (`run` takes `&mut self`); use one
/// instance per concurrent job.
pub struct Orchestrator<S, O> {
    config: JobConfig,
    storage: S,
    ocr: O,
    events: ProgressSender,
    state: JobState,
}

impl Orchestrator<GcsStorage, VisionClient> {
    /// Orchestrator over the bundled Cloud Storage and Vision clients.
    pub fn connect(config: JobConfig, credentials: Credentials) -> Result<Self, OcrError> {
        let storage = GcsStorage::connect(credentials.clone())?;
        let ocr = VisionClient::connect(credentials)?;
        Ok(Self::new(config, storage, ocr))
    }
}

impl<S: StorageClient, O: OcrClient> Orchestrator<S, O> {
    pub fn new(config: JobConfig, storage: S, ocr: O) -> Self {
        Self {
            config,
            storage,
            ocr,
            events: ProgressSender::disabled(),
            state: JobState::Idle,
        }
    }

    /// Send progress events to `events` (see [`crate::progress::event_stream`]).
    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// State of the current (or last) job.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Convert `source` to `<output_dir>/<stem>.md`.
    ///
    /// Emits progress events at every step boundary and exactly one terminal
    /// event, `Completed` or `Failed`.
    pub async fn run(&mut self, source: impl AsRef<Path>) -> Result<JobOutput, OcrError> {
        let started = Instant::now();
        let source = source.as_ref();
        self.state = JobState::Idle;
        info!("Starting OCR job: {}", source.display());

        match self.execute(source, started).await {
            Ok(output) => {
                info!(
                    "Job complete: {} pages → {} in {}ms",
                    output.page_count,
                    output.output_path.display(),
                    output.processing_time_ms
                );
                self.events
                    .send(JobEvent::Completed {
                        timestamp: Utc::now(),
                        output_path: output.output_path.clone(),
                        page_count: output.page_count,
                        processing_time_ms: output.processing_time_ms,
                    })
                    .await;
                Ok(output)
            }
            Err(err) => {
                let phase = self.state.phase();
                warn!("Job failed during {} ({:?}): {}", phase, self.state, err);
                self.state = JobState::Failed;
                self.events
                    .send(JobEvent::Failed {
                        timestamp: Utc::now(),
                        phase,
                        error_message: err.to_string(),
                        details: Some(err.kind().to_string()),
                    })
                    .await;
                Err(err)
            }
        }
    }

    async fn execute(&mut self, path: &Path, started: Instant) -> Result<JobOutput, OcrError> {
        let source = resolve_source(path)?;

        let split = if self.config.options.split_spread {
            if source.strategy.is_pdf() {
                self.events
                    .progress(Phase::Upload, "Splitting spread pages", Some(2))
                    .await;
                let split = split_spreads(&source.path, self.config.options.right_to_left).await?;
                info!(
                    "Split {} spreads → {} pages",
                    split.spread_count, split.page_count
                );
                Some(split)
            } else {
                warn!(
                    "Spread splitting only applies to PDF; ignoring it for {}",
                    source.path.display()
                );
                None
            }
        } else {
            None
        };
        let document_path = split
            .as_ref()
            .map(|s| s.path().to_path_buf())
            .unwrap_or_else(|| source.path.clone());

        let pages = match source.strategy {
            ProcessingStrategy::Sync => self.recognize_image(&document_path).await,
            ProcessingStrategy::Batch { mime_type } => {
                self.recognize_batch(&source, &document_path, mime_type).await
            }
        };

        if let Some(split) = split {
            if let Err(e) = split.remove() {
                warn!("Failed to remove split PDF: {}", e);
            }
        }

        let pages = pages?;
        let output_path = self.save(&source, &pages).await?;

        Ok(JobOutput {
            output_path,
            page_count: pages.len(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn transition(&mut self, next: JobState) -> Result<(), OcrError> {
        if !self.state.can_transition_to(next) {
            return Err(OcrError::Internal(format!(
                "invalid job state transition {:?} → {:?}",
                self.state, next
            )));
        }
        debug!("Job state {:?} → {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::from(&self.config.options)
    }

    // ── Sync strategy ───────────────────────────────────────────────────────

    async fn recognize_image(&mut self, image: &Path) -> Result<Vec<String>, OcrError> {
        self.transition(JobState::Requesting)?;
        self.events
            .progress(Phase::ApiRequest, "Recognizing image", Some(20))
            .await;
        let response = self
            .ocr
            .annotate_image(image, &self.config.language_hints)
            .await?;

        self.transition(JobState::Parsing)?;
        self.events
            .progress(Phase::Parse, "Extracting text", Some(80))
            .await;
        Ok(vec![extract_page(&response, self.extract_options())])
    }

    // ── Batch strategy ──────────────────────────────────────────────────────

    async fn recognize_batch(
        &mut self,
        source: &SourceDocument,
        document: &Path,
        mime_type: &str,
    ) -> Result<Vec<String>, OcrError> {
        let bucket = self.config.bucket.clone();
        if bucket.is_empty() {
            return Err(OcrError::InvalidConfig(format!(
                "a bucket is required for {} sources",
                mime_type
            )));
        }
        // Scoped to the whole batch path; closed on success and failure alike
        let workdir = tempfile::Builder::new()
            .prefix("ocr2md-")
            .tempdir()
            .map_err(|e| OcrError::Internal(format!("tempdir: {e}")))?;

        let pages = self
            .run_batch(source, document, mime_type, &bucket, workdir.path())
            .await;

        let workdir_path = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!("Failed to remove {}: {}", workdir_path.display(), e);
        }
        pages
    }

    async fn run_batch(
        &mut self,
        source: &SourceDocument,
        document: &Path,
        mime_type: &str,
        bucket: &str,
        workdir: &Path,
    ) -> Result<Vec<String>, OcrError> {
        let timestamp = Utc::now().timestamp_millis();
        let input_object = format!("input/{}-{}", timestamp, source.file_name());
        let output_prefix = format!("output/{}/", timestamp);

        self.transition(JobState::Uploading)?;
        self.events
            .progress(Phase::Upload, format!("Checking bucket {bucket}"), Some(5))
            .await;
        if !self.storage.bucket_exists(bucket).await? {
            return Err(OcrError::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }

        self.events
            .progress(
                Phase::Upload,
                format!("Uploading {}", source.file_name()),
                Some(10),
            )
            .await;
        self.storage.upload(document, bucket, &input_object).await?;

        self.transition(JobState::Requesting)?;
        self.events
            .progress(Phase::ApiRequest, "Submitting batch recognition", Some(20))
            .await;
        let request = BatchRequest {
            input_uri: gs_uri(bucket, &input_object),
            output_uri_prefix: gs_uri(bucket, &output_prefix),
            mime_type: mime_type.to_string(),
            batch_size: RESULT_BATCH_SIZE,
            language_hints: self.config.language_hints.clone(),
        };
        let operation = self.ocr.submit_batch(&request).await?;
        info!("Batch operation {} submitted", operation);

        self.transition(JobState::Polling)?;
        self.wait_for(&operation).await?;

        self.transition(JobState::Downloading)?;
        self.collect_results(bucket, &output_prefix, workdir).await
    }

    /// Poll at the fixed interval until the operation is done, reports an
    /// error, or the timeout elapses.
    async fn wait_for(&mut self, operation: &OperationHandle) -> Result<(), OcrError> {
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let interval = Duration::from_millis(self.config.polling_interval_ms);

        loop {
            // A stalled status call counts against the job timeout too
            let remaining = timeout.saturating_sub(started.elapsed());
            let poll = self.ocr.poll_status(operation);
            let status = match tokio::time::timeout(remaining, poll).await {
                Ok(status) => status?,
                Err(_) => return Err(self.timed_out(operation)),
            };
            if let Some(err) = &status.error {
                return Err(OcrError::ApiRequestFailed {
                    message: format!(
                        "operation {} failed (code {}): {}",
                        operation, err.code, err.message
                    ),
                });
            }
            if status.done {
                debug!("Operation {} done after {:?}", operation, started.elapsed());
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(self.timed_out(operation));
            }

            let service_state = status.state().map(|s| format!(", {s}")).unwrap_or_default();
            self.events
                .progress(
                    Phase::Polling,
                    format!(
                        "Waiting for recognition ({}s elapsed{})",
                        elapsed.as_secs(),
                        service_state
                    ),
                    Some(30),
                )
                .await;

            tokio::time::sleep(interval.min(timeout - elapsed)).await;
            self.transition(JobState::Polling)?;
        }
    }

    fn timed_out(&self, operation: &OperationHandle) -> OcrError {
        OcrError::OperationTimeout {
            operation: operation.to_string(),
            timeout_ms: self.config.timeout_ms,
        }
    }

    async fn collect_results(
        &mut self,
        bucket: &str,
        prefix: &str,
        workdir: &Path,
    ) -> Result<Vec<String>, OcrError> {
        let names: Vec<String> = self
            .storage
            .list(bucket, prefix)
            .await?
            .into_iter()
            .filter(|name| name.ends_with(".json"))
            .collect();
        if names.is_empty() {
            return Err(OcrError::NoResults {
                prefix: gs_uri(bucket, prefix),
            });
        }

        let total = names.len();
        self.events
            .progress(
                Phase::Download,
                format!("Downloading {total} result files"),
                Some(40),
            )
            .await;

        let storage = &self.storage;
        let events = &self.events;
        let done = AtomicUsize::new(0);
        let done = &done;
        let files: Vec<PathBuf> = stream::iter(names)
            .map(|name| async move {
                let local = local_result_path(workdir, prefix, &name);
                if let Some(parent) = local.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| OcrError::DownloadFailed {
                            source_path: name.clone(),
                            reason: format!("{}: {e}", parent.display()),
                        })?;
                }
                storage.download(bucket, &name, &local).await?;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Downloaded {} ({}/{})", name, n, total);
                events
                    .progress(
                        Phase::Download,
                        format!("Downloaded {n}/{total}"),
                        Some((40 + 30 * n / total) as u8),
                    )
                    .await;
                Ok::<_, OcrError>(local)
            })
            .buffer_unordered(self.config.download_concurrency)
            .try_collect()
            .await?;

        self.transition(JobState::Parsing)?;
        self.events
            .progress(Phase::Parse, "Parsing result files", Some(80))
            .await;

        let ordered = sort_result_files(files);
        let mut documents = Vec::with_capacity(ordered.len());
        let mut failures = Vec::new();
        for path in &ordered {
            match parse_result_file(path).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!("Skipping result file: {}", e);
                    failures.push(e);
                }
            }
        }

        if documents.is_empty() {
            return Err(OcrError::ResultParseFailure {
                total: ordered.len(),
                first_error: failures
                    .first()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no result files".to_string()),
            });
        }
        if !failures.is_empty() {
            warn!(
                "{} of {} result files skipped; their pages are missing from the output",
                failures.len(),
                ordered.len()
            );
        }

        Ok(extract_pages(&documents, self.extract_options()))
    }

    // ── Output ──────────────────────────────────────────────────────────────

    async fn save(&mut self, source: &SourceDocument, pages: &[String]) -> Result<PathBuf, OcrError> {
        self.transition(JobState::Saving)?;
        let path = source.markdown_path(&self.config.output_dir);
        self.events
            .progress(
                Phase::Save,
                format!("Writing {}", path.display()),
                Some(90),
            )
            .await;

        let markdown = compose_markdown(pages);
        write_atomic(&path, &markdown).await?;

        self.transition(JobState::Complete)?;
        Ok(path)
    }
}

/// Local path for a listed result object: its name relative to `prefix`,
/// under `workdir`. Objects in different sub-prefixes keep distinct paths.
/// Empty, `.` and `..` segments are dropped so nothing escapes `workdir`.
fn local_result_path(workdir: &Path, prefix: &str, name: &str) -> PathBuf {
    name.strip_prefix(prefix)
        .unwrap_or(name)
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .fold(workdir.to_path_buf(), |path, seg| path.join(seg))
}

/// Read and parse one downloaded result file.
async fn parse_result_file(path: &Path) -> Result<AnnotateFileResponse, ResultFileError> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ResultFileError::ReadFailed {
            file: file.clone(),
            detail: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| ResultFileError::InvalidJson {
        file,
        detail: e.to_string(),
    })
}

/// Write to `<path>.tmp`, then rename over `path`, so readers never see a
/// partial file.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), OcrError> {
    let write_err = |source: std::io::Error| OcrError::FileWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_path_is_legal() {
        use JobState::*;
        let path = [
            Idle,
            Uploading,
            Requesting,
            Polling,
            Polling,
            Downloading,
            Parsing,
            Saving,
            Complete,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} → {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn sync_path_is_legal() {
        use JobState::*;
        for pair in [Idle, Requesting, Parsing, Saving, Complete].windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
    }

    #[test]
    fn illegal_transitions() {
        use JobState::*;
        assert!(!Idle.can_transition_to(Polling));
        assert!(!Uploading.can_transition_to(Downloading));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Idle));
        assert!(Polling.can_transition_to(Failed));
        assert!(Idle.can_transition_to(Failed));
    }

    #[test]
    fn failure_phase_follows_state() {
        assert_eq!(JobState::Idle.phase(), Phase::Upload);
        assert_eq!(JobState::Requesting.phase(), Phase::ApiRequest);
        assert_eq!(JobState::Polling.phase(), Phase::Polling);
        assert_eq!(JobState::Downloading.phase(), Phase::Download);
    }

    #[test]
    fn result_paths_keep_sub_prefixes() {
        let work = Path::new("/tmp/ocr2md-x");
        let prefix = "output/17/";
        assert_eq!(
            local_result_path(work, prefix, "output/17/output-1-to-2.json"),
            work.join("output-1-to-2.json")
        );
        assert_ne!(
            local_result_path(work, prefix, "output/17/a/output-1-to-2.json"),
            local_result_path(work, prefix, "output/17/b/output-1-to-2.json")
        );
        assert_eq!(
            local_result_path(work, prefix, "output/17/../../etc/x.json"),
            work.join("etc").join("x.json")
        );
    }

    #[tokio::test]
    async fn atomic_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/scan.md");
        write_atomic(&target, "# Page 1\n\nx\n\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Page 1\n\nx\n\n");
        assert!(!target.with_extension("md.tmp").exists());
    }

    #[tokio::test]
    async fn bad_result_file_is_non_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output-1-to-2.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = parse_result_file(&path).await.unwrap_err();
        assert!(matches!(err, ResultFileError::InvalidJson { ref file, .. } if file == "output-1-to-2.json"));

        let missing = parse_result_file(&dir.path().join("gone.json")).await.unwrap_err();
        assert!(matches!(missing, ResultFileError::ReadFailed { .. }));
    }
}
