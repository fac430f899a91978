//! Ordered progress events for a running job.
//!
//! The orchestrator pushes [`JobEvent`]s into a bounded `tokio::sync::mpsc`
//! channel. The caller drains the receiving end (or wraps it as a
//! [`JobEventStream`]) and forwards events to whatever surface it owns: a
//! terminal progress bar, a WebSocket, a log file.
//!
//! A job emits zero or more [`JobEvent::Progress`] events followed by
//! exactly one terminal event, either [`JobEvent::Completed`] or
//! [`JobEvent::Failed`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2md::progress::{event_channel, JobEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (tx, mut rx) = event_channel(16);
//! tx.progress(edgequake_ocr2md::Phase::Upload, "Uploading", Some(10)).await;
//! drop(tx);
//! while let Some(event) = rx.recv().await {
//!     assert!(matches!(event, JobEvent::Progress { .. }));
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The job step a progress or error event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Upload,
    ApiRequest,
    Polling,
    Download,
    Parse,
    Save,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Upload => "upload",
            Phase::ApiRequest => "api-request",
            Phase::Polling => "polling",
            Phase::Download => "download",
            Phase::Parse => "parse",
            Phase::Save => "save",
        };
        f.write_str(s)
    }
}

/// One event on the job's progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A step boundary or a poll tick.
    Progress {
        timestamp: DateTime<Utc>,
        phase: Phase,
        message: String,
        /// 0–100 when the step has a meaningful position.
        percentage: Option<u8>,
    },
    /// Terminal: the Markdown file was written.
    Completed {
        timestamp: DateTime<Utc>,
        output_path: PathBuf,
        page_count: usize,
        processing_time_ms: u64,
    },
    /// Terminal: the job stopped on its first unrecoverable error.
    Failed {
        timestamp: DateTime<Utc>,
        phase: Phase,
        error_message: String,
        details: Option<String>,
    },
}

impl JobEvent {
    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress { .. })
    }
}

/// Receiving end of a job's events as a `Stream`.
pub type JobEventStream = ReceiverStream<JobEvent>;

/// Sending half used by the orchestrator.
///
/// Sends wait for channel capacity, so a slow consumer slows the job down
/// instead of losing events. If the receiver has been dropped the event is
/// discarded; a caller that stops listening does not abort the job.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<JobEvent>>,
}

impl ProgressSender {
    /// A sender that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub async fn send(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }

    pub async fn progress(&self, phase: Phase, message: impl Into<String>, percentage: Option<u8>) {
        self.send(JobEvent::Progress {
            timestamp: Utc::now(),
            phase,
            message: message.into(),
            percentage: percentage.map(|p| p.min(100)),
        })
        .await;
    }
}

/// Create a bounded event channel.
pub fn event_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<JobEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx: Some(tx) }, rx)
}

/// Create a bounded event channel whose receiving end is a `Stream`.
pub fn event_stream(capacity: usize) -> (ProgressSender, JobEventStream) {
    let (tx, rx) = event_channel(capacity);
    (tx, ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (tx, mut rx) = event_channel(4);
        tx.progress(Phase::Upload, "a", Some(5)).await;
        tx.progress(Phase::ApiRequest, "b", Some(20)).await;
        tx.progress(Phase::Polling, "c", None).await;
        drop(tx);

        let mut phases = Vec::new();
        while let Some(JobEvent::Progress { phase, .. }) = rx.recv().await {
            phases.push(phase);
        }
        assert_eq!(phases, vec![Phase::Upload, Phase::ApiRequest, Phase::Polling]);
    }

    #[tokio::test]
    async fn percentage_is_capped() {
        let (tx, mut rx) = event_channel(1);
        tx.progress(Phase::Save, "done", Some(250)).await;
        match rx.recv().await {
            Some(JobEvent::Progress { percentage, .. }) => assert_eq!(percentage, Some(100)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_is_ignored() {
        let (tx, rx) = event_channel(1);
        drop(rx);
        tx.progress(Phase::Upload, "nobody listens", None).await;
        ProgressSender::disabled()
            .progress(Phase::Upload, "disabled", None)
            .await;
    }

    #[tokio::test]
    async fn stream_wrapper_yields_events() {
        let (tx, stream) = event_stream(2);
        tx.progress(Phase::Download, "x", Some(70)).await;
        drop(tx);
        let events: Vec<JobEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_terminal());
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::ApiRequest.to_string(), "api-request");
        assert_eq!(
            serde_json::to_string(&Phase::ApiRequest).unwrap(),
            "\"api-request\""
        );
    }
}
