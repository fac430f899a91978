//! Result of a completed job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What [`crate::orchestrator::Orchestrator::run`] returns on success.
///
/// Serialisable so the CLI can print it with `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    /// The Markdown file that was written.
    pub output_path: PathBuf,
    /// Number of `# Page N` sections in the document.
    pub page_count: usize,
    /// Wall-clock time of the whole job.
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_snake_case() {
        let out = JobOutput {
            output_path: PathBuf::from("out/scan.md"),
            page_count: 3,
            processing_time_ms: 1200,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["output_path"], "out/scan.md");
        assert_eq!(json["page_count"], 3);
        assert_eq!(json["processing_time_ms"], 1200);
    }
}
