//! Input resolution: validate the source file and pick a processing strategy.
//!
//! ## Why classify by extension?
//!
//! The OCR service's asynchronous batch mode only reads PDF, TIFF and GIF
//! from object storage. PNG and JPEG must go through the synchronous
//! single-image call instead. The decision is made once, here, and carried
//! through the job as a [`ProcessingStrategy`] so nothing downstream has to
//! look at file names again.

use crate::error::OcrError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a source document is sent to the OCR service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStrategy {
    /// One synchronous annotate call; the result is exactly one page.
    Sync,
    /// Upload, asynchronous batch annotate, poll, download result files.
    Batch { mime_type: &'static str },
}

impl ProcessingStrategy {
    /// Classify a path by its (case-insensitive) extension.
    pub fn classify(path: &Path) -> Result<Self, OcrError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "png" | "jpg" | "jpeg" => Ok(ProcessingStrategy::Sync),
            "pdf" => Ok(ProcessingStrategy::Batch {
                mime_type: "application/pdf",
            }),
            "tif" | "tiff" => Ok(ProcessingStrategy::Batch {
                mime_type: "image/tiff",
            }),
            "gif" => Ok(ProcessingStrategy::Batch {
                mime_type: "image/gif",
            }),
            _ => Err(OcrError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// `true` when the source is a PDF (the only format the spread splitter handles).
    pub fn is_pdf(&self) -> bool {
        matches!(
            self,
            ProcessingStrategy::Batch {
                mime_type: "application/pdf"
            }
        )
    }
}

/// A validated source file and its strategy.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub strategy: ProcessingStrategy,
}

impl SourceDocument {
    /// File name used in the remote input object name.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }

    /// `<output_dir>/<source name with extension replaced by .md>`.
    pub fn markdown_path(&self, output_dir: &Path) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        output_dir.join(format!("{stem}.md"))
    }
}

/// Validate that `path` exists and is a regular file, then classify it.
///
/// Classification happens first so an unsupported file is reported as such
/// even before it is touched on disk.
pub fn resolve_source(path: &Path) -> Result<SourceDocument, OcrError> {
    let strategy = ProcessingStrategy::classify(path)?;

    if !path.is_file() {
        return Err(OcrError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    debug!("Resolved source {} as {:?}", path.display(), strategy);
    Ok(SourceDocument {
        path: path.to_path_buf(),
        strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_formats() {
        assert_eq!(
            ProcessingStrategy::classify(Path::new("a.PNG")).unwrap(),
            ProcessingStrategy::Sync
        );
        assert_eq!(
            ProcessingStrategy::classify(Path::new("a.jpeg")).unwrap(),
            ProcessingStrategy::Sync
        );
        assert_eq!(
            ProcessingStrategy::classify(Path::new("book.pdf")).unwrap(),
            ProcessingStrategy::Batch {
                mime_type: "application/pdf"
            }
        );
        assert_eq!(
            ProcessingStrategy::classify(Path::new("scan.tif")).unwrap(),
            ProcessingStrategy::Batch {
                mime_type: "image/tiff"
            }
        );
        assert!(ProcessingStrategy::classify(Path::new("a.gif")).is_ok());
    }

    #[test]
    fn unsupported_extension() {
        let err = ProcessingStrategy::classify(Path::new("notes.docx")).unwrap_err();
        match err {
            OcrError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "docx"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(ProcessingStrategy::classify(Path::new("no_extension")).is_err());
    }

    #[test]
    fn only_pdf_is_splittable() {
        assert!(ProcessingStrategy::classify(Path::new("x.pdf")).unwrap().is_pdf());
        assert!(!ProcessingStrategy::classify(Path::new("x.tiff")).unwrap().is_pdf());
        assert!(!ProcessingStrategy::Sync.is_pdf());
    }

    #[test]
    fn missing_source() {
        let err = resolve_source(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, OcrError::SourceNotFound { .. }));
    }

    #[test]
    fn markdown_path_replaces_extension() {
        let doc = SourceDocument {
            path: PathBuf::from("/scans/vol.1.pdf"),
            strategy: ProcessingStrategy::Batch {
                mime_type: "application/pdf",
            },
        };
        assert_eq!(
            doc.markdown_path(Path::new("/out")),
            PathBuf::from("/out/vol.1.md")
        );
        assert_eq!(doc.file_name(), "vol.1.pdf");
    }
}
