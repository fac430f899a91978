//! Image encoding for the synchronous annotate call.
//!
//! The single-image endpoint takes the image inline as base64 in the JSON
//! request body. Before encoding we sniff the bytes with `image` so a JPEG
//! renamed to `.png` (fine) or a text file renamed to `.png` (not fine) is
//! caught locally instead of as an opaque API error.

use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// A base64-encoded image ready for the annotate request body.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub content: String,
    pub format: ImageFormat,
}

/// Read an image file and base64-encode it.
pub async fn encode_image_file(path: &Path) -> Result<EncodedImage, OcrError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            OcrError::Internal(format!("Failed to read {}: {e}", path.display()))
        }
    })?;
    encode_image_bytes(path, &bytes)
}

/// Base64-encode image bytes after checking they are PNG or JPEG.
pub fn encode_image_bytes(path: &Path, bytes: &[u8]) -> Result<EncodedImage, OcrError> {
    let format = image::guess_format(bytes).map_err(|_| OcrError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: "unrecognised image data".to_string(),
    })?;

    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(OcrError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: format!("{format:?}").to_lowercase(),
        });
    }

    let content = STANDARD.encode(bytes);
    debug!("Encoded {:?} image → {} bytes base64", format, content.len());

    Ok(EncodedImage { content, format })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn encode_small_png() {
        let bytes = png_bytes();
        let encoded = encode_image_bytes(Path::new("page.png"), &bytes).expect("encode");
        assert_eq!(encoded.format, ImageFormat::Png);
        let decoded = STANDARD.decode(&encoded.content).expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn reject_non_image() {
        let err = encode_image_bytes(Path::new("fake.png"), b"hello, not an image").unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn encode_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        std::fs::write(&path, png_bytes()).unwrap();
        let encoded = encode_image_file(&path).await.unwrap();
        assert!(!encoded.content.is_empty());
    }
}
