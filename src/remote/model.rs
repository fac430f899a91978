//! Wire model of the Vision recognition response.
//!
//! Only the fields the extraction engine reads are modelled; everything else
//! in the JSON is ignored by serde. Every level is optional on the wire, so
//! every field defaults to empty rather than failing the parse.
//!
//! ```text
//! AnnotateFileResponse
//!  └─ responses[]            one per recognized page
//!      └─ fullTextAnnotation
//!          ├─ text           page text, already flattened by the service
//!          └─ pages[] → blocks[] → paragraphs[] → words[] → symbols[]
//! ```

use serde::{Deserialize, Serialize};

/// Content of one batch result file (`output-<start>-to-<end>.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateFileResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

/// Recognition result for one page (batch) or one image (sync call).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    pub context: Option<ImageContext>,
    #[serde(default)]
    pub error: Option<RpcStatus>,
}

/// Where a response came from inside the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContext {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default)]
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    #[serde(default)]
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    #[serde(default)]
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub property: Option<TextProperty>,
}

impl Symbol {
    /// The break the service detected after this glyph, if any.
    pub fn detected_break(&self) -> Option<BreakType> {
        self.property
            .as_ref()
            .and_then(|p| p.detected_break.as_ref())
            .map(|b| b.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProperty {
    #[serde(default)]
    pub detected_break: Option<DetectedBreak>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBreak {
    #[serde(rename = "type", default)]
    pub kind: BreakType,
}

/// Break marker attached to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakType {
    #[default]
    Unknown,
    Space,
    SureSpace,
    EolSureSpace,
    Hyphen,
    LineBreak,
}

/// Four-vertex polygon around a recognized element.
///
/// The synchronous image call fills `vertices` in pixels. File batch results
/// (PDF/TIFF/GIF) fill `normalized_vertices` instead, in page fractions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub normalized_vertices: Vec<NormalizedVertex>,
}

/// Pixel coordinates. The service omits a coordinate that equals zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Coordinates relative to the page size, in `0.0..=1.0`. Zero is omitted
/// on the wire as for [`Vertex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// `google.rpc.Status` as embedded in responses and operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sparse_response() {
        let json = r#"{
            "inputConfig": {"mimeType": "application/pdf"},
            "responses": [
                {
                    "fullTextAnnotation": {
                        "text": "本文\n",
                        "pages": [{
                            "width": 1000,
                            "blocks": [{
                                "paragraphs": [{
                                    "words": [{
                                        "symbols": [{
                                            "text": "本",
                                            "boundingBox": {"vertices": [{"x": 1}, {"x": 9}, {"x": 9, "y": 10}, {"y": 10}]},
                                            "property": {"detectedBreak": {"type": "LINE_BREAK"}}
                                        }]
                                    }]
                                }]
                            }]
                        }]
                    },
                    "context": {"uri": "gs://b/input/1-a.pdf", "pageNumber": 1}
                },
                {}
            ]
        }"#;

        let parsed: AnnotateFileResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.responses.len(), 2);

        let first = &parsed.responses[0];
        assert_eq!(first.context.as_ref().unwrap().page_number, Some(1));
        let symbol = &first.full_text_annotation.as_ref().unwrap().pages[0].blocks[0].paragraphs[0]
            .words[0]
            .symbols[0];
        assert_eq!(symbol.detected_break(), Some(BreakType::LineBreak));
        let v = &symbol.bounding_box.as_ref().unwrap().vertices;
        assert_eq!(v[0], Vertex { x: 1.0, y: 0.0 });
        assert_eq!(v[3], Vertex { x: 0.0, y: 10.0 });

        assert!(parsed.responses[1].full_text_annotation.is_none());
    }

    #[test]
    fn parse_normalized_vertices() {
        let json = r#"{"normalizedVertices": [{"x": 0.1, "y": 0.2}, {"x": 0.15, "y": 0.2}, {"x": 0.15, "y": 0.3}, {"x": 0.1}]}"#;
        let poly: BoundingPoly = serde_json::from_str(json).unwrap();
        assert!(poly.vertices.is_empty());
        assert_eq!(poly.normalized_vertices.len(), 4);
        assert_eq!(poly.normalized_vertices[2], NormalizedVertex { x: 0.15, y: 0.3 });
        assert_eq!(poly.normalized_vertices[3], NormalizedVertex { x: 0.1, y: 0.0 });
    }

    #[test]
    fn parse_break_types() {
        let b: DetectedBreak = serde_json::from_str(r#"{"type": "EOL_SURE_SPACE"}"#).unwrap();
        assert_eq!(b.kind, BreakType::EolSureSpace);
        let b: DetectedBreak = serde_json::from_str(r#"{"type": "SURE_SPACE"}"#).unwrap();
        assert_eq!(b.kind, BreakType::SureSpace);
    }
}
