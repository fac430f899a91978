//! Text extraction: recognition responses → one string per page.
//!
//! ## Two modes
//!
//! * **Baseline** - both options off. The service already flattens each page
//!   into `fullTextAnnotation.text`; that string is used verbatim.
//! * **Detailed** - ruby removal and/or line-break normalisation requested.
//!   The page is rebuilt glyph by glyph from the
//!   `page → block → paragraph → word → symbol` tree so individual glyphs
//!   can be dropped and break markers reinterpreted. A response without the
//!   tree falls back to baseline.
//!
//! Paragraphs always end the current run of text. Empty paragraphs are
//! dropped. The rest are joined with `\n`, or with a blank line when
//! normalising, so a Markdown renderer sees real paragraph breaks.

use crate::pipeline::geometry::{is_ruby, ruby_threshold, symbol_height};
use crate::remote::model::{AnnotateFileResponse, AnnotateImageResponse, BreakType, Paragraph};
use serde::{Deserialize, Serialize};

/// Which repairs to apply while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub remove_ruby: bool,
    pub normalize_line_breaks: bool,
}

impl ExtractOptions {
    fn is_detailed(&self) -> bool {
        self.remove_ruby || self.normalize_line_breaks
    }
}

impl From<&crate::config::JobOptions> for ExtractOptions {
    fn from(o: &crate::config::JobOptions) -> Self {
        Self {
            remove_ruby: o.remove_ruby,
            normalize_line_breaks: o.normalize_line_breaks,
        }
    }
}

/// Extract page texts from result files already in page order.
///
/// Every response is one page, so the output length equals the total number
/// of responses across `documents`.
pub fn extract_pages(documents: &[AnnotateFileResponse], options: ExtractOptions) -> Vec<String> {
    documents
        .iter()
        .flat_map(|doc| doc.responses.iter())
        .map(|response| extract_page(response, options))
        .collect()
}

/// Extract the text of one recognized page. Never fails: a page with no
/// recognizable text yields an empty string.
pub fn extract_page(response: &AnnotateImageResponse, options: ExtractOptions) -> String {
    let Some(annotation) = response.full_text_annotation.as_ref() else {
        return String::new();
    };

    let has_geometry = annotation.pages.iter().any(|p| !p.blocks.is_empty());
    if !options.is_detailed() || !has_geometry {
        return annotation.text.clone().unwrap_or_default();
    }

    let separator = if options.normalize_line_breaks {
        "\n\n"
    } else {
        "\n"
    };

    let mut paragraphs = Vec::new();
    for page in &annotation.pages {
        for block in &page.blocks {
            let threshold = if options.remove_ruby {
                ruby_threshold(block)
            } else {
                0.0
            };
            for paragraph in &block.paragraphs {
                let text = rebuild_paragraph(paragraph, threshold, options);
                if !text.is_empty() {
                    paragraphs.push(text);
                }
            }
        }
    }

    paragraphs.join(separator)
}

/// Concatenate the kept glyphs of one paragraph, honouring break markers.
fn rebuild_paragraph(paragraph: &Paragraph, threshold: f64, options: ExtractOptions) -> String {
    let mut out = String::new();

    for symbol in paragraph.words.iter().flat_map(|w| w.symbols.iter()) {
        if options.remove_ruby && is_ruby(symbol_height(symbol), threshold) {
            continue;
        }
        out.push_str(&symbol.text);

        match symbol.detected_break() {
            Some(BreakType::Space | BreakType::SureSpace) => out.push(' '),
            Some(BreakType::LineBreak | BreakType::EolSureSpace) => {
                if !options.normalize_line_breaks {
                    out.push('\n');
                }
            }
            // hyphen/unknown: the glyph itself carries the text
            Some(BreakType::Hyphen | BreakType::Unknown) | None => {}
        }
    }

    out.truncate(out.trim_end().len());
    out
}
