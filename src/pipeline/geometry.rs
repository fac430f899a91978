//! Glyph geometry helpers used by ruby removal.

use crate::remote::model::{Block, BoundingPoly, Symbol};

/// Fraction of the block's median glyph height below which a glyph counts as ruby.
///
/// Ruby glyphs are usually under half the body-text height; 0.6 keeps small
/// body glyphs (punctuation, small kana) while still catching ruby.
pub const RUBY_HEIGHT_RATIO: f64 = 0.6;

/// Vertical span of a polygon: max y − min y.
///
/// Pixel `vertices` are used when there are at least four, otherwise the
/// `normalized_vertices` of batch results. The ruby test only compares
/// heights within one block, so the unit does not matter. Zero when neither
/// list has four vertices.
pub fn polygon_height(poly: &BoundingPoly) -> f64 {
    if poly.vertices.len() >= 4 {
        y_span(poly.vertices.iter().map(|v| v.y))
    } else if poly.normalized_vertices.len() >= 4 {
        y_span(poly.normalized_vertices.iter().map(|v| v.y))
    } else {
        0.0
    }
}

fn y_span(ys: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });
    max - min
}

/// Height of a symbol's bounding box; zero when it has none.
pub fn symbol_height(symbol: &Symbol) -> f64 {
    symbol.bounding_box.as_ref().map_or(0.0, polygon_height)
}

/// Median of `values`; 0 for an empty slice. Even lengths average the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Height of every symbol in the block, in reading order.
pub fn block_symbol_heights(block: &Block) -> Vec<f64> {
    block
        .paragraphs
        .iter()
        .flat_map(|p| p.words.iter())
        .flat_map(|w| w.symbols.iter())
        .map(symbol_height)
        .collect()
}

/// Ruby threshold for a block: 0.6 × median of its positive glyph heights.
pub fn ruby_threshold(block: &Block) -> f64 {
    let positive: Vec<f64> = block_symbol_heights(block)
        .into_iter()
        .filter(|h| *h > 0.0)
        .collect();
    median(&positive) * RUBY_HEIGHT_RATIO
}

/// A glyph is ruby when its height is positive and strictly below the threshold.
/// Glyphs without usable geometry are never ruby.
pub fn is_ruby(height: f64, threshold: f64) -> bool {
    height > 0.0 && height < threshold
}
