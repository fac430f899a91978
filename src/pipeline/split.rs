//! Spread splitting: one landscape scan of two book pages → two portrait pages.
//!
//! ## How
//!
//! Pages are never re-rendered. A spread page's dictionary is cloned twice
//! and each clone gets a `MediaBox`/`CropBox` covering one half of the
//! original visible area. Content streams and resources are shared by
//! reference, so text, images and fonts are untouched and the file grows
//! only by two small dictionaries per spread.
//!
//! The rewritten page list is flattened under the root `Pages` node, so the
//! attributes a page may inherit from intermediate nodes (`Resources`,
//! `MediaBox`, `CropBox`, `Rotate`) are copied onto each page first.
//!
//! lopdf is synchronous and the work is CPU-bound, so [`split_spreads`] runs
//! it on the blocking pool.

use crate::error::OcrError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A rewritten PDF in a temporary file.
///
/// The file is deleted when this value is dropped; call [`SplitPdf::remove`]
/// to delete it explicitly and observe any error.
#[derive(Debug)]
pub struct SplitPdf {
    file: NamedTempFile,
    /// Pages in the rewritten document.
    pub page_count: usize,
    /// Source pages that were split in two.
    pub spread_count: usize,
}

impl SplitPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the temporary file now.
    pub fn remove(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Axis-aligned page rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageBox {
    fn from_object(obj: &Object) -> Option<Self> {
        let values: Vec<f64> = obj
            .as_array()
            .ok()?
            .iter()
            .filter_map(number)
            .collect();
        if values.len() != 4 {
            return None;
        }
        Some(Self {
            x0: values[0].min(values[2]),
            y0: values[1].min(values[3]),
            x1: values[0].max(values[2]),
            y1: values[1].max(values[3]),
        })
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// A page wider than it is tall holds two book pages side by side.
    pub fn is_spread(&self) -> bool {
        self.width() > self.height()
    }

    /// Left and right halves, each exactly half the original width.
    pub fn halves(&self) -> (PageBox, PageBox) {
        let mid = self.x0 + self.width() / 2.0;
        (
            PageBox { x1: mid, ..*self },
            PageBox { x0: mid, ..*self },
        )
    }

    fn to_object(self) -> Object {
        Object::Array(vec![
            Object::from(self.x0 as f32),
            Object::from(self.y0 as f32),
            Object::from(self.x1 as f32),
            Object::from(self.y1 as f32),
        ])
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn split_err(path: &Path, detail: impl std::fmt::Display) -> OcrError {
    OcrError::SplitFailed {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Follow a reference to the object it points at.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look `key` up on the page or, failing that, on its ancestors.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    if let Ok(value) = page.get(key) {
        return Some(value.clone());
    }
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    // page trees are shallow; the bound only guards against cycles
    for _ in 0..64 {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Visible area of a page: its CropBox if it has one, otherwise its MediaBox.
fn visible_box(doc: &Document, page: &Dictionary) -> Option<PageBox> {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .filter_map(|key| page.get(key).ok())
        .find_map(|obj| PageBox::from_object(resolve(doc, obj)))
}

fn pages_root(doc: &Document) -> Result<ObjectId, lopdf::Error> {
    let catalog = doc.trailer.get(b"Root")?.as_reference()?;
    doc.get_dictionary(catalog)?.get(b"Pages")?.as_reference()
}

/// Rewrite `input` with every spread page split in two.
///
/// `right_to_left` puts the right half first.
pub async fn split_spreads(input: &Path, right_to_left: bool) -> Result<SplitPdf, OcrError> {
    let path = input.to_path_buf();
    tokio::task::spawn_blocking(move || split_spreads_blocking(&path, right_to_left))
        .await
        .map_err(|e| OcrError::Internal(format!("Split task panicked: {}", e)))?
}

/// Blocking implementation of [`split_spreads`].
pub fn split_spreads_blocking(input: &Path, right_to_left: bool) -> Result<SplitPdf, OcrError> {
    let mut doc = Document::load(input).map_err(|e| split_err(input, e))?;
    let root_id = pages_root(&doc).map_err(|e| split_err(input, e))?;

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let source_pages = page_ids.len();
    let mut kids: Vec<ObjectId> = Vec::with_capacity(source_pages);
    let mut spreads = 0usize;

    for (idx, id) in page_ids.into_iter().enumerate() {
        let mut page = doc
            .get_dictionary(id)
            .map_err(|e| split_err(input, e))?
            .clone();

        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(&doc, &page, key) {
                    page.set(key, value);
                }
            }
        }
        page.set("Parent", Object::Reference(root_id));

        let bounds = visible_box(&doc, &page)
            .ok_or_else(|| split_err(input, format!("page {} has no usable MediaBox", idx + 1)))?;

        if bounds.is_spread() {
            let (left, right) = bounds.halves();
            let order = if right_to_left {
                [right, left]
            } else {
                [left, right]
            };
            for half in order {
                let mut copy = page.clone();
                copy.set("MediaBox", half.to_object());
                copy.set("CropBox", half.to_object());
                kids.push(doc.add_object(Object::Dictionary(copy)));
            }
            spreads += 1;
            debug!(
                "Split page {} ({:.0}x{:.0})",
                idx + 1,
                bounds.width(),
                bounds.height()
            );
        } else {
            *doc.get_object_mut(id).map_err(|e| split_err(input, e))? = Object::Dictionary(page);
            kids.push(id);
        }
    }

    let root = doc
        .get_object_mut(root_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| split_err(input, e))?;
    root.set(
        "Kids",
        kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
    );
    root.set("Count", kids.len() as i64);
    doc.prune_objects();

    let mut file = tempfile::Builder::new()
        .prefix("ocr2md-split-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| OcrError::Internal(format!("tempfile: {e}")))?;
    doc.save_to(file.as_file_mut())
        .map_err(|e| split_err(input, e))?;

    info!(
        "Split {} spread pages: {} → {} pages",
        spreads,
        source_pages,
        kids.len()
    );

    Ok(SplitPdf {
        file,
        page_count: kids.len(),
        spread_count: spreads,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a PDF whose pages have the given `(width, height)` MediaBoxes.
    /// Each page draws its 1-based number so pages can be told apart.
    pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for (i, (w, h)) in sizes.iter().enumerate() {
            let content = format!("BT /F1 24 Tf 50 50 Td (page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), (*w).into(), (*h).into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids.clone(),
                "Count" => kids.len() as i64,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::pdf_with_pages;
    use super::*;
    use std::path::PathBuf;

    fn write_pdf(doc: &mut Document, dir: &Path) -> PathBuf {
        let path = dir.join("source.pdf");
        doc.save(&path).expect("save fixture");
        path
    }

    fn media_boxes(path: &Path) -> Vec<PageBox> {
        let doc = Document::load(path).expect("reload");
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                PageBox::from_object(page.get(b"MediaBox").unwrap()).unwrap()
            })
            .collect()
    }

    fn contents(path: &Path) -> Vec<Object> {
        let doc = Document::load(path).expect("reload");
        doc.get_pages()
            .values()
            .map(|id| doc.get_dictionary(*id).unwrap().get(b"Contents").unwrap().clone())
            .collect()
    }

    fn approx(b: PageBox, expected: [f64; 4]) -> bool {
        [b.x0, b.y0, b.x1, b.y1]
            .iter()
            .zip(expected.iter())
            .all(|(a, e)| (a - e).abs() < 0.01)
    }

    #[test]
    fn spread_detection_and_halves() {
        let b = PageBox {
            x0: 0.0,
            y0: 0.0,
            x1: 1200.0,
            y1: 800.0,
        };
        assert!(b.is_spread());
        let (l, r) = b.halves();
        assert_eq!(l.width(), 600.0);
        assert_eq!(r.x0, 600.0);
        assert_eq!(r.x1, 1200.0);
        assert!(!PageBox { x1: 800.0, ..b }.is_spread());
    }

    #[test]
    fn right_to_left_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(600, 800), (1200, 800), (600, 800)]);
        let src = write_pdf(&mut doc, dir.path());
        let before = std::fs::read(&src).unwrap();

        let split = split_spreads_blocking(&src, true).expect("split");
        assert_eq!(split.page_count, 4);
        assert_eq!(split.spread_count, 1);

        let boxes = media_boxes(split.path());
        assert_eq!(boxes.len(), 4);
        assert!(approx(boxes[0], [0.0, 0.0, 600.0, 800.0]));
        assert!(approx(boxes[1], [600.0, 0.0, 1200.0, 800.0]), "right half first");
        assert!(approx(boxes[2], [0.0, 0.0, 600.0, 800.0]), "then left half");
        assert!(approx(boxes[3], [0.0, 0.0, 600.0, 800.0]));

        // both halves draw the original page's content
        let c = contents(split.path());
        assert_eq!(c[1], c[2]);
        assert_ne!(c[0], c[1]);

        assert_eq!(std::fs::read(&src).unwrap(), before, "source untouched");
    }

    #[test]
    fn left_to_right_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(1000, 700)]);
        let src = write_pdf(&mut doc, dir.path());

        let split = split_spreads_blocking(&src, false).expect("split");
        let boxes = media_boxes(split.path());
        assert_eq!(boxes.len(), 2);
        assert!(approx(boxes[0], [0.0, 0.0, 500.0, 700.0]));
        assert!(approx(boxes[1], [500.0, 0.0, 1000.0, 700.0]));
    }

    #[test]
    fn portrait_only_document_is_unchanged_in_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(600, 800), (600, 800)]);
        let src = write_pdf(&mut doc, dir.path());

        let split = split_spreads_blocking(&src, true).expect("split");
        assert_eq!(split.page_count, 2);
        assert_eq!(split.spread_count, 0);
    }

    #[test]
    fn inherited_resources_survive_flattening() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(1200, 800)]);
        let src = write_pdf(&mut doc, dir.path());

        let split = split_spreads_blocking(&src, true).expect("split");
        let out = Document::load(split.path()).unwrap();
        for id in out.get_pages().values() {
            assert!(out.get_dictionary(*id).unwrap().has(b"Resources"));
        }
    }

    #[test]
    fn temp_file_is_removable() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(1200, 800)]);
        let src = write_pdf(&mut doc, dir.path());

        let split = split_spreads_blocking(&src, true).expect("split");
        let path = split.path().to_path_buf();
        assert!(path.exists());
        split.remove().expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();
        let err = split_spreads_blocking(&path, true).unwrap_err();
        assert!(matches!(err, OcrError::SplitFailed { .. }));
    }

    #[tokio::test]
    async fn async_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = pdf_with_pages(&[(600, 800), (1200, 800), (600, 800)]);
        let src = write_pdf(&mut doc, dir.path());
        let split = split_spreads(&src, true).await.expect("split");
        assert_eq!(split.page_count, 4);
    }
}
