//! Result-file ordering.
//!
//! The batch annotate call writes one JSON file per chunk of pages and names
//! them `output-<start>-to-<end>.json`. Object listings come back in
//! lexicographic order (`output-101-to-200` sorts before `output-1-to-100`
//! only when it happens to), so the start page is parsed from the name and
//! used as the sort key.
//!
//! Ordering here is best effort: a name that does not follow the convention
//! sorts first, and a name whose page number cannot be represented leaves the
//! whole list in its original order rather than failing the job.

use once_cell::sync::Lazy;
use regex::Regex;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use tracing::warn;

static RE_PAGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d+)-to-(\d+)[^/]*\.json$").unwrap());

/// Start page encoded in a result file name; `Ok(0)` if the name does not
/// follow the `-<start>-to-<end>…json` convention.
pub fn start_page(path: &Path) -> Result<u32, ParseIntError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    match RE_PAGE_RANGE.captures(&name) {
        Some(caps) => caps[1].parse::<u32>(),
        None => Ok(0),
    }
}

/// Sort result files ascending by start page.
///
/// The sort is stable, so files with equal start pages (including every
/// unmatched name) keep their relative order.
pub fn sort_result_files(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut keyed = Vec::with_capacity(paths.len());
    for path in &paths {
        match start_page(path) {
            Ok(start) => keyed.push((start, path.clone())),
            Err(e) => {
                warn!(
                    "Could not read page range from '{}' ({}); keeping listing order",
                    path.display(),
                    e
                );
                return paths;
            }
        }
    }

    keyed.sort_by_key(|(start, _)| *start);
    keyed.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn sorts_by_start_page() {
        let sorted = sort_result_files(paths(&["output-101-to-200.json", "output-1-to-100.json"]));
        assert_eq!(sorted, paths(&["output-1-to-100.json", "output-101-to-200.json"]));
    }

    #[test]
    fn numeric_not_lexicographic() {
        let sorted = sort_result_files(paths(&[
            "out/output-1001-to-1100.json",
            "out/output-201-to-300.json",
            "out/output-1-to-100.json",
        ]));
        assert_eq!(
            sorted,
            paths(&[
                "out/output-1-to-100.json",
                "out/output-201-to-300.json",
                "out/output-1001-to-1100.json",
            ])
        );
    }

    #[test]
    fn unmatched_name_sorts_first() {
        let sorted = sort_result_files(paths(&["output-1-to-100.json", "summary.json"]));
        assert_eq!(sorted, paths(&["summary.json", "output-1-to-100.json"]));
        assert_eq!(start_page(Path::new("summary.json")).unwrap(), 0);
    }

    #[test]
    fn overflowing_page_number_keeps_input_order() {
        let input = paths(&[
            "output-101-to-200.json",
            "output-99999999999999999999-to-1.json",
            "output-1-to-100.json",
        ]);
        assert_eq!(sort_result_files(input.clone()), input);
    }

    #[test]
    fn suffix_after_end_page_is_allowed() {
        assert_eq!(start_page(Path::new("output-1-to-100-v2.json")).unwrap(), 1);
        assert_eq!(start_page(Path::new("output-101-to-200-v2.json")).unwrap(), 101);
        let sorted = sort_result_files(paths(&["output-101-to-200-v2.json", "output-1-to-100-v2.json"]));
        assert_eq!(sorted, paths(&["output-1-to-100-v2.json", "output-101-to-200-v2.json"]));
    }

    #[test]
    fn start_page_uses_file_name_only() {
        assert_eq!(
            start_page(Path::new("output/1700000000-5-to-9/output-3-to-4.json")).unwrap(),
            3
        );
    }
}
