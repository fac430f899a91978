//! Markdown assembly: ordered page texts → one document.
//!
//! Output is a pure function of the input: the same page texts always give
//! byte-identical Markdown.

/// Placeholder written for a page whose trimmed text is empty.
pub const EMPTY_PAGE_PLACEHOLDER: &str = "*(No text detected on this page)*";

/// Render page texts as Markdown with one `# Page N` section per page,
/// separated by horizontal rules.
///
/// ```rust
/// use edgequake_ocr2md::pipeline::compose::compose_markdown;
///
/// let md = compose_markdown(&["first".to_string(), "second".to_string()]);
/// assert_eq!(md, "# Page 1\n\nfirst\n\n---\n\n# Page 2\n\nsecond\n\n");
/// ```
pub fn compose_markdown(pages: &[String]) -> String {
    let mut out = String::new();
    let last = pages.len().saturating_sub(1);

    for (i, text) in pages.iter().enumerate() {
        let body = text.trim();
        out.push_str(&format!("# Page {}\n\n", i + 1));
        out.push_str(if body.is_empty() {
            EMPTY_PAGE_PLACEHOLDER
        } else {
            body
        });
        out.push_str("\n\n");
        if i != last {
            out.push_str("---\n\n");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn headers_placeholder_and_separators() {
        let md = compose_markdown(&pages(&["A", "", "B"]));
        assert_eq!(
            md,
            "# Page 1\n\nA\n\n---\n\n\
             # Page 2\n\n*(No text detected on this page)*\n\n---\n\n\
             # Page 3\n\nB\n\n"
        );
        assert_eq!(md.matches("---").count(), 2);
        assert!(!md.trim_end().ends_with("---"));
    }

    #[test]
    fn whitespace_only_page_is_empty() {
        let md = compose_markdown(&pages(&[" \n\t "]));
        assert!(md.contains(EMPTY_PAGE_PLACEHOLDER));
    }

    #[test]
    fn text_is_trimmed() {
        let md = compose_markdown(&pages(&["\n\n  body  \n"]));
        assert_eq!(md, "# Page 1\n\nbody\n\n");
    }

    #[test]
    fn idempotent() {
        let input = pages(&["一", "", "三\n四"]);
        assert_eq!(compose_markdown(&input), compose_markdown(&input));
    }

    #[test]
    fn no_pages_no_output() {
        assert_eq!(compose_markdown(&[]), "");
    }
}
