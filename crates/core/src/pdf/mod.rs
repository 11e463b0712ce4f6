//! PDF extraction.
//!
//! PDFs carry no semantic markup, so structure is reconstructed from
//! typography: text runs are grouped into elements, the dominant font size is
//! taken as body text, and larger or bolder elements become headings.
//!
//! # Example
//!
//! ```rust
//! use stash_core::{ExtractError, FetchContext, PdfConfig, extract_pdf};
//!
//! let err = extract_pdf(b"Not a PDF", &FetchContext::new(), &PdfConfig::default()).unwrap_err();
//! assert!(matches!(err, ExtractError::InvalidDocument(_)));
//! ```

mod assemble;
mod classify;
mod cleanup;
mod layout;
mod source;
mod structure;

pub use assemble::assemble_markdown;
pub use classify::{
    ElementType, ListKind, ListMarker, TextElement, classify, classify_elements, group_runs, is_heading_pattern,
    is_never_heading, list_marker,
};
pub use cleanup::cleanup_markdown;
pub use layout::StyledRun;
pub use source::{LopdfSource, PagedDocument};
pub use structure::{DEFAULT_FONT_SIZE, DocumentStructuralInfo, round_font_size};

use tracing::debug;

use crate::{ExtractError, ExtractedContent, FetchContext, Result};

/// Title used when neither metadata, text nor file name provide one.
pub const UNTITLED_PDF: &str = "PDF Document";

/// Tuning for the PDF pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfConfig {
    /// Runs whose sizes differ by more than this many points start a new element
    pub size_tolerance: f32,
    /// Characters at the top of page one searched for a title
    pub title_window: usize,
    pub title_min_len: usize,
    pub title_max_len: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { size_tolerance: 0.5, title_window: 500, title_min_len: 5, title_max_len: 200 }
    }
}

/// Extracts PDF bytes into a content record.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidDocument`] if the bytes cannot be opened and
/// [`ExtractError::EmptyDocument`] if the document has no pages.
pub fn extract_pdf(bytes: &[u8], context: &FetchContext, config: &PdfConfig) -> Result<ExtractedContent> {
    let source = LopdfSource::open(bytes)?;
    extract_document(&source, context, config)
}

/// Extracts any [`PagedDocument`].
pub fn extract_document<D: PagedDocument + ?Sized>(
    doc: &D,
    context: &FetchContext,
    config: &PdfConfig,
) -> Result<ExtractedContent> {
    let page_count = doc.page_count();
    if page_count == 0 {
        return Err(ExtractError::EmptyDocument);
    }

    let mut pages: Vec<(Vec<StyledRun>, bool)> = (0..page_count)
        .map(|index| {
            let runs = doc.styled_runs(index);
            if runs.is_empty() { (plain_text_runs(&doc.plain_text(index)), false) } else { (runs, true) }
        })
        .collect();

    let info = DocumentStructuralInfo::from_runs(pages.iter().filter(|(_, styled)| *styled).flat_map(|(r, _)| r));
    for (runs, styled) in pages.iter_mut() {
        if !*styled {
            runs.iter_mut().for_each(|run| run.font_size = info.common_font_size);
        }
    }
    debug!(
        pages = page_count,
        common_font_size = info.common_font_size,
        max_font_size = info.max_font_size,
        "pdf structure"
    );

    for index in 0..page_count {
        let images = doc.image_count(index);
        if images > 0 {
            debug!(page = index + 1, images, "page has embedded images; not extracted");
        }
    }

    let page_elements: Vec<Vec<TextElement>> =
        pages.iter().map(|(runs, _)| group_runs(runs, config.size_tolerance)).collect();

    let title = doc
        .metadata_title()
        .or_else(|| page_elements.first().and_then(|first| title_from_elements(first, config)))
        .or_else(|| title_from_file_name(context))
        .unwrap_or_else(|| UNTITLED_PDF.to_string());

    let mut elements: Vec<TextElement> = page_elements.into_iter().flatten().collect();
    classify_elements(&mut elements, &info);
    let markdown = cleanup_markdown(&assemble_markdown(&elements));

    Ok(ExtractedContent { title, markdown, images: Vec::new(), raw_html: String::new() })
}

/// Runs for a page that only yielded plain text, one per line.
///
/// Sizes are filled in once the body size is known; blank lines become empty
/// runs so paragraphs stay apart.
fn plain_text_runs(text: &str) -> Vec<StyledRun> {
    text.lines().map(|line| StyledRun::plain(line.trim_end(), DEFAULT_FONT_SIZE)).collect()
}

/// Largest-font element starting within the title window of page one.
fn title_from_elements(elements: &[TextElement], config: &PdfConfig) -> Option<String> {
    let mut offset = 0;
    let mut best: Option<(f32, String)> = None;

    for element in elements {
        if offset >= config.title_window {
            break;
        }
        offset += element.char_len();

        let text = element.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let len = text.chars().count();
        if len < config.title_min_len || len > config.title_max_len {
            continue;
        }
        if best.as_ref().is_none_or(|(size, _)| element.font_size > *size) {
            best = Some((element.font_size, text));
        }
    }
    best.map(|(_, text)| text)
}

fn title_from_file_name(context: &FetchContext) -> Option<String> {
    let url = context.base_url.as_ref()?;
    let name = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let name = name.replace("%20", " ");
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name.as_str(),
    };
    let stem = stem.trim();
    if stem.is_empty() { None } else { Some(stem.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDocument {
        title: Option<String>,
        pages: Vec<Vec<StyledRun>>,
        text: Vec<String>,
    }

    impl FakeDocument {
        fn styled(pages: Vec<Vec<StyledRun>>) -> Self {
            let text = vec![String::new(); pages.len()];
            Self { title: None, pages, text }
        }
    }

    impl PagedDocument for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn metadata_title(&self) -> Option<String> {
            self.title.clone()
        }

        fn styled_runs(&self, index: usize) -> Vec<StyledRun> {
            self.pages[index].clone()
        }

        fn plain_text(&self, index: usize) -> String {
            self.text[index].clone()
        }
    }

    fn body_lines(n: usize) -> Vec<StyledRun> {
        (1..=n).map(|i| StyledRun::plain(format!("Paragraph line {} of the report body.", i), 10.0)).collect()
    }

    fn report() -> FakeDocument {
        let mut first = vec![StyledRun::plain("Report Title", 24.0)];
        first.extend(body_lines(10));
        FakeDocument::styled(vec![first, body_lines(5)])
    }

    #[test]
    fn test_report_title_and_heading() {
        let content = extract_document(&report(), &FetchContext::new(), &PdfConfig::default()).unwrap();
        assert_eq!(content.title, "Report Title");
        assert!(content.markdown.starts_with("# Report Title\n\nParagraph line 1 of the report body."));
        assert!(content.images.is_empty());
        assert!(content.raw_html.is_empty());
    }

    #[test]
    fn test_metadata_title_wins() {
        let mut doc = report();
        doc.title = Some("From Metadata".to_string());
        let content = extract_document(&doc, &FetchContext::new(), &PdfConfig::default()).unwrap();
        assert_eq!(content.title, "From Metadata");
    }

    #[test]
    fn test_file_name_title() {
        let doc = FakeDocument::styled(vec![vec![StyledRun::plain("tiny", 10.0)]]);
        let ctx = FetchContext::from_url_str("https://a.com/papers/Annual%20Review.pdf").unwrap();
        let content = extract_document(&doc, &ctx, &PdfConfig::default()).unwrap();
        assert_eq!(content.title, "Annual Review");
    }

    #[test]
    fn test_untitled_pdf() {
        let doc = FakeDocument::styled(vec![vec![StyledRun::plain("tiny", 10.0)]]);
        let content = extract_document(&doc, &FetchContext::new(), &PdfConfig::default()).unwrap();
        assert_eq!(content.title, UNTITLED_PDF);
        assert_eq!(content.markdown, "tiny");
    }

    #[test]
    fn test_empty_document() {
        let doc = FakeDocument::styled(Vec::new());
        let err = extract_document(&doc, &FetchContext::new(), &PdfConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument));
    }

    #[test]
    fn test_plain_text_fallback_page() {
        let doc = FakeDocument {
            title: None,
            pages: vec![body_lines(3), Vec::new()],
            text: vec![String::new(), "Fallback text that was\nwrapped here.\n\nSecond block.".to_string()],
        };
        let content = extract_document(&doc, &FetchContext::new(), &PdfConfig::default()).unwrap();
        assert!(content.markdown.ends_with("Fallback text that was wrapped here.\n\nSecond block."));
    }

    #[test]
    fn test_title_window_limits_search() {
        let mut runs = body_lines(20);
        runs.push(StyledRun::plain("Late Large Text", 30.0));
        let elements = group_runs(&runs, 0.5);
        assert_eq!(title_from_elements(&elements, &PdfConfig::default()).unwrap(), "Paragraph line 1 of the report body.");
    }

    #[test]
    fn test_bold_heading_and_list_in_document() {
        let mut runs = body_lines(6);
        runs.insert(0, StyledRun::plain("1. Introduction", 14.0).bold());
        runs.push(StyledRun::plain("• first point", 10.0));
        runs.push(StyledRun::plain("• second point", 10.0));
        let doc = FakeDocument::styled(vec![runs]);
        let content = extract_document(&doc, &FetchContext::new(), &PdfConfig::default()).unwrap();

        assert!(content.markdown.starts_with("## 1. Introduction\n\n"));
        assert!(content.markdown.ends_with("- first point\n- second point"));
    }
}
