//! PDF source detection by URL suffix, declared MIME type and magic bytes.

use crate::FetchContext;

/// PDF magic bytes.
const PDF_MAGIC: &[u8] = b"%PDF";

/// True when `data` starts with the `%PDF` header.
pub fn looks_like_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// True when the base URL path ends in `.pdf`, case-insensitively.
pub fn has_pdf_suffix(context: &FetchContext) -> bool {
    context
        .base_url
        .as_ref()
        .is_some_and(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
}

/// True when the declared media type is `application/pdf`.
pub fn has_pdf_mime(context: &FetchContext) -> bool {
    context.media_type().as_deref() == Some("application/pdf")
}

/// Whether the input should go through the PDF pipeline instead of the HTML one.
pub fn is_pdf_source(data: &[u8], context: &FetchContext) -> bool {
    has_pdf_suffix(context) || has_pdf_mime(context) || looks_like_pdf(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://a.com/paper.pdf", true)]
    #[case("https://a.com/PAPER.PDF", true)]
    #[case("https://a.com/paper.pdf?download=1", true)]
    #[case("https://a.com/pdf/viewer", false)]
    #[case("https://a.com/article.html", false)]
    fn test_suffix_detection(#[case] url: &str, #[case] expected: bool) {
        let ctx = FetchContext::from_url_str(url).unwrap();
        assert_eq!(has_pdf_suffix(&ctx), expected);
    }

    #[test]
    fn test_mime_detection() {
        assert!(has_pdf_mime(&FetchContext::with_mime("application/pdf")));
        assert!(has_pdf_mime(&FetchContext::with_mime("application/pdf; qs=0.001")));
        assert!(!has_pdf_mime(&FetchContext::with_mime("text/html")));
        assert!(!has_pdf_mime(&FetchContext::new()));
    }

    #[test]
    fn test_magic_bytes() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"Not a PDF"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    fn test_is_pdf_source_combines_signals() {
        assert!(is_pdf_source(b"%PDF-1.4", &FetchContext::new()));
        assert!(is_pdf_source(b"<html>", &FetchContext::with_mime("application/pdf")));
        assert!(!is_pdf_source(b"<html>", &FetchContext::with_mime("text/html")));
    }
}
