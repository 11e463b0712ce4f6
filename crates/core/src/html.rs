//! The static HTML extraction pipeline.
//!
//! Parses the page, takes the title from the untouched document, sanitizes a
//! copy, locates the article, emits Markdown and collects image URLs. The
//! regression guard falls back to the original tree when sanitizing strips
//! most of the page.

use tracing::debug;
use url::Url;

use crate::extractor::ExtractorConfig;
use crate::images::extract_image_urls;
use crate::locator::{LocatedBy, locate_main_content};
use crate::markdown::emit_markdown;
use crate::parse::Document;
use crate::{ExtractedContent, FetchContext, Result};

/// Length ratios that decide whether a sanitized copy lost too much of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionGuard {
    /// Cleaned body text below this share of the original is a regression (default: 0.10)
    pub min_ratio: f64,
    /// Original body text above this length is "large" (default: 1000)
    pub large_body: usize,
    /// A large body cleaned below this length is a regression (default: 100)
    pub min_cleaned: usize,
}

impl Default for RegressionGuard {
    fn default() -> Self {
        Self { min_ratio: 0.10, large_body: 1000, min_cleaned: 100 }
    }
}

impl RegressionGuard {
    /// True when the cleaned copy should be thrown away in favour of the original.
    pub fn should_discard(&self, original_len: usize, cleaned_len: usize) -> bool {
        if original_len == 0 {
            return false;
        }

        (cleaned_len as f64) < (original_len as f64) * self.min_ratio
            || (original_len > self.large_body && cleaned_len < self.min_cleaned)
    }
}

/// Body of one pass over an HTML document (steps after the title).
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlExtraction {
    pub markdown: String,
    pub images: Vec<String>,
    pub located_by: LocatedBy,
    /// Set when the regression guard rejected the sanitized copy
    pub used_original: bool,
}

impl HtmlExtraction {
    /// Sanitizes, locates and emits `html`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ExtractError::HtmlParseError`] if the sanitizer cannot
    /// rewrite the markup.
    pub fn run(html: &str, base_url: Option<&Url>, config: &ExtractorConfig) -> Result<Self> {
        let original = Document::parse_with_base_url(html, base_url.cloned())?;
        Self::from_document(&original, config)
    }

    /// Runs the pipeline on an already-parsed original document.
    pub fn from_document(original: &Document, config: &ExtractorConfig) -> Result<Self> {
        let cleaned = original.sanitized(&config.sanitize)?;

        let original_len = original.body_text_len();
        let cleaned_len = cleaned.body_text_len();
        let used_original = config.guard.should_discard(original_len, cleaned_len);
        if used_original {
            debug!(original_len, cleaned_len, "sanitizing removed too much text, locating in the original document");
        }

        let chosen = if used_original { original } else { &cleaned };
        let located = locate_main_content(chosen, &config.locator);
        let markdown = emit_markdown(located.element.element_ref(), &config.markdown);
        let images = extract_image_urls(&located.element, original.base_url());

        Ok(Self { markdown, images, located_by: located.located_by, used_original })
    }
}

/// Extracts an HTML page into a content record.
///
/// This covers parsing through image collection; PDF detection and the render
/// fallback are layered on top by [`crate::Extractor`].
///
/// # Example
///
/// ```rust
/// use stash_core::{ExtractorConfig, FetchContext, extract_html};
///
/// let html = "<html><body><article><h1>Hi</h1><p>Hello <b>world</b>.</p></article></body></html>";
/// let content = extract_html(html, &FetchContext::new(), &ExtractorConfig::default()).unwrap();
/// assert_eq!(content.markdown, "# Hi\n\nHello **world**.");
/// ```
pub fn extract_html(html: &str, context: &FetchContext, config: &ExtractorConfig) -> Result<ExtractedContent> {
    let original = Document::parse_with_base_url(html, context.base_url.clone())?;
    let title = original.extract_title();
    let body = HtmlExtraction::from_document(&original, config)?;

    Ok(ExtractedContent { title, markdown: body.markdown, images: body.images, raw_html: html.to_string() })
}

/// Whether a static result is thin enough to retry through a renderer.
///
/// Only pages with an `http(s)` URL can be rendered.
pub fn needs_render_fallback(content: &ExtractedContent, context: &FetchContext, config: &ExtractorConfig) -> bool {
    let renderable = context.base_url.as_ref().is_some_and(|u| matches!(u.scheme(), "http" | "https"));
    renderable && content.markdown.chars().count() < config.min_markdown_len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> ExtractedContent {
        extract_html(html, &FetchContext::new(), &ExtractorConfig::default()).unwrap()
    }

    fn paragraph(n: usize) -> String {
        "Readers keep coming back to this paragraph because it has real substance. ".repeat(n)
    }

    #[test]
    fn test_scenario_article_with_bold() {
        let content = extract("<html><body><article><h1>Hi</h1><p>Hello <b>world</b>.</p></article></body></html>");
        assert_eq!(content.title, "Hi");
        assert_eq!(content.markdown, "# Hi\n\nHello **world**.");
        assert!(content.images.is_empty());
        assert!(content.raw_html.contains("<article>"));
    }

    #[test]
    fn test_title_comes_from_original_document() {
        let html = "<html><head><title>Kept Title</title></head><body><p>Body</p></body></html>";
        assert_eq!(extract(html).title, "Kept Title");
    }

    #[test]
    fn test_scripts_never_reach_markdown() {
        let html = format!(
            "<html><body><article><p>{}</p><script>alert('x')</script><img src=x onerror=alert(1)></article></body></html>",
            paragraph(3)
        );
        let content = extract(&html);
        let lower = content.markdown.to_lowercase();
        assert!(!lower.contains("<script"));
        assert!(!lower.contains("alert("));
        assert!(!lower.contains("onerror="));
    }

    #[test]
    fn test_article_located_over_navigation() {
        let html = format!(
            r#"<html><body><nav><a href="/">Home</a><a href="/about">About</a></nav>
            <article><h2>Story</h2><p>{}</p></article>
            <footer>Copyright</footer></body></html>"#,
            paragraph(4)
        );
        let content = extract(&html);
        assert!(content.markdown.starts_with("## Story"));
        assert!(!content.markdown.contains("Home"));
        assert!(!content.markdown.contains("Copyright"));
    }

    #[test]
    fn test_images_resolved_against_base() {
        let html = format!(
            r#"<html><body><article><p>{}</p><img src="../img/x.png"><img src="https://cdn.b.com/y.jpg"></article></body></html>"#,
            paragraph(3)
        );
        let ctx = FetchContext::from_url_str("https://a.com/dir/page.html").unwrap();
        let content = extract_html(&html, &ctx, &ExtractorConfig::default()).unwrap();
        assert_eq!(content.images, vec!["https://a.com/img/x.png", "https://cdn.b.com/y.jpg"]);
    }

    #[test]
    fn test_relative_images_dropped_without_base() {
        let html = format!(r#"<html><body><article><p>{}</p><img src="x.png"></article></body></html>"#, paragraph(3));
        assert!(extract(&html).images.is_empty());
    }

    #[test]
    fn test_guard_thresholds() {
        let guard = RegressionGuard::default();
        assert!(!guard.should_discard(0, 0));
        assert!(!guard.should_discard(500, 400));
        assert!(guard.should_discard(500, 40));
        assert!(guard.should_discard(5000, 90));
        assert!(!guard.should_discard(900, 95));
        assert!(!guard.should_discard(5000, 600));
    }

    #[test]
    fn test_guard_restores_original_tree() {
        let config = ExtractorConfig::builder().remove_tag("article").build();
        let html = format!("<html><body><article><p>{}</p></article><p>tiny</p></body></html>", paragraph(20));
        let body = HtmlExtraction::run(&html, None, &config).unwrap();
        assert!(body.used_original);
        assert!(body.markdown.contains("real substance"));
    }

    #[test]
    fn test_guard_keeps_clean_copy_normally() {
        let html = format!("<html><body><article><p>{}</p></article><script>var x = 1;</script></body></html>", paragraph(5));
        let body = HtmlExtraction::run(&html, None, &ExtractorConfig::default()).unwrap();
        assert!(!body.used_original);
    }

    #[test]
    fn test_inline_json_does_not_count_as_text() {
        let nav: String = (0..10).map(|i| format!(r#"<a href="/{i}">Nav link {i}</a> "#)).collect();
        let data = format!(r#"{{"props":{{"blob":"{}"}}}}"#, "x".repeat(20_000));
        let html = format!(
            r#"<html><body><div class="menu">{nav}</div><div><p>{}</p></div>
            <script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#,
            paragraph(6)
        );

        let body = HtmlExtraction::run(&html, None, &ExtractorConfig::default()).unwrap();
        assert!(!body.used_original);
        assert!(body.markdown.starts_with("Readers keep coming back"));
        assert!(!body.markdown.contains("Nav link"));

        let content = extract(&html);
        assert!(!content.markdown.contains("Nav link"));
        assert!(!content.markdown.contains("props"));
    }

    #[test]
    fn test_needs_render_fallback() {
        let config = ExtractorConfig::default();
        let thin = ExtractedContent { markdown: "Loading...".to_string(), ..Default::default() };
        let full = ExtractedContent { markdown: "x".repeat(150), ..Default::default() };
        let with_url = FetchContext::from_url_str("https://spa.example.com/").unwrap();

        assert!(needs_render_fallback(&thin, &with_url, &config));
        assert!(!needs_render_fallback(&full, &with_url, &config));
        assert!(!needs_render_fallback(&thin, &FetchContext::new(), &config));
        let file = FetchContext::from_url_str("file:///tmp/page.html").unwrap();
        assert!(!needs_render_fallback(&thin, &file, &config));
    }

    #[test]
    fn test_non_boilerplate_text_never_yields_empty_markdown() {
        let content = extract("<html><body><div><span>x</span></div></body></html>");
        assert_eq!(content.markdown, "x");
    }
}
