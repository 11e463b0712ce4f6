//! Main entry point for content extraction.
//!
//! [`Extractor`] decides between the PDF and HTML pipelines, retries thin HTML
//! results through a [`Renderer`], and moves the CPU-bound work off the async
//! runtime when asked to.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::html::{HtmlExtraction, RegressionGuard, extract_html, needs_render_fallback};
use crate::locator::LocatorConfig;
use crate::markdown::MarkdownOptions;
use crate::metadata::UNTITLED;
use crate::pdf::{PdfConfig, cleanup_markdown, extract_pdf};
use crate::render::{RenderConfig, Renderer, render_with_retry};
use crate::sanitize::SanitizeConfig;
use crate::{ExtractError, ExtractedContent, FetchContext, Result, detect};

/// Longest first line of shared text that is used as its title.
const TEXT_TITLE_MAX: usize = 200;

/// Configuration for every stage of extraction.
///
/// # Example
///
/// ```rust
/// use stash_core::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .max_depth(20)
///     .min_markdown_len(250)
///     .render_fallback(false)
///     .build();
/// assert_eq!(config.markdown.max_depth, 20);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub sanitize: SanitizeConfig,
    pub locator: LocatorConfig,
    pub markdown: MarkdownOptions,
    pub guard: RegressionGuard,
    pub pdf: PdfConfig,
    pub render: RenderConfig,

    /// Markdown shorter than this (in characters) triggers the render fallback (default: 100).
    pub min_markdown_len: usize,

    /// Whether thin HTML results are retried through a renderer (default: true).
    pub render_fallback: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sanitize: SanitizeConfig::default(),
            locator: LocatorConfig::default(),
            markdown: MarkdownOptions::default(),
            guard: RegressionGuard::default(),
            pdf: PdfConfig::default(),
            render: RenderConfig::default(),
            min_markdown_len: 100,
            render_fallback: true,
        }
    }
}

impl ExtractorConfig {
    /// Creates a new builder for ExtractorConfig.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::new()
    }
}

/// Builder for ExtractorConfig.
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ExtractorConfig::default() }
    }

    /// Adds an element the sanitizer removes with its content.
    pub fn remove_tag(mut self, tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        if !self.config.sanitize.remove_tags.contains(&tag) {
            self.config.sanitize.remove_tags.push(tag);
        }
        self
    }

    pub fn sanitize(mut self, value: SanitizeConfig) -> Self {
        self.config.sanitize = value;
        self
    }

    /// Replaces the locator tables.
    pub fn locator(mut self, value: LocatorConfig) -> Self {
        self.config.locator = value;
        self
    }

    /// Sets the Markdown emitter's nesting cap.
    pub fn max_depth(mut self, value: usize) -> Self {
        self.config.markdown.max_depth = value;
        self
    }

    pub fn guard(mut self, value: RegressionGuard) -> Self {
        self.config.guard = value;
        self
    }

    pub fn pdf(mut self, value: PdfConfig) -> Self {
        self.config.pdf = value;
        self
    }

    pub fn render(mut self, value: RenderConfig) -> Self {
        self.config.render = value;
        self
    }

    /// Sets the overall bound on one render.
    pub fn render_timeout(mut self, value: Duration) -> Self {
        self.config.render.hard_timeout = value;
        self
    }

    pub fn min_markdown_len(mut self, value: usize) -> Self {
        self.config.min_markdown_len = value;
        self
    }

    /// Enables or disables the render fallback.
    pub fn render_fallback(mut self, value: bool) -> Self {
        self.config.render_fallback = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ExtractorConfig {
        self.config
    }
}

impl Default for ExtractorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts content records from HTML, PDF and plain text.
///
/// # Example
///
/// ```rust
/// use stash_core::{Extractor, FetchContext};
///
/// let extractor = Extractor::new();
/// let html = b"<html><body><article><h1>Hi</h1><p>Hello <b>world</b>.</p></article></body></html>";
/// let content = extractor.extract_bytes(html, &FetchContext::new()).unwrap();
/// assert_eq!(content.markdown, "# Hi\n\nHello **world**.");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates an extractor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts raw bytes, routing PDFs to the PDF pipeline.
    ///
    /// Anything that is not a PDF is decoded as UTF-8, replacing invalid
    /// sequences, and treated as HTML.
    ///
    /// # Errors
    ///
    /// PDF sources fail with [`ExtractError::InvalidDocument`] or
    /// [`ExtractError::EmptyDocument`]; HTML sources only fail if the markup
    /// cannot be rewritten at all.
    pub fn extract_bytes(&self, bytes: &[u8], context: &FetchContext) -> Result<ExtractedContent> {
        if detect::is_pdf_source(bytes, context) {
            debug!(len = bytes.len(), "extracting as pdf");
            return extract_pdf(bytes, context, &self.config.pdf);
        }
        self.extract_html(&String::from_utf8_lossy(bytes), context)
    }

    /// Runs the static HTML pipeline.
    pub fn extract_html(&self, html: &str, context: &FetchContext) -> Result<ExtractedContent> {
        extract_html(html, context, &self.config)
    }

    /// Turns shared plain text into a content record.
    ///
    /// A lone `http(s)` URL becomes an empty record titled with its host, to be
    /// fetched by the caller. Other text becomes paragraphs, one per
    /// blank-line-separated block, titled by its first line.
    pub fn extract_text(&self, text: &str, context: &FetchContext) -> ExtractedContent {
        let trimmed = text.trim();

        if !trimmed.contains(char::is_whitespace)
            && let Ok(url) = Url::parse(trimmed)
            && matches!(url.scheme(), "http" | "https")
        {
            let title = url.host_str().map_or_else(|| trimmed.to_string(), str::to_string);
            return ExtractedContent { title, ..Default::default() };
        }

        let title = trimmed
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.chars().take(TEXT_TITLE_MAX).collect::<String>())
            .or_else(|| context.base_url.as_ref().and_then(|u| u.host_str().map(str::to_string)))
            .unwrap_or_else(|| UNTITLED.to_string());

        let paragraphs = trimmed
            .replace("\r\n", "\n")
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
            .join("\n\n");

        ExtractedContent { title, markdown: cleanup_markdown(&paragraphs), ..Default::default() }
    }

    /// Extracts `html`, retrying through `renderer` when the result is thin.
    ///
    /// The retry only happens for `http(s)` base URLs. Once a render succeeds
    /// its extraction is returned, even if it is still thin. A failed render
    /// is logged and the static result returned. The title comes from the
    /// static document unless it only had the URL host.
    pub async fn extract_with_fallback<R>(
        &self,
        html: &str,
        context: &FetchContext,
        renderer: &R,
    ) -> Result<ExtractedContent>
    where
        R: Renderer + ?Sized,
    {
        let content = self.extract_html(html, context)?;
        if !self.config.render_fallback || !needs_render_fallback(&content, context, &self.config) {
            return Ok(content);
        }
        let Some(url) = context.base_url.as_ref() else {
            return Ok(content);
        };

        debug!(url = %url, len = content.markdown.chars().count(), "static extraction is thin, rendering");
        let rendered = match render_with_retry(renderer, url, &self.config.render).await {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(url = %url, error = %e, "render fallback failed, keeping static result");
                return Ok(content);
            }
        };

        let body = match HtmlExtraction::run(&rendered, Some(url), &self.config) {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "rendered page could not be extracted, keeping static result");
                return Ok(content);
            }
        };

        let untitled = content.title == UNTITLED || url.host_str() == Some(content.title.as_str());
        let title = if untitled { rendered_title(&rendered, url) } else { content.title };
        Ok(ExtractedContent { title, markdown: body.markdown, images: body.images, raw_html: rendered })
    }

    /// Runs [`Extractor::extract_bytes`] on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Besides extraction errors, returns [`ExtractError::TaskFailed`] if the
    /// worker panicked or was cancelled.
    pub async fn extract_in_background(&self, bytes: Vec<u8>, context: FetchContext) -> Result<ExtractedContent> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract_bytes(&bytes, &context))
            .await
            .map_err(|e| ExtractError::TaskFailed(e.to_string()))?
    }

    /// Fetches a URL and extracts it, falling back to a placeholder record
    /// when the download itself fails.
    ///
    /// Extraction errors on a fetched body (an unreadable PDF) are returned.
    #[cfg(feature = "fetch")]
    pub async fn fetch_and_extract(&self, url: &str, fetch_config: &crate::FetchConfig) -> Result<ExtractedContent> {
        let fetched = match crate::fetch_url(url, fetch_config).await {
            Ok(fetched) => fetched,
            Err(ExtractError::InvalidUrl(reason)) => return Err(ExtractError::InvalidUrl(reason)),
            Err(e) => {
                warn!(url, error = %e, "fetch failed, storing placeholder");
                return Ok(ExtractedContent::placeholder(url, &e.to_string()));
            }
        };

        let context = fetched.context();
        self.extract_in_background(fetched.bytes, context).await
    }
}

fn rendered_title(html: &str, url: &Url) -> String {
    crate::parse::Document::parse_with_base_url(html, Some(url.clone()))
        .map(|doc| doc.extract_title())
        .unwrap_or_else(|_| UNTITLED.to_string())
}

/// Extracts bytes with default settings.
///
/// # Example
///
/// ```rust
/// use stash_core::{FetchContext, extract};
///
/// let content = extract(b"<html><body><h1>Title</h1></body></html>", &FetchContext::new()).unwrap();
/// assert!(content.markdown.lines().any(|line| line == "# Title"));
/// ```
pub fn extract(bytes: &[u8], context: &FetchContext) -> Result<ExtractedContent> {
    Extractor::new().extract_bytes(bytes, context)
}

/// Turns shared plain text into a content record with default settings.
pub fn extract_text(text: &str, context: &FetchContext) -> ExtractedContent {
    Extractor::new().extract_text(text, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{ScriptedRenderer, page};

    fn spa_context() -> FetchContext {
        FetchContext::from_url_str("https://spa.example.com/post").unwrap()
    }

    fn fast_extractor() -> Extractor {
        let render = RenderConfig {
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(10),
            hard_timeout: Duration::from_secs(5),
            ..RenderConfig::default()
        };
        Extractor::with_config(ExtractorConfig::builder().render(render).build())
    }

    const SHELL: &str = "<html><head><title>App Shell</title></head><body><div id=root>Loading...</div></body></html>";

    #[test]
    fn test_builder_sets_fields() {
        let config = ExtractorConfig::builder()
            .max_depth(10)
            .min_markdown_len(5)
            .render_fallback(false)
            .render_timeout(Duration::from_secs(3))
            .remove_tag("ASIDE")
            .remove_tag("aside")
            .build();
        assert_eq!(config.markdown.max_depth, 10);
        assert_eq!(config.min_markdown_len, 5);
        assert!(!config.render_fallback);
        assert_eq!(config.render.hard_timeout, Duration::from_secs(3));
        assert_eq!(config.sanitize.remove_tags.iter().filter(|t| *t == "aside").count(), 1);
    }

    #[test]
    fn test_bytes_dispatch_to_pdf() {
        let err = extract(b"Not a PDF", &FetchContext::with_mime("application/pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidDocument(_)));

        let ctx = FetchContext::from_url_str("https://a.com/file.pdf").unwrap();
        assert!(matches!(extract(b"garbage", &ctx), Err(ExtractError::InvalidDocument(_))));
    }

    #[test]
    fn test_bytes_default_to_html() {
        let content = extract(b"<p>Plain \xff page</p>", &FetchContext::new()).unwrap();
        assert!(content.markdown.contains("Plain"));
        assert!(content.markdown.contains("page"));
    }

    #[test]
    fn test_text_with_lone_url() {
        let content = extract_text("  https://news.example.org/story/1  ", &FetchContext::new());
        assert_eq!(content.title, "news.example.org");
        assert!(content.markdown.is_empty());
    }

    #[test]
    fn test_text_becomes_paragraphs() {
        let content = extract_text("Shopping list\nmilk   and eggs\n\n\n\nCall  Sam .", &FetchContext::new());
        assert_eq!(content.title, "Shopping list");
        assert_eq!(content.markdown, "Shopping list milk and eggs\n\nCall Sam.");
    }

    #[test]
    fn test_text_title_truncated_and_untitled() {
        let long = "x".repeat(300);
        assert_eq!(extract_text(&long, &FetchContext::new()).title.chars().count(), 200);
        assert_eq!(extract_text("   ", &FetchContext::new()).title, UNTITLED);
        assert_eq!(extract_text("ftp://files.example.com/a", &FetchContext::new()).title, "ftp://files.example.com/a");
    }

    #[tokio::test]
    async fn test_fallback_uses_rendered_page() {
        let text = "Rendered article paragraph with enough words to count as content. ".repeat(4);
        let rendered = page(&text);
        let renderer = ScriptedRenderer::new(&[&rendered, &rendered]);

        let content = fast_extractor().extract_with_fallback(SHELL, &spa_context(), &renderer).await.unwrap();
        assert_eq!(content.title, "App Shell");
        assert!(content.markdown.starts_with("Rendered article paragraph"));
        assert_eq!(content.raw_html, rendered);
    }

    #[tokio::test]
    async fn test_fallback_skipped_without_url() {
        let renderer = ScriptedRenderer::new(&[&page("never used")]);
        let content = fast_extractor().extract_with_fallback(SHELL, &FetchContext::new(), &renderer).await.unwrap();
        assert_eq!(content.markdown, "Loading...");
        assert_eq!(renderer.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_disabled() {
        let renderer = ScriptedRenderer::new(&[&page("never used")]);
        let extractor = Extractor::with_config(ExtractorConfig::builder().render_fallback(false).build());
        let content = extractor.extract_with_fallback(SHELL, &spa_context(), &renderer).await.unwrap();
        assert_eq!(content.markdown, "Loading...");
        assert_eq!(renderer.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_returns_thin_render() {
        let rendered = page("Hi");
        let renderer = ScriptedRenderer::new(&[&rendered]);

        let content = fast_extractor().extract_with_fallback(SHELL, &spa_context(), &renderer).await.unwrap();
        assert_eq!(content.markdown, "Hi");
        assert_eq!(content.raw_html, rendered);
        assert_eq!(content.title, "App Shell");
    }

    #[tokio::test]
    async fn test_fallback_failure_keeps_static_result() {
        let renderer = ScriptedRenderer { fail_open: true, ..ScriptedRenderer::new(&[]) };
        let content = fast_extractor().extract_with_fallback(SHELL, &spa_context(), &renderer).await.unwrap();
        assert_eq!(content.title, "App Shell");
        assert_eq!(content.markdown, "Loading...");
        assert!(content.raw_html.contains("id=root"));
    }

    #[tokio::test]
    async fn test_background_extraction() {
        let html = b"<html><body><article><h1>Hi</h1><p>Hello <b>world</b>.</p></article></body></html>".to_vec();
        let content = Extractor::new().extract_in_background(html, FetchContext::new()).await.unwrap();
        assert_eq!(content.markdown, "# Hi\n\nHello **world**.");

        let pdf = FetchContext::with_mime("application/pdf");
        let err = Extractor::new().extract_in_background(b"Not a PDF".to_vec(), pdf).await;
        assert!(matches!(err, Err(ExtractError::InvalidDocument(_))));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_unreachable_page_becomes_placeholder() {
        let config = crate::FetchConfig { timeout: 5, ..Default::default() };
        let content = Extractor::new().fetch_and_extract("http://127.0.0.1:9/story", &config).await.unwrap();
        assert_eq!(content.title, "127.0.0.1");
        assert!(content.markdown.contains("could not be downloaded"));

        let err = Extractor::new().fetch_and_extract("not a url", &config).await;
        assert!(matches!(err, Err(ExtractError::InvalidUrl(_))));
    }
}
