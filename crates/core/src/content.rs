//! The content record produced by every extraction path, and the fetch
//! context the caller hands in alongside the raw bytes.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ExtractError, Result};

/// Content record produced by one extraction call.
///
/// The caller assigns storage identity; nothing in here is mutated after
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Document title, never empty.
    pub title: String,
    /// Normalized Markdown body.
    pub markdown: String,
    /// Absolute image URLs in document order, duplicates allowed.
    pub images: Vec<String>,
    /// The HTML the record was extracted from; empty for PDF and text sources.
    pub raw_html: String,
}

impl ExtractedContent {
    /// Builds the explanatory record stored when the page itself could not be fetched.
    ///
    /// The fetch layer records this instead of propagating the failure, so the
    /// reader still shows something for the saved item.
    pub fn placeholder(url: &str, reason: &str) -> Self {
        let title = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "Saved Link".to_string());

        let markdown = format!(
            "This page could not be downloaded.\n\nReason: {}\n\n[Open the original]({})",
            reason.trim(),
            url
        );

        Self { title, markdown, images: Vec::new(), raw_html: String::new() }
    }

    /// Number of whitespace-separated words in the Markdown body.
    pub fn word_count(&self) -> usize {
        self.markdown.split_whitespace().count()
    }

    /// Serializes the record to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| ExtractError::ConfigError(format!("JSON serialization failed: {}", e)))
    }
}

/// Where the bytes came from and what the server said they were.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchContext {
    /// Resolves relative links and images; a `.pdf` path marks a PDF source.
    pub base_url: Option<Url>,
    /// Declared `Content-Type`, parameters allowed (`text/html; charset=utf-8`).
    pub declared_mime_type: Option<String>,
}

impl FetchContext {
    /// Context with neither base URL nor MIME type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a page loaded from `base_url`.
    pub fn with_base_url(base_url: Url) -> Self {
        Self { base_url: Some(base_url), declared_mime_type: None }
    }

    /// Context carrying only a declared MIME type.
    pub fn with_mime(mime: &str) -> Self {
        Self { base_url: None, declared_mime_type: Some(mime.to_string()) }
    }

    /// Parses `url` and uses it as the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidUrl`] if `url` is not an absolute URL.
    pub fn from_url_str(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| ExtractError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::with_base_url(parsed))
    }

    /// Sets the declared MIME type.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime_type = Some(mime.into());
        self
    }

    /// Media type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.declared_mime_type
            .as_deref()
            .and_then(|m| m.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_uses_host_as_title() {
        let record = ExtractedContent::placeholder("https://example.com/a/b", "connection reset");
        assert_eq!(record.title, "example.com");
        assert!(record.markdown.contains("connection reset"));
        assert!(record.markdown.contains("(https://example.com/a/b)"));
        assert!(record.images.is_empty());
    }

    #[test]
    fn test_placeholder_unparseable_url() {
        let record = ExtractedContent::placeholder("not a url", "dns failure");
        assert_eq!(record.title, "Saved Link");
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let ctx = FetchContext::with_mime("Application/PDF; charset=binary");
        assert_eq!(ctx.media_type().as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_from_url_str_rejects_relative() {
        assert!(matches!(FetchContext::from_url_str("/just/a/path"), Err(ExtractError::InvalidUrl(_))));
        assert!(FetchContext::from_url_str("https://a.com/x").is_ok());
    }

    #[test]
    fn test_to_json_fields() {
        let record = ExtractedContent { title: "T".into(), markdown: "body".into(), ..Default::default() };
        let json = record.to_json().unwrap();
        assert_eq!(json["title"], "T");
        assert!(json.get("raw_html").is_some());
    }
}
