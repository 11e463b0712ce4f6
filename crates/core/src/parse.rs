//! HTML parsing and DOM access.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! HTML and navigating the DOM tree using CSS selectors.
//!
//! Documents are never mutated. Sanitizing produces a second [`Document`]
//! and leaves the original available to the caller.
//!
//! # Example
//!
//! ```rust
//! use stash_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::markdown::SKIPPED_TAGS;
use crate::sanitize::{self, SanitizeConfig};
use crate::{ExtractError, Result};

/// Represents a parsed HTML document.
///
/// A Document wraps an HTML page and provides methods for querying elements
/// using CSS selectors and reading the few metadata fields extraction needs.
///
/// # Example
///
/// ```rust
/// use stash_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// ```
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    /// Parses HTML from a string without any cleaning.
    ///
    /// The parser recovers from malformed markup the way browsers do, so this
    /// only fails if the markup cannot be turned into a tree at all.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, base_url: None })
    }

    /// Parses HTML and remembers the URL it was loaded from.
    pub fn parse_with_base_url(html: &str, base_url: Option<Url>) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, base_url })
    }

    /// Sanitizes `html` and parses the result into a new document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::HtmlParseError`] if the rewriter rejects the markup.
    pub fn parse_sanitized(html: &str, base_url: Option<Url>, config: &SanitizeConfig) -> Result<Self> {
        let cleaned = sanitize::sanitize_html(html, config)?;
        Self::parse_with_base_url(&cleaned, base_url)
    }

    /// Produces a sanitized copy of this document.
    pub fn sanitized(&self, config: &SanitizeConfig) -> Result<Self> {
        Self::parse_sanitized(&self.as_string(), self.base_url.clone(), config)
    }

    /// Gets the base URL the document was loaded from.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Gets the raw HTML representation.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Serializes the whole tree back to HTML.
    pub fn as_string(&self) -> String {
        self.html.html()
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(Element::new).collect())
    }

    /// The `<body>` element; the parser always synthesizes one for documents.
    pub fn body(&'_ self) -> Option<Element<'_>> {
        let selector = Selector::parse("body").ok()?;
        self.html.select(&selector).next().map(Element::new)
    }

    /// The `<body>` if present, otherwise the root element.
    pub fn body_or_root(&'_ self) -> Element<'_> {
        self.body().unwrap_or_else(|| Element::new(self.html.root_element()))
    }

    /// Character count of the body's visible text, used by the regression guard.
    pub fn body_text_len(&self) -> usize {
        self.body_or_root().text_len()
    }

    /// Gets the content of the document `<title>` element if present.
    ///
    /// `<title>` inside inline SVG labels the graphic and is ignored.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .find(|el| !in_svg(*el))
            .map(|el| el.text().collect::<String>())
    }

    /// Looks up `<meta property=..>` or `<meta name=..>` content.
    pub fn meta_content(&self, key: &str) -> Option<String> {
        for attr in ["property", "name"] {
            let selector = format!("meta[{}=\"{}\"]", attr, key);
            if let Ok(elements) = self.select(&selector) {
                for el in elements {
                    if let Some(content) = el.attr("content") {
                        let content = content.trim();
                        if !content.is_empty() {
                            return Some(content.to_string());
                        }
                    }
                }
            }
        }
        None
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// A wrapper around scraper's ElementRef.
///
/// Element represents a single node in the HTML document tree and provides
/// methods for accessing its attributes and text content.
///
/// # Example
///
/// ```rust
/// use stash_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    /// The underlying scraper reference.
    pub fn element_ref(&self) -> ElementRef<'a> {
        self.element
    }

    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Text a reader would see. Text under scripts, styles and other
    /// never-rendered elements is left out.
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<_> = self.element.children().rev().collect();
        while let Some(node) = stack.pop() {
            match node.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) if !SKIPPED_TAGS.contains(&el.name()) => stack.extend(node.children().rev()),
                _ => {}
            }
        }
        out
    }

    /// Character count of the trimmed visible text.
    pub fn text_len(&self) -> usize {
        self.visible_text().trim().chars().count()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name (e.g., "div", "a", "span").
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(Element::new).collect())
    }

    /// Number of descendant elements, excluding this one.
    pub fn descendant_element_count(&self) -> usize {
        self.element
            .descendants()
            .skip(1)
            .filter(|node| node.value().is_element())
            .count()
    }

    /// Number of descendant `<a>` elements.
    pub fn link_count(&self) -> usize {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name().eq_ignore_ascii_case("a"))
            .count()
    }
}

fn in_svg(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name().eq_ignore_ascii_case("svg"))
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ExtractError::HtmlParseError(format!("Invalid selector: {}", e)))
}
