pub mod content;
pub mod detect;
pub mod error;
pub mod extractor;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod html;
pub mod images;
pub mod locator;
pub mod markdown;
pub mod metadata;
pub mod parse;
pub mod pdf;
pub mod render;
pub mod sanitize;
pub mod scoring;
pub mod store;

pub use content::{ExtractedContent, FetchContext};
pub use detect::{is_pdf_source, looks_like_pdf};
pub use error::{ExtractError, Result};
pub use extractor::{Extractor, ExtractorConfig, ExtractorConfigBuilder, extract, extract_text};
#[cfg(feature = "fetch")]
pub use fetch::{FetchConfig, FetchedDocument, fetch_file, fetch_stdin, fetch_url, store_images};
pub use html::{HtmlExtraction, RegressionGuard, extract_html, needs_render_fallback};
pub use images::{extract_image_urls, resolve_image_url};
pub use locator::{Located, LocatedBy, LocatorConfig, locate_main_content};
pub use markdown::{MarkdownOptions, emit_markdown, finalize_markdown};
pub use metadata::UNTITLED;
pub use parse::{Document, Element};
pub use pdf::{
    DocumentStructuralInfo, ElementType, LopdfSource, PagedDocument, PdfConfig, StyledRun, TextElement, classify,
    cleanup_markdown, extract_document, extract_pdf,
};
#[cfg(feature = "render")]
pub use render::{ChromiumRenderer, ChromiumSession};
pub use render::{RenderConfig, RenderSession, Renderer, render_with_retry};
pub use sanitize::{SanitizeConfig, sanitize_html};
#[doc(hidden)]
pub use scoring::{CandidateMetrics, ExclusionRules, density_score, is_excluded};
pub use store::{ImageStore, MemoryImageStore, content_id};
