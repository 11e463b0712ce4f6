//! Error types for extraction operations.
//!
//! This module defines the main error type [`ExtractError`]. Only structurally
//! invalid input produces a hard failure: messy HTML never does, while PDF bytes
//! that cannot be opened or that contain no pages surface as
//! [`ExtractError::InvalidDocument`] and [`ExtractError::EmptyDocument`].
//!
//! # Example
//!
//! ```rust
//! use stash_core::{ExtractError, FetchContext, extract};
//!
//! match extract(b"Not a PDF", &FetchContext::with_mime("application/pdf")) {
//!     Err(ExtractError::InvalidDocument(reason)) => println!("could not read this document: {reason}"),
//!     Err(e) => println!("Error: {}", e),
//!     Ok(content) => println!("{}", content.title),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for extraction operations.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The bytes could not be opened as a paginated document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The document opened but contains no pages.
    #[error("Document has no pages")]
    EmptyDocument,

    /// HTML parsing errors.
    ///
    /// Returned for invalid CSS selectors or when markup cannot be rewritten.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request or render timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The rendering collaborator failed to produce HTML.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Wraps standard I/O errors for file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Locator tables or other configuration files are missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A background extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

impl From<lopdf::Error> for ExtractError {
    fn from(err: lopdf::Error) -> Self {
        ExtractError::InvalidDocument(err.to_string())
    }
}

/// Result type alias for ExtractError.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtractError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_invalid_document_error() {
        let err = ExtractError::InvalidDocument("missing header".to_string());
        assert!(err.to_string().contains("missing header"));
    }

    #[test]
    fn test_empty_document_error() {
        assert_eq!(ExtractError::EmptyDocument.to_string(), "Document has no pages");
    }

    #[test]
    fn test_timeout_error() {
        let err = ExtractError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }
}
