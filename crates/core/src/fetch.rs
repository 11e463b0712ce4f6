//! Content fetching from URLs, files, and stdin.
//!
//! Everything comes back as raw bytes: whether a source is HTML or PDF is
//! decided later from the bytes and the [`FetchContext`].

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::store::ImageStore;
use crate::{ExtractError, FetchContext, Result};

/// HTTP client configuration for fetching pages and images.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: "Mozilla/5.0 (compatible; Stash/0.3; read-it-later)".to_string() }
    }
}

impl FetchConfig {
    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .user_agent(&self.user_agent)
            .build()
            .map_err(ExtractError::HttpError)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ExtractError {
        if e.is_timeout() { ExtractError::Timeout { timeout: self.timeout } } else { ExtractError::HttpError(e) }
    }
}

/// A downloaded response body and what the server said about it.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    /// `Content-Type` header, verbatim
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: Url,
}

impl FetchedDocument {
    /// Context for extracting this body: the final URL plus the declared type.
    pub fn context(&self) -> FetchContext {
        FetchContext { base_url: Some(self.final_url.clone()), declared_mime_type: self.content_type.clone() }
    }
}

fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| ExtractError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ExtractError::InvalidUrl(format!("unsupported scheme '{}', expected http or https", other))),
    }
}

/// Downloads a page.
///
/// Follows redirects and fails on non-success status codes.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<FetchedDocument> {
    let parsed_url = parse_http_url(url)?;
    let client = config.client()?;

    let response = client
        .get(parsed_url)
        .header("Accept", "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| config.map_send_error(e))?
        .error_for_status()?;

    let final_url = response.url().clone();
    let content_type = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
    let bytes = response.bytes().await.map_err(|e| config.map_send_error(e))?.to_vec();
    debug!(url = %final_url, len = bytes.len(), content_type = ?content_type, "fetched");

    Ok(FetchedDocument { bytes, content_type, final_url })
}

/// Reads a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<Vec<u8>> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() { Err(ExtractError::FileNotFound(path_buf)) } else { Ok(fs::read(&path_buf)?) }
}

/// Reads standard input until EOF.
pub fn fetch_stdin() -> Result<Vec<u8>> {
    use std::io::{self, Read};

    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;

    Ok(buffer)
}

/// Downloads `urls` into `store`.
///
/// Returns `(url, id)` for every image that was stored; failed downloads are
/// logged and skipped.
pub async fn store_images(urls: &[String], store: &dyn ImageStore, config: &FetchConfig) -> Vec<(String, String)> {
    let client = match config.client() {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "could not build image client");
            return Vec::new();
        }
    };

    let mut stored = Vec::with_capacity(urls.len());
    for url in urls {
        match download(&client, url, config).await.and_then(|bytes| store.store(&bytes, Some(url))) {
            Ok(id) => stored.push((url.clone(), id)),
            Err(e) => debug!(url = %url, error = %e, "skipping image"),
        }
    }
    stored
}

async fn download(client: &Client, url: &str, config: &FetchConfig) -> Result<Vec<u8>> {
    let parsed = parse_http_url(url)?;
    let response = client.get(parsed).send().await.map_err(|e| config.map_send_error(e))?.error_for_status()?;
    Ok(response.bytes().await.map_err(|e| config.map_send_error(e))?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryImageStore;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.contains("Stash"));
    }

    #[tokio::test]
    async fn test_fetch_url_invalid() {
        let result = fetch_url("not-a-url", &FetchConfig::default()).await;
        assert!(matches!(result, Err(ExtractError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_url_rejects_other_schemes() {
        let result = fetch_url("ftp://example.com/file.html", &FetchConfig::default()).await;
        assert!(matches!(result, Err(ExtractError::InvalidUrl(_))));
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/file.html");
        assert!(matches!(result, Err(ExtractError::FileNotFound(_))));
    }

    #[test]
    fn test_fetch_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 data").unwrap();
        assert_eq!(fetch_file(path.to_str().unwrap()).unwrap(), b"%PDF-1.4 data");
    }

    #[test]
    fn test_fetched_document_context() {
        let doc = FetchedDocument {
            bytes: Vec::new(),
            content_type: Some("application/pdf".to_string()),
            final_url: Url::parse("https://a.com/x").unwrap(),
        };
        let ctx = doc.context();
        assert_eq!(ctx.base_url.as_ref().unwrap().as_str(), "https://a.com/x");
        assert_eq!(ctx.media_type().as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_store_images_skips_unfetchable() {
        let store = MemoryImageStore::new();
        let urls = vec!["data:image/png;base64,AAAA".to_string(), "not a url".to_string()];
        let stored = store_images(&urls, &store, &FetchConfig::default()).await;
        assert!(stored.is_empty());
        assert!(store.is_empty());
    }
}
