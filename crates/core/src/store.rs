//! Content-addressed image storage.
//!
//! Extraction only emits image URLs. Whoever downloads them hands the bytes to
//! an [`ImageStore`], which names each image by a digest of its contents so the
//! same picture saved from two articles is stored once.

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::Result;

/// Lowercase hex SHA-256 digest of `bytes`.
///
/// ```rust
/// use stash_core::content_id;
///
/// assert_eq!(content_id(b"").len(), 64);
/// assert_eq!(content_id(b"abc"), content_id(b"abc"));
/// ```
pub fn content_id(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Storage for downloaded image bytes keyed by content.
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` and returns their identifier.
    ///
    /// Storing the same bytes twice returns the same identifier.
    fn store(&self, bytes: &[u8], source_url: Option<&str>) -> Result<String>;

    /// The bytes stored under `id`, if any.
    fn fetch(&self, id: &str) -> Option<Vec<u8>>;

    fn contains(&self, id: &str) -> bool {
        self.fetch(id).is_some()
    }
}

#[derive(Debug, Clone)]
struct StoredImage {
    bytes: Vec<u8>,
    source_url: Option<String>,
}

/// In-process [`ImageStore`].
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<String, StoredImage>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URL the image was first stored from.
    pub fn source_url(&self, id: &str) -> Option<String> {
        let images = self.images.read().unwrap_or_else(|e| e.into_inner());
        images.get(id).and_then(|img| img.source_url.clone())
    }
}

impl ImageStore for MemoryImageStore {
    fn store(&self, bytes: &[u8], source_url: Option<&str>) -> Result<String> {
        let id = content_id(bytes);
        let mut images = self.images.write().unwrap_or_else(|e| e.into_inner());
        images
            .entry(id.clone())
            .or_insert_with(|| StoredImage { bytes: bytes.to_vec(), source_url: source_url.map(str::to_string) });
        Ok(id)
    }

    fn fetch(&self, id: &str) -> Option<Vec<u8>> {
        let images = self.images.read().unwrap_or_else(|e| e.into_inner());
        images.get(id).map(|img| img.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_sha256_hex() {
        assert_eq!(content_id(b"abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_store_and_fetch() {
        let store = MemoryImageStore::new();
        let id = store.store(b"\x89PNG fake", Some("https://a.com/x.png")).unwrap();

        assert_eq!(store.fetch(&id).unwrap(), b"\x89PNG fake");
        assert!(store.contains(&id));
        assert_eq!(store.source_url(&id).as_deref(), Some("https://a.com/x.png"));
        assert!(store.fetch("missing").is_none());
    }

    #[test]
    fn test_same_bytes_stored_once() {
        let store = MemoryImageStore::new();
        let first = store.store(b"same", Some("https://a.com/1.png")).unwrap();
        let second = store.store(b"same", Some("https://b.com/2.png")).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.source_url(&first).as_deref(), Some("https://a.com/1.png"));
    }
}
