//! Page access for the PDF pipeline.
//!
//! [`PagedDocument`] is what the classifier needs from a paginated document;
//! [`LopdfSource`] provides it for real PDF bytes and tests can provide it
//! from plain data.

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use tracing::debug;

use super::layout::{self, StyledRun, decode_text_simple};
use crate::{ExtractError, Result};

/// A document made of pages of styled text.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Title recorded in the document metadata, if any.
    fn metadata_title(&self) -> Option<String>;

    /// Styled runs of page `index` (0-based). Empty when unavailable.
    fn styled_runs(&self, index: usize) -> Vec<StyledRun>;

    /// Plain text of page `index`, used when no styled runs come back.
    fn plain_text(&self, index: usize) -> String;

    /// Embedded images drawn on page `index`.
    fn image_count(&self, _index: usize) -> usize {
        0
    }
}

/// [`PagedDocument`] over PDF bytes, backed by `lopdf`.
pub struct LopdfSource {
    doc: LopdfDocument,
    pages: Vec<(u32, ObjectId)>,
}

impl LopdfSource {
    /// Opens PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidDocument`] if the bytes are not a readable PDF.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(bytes).map_err(|e| match e {
            lopdf::Error::Decryption(_) => ExtractError::InvalidDocument("document is encrypted".to_string()),
            other => ExtractError::from(other),
        })?;
        let pages = doc.get_pages().into_iter().collect();
        Ok(Self { doc, pages })
    }

    /// Direct access to the parsed document.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    fn dictionary<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match obj {
            Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    fn is_image(&self, obj: &Object) -> bool {
        let stream = match obj {
            Object::Reference(id) => match self.doc.get_object(*id) {
                Ok(Object::Stream(stream)) => stream,
                _ => return false,
            },
            Object::Stream(stream) => stream,
            _ => return false,
        };
        stream.dict.get(b"Subtype").and_then(|o| o.as_name()).is_ok_and(|n| n == b"Image")
    }
}

impl PagedDocument for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn metadata_title(&self) -> Option<String> {
        let info = self.doc.trailer.get(b"Info").ok().and_then(|o| self.dictionary(o))?;
        let bytes = info.get(b"Title").ok()?.as_str().ok()?;
        let title = decode_text_simple(bytes).trim().to_string();
        if title.is_empty() { None } else { Some(title) }
    }

    fn styled_runs(&self, index: usize) -> Vec<StyledRun> {
        let Some(&(number, id)) = self.pages.get(index) else {
            return Vec::new();
        };
        layout::page_runs(&self.doc, id).unwrap_or_else(|e| {
            debug!(page = number, error = %e, "no styled runs for page");
            Vec::new()
        })
    }

    fn plain_text(&self, index: usize) -> String {
        self.pages
            .get(index)
            .and_then(|&(number, _)| self.doc.extract_text(&[number]).ok())
            .unwrap_or_default()
    }

    fn image_count(&self, index: usize) -> usize {
        let Some(&(_, id)) = self.pages.get(index) else {
            return 0;
        };
        let xobjects = self
            .doc
            .get_dictionary(id)
            .ok()
            .and_then(|page| page.get(b"Resources").ok())
            .and_then(|o| self.dictionary(o))
            .and_then(|resources| resources.get(b"XObject").ok())
            .and_then(|o| self.dictionary(o));

        xobjects.map_or(0, |dict| dict.iter().filter(|(_, obj)| self.is_image(obj)).count())
    }
}
