use std::fmt;
use std::sync::Arc;

use crate::error::SourceError;

/// Where a document's bytes come from
///
/// Exactly one variant is active per session.
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Remote locator, fetched by the engine
    Remote(String),
    /// Bytes already in memory (drag-and-drop or file picker)
    Bytes(Arc<[u8]>),
}

impl DocumentSource {
    pub const PDF_MIME: &'static str = "application/pdf";

    /// Locator for a file served from `api_base`
    pub fn remote(api_base: &str, filename: &str) -> Self {
        Self::Remote(format!("{}/{}", api_base.trim_end_matches('/'), filename))
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, SourceError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(Self::Bytes(bytes))
    }

    /// Accept an uploaded file only when it declares itself a PDF
    pub fn from_upload(bytes: impl Into<Arc<[u8]>>, mime: &str) -> Result<Self, SourceError> {
        if mime != Self::PDF_MIME {
            return Err(SourceError::NotPdf {
                mime: mime.to_string(),
            });
        }
        Self::from_bytes(bytes)
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Remote(locator) => locator.clone(),
            Self::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(locator) => f.debug_tuple("Remote").field(locator).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
        }
    }
}
