//! Error types for the viewer
//!
//! Session-level failures (`OpenError`) clear all derived state before they are
//! reported. Page-level failures (`PageError`, `RenderError`) never escalate:
//! the page is marked failed and stays eligible for a passive retry.

use thiserror::Error;

use crate::guard::Generation;

/// A document could not be fetched or decoded.
///
/// Fatal to the current session. No partial page list is retained.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    /// The bytes could not be acquired (network or file read)
    #[error("Failed to fetch document from {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    /// The bytes were acquired but the engine rejected them
    #[error("Failed to decode document: {0}")]
    Decode(String),

    /// The source itself was unusable
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Retrieving a single page's content failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    NotFound { page: u32, page_count: usize },

    #[error("Failed to decode page {page}: {reason}")]
    Decode { page: u32, reason: String },
}

/// Painting a page into its surface failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error(transparent)]
    Page(#[from] PageError),

    /// The page had no bound surface when the paint step ran
    #[error("No surface is bound for page {0}")]
    SurfaceUnavailable(u32),

    #[error("Failed to draw page {page}: {reason}")]
    Draw { page: u32, reason: String },
}

/// A completion arrived for a document generation that has been superseded.
///
/// Never surfaced to the user; the scheduler logs and drops it.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Render of page {page} belongs to generation {ticket}, current is {current}")]
pub struct StaleGeneration {
    pub page: u32,
    pub ticket: Generation,
    pub current: Generation,
}

/// A supplied document source was rejected before opening.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Please upload a PDF file (got {mime:?})")]
    NotPdf { mime: String },

    #[error("Document source is empty")]
    Empty,
}
