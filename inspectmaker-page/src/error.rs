//! Error types for the page model.

use thiserror::Error;

/// Errors surfaced by page operations that cross into the main world.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// A `<script src>` element could not load its resource.
    #[error("Failed to load script resource '{0}'")]
    ResourceNotFound(String),

    /// The document has been unloaded; nothing runs in it any more.
    #[error("Document has been discarded")]
    Discarded,

    /// The main-world thread is gone or dropped the request.
    #[error("Main world is unavailable")]
    WorldUnavailable,

    /// The native browser API rejected the call.
    #[error("Native API error: {0}")]
    NativeApi(String),
}
