//! Error types for bridge executions.

use inspectmaker_page::PageError;
use thiserror::Error;

/// Why a bridge call produced no output.
///
/// The `Display` form of each variant is what ends up in the `error` field
/// of an [`ExecutionResult`](crate::protocol::ExecutionResult).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The executed code threw; carries the exception message.
    #[error("{0}")]
    Execution(String),

    /// The bridge script element failed to load.
    #[error("Failed to load bridge script: {0}")]
    LoadFailed(#[source] PageError),

    /// The page refused the call (discarded, main world gone).
    #[error(transparent)]
    Page(#[from] PageError),

    /// The pending call was dropped before its reply arrived.
    #[error("Result channel closed before a reply arrived")]
    ChannelClosed,

    /// The request could not be encoded as a window message.
    #[error("Failed to encode bridge message: {0}")]
    Encode(#[from] serde_json::Error),
}
