//! Fault taxonomy shared by the resolver, the transform engine and the
//! document service. The HTTP layer maps these to status codes in one place.

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// The handle is unknown, or the document behind it has expired.
    #[error("no document with handle {0}")]
    NotFound(String),
    /// A remote context did not respond within the configured bound.
    #[error("fetching context {url} timed out")]
    FetchTimeout { url: String },
    /// Transport or HTTP failure while dereferencing a remote context.
    #[error("fetching context {url} failed: {reason}")]
    FetchError { url: String, reason: String },
    /// The remote body is not a usable JSON-LD context document.
    #[error("document at {url} is not a valid JSON-LD context")]
    InvalidContext { url: String },
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),
    #[error("unauthorized")]
    Unauthorized,
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Error {
        Error::MalformedDocument(reason.into())
    }
}
