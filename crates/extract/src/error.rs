//! Extraction Error Types
//!
//! Provider failures are soft as far as the orchestrator is concerned: one
//! failing provider never aborts its siblings. These kinds still say what the
//! caller could do about it.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The payload is not something this provider can decode.
    #[display("unsupported content: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// The payload claims to be decodable but is broken.
    #[display("malformed content: {_0}")]
    Malformed(#[error(not(source))] String),
    /// The provider is missing something it needs (credentials, a binary).
    #[display("provider unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// A remote service failed or answered with something unexpected.
    #[display("remote service error: {_0}")]
    Remote(#[error(not(source))] String),
    /// A media-type pattern failed to compile.
    #[display("invalid media type pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// A stored value could not be decoded back into a feature value.
    #[display("invalid stored value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
