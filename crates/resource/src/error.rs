//! Resource Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A resource error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file does not exist, or the remote answered with a non-success status.
    #[display("resource not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The payload is bigger than the configured cap.
    #[display("resource too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    /// The locator could not be parsed, or no source accepts it.
    #[display("invalid locator: {_0}")]
    InvalidLocator(#[error(not(source))] String),
    /// An ignore or filter pattern failed to compile.
    #[display("invalid pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// Access denied by the filesystem.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (connection refused, TLS, timeouts, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_))
    }
}
