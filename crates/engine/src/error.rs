//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the resource, cache and
//! extract crates are re-raised under one of these kinds, keeping the original
//! as a child frame.

use derive_more::{Display, Error};
use sieve_resource::error::{Error as ResourceError, ErrorKind as ResourceErrorKind};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No such resource, feature or provider.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The resource could not be loaded, or every applicable provider failed.
    #[display("extraction failed: {_0}")]
    ExtractionFailed(#[error(not(source))] Failure),
    /// Malformed request options.
    #[display("invalid input: {_0}")]
    InvalidInput(#[error(not(source))] String),
    /// The cache database failed; there is no local recovery.
    #[display("storage error")]
    Storage,
    /// The engine could not be assembled (HTTP client, provider wiring).
    #[display("engine setup failed")]
    Setup,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage => true,
            Self::ExtractionFailed(failure) => matches!(failure, Failure::Unreadable(_)),
            _ => false,
        }
    }

    /// Classify a failure to load a resource.
    pub(crate) fn from_load(err: &ResourceError) -> Self {
        match &**err {
            ResourceErrorKind::NotFound(what) => Self::ExtractionFailed(Failure::NotFound(what.clone())),
            ResourceErrorKind::TooLarge { size, limit } => Self::ExtractionFailed(Failure::TooLarge {
                size: *size,
                limit: *limit,
            }),
            ResourceErrorKind::InvalidLocator(reason) => Self::InvalidInput(reason.clone()),
            other => Self::ExtractionFailed(Failure::Unreadable(other.to_string())),
        }
    }
}

/// Why an extraction produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Failure {
    #[display("resource not found: {_0}")]
    NotFound(String),
    #[display("resource too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[display("resource could not be read: {_0}")]
    Unreadable(String),
    /// Every applicable provider failed.
    #[display("{} provider(s) failed", _0.len())]
    Providers(Vec<ProviderFailure>),
}

/// One provider's soft failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{provider}: {reason}")]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_map_to_taxonomy() {
        let err: ResourceError = ResourceErrorKind::TooLarge { size: 12, limit: 10 }.into();
        assert!(matches!(
            ErrorKind::from_load(&err),
            ErrorKind::ExtractionFailed(Failure::TooLarge { size: 12, limit: 10 })
        ));
        let err: ResourceError = ResourceErrorKind::NotFound("file:///a".to_string()).into();
        assert!(matches!(ErrorKind::from_load(&err), ErrorKind::ExtractionFailed(Failure::NotFound(_))));
        let err: ResourceError = ResourceErrorKind::InvalidLocator("ftp".to_string()).into();
        assert!(matches!(ErrorKind::from_load(&err), ErrorKind::InvalidInput(_)));
        let err: ResourceError = ResourceErrorKind::Network("reset".to_string()).into();
        let kind = ErrorKind::from_load(&err);
        assert!(kind.is_retryable());
    }

    #[test]
    fn provider_failures_display() {
        let failure = Failure::Providers(vec![
            ProviderFailure {
                provider: "a".to_string(),
                reason: "boom".to_string(),
            },
            ProviderFailure {
                provider: "b".to_string(),
                reason: "bang".to_string(),
            },
        ]);
        assert_eq!(failure.to_string(), "2 provider(s) failed");
        assert_eq!(ErrorKind::ExtractionFailed(failure).to_string(), "extraction failed: 2 provider(s) failed");
    }
}
