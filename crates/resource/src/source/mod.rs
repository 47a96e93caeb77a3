//! Resource sources.
//!
//! A [`ResourceSource`] knows how to turn a [`Locator`] into bytes. The
//! [`Fingerprinter`](crate::Fingerprinter) picks the first configured source
//! that accepts a locator, so the order sources are registered in matters
//! when several could claim the same locator (a [`MockSource`] in tests, for
//! example).

mod http;
mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::HttpSource;
pub use self::local::{DirectoryEntry, LocalSource};
#[cfg(feature = "mock")]
pub use self::mock::MockSource;
use crate::error::{ErrorKind, Result};
use crate::{Locator, ResourceKind};
use async_trait::async_trait;

/// Raw result of reading a resource, before fingerprinting.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub kind: ResourceKind,
    /// Parameter-free media type, declared by the remote or detected locally.
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// Logical size of the resource. Matches `bytes.len()` for files and URLs;
    /// for directories it is the sum of the children's sizes.
    pub size: u64,
}

/// Uniform interface over the places resources are loaded from.
///
/// Implementations must enforce `limit` as early as they can (a declared
/// length, file metadata) and again after the read when the length could not
/// be known up front.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Name of the source, for logging.
    fn name(&self) -> &str;

    /// Whether this source can load the given locator.
    fn accepts(&self, locator: &Locator) -> bool;

    /// Read the resource in full.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the resource does not
    /// exist and [`TooLarge`](ErrorKind::TooLarge) if it is bigger than `limit`.
    async fn fetch(&self, locator: &Locator, limit: u64) -> Result<Fetched>;
}

/// Shared check for sources that learn the size before (or after) reading.
pub(crate) fn enforce_limit(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        exn::bail!(ErrorKind::TooLarge { size, limit });
    }
    Ok(())
}
