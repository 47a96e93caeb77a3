//! Loading and fingerprinting resources.

use crate::error::{ErrorKind, Result};
use crate::source::{HttpSource, LocalSource, ResourceSource};
use crate::{Loaded, Locator, Resource, ResourceKind};
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

/// Default cap on payload size: 100 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Loads resources through the first [`ResourceSource`] that accepts them and
/// computes their content checksum.
///
/// Nothing is cached at this layer; every call reads the resource again.
#[derive(Clone)]
pub struct Fingerprinter {
    sources: Vec<Arc<dyn ResourceSource>>,
    max_size: u64,
}

impl Fingerprinter {
    pub fn new(sources: Vec<Arc<dyn ResourceSource>>, max_size: u64) -> Self {
        Self { sources, max_size }
    }

    /// Local filesystem and HTTP(S) sources.
    pub fn with_defaults(max_size: u64, http_timeout: Duration) -> Result<Self> {
        let sources: Vec<Arc<dyn ResourceSource>> =
            vec![Arc::new(LocalSource::new()), Arc::new(HttpSource::new(http_timeout)?)];
        Ok(Self::new(sources, max_size))
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Load a resource and fingerprint it.
    ///
    /// Files and URLs get a BLAKE3 checksum over the full payload; directories
    /// get none, their payload being a listing rather than content.
    #[instrument(level = "debug", skip(self, locator), fields(locator = %locator))]
    pub async fn load(&self, locator: &Locator) -> Result<Loaded> {
        let Some(source) = self.sources.iter().find(|s| s.accepts(locator)) else {
            exn::bail!(ErrorKind::InvalidLocator(format!("no source accepts {locator}")));
        };
        let fetched = source.fetch(locator, self.max_size).await?;
        let checksum = match fetched.kind {
            ResourceKind::Directory => None,
            _ => Some(blake3::hash(&fetched.bytes).to_hex().to_string()),
        };
        tracing::debug!(source = source.name(), size = fetched.size, media_type = %fetched.media_type, "loaded resource");
        Ok(Loaded {
            resource: Resource {
                id: locator.identity(),
                kind: fetched.kind,
                size: fetched.size,
                media_type: fetched.media_type,
                checksum,
                last_processed: UtcDateTime::now(),
            },
            bytes: fetched.bytes,
        })
    }
}

impl std::fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fingerprinter")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("max_size", &self.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Fingerprinter {
        Fingerprinter::new(vec![Arc::new(LocalSource::new())], DEFAULT_MAX_SIZE)
    }

    #[tokio::test]
    async fn test_checksum_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        let locator = Locator::from_path(&path).unwrap();

        std::fs::write(&path, "hello world").unwrap();
        let first = local().load(&locator).await.unwrap();
        let again = local().load(&locator).await.unwrap();
        assert_eq!(first.resource.checksum, again.resource.checksum);
        assert_eq!(
            first.resource.checksum.as_deref(),
            Some(blake3::hash(b"hello world").to_hex().as_str())
        );

        std::fs::write(&path, "hello there").unwrap();
        let changed = local().load(&locator).await.unwrap();
        assert_ne!(first.resource.checksum, changed.resource.checksum);
        assert_eq!(changed.resource.id, first.resource.id);
    }

    #[tokio::test]
    async fn test_directory_has_no_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = local().load(&Locator::from_path(dir.path()).unwrap()).await.unwrap();
        assert_eq!(loaded.resource.kind, ResourceKind::Directory);
        assert!(loaded.resource.checksum.is_none());
    }

    #[tokio::test]
    async fn test_no_source_accepts() {
        let err = local().load(&Locator::parse("https://example.com").unwrap()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLocator(_)));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();
        let fingerprinter = Fingerprinter::new(vec![Arc::new(LocalSource::new())], 9);
        let err = fingerprinter.load(&Locator::from_path(&path).unwrap()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooLarge { size: 10, limit: 9 }));
    }
}
