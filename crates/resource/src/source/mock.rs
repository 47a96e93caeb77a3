//! In-memory source for testing.

use crate::error::{ErrorKind, Result};
use crate::media;
use crate::source::{Fetched, ResourceSource, enforce_limit};
use crate::{Locator, ResourceKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// In-memory source for testing.
///
/// Payloads are keyed by locator identity and kept behind a [`RwLock`], so
/// tests can mutate "files" between extraction calls through `&self`. Every
/// locator is accepted; anything not in the map is [`NotFound`](ErrorKind::NotFound).
#[derive(Debug, Default)]
pub struct MockSource {
    storage: RwLock<HashMap<String, Vec<u8>>>,
}

impl MockSource {
    /// Create a mock source pre-populated with payloads.
    ///
    /// Panics if any locator fails to parse. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (locator, data) in files {
            let Ok(parsed) = Locator::parse(locator.as_ref()) else {
                panic!("MockSource::with_files: invalid locator {}", locator.as_ref());
            };
            map.insert(parsed.identity(), data.into());
        }
        Self {
            storage: RwLock::new(map),
        }
    }

    /// Create or replace a payload.
    pub async fn write(&self, locator: &Locator, data: impl Into<Vec<u8>>) {
        self.storage.write().await.insert(locator.identity(), data.into());
    }

    /// Remove a payload, returning whether it existed.
    pub async fn remove(&self, locator: &Locator) -> bool {
        self.storage.write().await.remove(&locator.identity()).is_some()
    }
}

#[async_trait]
impl ResourceSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn accepts(&self, _locator: &Locator) -> bool {
        true
    }

    async fn fetch(&self, locator: &Locator, limit: u64) -> Result<Fetched> {
        let identity = locator.identity();
        let Some(bytes) = self.storage.read().await.get(&identity).cloned() else {
            exn::bail!(ErrorKind::NotFound(identity));
        };
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        enforce_limit(size, limit)?;
        let (kind, media_type) = match locator {
            Locator::Path(path) => (ResourceKind::File, media::detect(path, &bytes)),
            Locator::Url(url) => (ResourceKind::Url, media::detect(Path::new(url.path()), &bytes)),
        };
        Ok(Fetched {
            kind,
            media_type,
            bytes,
            size,
        })
    }
}
