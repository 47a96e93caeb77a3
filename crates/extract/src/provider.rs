//! The capability provider interface.

use crate::error::Result;
use crate::models::{Produced, Registration};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Everything a provider gets to look at.
#[derive(Debug, Clone)]
pub struct Input {
    /// The full payload. Shared so providers can move it onto a blocking thread.
    pub bytes: Arc<[u8]>,
    /// Parameter-free media type.
    pub media_type: String,
    /// TTL requested by the caller; providers may override it per value.
    pub ttl: Duration,
    /// Keys still missing for this resource. Providers may skip work for keys
    /// not listed; anything produced outside this set is discarded anyway.
    pub wanted: BTreeSet<String>,
}
impl Input {
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: impl Into<String>, ttl: Duration) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            ttl,
            wanted: BTreeSet::new(),
        }
    }

    pub fn wanting(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.wanted = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `key` should be produced. An empty wish list means everything.
    pub fn wants(&self, key: &str) -> bool {
        self.wanted.is_empty() || self.wanted.contains(key)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// An external routine that turns raw resource bytes into features.
///
/// Failures are soft: the orchestrator records them against this provider and
/// carries on with the others.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique name; also the primary key of the provider's registration.
    fn name(&self) -> &str;

    /// Glob patterns of the media types this provider accepts.
    fn media_types(&self) -> &[&str];

    /// Feature keys this provider can produce.
    fn keys(&self) -> &[&str];

    fn priority(&self) -> i32 {
        0
    }

    /// Whether the provider can run at all (credentials present and so on).
    fn is_available(&self) -> bool {
        true
    }

    /// Best-effort providers whose failure is logged and never counted
    /// against the extraction.
    fn is_enrichment(&self) -> bool {
        false
    }

    async fn extract(&self, input: &Input) -> Result<Vec<Produced>>;

    /// Default registration derived from the provider itself.
    fn registration(&self) -> Registration {
        Registration::new(self.name())
            .with_media_types(self.media_types().iter().copied())
            .with_keys(self.keys().iter().copied())
            .with_priority(self.priority())
    }
}

pub type ProviderHandle = Arc<dyn Provider>;
