use crate::error::{ErrorKind, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Routing information for a capability provider.
///
/// Media types are glob patterns (`image/*`, `application/json`) matched
/// case-insensitively against a parameter-free media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub media_types: Vec<String>,
    /// Feature keys the provider is known to produce.
    pub keys: Vec<String>,
    /// Higher runs first when several providers apply.
    pub priority: i32,
    pub enabled: bool,
}
impl Registration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media_types: Vec::new(),
            keys: Vec::new(),
            priority: 0,
            enabled: true,
        }
    }

    pub fn with_media_types(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.media_types = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Compile the media-type patterns.
    pub fn matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.media_types {
            let glob = Glob::new(&pattern.to_ascii_lowercase())
                .map_err(|e| ErrorKind::InvalidPattern(format!("{pattern}: {e}")))?;
            builder.add(glob);
        }
        Ok(builder.build().map_err(|e| ErrorKind::InvalidPattern(e.to_string()))?)
    }

    /// One-off match; the registry keeps compiled matchers instead.
    pub fn accepts(&self, media_type: &str) -> Result<bool> {
        Ok(self.matcher()?.is_match(media_type.to_ascii_lowercase()))
    }
}
