use serde::{Deserialize, Serialize};

/// Which features to return from a query. Every filter that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFilter {
    pub resource_id: Option<String>,
    /// An empty list matches nothing.
    pub keys: Option<Vec<String>>,
    /// An empty list matches nothing.
    pub providers: Option<Vec<String>>,
    /// Expired features are physically present until swept; they are only
    /// returned when asked for.
    #[serde(default)]
    pub include_expired: bool,
}
impl FeatureFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    pub fn include_expired(mut self, include: bool) -> Self {
        self.include_expired = include;
        self
    }
}

/// Which provider registrations to list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFilter {
    pub enabled: Option<bool>,
    /// Only registrations whose patterns accept this media type.
    pub media_type: Option<String>,
}

/// Cache-wide counters. Read without a transaction, so only eventually
/// consistent with concurrent writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub resource_count: u64,
    pub feature_count: u64,
    pub expired_count: u64,
    pub enabled_provider_count: u64,
}
