use crate::models::FeatureValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use time::UtcDateTime;

/// Free-form metadata attached to a feature by its provider.
pub type Metadata = BTreeMap<String, String>;

/// A value as returned by a provider, before it is attached to a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub key: String,
    pub value: FeatureValue,
    /// Overrides the TTL requested by the caller.
    pub ttl: Option<Duration>,
    pub metadata: Metadata,
}
impl Produced {
    pub fn new(key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A named derived value attached to a resource, with its own TTL.
///
/// At most one live feature exists per `(resource_id, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub resource_id: String,
    pub key: String,
    pub value: FeatureValue,
    /// Name of the provider that produced the value.
    pub provider: String,
    #[serde(with = "unix_seconds")]
    pub generated_at: UtcDateTime,
    pub ttl: Duration,
    #[serde(with = "unix_seconds")]
    pub expires_at: UtcDateTime,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}
impl Feature {
    /// Attach a provider's output to a resource, generated now.
    pub fn from_produced(
        resource_id: impl Into<String>,
        provider: impl Into<String>,
        produced: Produced,
        default_ttl: Duration,
    ) -> Self {
        let generated_at = now();
        let ttl = produced.ttl.unwrap_or(default_ttl);
        Self {
            resource_id: resource_id.into(),
            key: produced.key,
            value: produced.value,
            provider: provider.into(),
            generated_at,
            ttl,
            expires_at: expiry(generated_at, ttl),
            metadata: produced.metadata,
        }
    }

    /// Expired features stay in storage until swept, but are no longer fresh.
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now())
    }

    /// Restart the TTL clock from `now`.
    pub fn refresh(&mut self, now: UtcDateTime) {
        self.generated_at = now;
        self.expires_at = expiry(now, self.ttl);
    }
}

/// Current time truncated to whole seconds, the resolution timestamps are
/// stored at. Keeps freshly produced features equal to their stored copies.
pub fn now() -> UtcDateTime {
    let now = UtcDateTime::now();
    UtcDateTime::from_unix_timestamp(now.unix_timestamp()).unwrap_or(now)
}

/// Absolute expiry for a TTL starting at `from`, clamped at the end of time.
pub fn expiry(from: UtcDateTime, ttl: Duration) -> UtcDateTime {
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| from.checked_add(ttl))
        .unwrap_or(UtcDateTime::MAX)
}

/// Timestamps serialize as unix seconds, the same resolution they are stored at.
mod unix_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::UtcDateTime;

    pub fn serialize<S: Serializer>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.unix_timestamp())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcDateTime, D::Error> {
        let timestamp = i64::deserialize(deserializer)?;
        UtcDateTime::from_unix_timestamp(timestamp).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_produced_uses_default_ttl() {
        let produced = Produced::new("text.word_count", 2u64);
        let feature = Feature::from_produced("file:///a.txt", "text-stats", produced, Duration::from_secs(60));
        assert_eq!(feature.ttl, Duration::from_secs(60));
        assert_eq!(feature.expires_at - feature.generated_at, time::Duration::seconds(60));
        assert!(!feature.is_expired());
    }

    #[test]
    fn test_produced_ttl_wins() {
        let produced = Produced::new("k", "v").with_ttl(Duration::from_secs(5)).with_metadata("model", "m");
        let feature = Feature::from_produced("file:///a.txt", "p", produced, Duration::from_secs(60));
        assert_eq!(feature.ttl, Duration::from_secs(5));
        assert_eq!(feature.metadata.get("model").map(String::as_str), Some("m"));
    }

    #[test]
    fn test_zero_ttl_is_already_expired() {
        let feature = Feature::from_produced("file:///a.txt", "p", Produced::new("k", "v"), Duration::ZERO);
        assert!(feature.is_expired_at(feature.generated_at));
    }

    #[test]
    fn test_now_has_no_subsecond_part() {
        assert_eq!(now().nanosecond(), 0);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        assert_eq!(expiry(now(), Duration::MAX), UtcDateTime::MAX);
    }
}
