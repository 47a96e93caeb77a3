use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use sieve_extract::models::Metadata;
use sieve_extract::{Feature, FeatureValue, ValueKind};
use std::time::Duration;
use time::UtcDateTime;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeatureRow {
    pub(crate) resource_id: String,
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) value_kind: String,
    pub(crate) provider: String,
    pub(crate) generated_at: i64,
    pub(crate) ttl: i64,
    pub(crate) expires_at: i64,
    pub(crate) metadata: String,
}
impl TryFrom<&Feature> for FeatureRow {
    type Error = Error;
    fn try_from(feature: &Feature) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_id: feature.resource_id.clone(),
            key: feature.key.clone(),
            value: feature.value.encode(),
            value_kind: feature.value.kind().to_string(),
            provider: feature.provider.clone(),
            generated_at: feature.generated_at.unix_timestamp(),
            ttl: i64::try_from(feature.ttl.as_secs()).or_raise(|| ErrorKind::InvalidData("ttl"))?,
            expires_at: feature.expires_at.unix_timestamp(),
            metadata: serde_json::to_string(&feature.metadata).or_raise(|| ErrorKind::InvalidData("metadata"))?,
        })
    }
}
impl TryFrom<FeatureRow> for Feature {
    type Error = Error;
    fn try_from(row: FeatureRow) -> Result<Self, Self::Error> {
        let kind = row.value_kind.parse::<ValueKind>().map_err(|_| ErrorKind::InvalidData("value kind"))?;
        Ok(Self {
            value: FeatureValue::decode(kind, &row.value).or_raise(|| ErrorKind::InvalidData("value"))?,
            generated_at: UtcDateTime::from_unix_timestamp(row.generated_at)
                .or_raise(|| ErrorKind::InvalidData("generated at"))?,
            ttl: Duration::from_secs(u64::try_from(row.ttl).or_raise(|| ErrorKind::InvalidData("ttl"))?),
            expires_at: UtcDateTime::from_unix_timestamp(row.expires_at)
                .or_raise(|| ErrorKind::InvalidData("expires at"))?,
            metadata: serde_json::from_str::<Metadata>(&row.metadata)
                .or_raise(|| ErrorKind::InvalidData("metadata"))?,
            resource_id: row.resource_id,
            key: row.key,
            provider: row.provider,
        })
    }
}
