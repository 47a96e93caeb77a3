//! The feature cache: resources, their features and provider registrations.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FeatureFilter, FeatureRow, ProviderFilter, ProviderRow, ResourceRow, Stats};
use exn::ResultExt;
use sieve_extract::models::{expiry, now};
use sieve_extract::{Feature, Registration};
use sieve_resource::Resource;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::time::Duration;
use tracing::instrument;

const FEATURE_COLUMNS: &str =
    "SELECT resource_id, key, value, value_kind, provider, generated_at, ttl, expires_at, metadata FROM features";

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Durable store of resources and their features, keyed by
/// `(resource identity, feature key)`.
///
/// Expiry is lazy: expired features stay queryable (when asked for) until
/// [`sweep_expired`](Self::sweep_expired) deletes them.
#[derive(Debug, Clone)]
pub struct FeatureCache {
    pool: SqlitePool,
}
impl From<&Database> for FeatureCache {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl FeatureCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Insert or update a resource by identity; last write wins.
    #[instrument(level = "debug", skip_all, fields(resource = %resource.id))]
    pub async fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        let row = ResourceRow::try_from(resource)?;
        sqlx::query(include_str!("../queries/upsert_resource.sql"))
            .bind(row.id)
            .bind(row.kind)
            .bind(row.size)
            .bind(row.media_type)
            .bind(row.checksum)
            .bind(row.last_processed)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn get_resource(&self, id: impl AsRef<str>) -> Result<Option<Resource>> {
        let row: Option<ResourceRow> = sqlx::query_as(include_str!("../queries/get_resource.sql"))
            .bind(id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Resource::try_from).transpose()
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Upsert a batch of features for one resource in a single transaction.
    ///
    /// Expiry is recomputed as `now + ttl` at write time. Returns the features
    /// exactly as stored.
    #[instrument(level = "debug", skip(self, features), fields(count = features.len()))]
    pub async fn store_features(&self, resource_id: &str, features: Vec<Feature>) -> Result<Vec<Feature>> {
        let written_at = now();
        let features = features
            .into_iter()
            .map(|mut feature| {
                feature.resource_id = resource_id.to_string();
                feature.refresh(written_at);
                feature
            })
            .collect::<Vec<_>>();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for feature in &features {
            let row = FeatureRow::try_from(feature)?;
            sqlx::query(include_str!("../queries/upsert_feature.sql"))
                .bind(row.resource_id)
                .bind(row.key)
                .bind(row.value)
                .bind(row.value_kind)
                .bind(row.provider)
                .bind(row.generated_at)
                .bind(row.ttl)
                .bind(row.expires_at)
                .bind(row.metadata)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(features)
    }

    /// Features matching every filter that is set, ordered by resource and key.
    pub async fn query_features(&self, filter: &FeatureFilter) -> Result<Vec<Feature>> {
        if filter.keys.as_ref().is_some_and(Vec::is_empty) || filter.providers.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(FEATURE_COLUMNS);
        builder.push(" WHERE 1 = 1");
        if let Some(resource_id) = &filter.resource_id {
            builder.push(" AND resource_id = ").push_bind(resource_id.clone());
        }
        if let Some(keys) = &filter.keys {
            builder.push(" AND key IN (");
            let mut separated = builder.separated(", ");
            for key in keys {
                separated.push_bind(key.clone());
            }
            separated.push_unseparated(")");
        }
        if let Some(providers) = &filter.providers {
            builder.push(" AND provider IN (");
            let mut separated = builder.separated(", ");
            for provider in providers {
                separated.push_bind(provider.clone());
            }
            separated.push_unseparated(")");
        }
        if !filter.include_expired {
            builder.push(" AND expires_at > ").push_bind(now().unix_timestamp());
        }
        builder.push(" ORDER BY resource_id, key");
        let rows: Vec<FeatureRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Feature::try_from).collect()
    }

    /// Unexpired features of one resource.
    pub async fn fresh_features(&self, resource_id: &str) -> Result<Vec<Feature>> {
        self.query_features(&FeatureFilter::new().resource(resource_id)).await
    }

    /// Give one feature a new TTL, counted from now.
    ///
    /// Returns [`ErrorKind::NotFound`] if the resource has no such feature.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_ttl(&self, resource_id: &str, key: &str, ttl: Duration) -> Result<Feature> {
        let seconds = i64::try_from(ttl.as_secs()).or_raise(|| ErrorKind::InvalidData("ttl"))?;
        let row: Option<FeatureRow> = sqlx::query_as(include_str!("../queries/update_ttl.sql"))
            .bind(seconds)
            .bind(expiry(now(), ttl).unix_timestamp())
            .bind(resource_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Feature::try_from(row),
            None => exn::bail!(ErrorKind::NotFound(format!("feature `{key}` of {resource_id}"))),
        }
    }

    /// Delete every feature whose expiry has passed. Returns how many went.
    #[instrument(level = "debug", skip(self))]
    pub async fn sweep_expired(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/sweep_expired.sql"))
            .bind(now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn stats(&self) -> Result<Stats> {
        let (resource_count, feature_count, expired_count, enabled_provider_count): (i64, i64, i64, i64) =
            sqlx::query_as(include_str!("../queries/stats.sql"))
                .bind(now().unix_timestamp())
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        Ok(Stats {
            resource_count: count(resource_count),
            feature_count: count(feature_count),
            expired_count: count(expired_count),
            enabled_provider_count: count(enabled_provider_count),
        })
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Create or replace a provider registration.
    pub async fn register_provider(&self, registration: &Registration) -> Result<()> {
        self.write_provider(include_str!("../queries/upsert_provider.sql"), registration).await
    }

    /// Store a registration only if none exists under that name yet, then
    /// return whatever is stored. Stored settings win over defaults.
    pub async fn seed_provider(&self, registration: &Registration) -> Result<Registration> {
        self.write_provider(include_str!("../queries/insert_provider_if_missing.sql"), registration).await?;
        match self.get_provider(&registration.name).await? {
            Some(stored) => Ok(stored),
            None => exn::bail!(ErrorKind::NotFound(format!("provider `{}`", registration.name))),
        }
    }

    async fn write_provider(&self, query: &'static str, registration: &Registration) -> Result<()> {
        let row = ProviderRow::try_from(registration)?;
        sqlx::query(query)
            .bind(row.name)
            .bind(row.media_types)
            .bind(row.keys)
            .bind(row.priority)
            .bind(row.enabled)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn get_provider(&self, name: &str) -> Result<Option<Registration>> {
        let row: Option<ProviderRow> = sqlx::query_as(include_str!("../queries/get_provider.sql"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Registration::try_from).transpose()
    }

    /// Registrations matching the filter, highest priority first.
    ///
    /// Registrations with patterns that no longer compile never match a
    /// media type filter.
    pub async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Registration>> {
        let rows: Vec<ProviderRow> = sqlx::query_as(include_str!("../queries/list_providers.sql"))
            .bind(filter.enabled)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let registrations = rows.into_iter().map(Registration::try_from).collect::<Result<Vec<_>>>()?;
        Ok(match &filter.media_type {
            Some(media_type) => registrations
                .into_iter()
                .filter(|registration| registration.accepts(media_type).unwrap_or(false))
                .collect(),
            None => registrations,
        })
    }
}
