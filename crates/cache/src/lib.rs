//! SQLite feature cache.
//!
//! Three tables: resources (one row per canonical identity), features (one row
//! per resource and key) and provider registrations. Features carry an
//! absolute expiry; expired rows remain until swept.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::{DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, Database, PoolSettings};
pub use crate::models::{FeatureFilter, ProviderFilter, Stats};
pub use crate::repo::FeatureCache;
