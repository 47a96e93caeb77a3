//! Extraction engine for sieve.
//!
//! Ties the resource loader, the feature cache and the capability providers
//! together: fingerprint a resource, decide which feature keys are missing or
//! stale, run the providers that can fill them and store the results. The
//! same pipeline drives directory indexing, in the foreground or as a
//! best-effort background pass over a file's siblings.

mod context;
mod engine;
pub mod error;
mod extract;
mod index;
mod lock;
mod options;
mod queue;

pub use crate::context::Context;
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::extract::{ExtractEvent, Extraction};
pub use crate::index::{FileOutcome, INDEXER_PROVIDER, IndexEvent, IndexReport, SkipReason};
pub use crate::options::{ExtractOptions, IndexOptions, Settings};
pub use crate::queue::QueueFailure;
pub use sieve_cache::{Database, FeatureFilter, PoolSettings, ProviderFilter, Stats};
pub use sieve_config::Config;
pub use sieve_extract::{Feature, FeatureValue, Input, Mode, Produced, Provider, ProviderHandle, Registration, keys};
pub use sieve_resource::{Fingerprinter, Locator, Resource, ResourceKind};
