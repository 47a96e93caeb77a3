pub mod error;
pub mod mode;
pub mod models;
mod provider;
pub mod providers;
mod registry;

pub use crate::mode::{Mode, keys};
pub use crate::models::{Feature, FeatureValue, Produced, Registration, ValueKind};
pub use crate::provider::{Input, Provider, ProviderHandle};
pub use crate::registry::ProviderRegistry;
