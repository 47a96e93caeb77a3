mod feature;
mod filter;
mod provider;
mod resource;

pub(crate) use self::feature::FeatureRow;
pub use self::filter::{FeatureFilter, ProviderFilter, Stats};
pub(crate) use self::provider::ProviderRow;
pub(crate) use self::resource::ResourceRow;
