mod feature;
mod registration;
mod value;

pub use self::feature::{Feature, Metadata, Produced, expiry, now};
pub use self::registration::Registration;
pub use self::value::{FeatureValue, ValueKind};
