pub mod error;
mod fingerprint;
mod locator;
pub mod media;
mod models;
pub mod source;
pub mod walk;

pub use crate::fingerprint::{DEFAULT_MAX_SIZE, Fingerprinter};
pub use crate::locator::Locator;
pub use crate::media::MediaClass;
pub use crate::models::{Loaded, Resource, ResourceKind};
#[cfg(feature = "mock")]
pub use crate::source::MockSource;
pub use crate::source::{DirectoryEntry, ResourceSource};
pub use crate::walk::{WalkEvent, WalkOptions, Walker};
