//! Built-in capability providers.

mod directory;
mod embeddings;
mod image;
mod text;
mod video;

pub use self::directory::DirectoryListing;
pub use self::embeddings::{EmbeddingSettings, HttpEmbeddings};
pub use self::image::{ImageBasic, THUMBNAIL_SIZE};
pub use self::text::TextStats;
pub use self::video::VideoProbe;
use crate::error::Result;
use crate::provider::ProviderHandle;
use std::sync::Arc;

/// Media types handled as text. Mirrors what
/// [`MediaClass::Text`](sieve_resource::MediaClass::Text) covers.
pub const TEXT_MEDIA_TYPES: &[&str] = &[
    "text/*",
    "application/json",
    "application/jsonl",
    "application/x-ndjson",
    "application/*+json",
    "application/xml",
    "*/*+xml",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/typescript",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/x-sh",
    "application/sql",
];

/// Every built-in provider. The embedding provider is always included; it
/// reports itself unavailable when no API key is configured.
pub fn builtin(embeddings: EmbeddingSettings) -> Result<Vec<ProviderHandle>> {
    Ok(vec![
        Arc::new(TextStats::new()),
        Arc::new(ImageBasic::new()),
        Arc::new(VideoProbe::new()),
        Arc::new(DirectoryListing::new()),
        Arc::new(HttpEmbeddings::new(embeddings)?),
    ])
}
