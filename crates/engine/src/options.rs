//! Request options and engine-wide settings.

use crate::error::{ErrorKind, Result};
use sieve_config::Config;
use sieve_extract::Mode;
use sieve_extract::providers::EmbeddingSettings;
use std::time::Duration;

/// Engine-wide defaults and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_mode: Mode,
    pub default_ttl: Duration,
    /// Resources bigger than this are refused.
    pub max_size: u64,
    pub http_timeout: Duration,
    /// Provider invocations in flight across every extraction in the process.
    pub provider_concurrency: usize,
    pub provider_timeout: Option<Duration>,
    pub embeddings: EmbeddingSettings,
    /// Files extracted at once by one indexing pass.
    pub index_concurrency: usize,
    pub index_max_files: usize,
    pub sibling_max_files: usize,
    pub max_depth: usize,
    pub ignore: Vec<String>,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            default_mode: config.extract.default_mode,
            default_ttl: config.extract.default_ttl(),
            max_size: config.extract.max_size_bytes,
            http_timeout: config.extract.http_timeout(),
            provider_concurrency: config.extract.provider_concurrency,
            provider_timeout: config.extract.provider_timeout(),
            embeddings: config.extract.embedding_settings(),
            index_concurrency: config.index.concurrency,
            index_max_files: config.index.max_files,
            sibling_max_files: config.index.sibling_max_files,
            max_depth: config.index.max_depth,
            ignore: config.index.ignore.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.provider_concurrency == 0 || self.index_concurrency == 0 {
            exn::bail!(ErrorKind::InvalidInput("concurrency limits must be greater than zero".to_string()));
        }
        if self.default_ttl.is_zero() {
            exn::bail!(ErrorKind::InvalidInput("default TTL must be greater than zero".to_string()));
        }
        if self.max_size == 0 {
            exn::bail!(ErrorKind::InvalidInput("size cap must be greater than zero".to_string()));
        }
        if self.index_max_files == 0 || self.sibling_max_files == 0 {
            exn::bail!(ErrorKind::InvalidInput("file caps must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Options for a single extraction. Unset fields fall back to [`Settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOptions {
    pub mode: Option<Mode>,
    pub ttl: Option<Duration>,
    /// Ignore the cache and recompute every in-scope key.
    pub force: bool,
    /// Keep unexpired keys and only produce the ones missing.
    pub update_missing: bool,
    pub include_embeddings: bool,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn update_missing(mut self, update_missing: bool) -> Self {
        self.update_missing = update_missing;
        self
    }

    pub fn include_embeddings(mut self, include_embeddings: bool) -> Self {
        self.include_embeddings = include_embeddings;
        self
    }

    pub(crate) fn resolve(&self, settings: &Settings) -> Result<Request> {
        let ttl = self.ttl.unwrap_or(settings.default_ttl);
        if ttl.is_zero() {
            exn::bail!(ErrorKind::InvalidInput("ttl must be greater than zero".to_string()));
        }
        Ok(Request {
            mode: self.mode.unwrap_or(settings.default_mode),
            ttl,
            force: self.force,
            update_missing: self.update_missing,
            include_embeddings: self.include_embeddings,
        })
    }
}

/// [`ExtractOptions`] with every default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Request {
    pub mode: Mode,
    pub ttl: Duration,
    pub force: bool,
    pub update_missing: bool,
    pub include_embeddings: bool,
}

/// Options for one directory indexing pass. Unset fields fall back to
/// [`Settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    pub recursive: bool,
    /// Extensions (without the dot) to index. `None` indexes every file.
    pub extensions: Option<Vec<String>>,
    pub max_files: Option<usize>,
    pub ttl: Option<Duration>,
    pub concurrency: Option<usize>,
    pub mode: Option<Mode>,
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub(crate) fn resolve(&self, settings: &Settings) -> Result<IndexRequest> {
        let max_files = self.max_files.unwrap_or(settings.index_max_files);
        let concurrency = self.concurrency.unwrap_or(settings.index_concurrency);
        if max_files == 0 {
            exn::bail!(ErrorKind::InvalidInput("max_files must be greater than zero".to_string()));
        }
        if concurrency == 0 {
            exn::bail!(ErrorKind::InvalidInput("concurrency must be greater than zero".to_string()));
        }
        let extract = ExtractOptions {
            mode: self.mode,
            ttl: self.ttl,
            ..ExtractOptions::default()
        };
        Ok(IndexRequest {
            recursive: self.recursive,
            extensions: self.extensions.clone(),
            max_files,
            concurrency,
            extract: extract.resolve(settings)?,
        })
    }
}

/// [`IndexOptions`] with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexRequest {
    pub recursive: bool,
    pub extensions: Option<Vec<String>>,
    pub max_files: usize,
    pub concurrency: usize,
    /// How each file is extracted.
    pub extract: Request,
}
