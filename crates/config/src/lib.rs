//! Layered configuration for sieve.
//!
//! Values resolve in order: built-in defaults, then an optional file (TOML,
//! YAML or JSON, chosen by extension), then `SIEVE_` environment variables
//! with `__` between section and key (`SIEVE_EXTRACT__DEFAULT_TTL_SECS=60`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use sieve_extract::Mode;
use sieve_extract::providers::EmbeddingSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "SIEVE_";
pub const DATABASE_FILENAME: &str = "sieve.sqlite";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub extract: ExtractConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite database file. Defaults to `sieve.sqlite` in the platform data
    /// directory.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    /// How often the reaper deletes expired features.
    pub sweep_interval_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            busy_timeout_ms: 1500,
            sweep_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub default_mode: Mode,
    pub default_ttl_secs: u64,
    pub max_size_bytes: u64,
    /// Provider invocations allowed to run at once across all extractions.
    pub provider_concurrency: usize,
    /// A provider running longer than this counts as failed. Unset means no
    /// limit.
    pub provider_timeout_secs: Option<u64>,
    pub http_timeout_secs: u64,
    pub embeddings: EmbeddingsConfig,
}
impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::Standard,
            default_ttl_secs: 3600,
            max_size_bytes: 100 * 1024 * 1024,
            provider_concurrency: 5,
            provider_timeout_secs: None,
            http_timeout_secs: 30,
            embeddings: EmbeddingsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}
impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Files extracted at once during one indexing pass.
    pub concurrency: usize,
    pub max_files: usize,
    /// File cap for the background pass over a file's siblings.
    pub sibling_max_files: usize,
    pub max_depth: usize,
    /// Globs matched against file and directory names.
    pub ignore: Vec<String>,
}
impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_files: 1000,
            sibling_max_files: 50,
            max_depth: 16,
            ignore: [".*", "node_modules", "target", "__pycache__"].map(String::from).to_vec(),
        }
    }
}

impl Config {
    /// Load and validate, layering `file` (if any) and the environment over
    /// the defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(file = ?file, "configuration loaded");
        Ok(config)
    }

    /// The provider stack behind [`load`](Self::load), for hosts that want to
    /// merge their own layers before extracting.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::Invalid {
                    field: "file",
                    reason: format!("{} does not exist", path.display()),
                });
            }
            let extension = path
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            figment = match extension.as_str() {
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "json" => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(field: &'static str, value: u64) -> Result<()> {
            if value == 0 {
                exn::bail!(ErrorKind::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }
        positive("cache.max_connections", u64::from(self.cache.max_connections))?;
        positive("cache.sweep_interval_secs", self.cache.sweep_interval_secs)?;
        positive("extract.default_ttl_secs", self.extract.default_ttl_secs)?;
        positive("extract.max_size_bytes", self.extract.max_size_bytes)?;
        positive("extract.provider_concurrency", self.extract.provider_concurrency as u64)?;
        positive("extract.http_timeout_secs", self.extract.http_timeout_secs)?;
        if let Some(timeout) = self.extract.provider_timeout_secs {
            positive("extract.provider_timeout_secs", timeout)?;
        }
        positive("index.concurrency", self.index.concurrency as u64)?;
        positive("index.max_files", self.index.max_files as u64)?;
        positive("index.sibling_max_files", self.index.sibling_max_files as u64)?;
        for pattern in &self.index.ignore {
            globset::Glob::new(pattern).or_raise(|| ErrorKind::Invalid {
                field: "index.ignore",
                reason: format!("`{pattern}` is not a valid glob"),
            })?;
        }
        Ok(())
    }

    /// The configured database path, or the platform default.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache.path {
            return Ok(path.clone());
        }
        let Some(dirs) = ProjectDirs::from("", "", "sieve") else {
            exn::bail!(ErrorKind::NoDataDirectory);
        };
        Ok(dirs.data_dir().join(DATABASE_FILENAME))
    }
}

impl CacheConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ExtractConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn embedding_settings(&self) -> EmbeddingSettings {
        EmbeddingSettings {
            endpoint: self.embeddings.endpoint.clone(),
            model: self.embeddings.model.clone(),
            api_key: self.embeddings.api_key.clone(),
            timeout: self.http_timeout(),
        }
    }
}
