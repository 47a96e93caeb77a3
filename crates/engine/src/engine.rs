use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::lock::KeyedLocks;
use crate::options::Settings;
use crate::queue::{IndexQueue, QueueFailure};
use exn::ResultExt;
use sieve_cache::{Database, FeatureCache, FeatureFilter, PoolSettings, ProviderFilter, Stats};
use sieve_config::Config;
use sieve_extract::{Feature, ProviderHandle, ProviderRegistry, Registration, providers};
use sieve_resource::{Fingerprinter, Loaded, Locator, Resource, WalkOptions, Walker};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};
use tracing::instrument;

/// The extraction engine: fingerprinting, the feature cache, provider
/// dispatch and directory indexing behind one handle.
///
/// Cheap to clone; clones share the cache, the provider pool and the
/// background queue.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) database: Database,
    pub(crate) cache: FeatureCache,
    pub(crate) fingerprinter: Fingerprinter,
    registry: RwLock<ProviderRegistry>,
    /// Global cap on provider invocations in flight.
    pub(crate) permits: Semaphore,
    pub(crate) locks: KeyedLocks,
    pub(crate) queue: IndexQueue,
    pub(crate) settings: Settings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("providers", &*self.registry())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

/// Assembles an [`Engine`] over an open [`Database`].
pub struct EngineBuilder {
    database: Database,
    settings: Settings,
    fingerprinter: Option<Fingerprinter>,
    providers: Vec<ProviderHandle>,
    builtins: bool,
}

impl EngineBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the default local + HTTP sources.
    pub fn fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }

    pub fn with_provider(mut self, provider: ProviderHandle) -> Self {
        self.providers.push(provider);
        self
    }

    /// Do not install the built-in providers.
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Install providers and reconcile them with the stored registrations.
    ///
    /// A provider seen for the first time is stored with its default
    /// registration; otherwise the stored registration wins.
    pub async fn build(self) -> Result<Engine> {
        let settings = self.settings;
        settings.validate()?;
        Walker::new(WalkOptions {
            ignore: settings.ignore.clone(),
            ..WalkOptions::default()
        })
        .or_raise(|| ErrorKind::InvalidInput("invalid ignore pattern".to_string()))?;

        let fingerprinter = match self.fingerprinter {
            Some(fingerprinter) => fingerprinter,
            None => Fingerprinter::with_defaults(settings.max_size, settings.http_timeout).or_raise(|| ErrorKind::Setup)?,
        };
        let mut handles = Vec::new();
        if self.builtins {
            handles.extend(providers::builtin(settings.embeddings.clone()).or_raise(|| ErrorKind::Setup)?);
        }
        handles.extend(self.providers);

        let cache = FeatureCache::from(&self.database);
        let mut registry = ProviderRegistry::new();
        for provider in handles {
            let stored = cache.seed_provider(&provider.registration()).await.or_raise(|| ErrorKind::Storage)?;
            registry.install(provider).or_raise(|| ErrorKind::Setup)?;
            if let Err(err) = registry.register(stored) {
                tracing::warn!(error = ?err, "ignoring stored provider registration");
            }
        }
        // Registrations stored without an implementation in this process.
        for stored in cache.list_providers(&ProviderFilter::default()).await.or_raise(|| ErrorKind::Storage)? {
            if registry.get(&stored.name).is_none()
                && let Err(err) = registry.register(stored)
            {
                tracing::warn!(error = ?err, "ignoring stored provider registration");
            }
        }
        tracing::debug!(providers = ?registry, "engine ready");

        Ok(Engine {
            inner: Arc::new(Inner {
                database: self.database,
                cache,
                fingerprinter,
                registry: RwLock::new(registry),
                permits: Semaphore::new(settings.provider_concurrency),
                locks: KeyedLocks::default(),
                queue: IndexQueue::new(),
                settings,
            }),
        })
    }
}

impl Engine {
    pub fn builder(database: Database) -> EngineBuilder {
        EngineBuilder {
            database,
            settings: Settings::default(),
            fingerprinter: None,
            providers: Vec::new(),
            builtins: true,
        }
    }

    /// Open the configured database, build an engine with the built-in
    /// providers and start the expiry reaper at `cache.sweep_interval_secs`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::InvalidInput("invalid configuration".to_string()))?;
        let path = config.database_path().or_raise(|| ErrorKind::Setup)?;
        let pool = PoolSettings {
            max_connections: config.cache.max_connections,
            busy_timeout: config.cache.busy_timeout(),
        };
        let database = Database::connect(&path, pool).await.or_raise(|| ErrorKind::Storage)?;
        tracing::info!(path = %path.display(), "opened feature cache");
        let engine = Self::builder(database).settings(Settings::from(config)).build().await?;
        engine.spawn_reaper(config.cache.sweep_interval())?;
        Ok(engine)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, ProviderRegistry> {
        self.inner.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ProviderRegistry> {
        self.inner.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load and fingerprint a resource, classifying load failures.
    pub(crate) async fn fingerprint(&self, locator: &Locator) -> Result<Loaded> {
        match self.inner.fingerprinter.load(locator).await {
            Ok(loaded) => Ok(loaded),
            Err(err) => {
                let kind = ErrorKind::from_load(&err);
                Err(err).or_raise(|| kind)
            },
        }
    }

    // =========================================================================
    // Cache query surface
    // =========================================================================

    pub async fn query(&self, filter: &FeatureFilter) -> Result<Vec<Feature>> {
        self.inner.cache.query_features(filter).await.or_raise(|| ErrorKind::Storage)
    }

    /// Features stored for one resource.
    pub async fn features(&self, locator: &Locator, include_expired: bool) -> Result<Vec<Feature>> {
        let filter = FeatureFilter::new().resource(locator.identity()).include_expired(include_expired);
        self.query(&filter).await
    }

    pub async fn get_resource(&self, locator: &Locator) -> Result<Option<Resource>> {
        self.inner.cache.get_resource(locator.identity()).await.or_raise(|| ErrorKind::Storage)
    }

    /// Give one stored feature a new TTL, counted from now.
    #[instrument(level = "debug", skip(self, ctx, locator), fields(request_id = %ctx.request_id(), locator = %locator))]
    pub async fn update_ttl(&self, ctx: &Context, locator: &Locator, key: &str, ttl: Duration) -> Result<Feature> {
        if ttl.is_zero() {
            exn::bail!(ErrorKind::InvalidInput("ttl must be greater than zero".to_string()));
        }
        let resource_id = locator.identity();
        match self.inner.cache.update_ttl(&resource_id, key, ttl).await {
            Ok(feature) => Ok(feature),
            Err(err) => {
                let kind = match &*err {
                    sieve_cache::error::ErrorKind::NotFound(what) => ErrorKind::NotFound(what.clone()),
                    _ => ErrorKind::Storage,
                };
                Err(err).or_raise(|| kind)
            },
        }
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.inner.cache.stats().await.or_raise(|| ErrorKind::Storage)
    }

    /// Delete expired features now. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        self.inner.cache.sweep_expired().await.or_raise(|| ErrorKind::Storage)
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Create or replace a registration, in storage and in the live registry.
    ///
    /// Registering a name with no installed implementation is allowed; it
    /// takes effect once a provider of that name is installed.
    #[instrument(level = "debug", skip_all, fields(provider = %registration.name))]
    pub async fn register_provider(&self, registration: Registration) -> Result<()> {
        if registration.name.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidInput("provider name must not be empty".to_string()));
        }
        registration
            .matcher()
            .or_raise(|| ErrorKind::InvalidInput(format!("invalid media type pattern for `{}`", registration.name)))?;
        self.inner.cache.register_provider(&registration).await.or_raise(|| ErrorKind::Storage)?;
        self.registry_mut()
            .register(registration)
            .or_raise(|| ErrorKind::InvalidInput("invalid registration".to_string()))
    }

    pub async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Registration>> {
        self.inner.cache.list_providers(filter).await.or_raise(|| ErrorKind::Storage)
    }

    // =========================================================================
    // Background work
    // =========================================================================

    /// Failures of background indexing jobs, as they happen.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<QueueFailure> {
        self.inner.queue.subscribe()
    }

    /// Wait until no background indexing job is queued or running.
    pub async fn wait_idle(&self) {
        self.inner.queue.wait_idle().await;
    }

    /// Sweep expired features every `interval` until [`shutdown`](Self::shutdown).
    pub fn spawn_reaper(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            exn::bail!(ErrorKind::InvalidInput("reaper interval must be greater than zero".to_string()));
        }
        self.inner.queue.spawn_reaper(self.inner.cache.clone(), interval);
        Ok(())
    }

    /// Stop background work, wait for running jobs and close the database.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
        self.inner.database.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_extract::Mode;

    async fn engine() -> Engine {
        Engine::builder(Database::connect_in_memory().await.unwrap()).build().await.unwrap()
    }

    #[tokio::test]
    async fn builtins_are_registered_and_stored() {
        let engine = engine().await;
        let stored = engine.list_providers(&ProviderFilter::default()).await.unwrap();
        let names = stored.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        for name in ["text-stats", "image-basic", "video-probe", "directory-listing", "http-embeddings"] {
            assert!(names.contains(&name), "{name} missing from {names:?}");
        }
        assert_eq!(engine.stats().await.unwrap().enabled_provider_count, 5);
    }

    #[tokio::test]
    async fn stored_registration_wins_over_defaults() {
        let database = Database::connect_in_memory().await.unwrap();
        let engine = Engine::builder(database.clone()).build().await.unwrap();
        let text = engine.registry().get("text-stats").cloned().unwrap();
        engine.register_provider(text.disabled()).await.unwrap();

        let rebuilt = Engine::builder(database).build().await.unwrap();
        assert!(!rebuilt.registry().get("text-stats").unwrap().enabled);
        let enabled = rebuilt
            .list_providers(&ProviderFilter {
                enabled: Some(true),
                media_type: Some("text/plain".to_string()),
            })
            .await
            .unwrap();
        assert!(enabled.iter().all(|r| r.name != "text-stats"));
    }

    #[tokio::test]
    async fn invalid_registrations_are_rejected() {
        let engine = engine().await;
        let err = engine
            .register_provider(Registration::new("broken").with_media_types(["text/[plain"]))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
        let err = engine.register_provider(Registration::new(" ")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }

    #[tokio::test]
    async fn invalid_settings_fail_to_build() {
        let database = Database::connect_in_memory().await.unwrap();
        let settings = Settings {
            provider_concurrency: 0,
            ..Settings::default()
        };
        let err = Engine::builder(database.clone()).settings(settings).build().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));

        let settings = Settings {
            ignore: vec!["a[".to_string()],
            ..Settings::default()
        };
        let err = Engine::builder(database).settings(settings).build().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }

    #[tokio::test]
    async fn update_ttl_errors() {
        let engine = engine().await;
        let ctx = Context::new();
        let locator = Locator::parse("/tmp/never-extracted.txt").unwrap();
        let err = engine.update_ttl(&ctx, &locator, "text.content", Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = engine.update_ttl(&ctx, &locator, "text.content", Duration::ZERO).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }

    #[tokio::test]
    async fn reaper_needs_positive_interval() {
        let engine = engine().await;
        assert!(engine.spawn_reaper(Duration::ZERO).is_err());
        engine.spawn_reaper(Duration::from_secs(60)).unwrap();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn configured_engines_sweep_on_their_own() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.txt");
        std::fs::write(&file, "short lived").unwrap();
        let mut config = Config::default();
        config.cache.path = Some(dir.path().join("sieve.sqlite"));
        config.cache.sweep_interval_secs = 1;
        let engine = Engine::from_config(&config).await.unwrap();

        let locator = Locator::from_path(&file).unwrap();
        let options = crate::options::ExtractOptions::new().ttl(Duration::from_secs(1));
        engine.extract_resource(&Context::new(), &locator, options).await.unwrap();
        assert!(!engine.features(&locator, true).await.unwrap().is_empty());

        // Expiry and sweep ticks both have whole-second resolution.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(engine.features(&locator, true).await.unwrap().is_empty());
        engine.shutdown().await;
    }

    #[test]
    fn default_settings_follow_config_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_mode, Mode::Standard);
        assert_eq!(settings.provider_concurrency, 5);
        assert_eq!(settings.index_concurrency, 3);
        assert_eq!(settings.sibling_max_files, 50);
    }
}
