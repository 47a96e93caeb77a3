#![allow(dead_code)]

use async_trait::async_trait;
use sieve_engine::{Database, Engine, Input, Produced, Provider, ProviderHandle, Settings, keys};
use sieve_extract::error::{ErrorKind as ProviderErrorKind, Result as ProviderResult};
use sieve_extract::providers::TextStats;
use sieve_resource::source::ResourceSource;
use sieve_resource::{DEFAULT_MAX_SIZE, Fingerprinter, MockSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Wraps a provider and counts its invocations.
pub struct Counting {
    inner: ProviderHandle,
    calls: AtomicUsize,
}

impl Counting {
    pub fn new(inner: ProviderHandle) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn text() -> Arc<Self> {
        Self::new(Arc::new(TextStats::new()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for Counting {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn media_types(&self) -> &[&str] {
        self.inner.media_types()
    }

    fn keys(&self) -> &[&str] {
        self.inner.keys()
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    fn is_enrichment(&self) -> bool {
        self.inner.is_enrichment()
    }

    async fn extract(&self, input: &Input) -> ProviderResult<Vec<Produced>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(input).await
    }
}

/// Produces one text key with a fixed value, fails, or stalls.
pub struct Scripted {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub behaviour: Behaviour,
}

#[derive(Clone, Copy)]
pub enum Behaviour {
    Succeed,
    Fail,
    Stall(Duration),
}

impl Scripted {
    pub fn new(name: &'static str, keys: &'static [&'static str], behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self { name, keys, behaviour })
    }
}

#[async_trait]
impl Provider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn media_types(&self) -> &[&str] {
        &["text/plain"]
    }

    fn keys(&self) -> &[&str] {
        self.keys
    }

    async fn extract(&self, _input: &Input) -> ProviderResult<Vec<Produced>> {
        match self.behaviour {
            Behaviour::Succeed => Ok(self.keys.iter().map(|key| Produced::new(*key, self.name)).collect()),
            Behaviour::Fail => exn::bail!(ProviderErrorKind::Malformed(format!("{} refused", self.name))),
            Behaviour::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Vec::new())
            },
        }
    }
}

/// Records how many of its invocations overlap.
pub struct Gauge {
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for Gauge {
    fn name(&self) -> &str {
        "gauge"
    }

    fn media_types(&self) -> &[&str] {
        &["text/plain"]
    }

    fn keys(&self) -> &[&str] {
        &[keys::TEXT_CONTENT]
    }

    async fn extract(&self, _input: &Input) -> ProviderResult<Vec<Produced>> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![Produced::new(keys::TEXT_CONTENT, "gauge")])
    }
}

/// An engine reading from `source`, with only the given providers installed.
pub async fn mock_engine(source: Arc<MockSource>, providers: Vec<ProviderHandle>) -> Engine {
    mock_engine_with(source, providers, Settings::default(), DEFAULT_MAX_SIZE).await
}

pub async fn mock_engine_with(
    source: Arc<MockSource>,
    providers: Vec<ProviderHandle>,
    settings: Settings,
    max_size: u64,
) -> Engine {
    let sources: Vec<Arc<dyn ResourceSource>> = vec![source];
    let mut builder = Engine::builder(Database::connect_in_memory().await.unwrap())
        .settings(settings)
        .fingerprinter(Fingerprinter::new(sources, max_size))
        .without_builtins();
    for provider in providers {
        builder = builder.with_provider(provider);
    }
    builder.build().await.unwrap()
}

/// An engine over the real filesystem with the built-in providers.
pub async fn disk_engine() -> Engine {
    Engine::builder(Database::connect_in_memory().await.unwrap()).build().await.unwrap()
}

/// An engine over the real filesystem with only the given providers installed.
pub async fn disk_engine_with(providers: Vec<ProviderHandle>, settings: Settings) -> Engine {
    let mut builder = Engine::builder(Database::connect_in_memory().await.unwrap())
        .settings(settings)
        .without_builtins();
    for provider in providers {
        builder = builder.with_provider(provider);
    }
    builder.build().await.unwrap()
}
