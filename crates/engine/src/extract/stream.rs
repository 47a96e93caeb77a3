use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, ErrorKind, Failure, ProviderFailure, Result};
use crate::extract::Extraction;
use crate::options::{ExtractOptions, Request};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use sieve_extract::error::{ErrorKind as ProviderErrorKind, Result as ProviderResult};
use sieve_extract::{Feature, Input, Produced, ProviderHandle};
use sieve_resource::{Locator, Resource};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Progress events emitted while extracting one resource.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. For each provider that runs, [`ProviderStarted`](Self::ProviderStarted)
///    and later exactly one of [`ProviderCompleted`](Self::ProviderCompleted)
///    or [`ProviderFailed`](Self::ProviderFailed). Providers run concurrently,
///    so events of different providers interleave.
/// 3. [`Completed`](Self::Completed) exactly once.
///
/// An error terminates the stream early, in which case `Completed` is never
/// emitted. Cache hits go straight from `Started` to `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractEvent {
    Started {
        request_id: String,
        resource_id: String,
    },
    ProviderStarted {
        provider: String,
    },
    /// Features a provider produced, before they are stored.
    ProviderCompleted {
        provider: String,
        features: Vec<Feature>,
    },
    ProviderFailed {
        provider: String,
        reason: String,
        /// Enrichment failures never fail the extraction.
        enrichment: bool,
    },
    Completed(Extraction),
}

/// What to do once the cache has been consulted.
enum Plan {
    Done(Extraction),
    Dispatch(Dispatch),
}

struct Dispatch {
    resource: Resource,
    input: Arc<Input>,
    /// Highest priority first.
    providers: Vec<ProviderHandle>,
    /// Held until the produced features are stored.
    _guard: OwnedMutexGuard<()>,
}

impl Engine {
    /// Streaming form of [`extract`](Engine::extract): once the extraction
    /// completes, siblings may be queued for background indexing.
    pub fn extract_stream<'a>(
        &'a self,
        ctx: &'a Context,
        locator: &'a Locator,
        options: ExtractOptions,
    ) -> impl Stream<Item = Result<ExtractEvent>> + 'a {
        stream!({
            let request = match options.resolve(&self.inner.settings) {
                Ok(request) => request,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            for await event in self.extraction(ctx, locator, request) {
                if let Ok(ExtractEvent::Completed(extraction)) = &event {
                    self.index_siblings(ctx, locator, &extraction.resource, request).await;
                }
                yield event;
            }
        })
    }

    /// Streaming form of [`extract_resource`](Engine::extract_resource).
    pub fn extract_resource_stream<'a>(
        &'a self,
        ctx: &'a Context,
        locator: &'a Locator,
        options: ExtractOptions,
    ) -> impl Stream<Item = Result<ExtractEvent>> + 'a {
        stream!({
            match options.resolve(&self.inner.settings) {
                Ok(request) => {
                    for await event in self.extraction(ctx, locator, request) {
                        yield event;
                    }
                },
                Err(e) => yield Err(e),
            }
        })
    }

    pub(crate) fn extraction<'a>(
        &'a self,
        ctx: &'a Context,
        locator: &'a Locator,
        request: Request,
    ) -> impl Stream<Item = Result<ExtractEvent>> + 'a {
        stream!({
            yield Ok(ExtractEvent::Started {
                request_id: ctx.request_id().to_string(),
                resource_id: locator.identity(),
            });

            let dispatch = match self.plan(ctx, locator, &request).await {
                Ok(Plan::Done(extraction)) => {
                    yield Ok(ExtractEvent::Completed(extraction));
                    return;
                },
                Ok(Plan::Dispatch(dispatch)) => dispatch,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };

            let mut running = FuturesUnordered::new();
            for (rank, provider) in dispatch.providers.iter().enumerate() {
                yield Ok(ExtractEvent::ProviderStarted {
                    provider: provider.name().to_string(),
                });
                running.push(self.invoke(rank, provider.clone(), dispatch.input.clone()));
            }

            let resource_id = dispatch.resource.id.clone();
            // Key -> (rank, feature). Higher priority providers win a key.
            let mut produced: BTreeMap<String, (usize, Feature)> = BTreeMap::new();
            let mut failures = Vec::new();
            let mut succeeded = 0usize;
            while let Some((rank, provider, outcome)) = running.next().await {
                let name = provider.name().to_string();
                match outcome {
                    Ok(values) => {
                        succeeded += usize::from(!provider.is_enrichment());
                        let features = values
                            .into_iter()
                            .filter(|value| dispatch.input.wanted.contains(&value.key))
                            .map(|value| Feature::from_produced(&resource_id, &name, value, request.ttl))
                            .collect::<Vec<_>>();
                        for feature in &features {
                            let outranked = produced.get(&feature.key).is_some_and(|(held, _)| *held < rank);
                            if !outranked {
                                produced.insert(feature.key.clone(), (rank, feature.clone()));
                            }
                        }
                        tracing::debug!(provider = %name, count = features.len(), "provider completed");
                        yield Ok(ExtractEvent::ProviderCompleted { provider: name, features });
                    },
                    Err(err) => {
                        let enrichment = provider.is_enrichment();
                        let reason = (*err).to_string();
                        if enrichment {
                            tracing::warn!(provider = %name, error = ?err, "enrichment provider failed; ignoring");
                        } else {
                            tracing::warn!(provider = %name, error = ?err, "provider failed");
                            failures.push(ProviderFailure {
                                provider: name.clone(),
                                reason: reason.clone(),
                            });
                        }
                        yield Ok(ExtractEvent::ProviderFailed { provider: name, reason, enrichment });
                    },
                }
            }

            let features = produced.into_values().map(|(_, feature)| feature).collect::<Vec<_>>();
            if features.is_empty() && succeeded == 0 && !failures.is_empty() {
                yield Err(Error::from(ErrorKind::ExtractionFailed(Failure::Providers(failures))));
                return;
            }
            match self.inner.cache.store_features(&resource_id, features).await.or_raise(|| ErrorKind::Storage) {
                Ok(stored) => {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        resource = %resource_id,
                        features = stored.len(),
                        failed = failures.len(),
                        "extracted features"
                    );
                    yield Ok(ExtractEvent::Completed(Extraction {
                        resource: dispatch.resource,
                        features: stored,
                        cached: false,
                    }));
                },
                Err(e) => yield Err(e),
            }
        })
    }

    /// Fingerprint, consult the cache and pick the providers to run.
    async fn plan(&self, ctx: &Context, locator: &Locator, request: &Request) -> Result<Plan> {
        let cache = &self.inner.cache;
        let loaded = self.fingerprint(locator).await?;
        let guard = self.inner.locks.lock(&loaded.resource.id).await;
        let resource = loaded.resource;

        let stored = cache.get_resource(&resource.id).await.or_raise(|| ErrorKind::Storage)?;
        let unchanged = !request.force && stored.is_some_and(|stored| stored.same_content(&resource));
        let mut wanted = request.mode.expected_keys(resource.class(), request.include_embeddings);
        // Only in-scope keys count towards a hit; a directory's summary alone
        // must not hide its listing features.
        let existing = if unchanged {
            let mut fresh = cache.fresh_features(&resource.id).await.or_raise(|| ErrorKind::Storage)?;
            fresh.retain(|feature| wanted.contains(&feature.key));
            fresh
        } else {
            Vec::new()
        };
        cache.upsert_resource(&resource).await.or_raise(|| ErrorKind::Storage)?;

        if !existing.is_empty() && !request.update_missing {
            tracing::debug!(request_id = %ctx.request_id(), resource = %resource.id, "cache hit");
            return Ok(Plan::Done(Extraction {
                resource,
                features: existing,
                cached: true,
            }));
        }

        if request.update_missing {
            let present = existing.iter().map(|feature| feature.key.as_str()).collect::<BTreeSet<_>>();
            wanted.retain(|key| !present.contains(key.as_str()));
        }
        if wanted.is_empty() {
            tracing::debug!(request_id = %ctx.request_id(), resource = %resource.id, "nothing missing");
            return Ok(Plan::Done(Extraction {
                resource,
                features: existing,
                cached: true,
            }));
        }

        let providers = self.registry().resolve(&resource.media_type, &wanted);
        tracing::debug!(
            request_id = %ctx.request_id(),
            resource = %resource.id,
            wanted = ?wanted,
            providers = providers.len(),
            "dispatching providers"
        );
        let input = Input::new(loaded.bytes, resource.media_type.clone(), request.ttl).wanting(wanted);
        Ok(Plan::Dispatch(Dispatch {
            resource,
            input: Arc::new(input),
            providers,
            _guard: guard,
        }))
    }

    /// Run one provider under the global permit pool and optional timeout.
    async fn invoke(
        &self,
        rank: usize,
        provider: ProviderHandle,
        input: Arc<Input>,
    ) -> (usize, ProviderHandle, ProviderResult<Vec<Produced>>) {
        let outcome = match self.inner.permits.acquire().await {
            Ok(_permit) => match self.inner.settings.provider_timeout {
                Some(limit) => match tokio::time::timeout(limit, provider.extract(&input)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProviderErrorKind::Unavailable(format!("timed out after {limit:?}")).into()),
                },
                None => provider.extract(&input).await,
            },
            Err(_) => Err(ProviderErrorKind::Unavailable("provider pool closed".to_string()).into()),
        };
        (rank, provider, outcome)
    }
}
