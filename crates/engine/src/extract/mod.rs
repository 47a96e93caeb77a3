//! Extraction orchestration.
//!
//! Two entry points exist on purpose. [`Engine::extract_resource`] only ever
//! extracts the resource it is given and is what the directory indexer calls.
//! [`Engine::extract`] does the same and then may queue one background pass
//! over the resource's siblings. Indexing never calls back into `extract`, so
//! the two cannot recurse into each other.

mod stream;

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{ErrorKind, Failure, Result};
use crate::options::{ExtractOptions, IndexOptions, Request};
use futures::StreamExt;
use sieve_extract::Feature;
use sieve_resource::{Locator, Resource, ResourceKind};
use std::pin::pin;
use tracing::instrument;

pub use self::stream::ExtractEvent;

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The resource as fingerprinted for this call.
    pub resource: Resource,
    /// Cache hits return the stored features; otherwise the features produced
    /// by this call.
    pub features: Vec<Feature>,
    /// Whether no provider ran.
    pub cached: bool,
}

impl Engine {
    /// Extract features for one resource, then possibly queue a background
    /// indexing pass over its siblings.
    ///
    /// Siblings are indexed when the locator is a local file and the
    /// containing directory has no unexpired features. The pass is capped at
    /// `sibling_max_files` files; its failures are logged and published on
    /// [`subscribe_failures`](Engine::subscribe_failures), never returned here.
    #[instrument(skip_all, fields(request_id = %ctx.request_id(), locator = %locator))]
    pub async fn extract(&self, ctx: &Context, locator: &Locator, options: ExtractOptions) -> Result<Vec<Feature>> {
        let request = options.resolve(&self.inner.settings)?;
        let extraction = self.run_extraction(ctx, locator, request).await?;
        self.index_siblings(ctx, locator, &extraction.resource, request).await;
        Ok(extraction.features)
    }

    /// Extract features for one resource. Never triggers directory indexing.
    #[instrument(skip_all, fields(request_id = %ctx.request_id(), locator = %locator))]
    pub async fn extract_resource(
        &self,
        ctx: &Context,
        locator: &Locator,
        options: ExtractOptions,
    ) -> Result<Vec<Feature>> {
        let request = options.resolve(&self.inner.settings)?;
        Ok(self.run_extraction(ctx, locator, request).await?.features)
    }

    /// Drive the extraction stream to completion.
    pub(crate) async fn run_extraction(&self, ctx: &Context, locator: &Locator, request: Request) -> Result<Extraction> {
        let mut events = pin!(self.extraction(ctx, locator, request));
        while let Some(event) = events.next().await {
            if let ExtractEvent::Completed(extraction) = event? {
                return Ok(extraction);
            }
        }
        exn::bail!(ErrorKind::ExtractionFailed(Failure::Unreadable(
            "extraction ended without completing".to_string()
        )))
    }

    /// Queue a background pass over the directory containing `locator`.
    async fn index_siblings(&self, ctx: &Context, locator: &Locator, resource: &Resource, request: Request) {
        if resource.kind == ResourceKind::Directory {
            return;
        }
        let Some(parent) = locator.parent() else {
            return;
        };
        let Some(directory) = parent.as_path().map(|path| path.to_path_buf()) else {
            return;
        };
        let identity = parent.identity();
        match self.inner.cache.fresh_features(&identity).await {
            Ok(features) if !features.is_empty() => {
                tracing::debug!(directory = %identity, "siblings already indexed");
                return;
            },
            Ok(_) => {},
            Err(err) => {
                tracing::warn!(error = ?err, directory = %identity, "could not check sibling index; skipping");
                return;
            },
        }
        let options = IndexOptions::new()
            .max_files(self.inner.settings.sibling_max_files)
            .mode(request.mode)
            .ttl(request.ttl);
        let engine = self.clone();
        let job_ctx = ctx.clone();
        let queued = self.inner.queue.submit(ctx.request_id(), identity, async move {
            engine.index_directory(&job_ctx, &directory, options).await
        });
        if queued {
            tracing::debug!("queued sibling indexing");
        }
    }
}
