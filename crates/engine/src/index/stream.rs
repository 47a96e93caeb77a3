use crate::context::Context;
use crate::engine::Engine;
use crate::error::{ErrorKind, Failure, Result};
use crate::index::{FileOutcome, INDEXER_PROVIDER, IndexReport, SkipReason};
use crate::options::{IndexOptions, IndexRequest, Request};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use sieve_extract::models::now;
use sieve_extract::{Feature, Produced, keys};
use sieve_resource::media::DIRECTORY_MEDIA_TYPE;
use sieve_resource::{Locator, Resource, ResourceKind, WalkEvent, WalkOptions, Walker};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Progress events emitted by [`Engine::index_stream`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete) exactly once, with the
///    number of files that will be extracted.
/// 3. [`File`](Self::File) once per listed path, including skipped ones.
/// 4. [`Complete`](Self::Complete) exactly once, after the directory summary
///    has been stored.
///
/// Per-file failures are reported as `File` events and do not end the stream.
/// Only an unusable directory or a storage failure ends it early with an
/// error, in which case `Complete` is never emitted.
#[derive(Debug)]
pub enum IndexEvent {
    Started,
    DiscoveryComplete(u64),
    File(FileOutcome),
    Complete(IndexReport),
}

/// What the walk produced before any extraction runs.
struct Discovery {
    files: Vec<PathBuf>,
    /// Listed paths that will not be extracted.
    skipped: Vec<FileOutcome>,
    total_size: u64,
    truncated: bool,
}

impl Engine {
    /// Stream an indexing pass over `path`.
    pub fn index_stream<'a>(
        &'a self,
        ctx: &'a Context,
        path: &'a Path,
        options: IndexOptions,
    ) -> impl Stream<Item = Result<IndexEvent>> + 'a {
        stream!({
            yield Ok(IndexEvent::Started);

            let (root, request) = match self.prepare_index(path, &options).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let discovery = match self.discover(&root, &request).await {
                Ok(discovery) => discovery,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
            yield Ok(IndexEvent::DiscoveryComplete(u64::try_from(discovery.files.len()).unwrap_or(0)));

            let mut report = IndexReport {
                directory: Locator::Path(root.clone()).identity(),
                truncated: discovery.truncated,
                ..IndexReport::default()
            };
            for outcome in discovery.skipped {
                report.record(&root, &outcome);
                yield Ok(IndexEvent::File(outcome));
            }

            let mut queued = discovery.files.into_iter();
            let mut processing = FuturesUnordered::new();
            for file in queued.by_ref().take(request.concurrency) {
                processing.push(self.index_file(ctx, file, request.extract));
            }
            while let Some(outcome) = processing.next().await {
                report.record(&root, &outcome);
                yield Ok(IndexEvent::File(outcome));
                if let Some(file) = queued.next() {
                    processing.push(self.index_file(ctx, file, request.extract));
                }
            }
            report.files.sort();

            if let Err(e) = self.store_summary(&report, discovery.total_size, request.extract.ttl).await {
                yield Err(e);
                return;
            }
            tracing::info!(
                request_id = %ctx.request_id(),
                directory = %report.directory,
                indexed = report.indexed,
                skipped = report.skipped,
                errors = report.errors,
                truncated = report.truncated,
                "indexed directory"
            );
            yield Ok(IndexEvent::Complete(report));
        })
    }

    /// Resolve options and make sure `path` is a readable directory.
    async fn prepare_index(&self, path: &Path, options: &IndexOptions) -> Result<(PathBuf, IndexRequest)> {
        let request = options.resolve(&self.inner.settings)?;
        let locator = Locator::from_path(path).or_raise(|| ErrorKind::InvalidInput(format!("{}", path.display())))?;
        let Some(root) = locator.as_path().map(Path::to_path_buf) else {
            exn::bail!(ErrorKind::InvalidInput(format!("{} is not a local path", path.display())));
        };
        match tokio::fs::metadata(&root).await {
            Ok(metadata) if metadata.is_dir() => Ok((root, request)),
            Ok(_) => exn::bail!(ErrorKind::InvalidInput(format!("{} is not a directory", root.display()))),
            Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(locator.identity())),
            Err(e) => Err(e).or_raise(|| ErrorKind::ExtractionFailed(Failure::Unreadable(locator.identity()))),
        }
    }

    /// List everything the pass will look at. Files past `max_files` are
    /// never listed.
    async fn discover(&self, root: &Path, request: &IndexRequest) -> Result<Discovery> {
        let walker = Walker::new(WalkOptions {
            recursive: request.recursive,
            max_depth: self.inner.settings.max_depth,
            max_files: request.max_files,
            max_size: self.inner.fingerprinter.max_size(),
            ignore: self.inner.settings.ignore.clone(),
            extensions: request.extensions.clone(),
        })
        .or_raise(|| ErrorKind::InvalidInput("invalid walk pattern".to_string()))?;

        let mut discovery = Discovery {
            files: Vec::new(),
            skipped: Vec::new(),
            total_size: 0,
            truncated: false,
        };
        let mut walk = walker.walk(root);
        while let Some(event) = walk.next().await {
            match event {
                WalkEvent::File { path, size } => {
                    discovery.total_size = discovery.total_size.saturating_add(size);
                    discovery.files.push(path);
                },
                WalkEvent::Oversized { path, size } => {
                    tracing::debug!(path = %path.display(), size, "skipping oversized file");
                    discovery.skipped.push(FileOutcome::Skipped {
                        path,
                        reason: SkipReason::Oversized { size },
                    });
                },
                WalkEvent::Unlistable { path, error } => {
                    tracing::warn!(path = %path.display(), error = ?error, "could not list directory; skipping");
                    discovery.skipped.push(FileOutcome::Skipped {
                        path,
                        reason: SkipReason::Unlistable,
                    });
                },
                WalkEvent::Truncated => discovery.truncated = true,
            }
        }
        Ok(discovery)
    }

    /// Extract one listed file. Never queues sibling indexing.
    async fn index_file(&self, ctx: &Context, path: PathBuf, request: Request) -> FileOutcome {
        let locator = Locator::Path(path.clone());
        match self.run_extraction(ctx, &locator, request).await {
            Ok(extraction) if extraction.cached && extraction.features.is_empty() => FileOutcome::Skipped {
                path,
                reason: SkipReason::Unsupported,
            },
            Ok(extraction) if extraction.cached => FileOutcome::Skipped {
                path,
                reason: SkipReason::Fresh,
            },
            Ok(extraction) => FileOutcome::Indexed {
                path,
                features: extraction.features.len(),
            },
            Err(error) => {
                tracing::warn!(path = %path.display(), error = ?error, "failed to index file");
                FileOutcome::Failed { path, error }
            },
        }
    }

    /// Record the pass under the directory's own identity.
    async fn store_summary(&self, report: &IndexReport, total_size: u64, ttl: std::time::Duration) -> Result<()> {
        let cache = &self.inner.cache;
        let _guard = self.inner.locks.lock(&report.directory).await;
        let resource = Resource {
            id: report.directory.clone(),
            kind: ResourceKind::Directory,
            size: total_size,
            media_type: DIRECTORY_MEDIA_TYPE.to_string(),
            checksum: None,
            last_processed: now(),
        };
        cache.upsert_resource(&resource).await.or_raise(|| ErrorKind::Storage)?;
        let summary = serde_json::json!({
            "file_count": report.indexed + report.skipped + report.errors,
            "indexed": report.indexed,
            "skipped": report.skipped,
            "errors": report.errors,
            "truncated": report.truncated,
            "files": report.files,
        });
        let feature = Feature::from_produced(
            &report.directory,
            INDEXER_PROVIDER,
            Produced::new(keys::DIRECTORY_SUMMARY, summary),
            ttl,
        );
        cache.store_features(&report.directory, vec![feature]).await.or_raise(|| ErrorKind::Storage)?;
        Ok(())
    }
}
