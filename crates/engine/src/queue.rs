//! Background work: sibling indexing jobs and the expiry reaper.

use crate::error::Result;
use crate::index::IndexReport;
use sieve_cache::FeatureCache;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A background indexing job that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFailure {
    pub request_id: String,
    /// Identity of the directory that was being indexed.
    pub directory: String,
    pub reason: String,
}

/// Queue for best-effort background jobs.
///
/// Indexing jobs are de-duplicated by directory identity while in flight.
/// Failures never reach the submitter: they are logged and published to
/// [`subscribe`](Self::subscribe) receivers.
#[derive(Debug, Clone)]
pub(crate) struct IndexQueue {
    tracker: TaskTracker,
    pending: Arc<watch::Sender<HashSet<String>>>,
    failures: broadcast::Sender<QueueFailure>,
    cancel: CancellationToken,
}

impl IndexQueue {
    pub(crate) fn new() -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            tracker: TaskTracker::new(),
            pending: Arc::new(watch::channel(HashSet::new()).0),
            failures,
            cancel: CancellationToken::new(),
        }
    }

    /// Queue an indexing job for `directory`. Returns `false` if the queue is
    /// shut down or the directory is already queued.
    pub(crate) fn submit<F>(&self, request_id: &str, directory: String, job: F) -> bool
    where
        F: Future<Output = Result<IndexReport>> + Send + 'static,
    {
        if self.tracker.is_closed() {
            tracing::debug!(%directory, "queue is shut down; dropping job");
            return false;
        }
        if !self.pending.send_if_modified(|pending| pending.insert(directory.clone())) {
            tracing::debug!(%directory, "directory already queued");
            return false;
        }
        let pending = self.pending.clone();
        let failures = self.failures.clone();
        let span = tracing::info_span!("background_index", request_id, %directory);
        let request_id = request_id.to_string();
        self.tracker.spawn(
            async move {
                // A panicking job surfaces here as a `JoinError`.
                let reason = match tokio::spawn(job.in_current_span()).await {
                    Ok(Ok(report)) => {
                        tracing::debug!(indexed = report.indexed, skipped = report.skipped, "background indexing done");
                        None
                    },
                    Ok(Err(err)) => {
                        tracing::warn!(error = ?err, "background indexing failed");
                        Some((*err).to_string())
                    },
                    Err(err) => {
                        tracing::error!(error = %err, "background indexing aborted");
                        Some(format!("indexing job aborted: {err}"))
                    },
                };
                if let Some(reason) = reason {
                    // No receivers is fine.
                    _ = failures.send(QueueFailure {
                        request_id,
                        directory: directory.clone(),
                        reason,
                    });
                }
                pending.send_modify(|pending| {
                    pending.remove(&directory);
                });
            }
            .instrument(span),
        );
        true
    }

    /// Run `sweep_expired` every `interval` until shutdown.
    pub(crate) fn spawn_reaper(&self, cache: FeatureCache, interval: Duration) {
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => match cache.sweep_expired().await {
                        Ok(swept) => tracing::debug!(swept, "swept expired features"),
                        Err(err) => tracing::warn!(error = ?err, "expiry sweep failed"),
                    },
                }
            }
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueFailure> {
        self.failures.subscribe()
    }

    /// Wait until no indexing job is queued or running.
    pub(crate) async fn wait_idle(&self) {
        let mut pending = self.pending.subscribe();
        // Errors only if the sender is gone, which `self` prevents.
        _ = pending.wait_for(|pending| pending.is_empty()).await;
    }

    /// Stop the reaper, refuse new jobs and wait for running ones.
    pub(crate) async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
