//! Directory indexing.
//!
//! A pass lists a directory (bounded by `max_files`, filtered by the ignore
//! globs and an optional extension allow-list), extracts every eligible file
//! through [`Engine::extract_resource`] with bounded concurrency and finally
//! stores a `directory.summary` feature under the directory's own identity.
//! Files whose features are still fresh are skipped, so indexing is always
//! re-enterable: once the TTL lapses the next pass extracts again.

mod stream;

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::options::IndexOptions;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::pin::pin;
use tracing::instrument;

pub use self::stream::IndexEvent;

/// Name recorded as the provider of directory summaries.
pub const INDEXER_PROVIDER: &str = "indexer";

/// Why a file was not extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Its features are unexpired and its content unchanged.
    Fresh,
    /// No feature keys are in scope for its media type.
    Unsupported,
    /// Bigger than the size cap.
    Oversized { size: u64 },
    /// A directory that could not be listed.
    Unlistable,
}

/// What happened to one path during a pass.
#[derive(Debug)]
pub enum FileOutcome {
    Indexed { path: PathBuf, features: usize },
    Skipped { path: PathBuf, reason: SkipReason },
    Failed { path: PathBuf, error: Error },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Indexed { path, .. } | Self::Skipped { path, .. } | Self::Failed { path, .. } => path,
        }
    }
}

/// Totals for one indexing pass. Files beyond `max_files` are in none of the
/// counts; `truncated` says whether any were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Identity of the indexed directory.
    pub directory: String,
    pub indexed: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Paths of the indexed files relative to the directory, sorted.
    pub files: Vec<String>,
    pub truncated: bool,
}

impl IndexReport {
    fn record(&mut self, root: &Path, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Indexed { path, .. } => {
                self.indexed += 1;
                let relative = path.strip_prefix(root).unwrap_or(path);
                self.files.push(relative.to_string_lossy().into_owned());
            },
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Failed { .. } => self.errors += 1,
        }
    }
}

impl Engine {
    /// Index a directory and return the totals.
    #[instrument(skip_all, fields(request_id = %ctx.request_id(), directory = %path.display()))]
    pub async fn index_directory(&self, ctx: &Context, path: &Path, options: IndexOptions) -> Result<IndexReport> {
        let mut events = pin!(self.index_stream(ctx, path, options));
        let mut report = IndexReport::default();
        while let Some(event) = events.next().await {
            if let IndexEvent::Complete(complete) = event? {
                report = complete;
            }
        }
        Ok(report)
    }
}
