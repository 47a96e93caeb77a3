//! Bounded directory walking.
//!
//! [`Walker`] lists the files below a directory for indexing. It follows
//! symlinked directories, but a canonical directory is only ever visited once,
//! so a link back up the tree can't send it round in circles. Depth, file count
//! and per-file size are all capped; the file-count cap applies while listing,
//! so a huge directory costs at most `max_files` entries of work.

use crate::error::{ErrorKind, Result};
use crate::source::LocalSource;
use async_stream::stream;
use futures::Stream;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;

pub type WalkStream<'a> = Pin<Box<dyn Stream<Item = WalkEvent> + Send + 'a>>;

/// Limits and filters applied while walking.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Maximum number of directory levels below the root (root is depth 0).
    pub max_depth: usize,
    /// Stop listing after this many eligible files.
    pub max_files: usize,
    /// Files bigger than this are reported as [`WalkEvent::Oversized`].
    pub max_size: u64,
    /// Glob patterns matched against entry names; matches are not listed.
    pub ignore: Vec<String>,
    /// Lowercase extensions (without the dot) to keep. `None` keeps all.
    pub extensions: Option<Vec<String>>,
}
impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: 16,
            max_files: 1000,
            max_size: 100 * 1024 * 1024,
            ignore: Vec::new(),
            extensions: None,
        }
    }
}

/// Something the walker found, in listing order.
#[derive(Debug)]
pub enum WalkEvent {
    /// An eligible file.
    File { path: PathBuf, size: u64 },
    /// A file that passed the filters but exceeds the size cap.
    Oversized { path: PathBuf, size: u64 },
    /// A directory that could not be listed.
    Unlistable { path: PathBuf, error: crate::error::Error },
    /// The file-count cap was reached; nothing further is listed.
    Truncated,
}

/// Compiled walker, reusable across directories.
#[derive(Debug, Clone)]
pub struct Walker {
    options: WalkOptions,
    ignore: GlobSet,
}

enum EntryKind {
    File(u64),
    Directory,
    Skip,
}

impl Walker {
    pub fn new(options: WalkOptions) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.ignore {
            let glob = Glob::new(pattern).map_err(|e| ErrorKind::InvalidPattern(format!("{pattern}: {e}")))?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| ErrorKind::InvalidPattern(e.to_string()))?;
        Ok(Self { options, ignore })
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.is_match(name)
    }

    fn wants_extension(&self, path: &Path) -> bool {
        let Some(allowed) = &self.options.extensions else {
            return true;
        };
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| allowed.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext)))
    }

    async fn classify(path: &Path) -> EntryKind {
        // Follows symlinks. Broken links and anything exotic are dropped.
        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => EntryKind::Directory,
            Ok(metadata) if metadata.is_file() => EntryKind::File(metadata.len()),
            _ => EntryKind::Skip,
        }
    }

    async fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut reader = fs::read_dir(dir).await.map_err(|e| LocalSource::map_io_error(e, dir))?;
        let mut paths = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| LocalSource::map_io_error(e, dir))? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    /// Walk `root` depth-first, files of a directory before its subdirectories.
    pub fn walk<'a>(&'a self, root: &Path) -> WalkStream<'a> {
        let mut stack = vec![(root.to_path_buf(), 0usize)];
        let mut visited = HashSet::new();
        let mut listed = 0usize;

        Box::pin(stream! {
            'dirs: while let Some((current, depth)) = stack.pop() {
                let canonical = match fs::canonicalize(&current).await {
                    Ok(canonical) => canonical,
                    Err(e) => {
                        yield WalkEvent::Unlistable { path: current.clone(), error: LocalSource::map_io_error(e, &current).into() };
                        continue 'dirs;
                    },
                };
                if !visited.insert(canonical) {
                    tracing::debug!(path = %current.display(), "directory already visited, skipping");
                    continue 'dirs;
                }
                let paths = match Self::read_sorted(&current).await {
                    Ok(paths) => paths,
                    Err(error) => {
                        yield WalkEvent::Unlistable { path: current.clone(), error };
                        continue 'dirs;
                    },
                };

                let mut subdirectories = Vec::new();
                for path in paths {
                    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    if self.is_ignored(&name) {
                        continue;
                    }
                    match Self::classify(&path).await {
                        EntryKind::Directory => {
                            if self.options.recursive && depth < self.options.max_depth {
                                subdirectories.push(path);
                            }
                        },
                        EntryKind::File(size) => {
                            if !self.wants_extension(&path) {
                                continue;
                            }
                            if listed >= self.options.max_files {
                                yield WalkEvent::Truncated;
                                return;
                            }
                            listed += 1;
                            if size > self.options.max_size {
                                yield WalkEvent::Oversized { path, size };
                            } else {
                                yield WalkEvent::File { path, size };
                            }
                        },
                        EntryKind::Skip => {},
                    }
                }
                // Reverse so the stack pops them in name order.
                for dir in subdirectories.into_iter().rev() {
                    stack.push((dir, depth + 1));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn touch(path: &Path, bytes: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![b'x'; bytes]).unwrap();
    }

    async fn files(walker: &Walker, root: &Path) -> (Vec<String>, Vec<WalkEvent>) {
        let events = walker.walk(root).collect::<Vec<_>>().await;
        let names = events
            .iter()
            .filter_map(|event| match event {
                WalkEvent::File { path, .. } => Some(path.strip_prefix(root).unwrap().display().to_string()),
                _ => None,
            })
            .collect();
        (names, events)
    }

    #[tokio::test]
    async fn test_non_recursive_walk() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.txt"), 1);
        touch(&dir.path().join("a.txt"), 1);
        touch(&dir.path().join("sub/c.txt"), 1);
        let walker = Walker::new(WalkOptions::default()).unwrap();
        let (names, _) = files(&walker, dir.path()).await;
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_recursive_walk_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"), 1);
        touch(&dir.path().join("one/b.txt"), 1);
        touch(&dir.path().join("one/two/c.txt"), 1);
        let walker = Walker::new(WalkOptions {
            recursive: true,
            max_depth: 1,
            ..WalkOptions::default()
        })
        .unwrap();
        let (names, _) = files(&walker, dir.path()).await;
        assert_eq!(names, ["a.txt", "one/b.txt"]);
    }

    #[tokio::test]
    async fn test_max_files_is_enforced_while_listing() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            touch(&dir.path().join(name), 1);
        }
        let walker = Walker::new(WalkOptions {
            max_files: 2,
            ..WalkOptions::default()
        })
        .unwrap();
        let (names, events) = files(&walker, dir.path()).await;
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert!(matches!(events.last(), Some(WalkEvent::Truncated)));
    }

    #[tokio::test]
    async fn test_filters() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("keep.md"), 1);
        touch(&dir.path().join("skip.bin"), 1);
        touch(&dir.path().join(".hidden.md"), 1);
        touch(&dir.path().join("huge.md"), 32);
        touch(&dir.path().join("node_modules/dep.md"), 1);
        let walker = Walker::new(WalkOptions {
            recursive: true,
            max_size: 16,
            ignore: vec![".*".to_string(), "node_modules".to_string()],
            extensions: Some(vec!["MD".to_string()]),
            ..WalkOptions::default()
        })
        .unwrap();
        let (names, events) = files(&walker, dir.path()).await;
        assert_eq!(names, ["keep.md"]);
        assert!(events.iter().any(|e| matches!(e, WalkEvent::Oversized { size: 32, .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_cycle_is_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub/a.txt"), 1);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();
        let walker = Walker::new(WalkOptions {
            recursive: true,
            max_depth: 64,
            ..WalkOptions::default()
        })
        .unwrap();
        let (names, _) = files(&walker, dir.path()).await;
        assert_eq!(names, ["sub/a.txt"]);
    }

    #[tokio::test]
    async fn test_unlistable_root() {
        let dir = tempfile::tempdir().unwrap();
        let walker = Walker::new(WalkOptions::default()).unwrap();
        let events = walker.walk(&dir.path().join("missing")).collect::<Vec<_>>().await;
        assert!(matches!(events.as_slice(), [WalkEvent::Unlistable { .. }]));
    }

    #[test]
    fn test_invalid_ignore_glob() {
        let err = Walker::new(WalkOptions {
            ignore: vec!["a[".to_string()],
            ..WalkOptions::default()
        })
        .unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPattern(_)));
    }
}
