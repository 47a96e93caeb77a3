//! Local filesystem source.
//!
//! Files are read in full via `tokio::fs`. Directories are "read" as a JSON
//! listing of their direct children, which is what directory-level providers
//! consume; a directory has no content checksum of its own.

use crate::error::{ErrorKind, Result};
use crate::media::{self, DIRECTORY_MEDIA_TYPE};
use crate::source::{Fetched, ResourceSource, enforce_limit};
use crate::{Locator, ResourceKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// One direct child of a directory, as serialized into a directory payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_dir: bool,
    pub size: u64,
}

/// Reads files and directories from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn read_file(path: &Path, declared_size: u64, limit: u64) -> Result<Fetched> {
        enforce_limit(declared_size, limit)?;
        let file = fs::File::open(path).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut bytes = Vec::with_capacity(usize::try_from(declared_size).unwrap_or_default());
        // The file may grow between stat and read; never buffer more than one
        // byte past the limit.
        file.take(limit.saturating_add(1)).read_to_end(&mut bytes).await.map_err(ErrorKind::Io)?;
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        enforce_limit(size, limit)?;
        Ok(Fetched {
            kind: ResourceKind::File,
            media_type: media::detect(path, &bytes),
            bytes,
            size,
        })
    }

    async fn read_directory(path: &Path) -> Result<Fetched> {
        let entries = list_directory(path).await?;
        let size = entries.iter().filter(|e| !e.is_dir).map(|e| e.size).sum();
        let bytes = serde_json::to_vec(&entries)
            .map_err(|e| ErrorKind::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(Fetched {
            kind: ResourceKind::Directory,
            media_type: DIRECTORY_MEDIA_TYPE.to_string(),
            bytes,
            size,
        })
    }
}

/// List the direct children of a directory, sorted by name.
///
/// Entries that vanish or can't be inspected mid-listing are dropped
/// silently; the listing is a snapshot, not a guarantee.
pub(crate) async fn list_directory(path: &Path) -> Result<Vec<DirectoryEntry>> {
    let mut reader = fs::read_dir(path).await.map_err(|e| LocalSource::map_io_error(e, path))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| LocalSource::map_io_error(e, path))? {
        // Follows symlinks, so a link to a directory is listed as a directory.
        let Ok(metadata) = fs::metadata(entry.path()).await else {
            continue;
        };
        entries.push(DirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[async_trait]
impl ResourceSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn accepts(&self, locator: &Locator) -> bool {
        matches!(locator, Locator::Path(_))
    }

    async fn fetch(&self, locator: &Locator, limit: u64) -> Result<Fetched> {
        let Some(path) = locator.as_path() else {
            exn::bail!(ErrorKind::InvalidLocator(locator.identity()));
        };
        let metadata = fs::metadata(path).await.map_err(|e| Self::map_io_error(e, path))?;
        if metadata.is_dir() {
            return Self::read_directory(path).await;
        }
        if !metadata.is_file() {
            // Sockets, FIFOs, device nodes: nothing sensible to fingerprint.
            exn::bail!(ErrorKind::NotFound(path.display().to_string()));
        }
        Self::read_file(path, metadata.len(), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "hello world").unwrap();
        let fetched = LocalSource.fetch(&Locator::from_path(&path).unwrap(), 1024).await.unwrap();
        assert_eq!(fetched.kind, ResourceKind::File);
        assert_eq!(fetched.media_type, "text/plain");
        assert_eq!(fetched.size, 11);
        assert_eq!(fetched.bytes, b"hello world");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::from_path(dir.path().join("missing.txt")).unwrap();
        let err = LocalSource.fetch(&locator, 1024).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; 64]).unwrap();
        let err = LocalSource.fetch(&Locator::from_path(&path).unwrap(), 63).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooLarge { size: 64, limit: 63 }));
        // Exactly at the limit is fine.
        assert!(LocalSource.fetch(&Locator::from_path(&path).unwrap(), 64).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bbb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let fetched = LocalSource.fetch(&Locator::from_path(dir.path()).unwrap(), 1).await.unwrap();
        assert_eq!(fetched.kind, ResourceKind::Directory);
        assert_eq!(fetched.media_type, DIRECTORY_MEDIA_TYPE);
        assert_eq!(fetched.size, 4);
        let entries: Vec<DirectoryEntry> = serde_json::from_slice(&fetched.bytes).unwrap();
        let names = entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);
        assert!(entries[2].is_dir);
    }

    #[test]
    fn test_accepts_only_paths() {
        assert!(LocalSource.accepts(&Locator::parse("/tmp/x").unwrap()));
        assert!(!LocalSource.accepts(&Locator::parse("https://example.com/x").unwrap()));
    }
}
