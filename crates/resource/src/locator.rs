//! Resource locators and canonical identities.
//!
//! Every resource tracked by the cache is identified by a canonical URL:
//! `file:///absolute/path` for anything on the local filesystem and the
//! normalized `http(s)://` URL for remote resources. Two locators that point
//! at the same thing must produce the same identity, otherwise the cache
//! would happily store duplicate rows for `./a.txt` and `/home/me/a.txt`.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Where a resource lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// An absolute, lexically normalized filesystem path (file or directory).
    Path(PathBuf),
    /// A remote `http` or `https` URL.
    Url(Url),
}

impl Locator {
    /// Parse a user-supplied locator.
    ///
    /// Accepts `file://` URLs, `http(s)://` URLs and bare filesystem paths.
    /// Relative paths are resolved against the current working directory.
    ///
    /// ```
    /// use sieve_resource::Locator;
    ///
    /// let locator = Locator::parse("/srv/docs/./notes/../readme.md").unwrap();
    /// assert_eq!(locator.identity(), "file:///srv/docs/readme.md");
    ///
    /// let remote = Locator::parse("https://example.com/a.txt").unwrap();
    /// assert_eq!(remote.identity(), "https://example.com/a.txt");
    ///
    /// assert!(Locator::parse("ftp://example.com/a.txt").is_err());
    /// ```
    pub fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref().trim();
        if input.is_empty() {
            exn::bail!(ErrorKind::InvalidLocator("empty locator".to_string()));
        }
        let Some((scheme, _)) = input.split_once("://") else {
            return Self::from_path(input);
        };
        match scheme.to_ascii_lowercase().as_str() {
            "file" => {
                let url = Url::parse(input).map_err(|e| ErrorKind::InvalidLocator(format!("{input}: {e}")))?;
                let path = url
                    .to_file_path()
                    .map_err(|()| ErrorKind::InvalidLocator(format!("{input}: not a local file URL")))?;
                Self::from_path(path)
            },
            "http" | "https" => {
                let url = Url::parse(input).map_err(|e| ErrorKind::InvalidLocator(format!("{input}: {e}")))?;
                Ok(Self::Url(url))
            },
            other => exn::bail!(ErrorKind::InvalidLocator(format!("unsupported scheme `{other}`"))),
        }
    }

    /// Build a locator from a filesystem path, making it absolute first.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(ErrorKind::Io)?;
        Ok(Self::Path(normalize(&absolute)))
    }

    /// The canonical identity used as the cache key for this resource.
    pub fn identity(&self) -> String {
        match self {
            Self::Path(path) => Url::from_file_path(path)
                .map(String::from)
                .unwrap_or_else(|()| format!("file://{}", path.display())),
            Self::Url(url) => url.to_string(),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Url(_) => None,
        }
    }

    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Self::Path(_) => None,
            Self::Url(url) => Some(url),
        }
    }

    /// Locator of the directory containing this resource, if it is on the
    /// local filesystem and not the root directory.
    pub fn parent(&self) -> Option<Self> {
        self.as_path().and_then(Path::parent).map(|p| Self::Path(p.to_path_buf()))
    }
}

impl FromStr for Locator {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.identity())
    }
}

/// Lexically resolve `.` and `..` components of an absolute path without
/// touching the filesystem (symlinks are left alone).
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {},
            // Popping past the root is a no-op, same as the kernel does.
            Component::ParentDir => {
                normalized.pop();
            },
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/b/c.txt", "/a/b/c.txt")]
    #[case("/a/./b//c.txt", "/a/b/c.txt")]
    #[case("/a/b/../c.txt", "/a/c.txt")]
    #[case("/../../etc", "/etc")]
    #[case("/a/b/", "/a/b")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(Path::new(input)), Path::new(expected));
    }

    #[test]
    fn test_file_url_and_path_share_identity() {
        let from_url = Locator::parse("file:///tmp/docs/doc.txt").unwrap();
        let from_path = Locator::parse("/tmp/docs/../docs/doc.txt").unwrap();
        assert_eq!(from_url, from_path);
        assert_eq!(from_url.identity(), "file:///tmp/docs/doc.txt");
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let locator = Locator::parse("some/relative/file.txt").unwrap();
        let path = locator.as_path().unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("some/relative/file.txt"));
    }

    #[test]
    fn test_identity_escapes_spaces() {
        let locator = Locator::parse("/tmp/my docs/a b.txt").unwrap();
        assert_eq!(locator.identity(), "file:///tmp/my%20docs/a%20b.txt");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("ftp://example.com/file")]
    #[case("s3://bucket/key")]
    #[case("http://")]
    fn test_invalid_locators(#[case] input: &str) {
        let err = Locator::parse(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLocator(_)));
    }

    #[test]
    fn test_url_locator() {
        let locator = Locator::parse("HTTPS://Example.com/a/b?x=1").unwrap();
        assert!(locator.as_url().is_some());
        assert!(locator.parent().is_none());
        assert_eq!(locator.identity(), "https://example.com/a/b?x=1");
    }

    #[test]
    fn test_parent() {
        let locator = Locator::parse("/srv/library/book.txt").unwrap();
        assert_eq!(locator.parent().unwrap(), Locator::Path(PathBuf::from("/srv/library")));
        assert!(Locator::parse("/").unwrap().parent().is_none());
    }
}
