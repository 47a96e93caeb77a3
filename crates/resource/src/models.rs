//! Resource models.
//!
//! These types represent both cache rows (resources table) and the result of
//! loading a resource from its source.

use crate::media::MediaClass;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// What kind of thing a [`Resource`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Url,
    Directory,
}
impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Directory => "directory",
        }
    }
}
impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for ResourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "file" => Self::File,
            "url" => Self::Url,
            "directory" => Self::Directory,
            other => return Err(other.to_string()),
        })
    }
}

/// An addressable file, URL or directory tracked by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Canonical URL (see [`Locator::identity`](crate::Locator::identity)).
    pub id: String,
    pub kind: ResourceKind,
    /// Size in bytes (for directories: sum of the direct children's sizes).
    pub size: u64,
    /// Media type, without parameters (`text/plain`, `image/png`, ...).
    pub media_type: String,
    /// BLAKE3 hex digest of the full payload. Directories have none.
    pub checksum: Option<String>,
    pub last_processed: UtcDateTime,
}
impl Resource {
    pub fn class(&self) -> MediaClass {
        match self.kind {
            ResourceKind::Directory => MediaClass::Directory,
            _ => MediaClass::from_media_type(&self.media_type),
        }
    }

    /// Whether cached data recorded against `self` still describes `current`.
    ///
    /// Directories carry no checksum on either side, so they always match and
    /// freshness is decided by feature expiry alone.
    pub fn same_content(&self, current: &Resource) -> bool {
        self.id == current.id && self.checksum == current.checksum
    }
}

/// A resource together with the bytes it was fingerprinted from.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub resource: Resource,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(checksum: Option<&str>) -> Resource {
        Resource {
            id: "file:///tmp/a.txt".to_string(),
            kind: ResourceKind::File,
            size: 11,
            media_type: "text/plain".to_string(),
            checksum: checksum.map(str::to_string),
            last_processed: UtcDateTime::now(),
        }
    }

    #[test]
    fn test_same_content() {
        assert!(resource(Some("abc")).same_content(&resource(Some("abc"))));
        assert!(!resource(Some("abc")).same_content(&resource(Some("def"))));
        assert!(!resource(Some("abc")).same_content(&resource(None)));
        // Directories: no checksum on either side.
        assert!(resource(None).same_content(&resource(None)));
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [ResourceKind::File, ResourceKind::Url, ResourceKind::Directory] {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("socket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_class_of_directory_ignores_media_type() {
        let mut dir = resource(None);
        dir.kind = ResourceKind::Directory;
        dir.media_type = "text/plain".to_string();
        assert_eq!(dir.class(), MediaClass::Directory);
    }
}
