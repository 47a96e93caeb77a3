//! Media type detection and classification.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// Media type recorded for directories.
pub const DIRECTORY_MEDIA_TYPE: &str = "inode/directory";
/// Media type of last resort for payloads nothing recognises.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions whose registered media type is wrong (or absent) for our
/// purposes. `.ts` is the classic example: the registry says MPEG transport
/// stream, but in a source tree it is almost always TypeScript.
const TEXT_OVERRIDES: &[(&str, &str)] = &[
    ("ts", "text/typescript"),
    ("tsx", "text/tsx"),
    ("jsx", "text/jsx"),
    ("rs", "text/x-rust"),
    ("py", "text/x-python"),
    ("go", "text/x-go"),
    ("rb", "text/x-ruby"),
    ("sh", "text/x-shellscript"),
    ("sql", "text/x-sql"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("toml", "application/toml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("json", "application/json"),
    ("jsonl", "application/jsonl"),
    ("txt", "text/plain"),
    ("log", "text/plain"),
];

/// Media types outside `text/*` that still hold text.
const TEXT_LIKE: &[&str] = &[
    "application/json",
    "application/jsonl",
    "application/x-ndjson",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/typescript",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/x-sh",
    "application/sql",
    "image/svg+xml",
];

/// Coarse classification used to pick feature scopes and providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Directory,
    Image,
    Video,
    Text,
    Other,
}
impl MediaClass {
    /// Classify a parameter-free media type.
    ///
    /// ```
    /// use sieve_resource::MediaClass;
    ///
    /// assert_eq!(MediaClass::from_media_type("image/png"), MediaClass::Image);
    /// assert_eq!(MediaClass::from_media_type("application/json"), MediaClass::Text);
    /// assert_eq!(MediaClass::from_media_type("application/ld+json"), MediaClass::Text);
    /// assert_eq!(MediaClass::from_media_type("application/zip"), MediaClass::Other);
    /// ```
    pub fn from_media_type(media_type: &str) -> Self {
        let media_type = media_type.trim().to_ascii_lowercase();
        // SVG is XML first and an image second, as far as feature extraction is concerned.
        if TEXT_LIKE.contains(&media_type.as_str())
            || media_type.starts_with("text/")
            || media_type.ends_with("+json")
            || media_type.ends_with("+xml")
        {
            return Self::Text;
        }
        if media_type == DIRECTORY_MEDIA_TYPE {
            return Self::Directory;
        }
        if media_type.starts_with("image/") {
            return Self::Image;
        }
        if media_type.starts_with("video/") {
            return Self::Video;
        }
        Self::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Image => "image",
            Self::Video => "video",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}
impl Display for MediaClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Detect the media type of a local file.
///
/// Order of precedence: text-like extension overrides, extension lookup,
/// magic bytes, and finally a UTF-8 sniff of the payload.
pub fn detect(path: &Path, bytes: &[u8]) -> String {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    if let Some(ext) = extension.as_deref()
        && let Some((_, media_type)) = TEXT_OVERRIDES.iter().find(|(candidate, _)| *candidate == ext)
    {
        return (*media_type).to_string();
    }
    if let Some(guess) = mime_guess::from_path(path).first() {
        return guess.essence_str().to_string();
    }
    sniff(bytes)
}

/// Detect a media type from content alone.
pub fn sniff(bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    if looks_like_text(bytes) {
        return "text/plain".to_string();
    }
    OCTET_STREAM.to_string()
}

/// Strip parameters (`; charset=utf-8`) and normalise case of a declared
/// `Content-Type` header value.
///
/// ```
/// use sieve_resource::media::strip_parameters;
///
/// assert_eq!(strip_parameters("Text/HTML; charset=UTF-8"), "text/html");
/// assert_eq!(strip_parameters("application/json"), "application/json");
/// ```
pub fn strip_parameters(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn looks_like_text(bytes: &[u8]) -> bool {
    // Only look at the head; a 100 MiB log file doesn't need a full validation pass.
    let head = &bytes[..bytes.len().min(8192)];
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // The cut may have landed in the middle of a multibyte sequence.
        Err(e) => e.error_len().is_none(),
    }
}
