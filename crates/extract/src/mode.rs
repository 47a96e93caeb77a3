//! Extraction modes and the feature keys each one puts in scope.

use serde::{Deserialize, Serialize};
use sieve_resource::MediaClass;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Well-known feature keys.
pub mod keys {
    pub const TEXT_CONTENT: &str = "text.content";
    pub const TEXT_WORD_COUNT: &str = "text.word_count";
    pub const TEXT_LINE_COUNT: &str = "text.line_count";
    pub const TEXT_CHAR_COUNT: &str = "text.char_count";
    pub const TEXT_SENTENCE_COUNT: &str = "text.sentence_count";
    pub const TEXT_TOP_WORDS: &str = "text.top_words";
    pub const TEXT_EMBEDDING: &str = "text.embedding";

    pub const IMAGE_FORMAT: &str = "image.format";
    pub const IMAGE_WIDTH: &str = "image.width";
    pub const IMAGE_HEIGHT: &str = "image.height";
    pub const IMAGE_THUMBNAIL: &str = "image.thumbnail";
    pub const IMAGE_DOMINANT_COLOR: &str = "image.dominant_color";

    pub const VIDEO_FORMAT: &str = "video.format";
    pub const VIDEO_SIZE: &str = "video.size";
    pub const VIDEO_THUMBNAIL: &str = "video.thumbnail";
    pub const VIDEO_KEYFRAMES: &str = "video.keyframes";

    pub const DIRECTORY_ENTRY_COUNT: &str = "directory.entry_count";
    pub const DIRECTORY_ENTRIES: &str = "directory.entries";
    pub const DIRECTORY_TOTAL_SIZE: &str = "directory.total_size";
    pub const DIRECTORY_EXTENSIONS: &str = "directory.extensions";
    /// Written by directory indexing, never by a provider.
    pub const DIRECTORY_SUMMARY: &str = "directory.summary";
}

use self::keys::*;

const TEXT_MINIMAL: &[&str] = &[TEXT_CONTENT, TEXT_WORD_COUNT, TEXT_LINE_COUNT, TEXT_CHAR_COUNT];
const TEXT_STANDARD: &[&str] = &[];
const TEXT_MAXIMAL: &[&str] = &[TEXT_SENTENCE_COUNT, TEXT_TOP_WORDS];

const IMAGE_MINIMAL: &[&str] = &[IMAGE_FORMAT, IMAGE_WIDTH, IMAGE_HEIGHT];
const IMAGE_STANDARD: &[&str] = &[IMAGE_THUMBNAIL];
const IMAGE_MAXIMAL: &[&str] = &[IMAGE_DOMINANT_COLOR];

const VIDEO_MINIMAL: &[&str] = &[VIDEO_FORMAT, VIDEO_SIZE];
const VIDEO_STANDARD: &[&str] = &[VIDEO_THUMBNAIL];
const VIDEO_MAXIMAL: &[&str] = &[VIDEO_KEYFRAMES];

const DIRECTORY_MINIMAL: &[&str] = &[DIRECTORY_ENTRY_COUNT];
const DIRECTORY_STANDARD: &[&str] = &[DIRECTORY_ENTRIES];
const DIRECTORY_MAXIMAL: &[&str] = &[DIRECTORY_TOTAL_SIZE, DIRECTORY_EXTENSIONS];

/// Breadth of feature keys considered in scope for an extraction.
///
/// Scopes are cumulative: every key in scope for `Minimal` is in scope for
/// `Standard`, and every key in scope for `Standard` is in scope for `Maximal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Minimal,
    #[default]
    Standard,
    Maximal,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Minimal, Mode::Standard, Mode::Maximal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Maximal => "maximal",
        }
    }

    /// The keys each tier adds, narrowest first.
    fn tiers(class: MediaClass) -> [&'static [&'static str]; 3] {
        match class {
            MediaClass::Text => [TEXT_MINIMAL, TEXT_STANDARD, TEXT_MAXIMAL],
            MediaClass::Image => [IMAGE_MINIMAL, IMAGE_STANDARD, IMAGE_MAXIMAL],
            MediaClass::Video => [VIDEO_MINIMAL, VIDEO_STANDARD, VIDEO_MAXIMAL],
            MediaClass::Directory => [DIRECTORY_MINIMAL, DIRECTORY_STANDARD, DIRECTORY_MAXIMAL],
            MediaClass::Other => [&[], &[], &[]],
        }
    }

    /// Feature keys expected for a resource of `class` under this mode.
    ///
    /// ```
    /// use sieve_extract::Mode;
    /// use sieve_resource::MediaClass;
    ///
    /// let keys = Mode::Minimal.expected_keys(MediaClass::Image, false);
    /// assert_eq!(keys.len(), 3);
    /// assert!(keys.contains("image.width"));
    /// assert!(Mode::Maximal.expected_keys(MediaClass::Other, true).is_empty());
    /// ```
    pub fn expected_keys(&self, class: MediaClass, include_embeddings: bool) -> BTreeSet<String> {
        let depth = match self {
            Self::Minimal => 1,
            Self::Standard => 2,
            Self::Maximal => 3,
        };
        let mut keys = Self::tiers(class)
            .iter()
            .take(depth)
            .flat_map(|tier| tier.iter())
            .map(|key| (*key).to_string())
            .collect::<BTreeSet<_>>();
        if include_embeddings && class == MediaClass::Text {
            keys.insert(TEXT_EMBEDDING.to_string());
        }
        keys
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Self::Minimal,
            "standard" => Self::Standard,
            "maximal" => Self::Maximal,
            other => return Err(other.to_string()),
        })
    }
}
