use crate::error::Result;
use crate::mode::keys;
use crate::models::Produced;
use crate::provider::{Input, Provider};
use async_trait::async_trait;

/// Container format and size of video payloads, from magic bytes alone.
///
/// Thumbnails and keyframes need a real decoder and are left to externally
/// registered providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoProbe;

impl VideoProbe {
    pub fn new() -> Self {
        Self
    }
}

/// Container name from magic bytes, falling back to the media subtype.
fn container(bytes: &[u8], media_type: &str) -> String {
    if let Some(kind) = infer::get(bytes).filter(|kind| kind.matcher_type() == infer::MatcherType::Video) {
        return kind.extension().to_string();
    }
    let subtype = media_type.split_once('/').map_or(media_type, |(_, subtype)| subtype);
    subtype.trim_start_matches("x-").to_string()
}

#[async_trait]
impl Provider for VideoProbe {
    fn name(&self) -> &str {
        "video-probe"
    }

    fn media_types(&self) -> &[&str] {
        &["video/*"]
    }

    fn keys(&self) -> &[&str] {
        &[keys::VIDEO_FORMAT, keys::VIDEO_SIZE]
    }

    async fn extract(&self, input: &Input) -> Result<Vec<Produced>> {
        let mut produced = Vec::new();
        if input.wants(keys::VIDEO_FORMAT) {
            produced.push(Produced::new(keys::VIDEO_FORMAT, container(&input.bytes, &input.media_type)));
        }
        if input.wants(keys::VIDEO_SIZE) {
            produced.push(Produced::new(keys::VIDEO_SIZE, input.bytes.len() as u64));
        }
        Ok(produced)
    }
}
