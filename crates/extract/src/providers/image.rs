use crate::error::{ErrorKind, Result};
use crate::mode::keys;
use crate::models::Produced;
use crate::provider::{Input, Provider};
use async_trait::async_trait;
use exn::ResultExt;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::instrument;

/// Longest edge of generated thumbnails, in pixels.
pub const THUMBNAIL_SIZE: u32 = 256;

/// Dimensions, format, thumbnail and dominant colour of raster images.
///
/// Decoding happens on the blocking pool; a large JPEG can take a while.
#[derive(Debug, Clone, Copy)]
pub struct ImageBasic {
    thumbnail_size: u32,
}

impl ImageBasic {
    pub fn new() -> Self {
        Self {
            thumbnail_size: THUMBNAIL_SIZE,
        }
    }

    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size.max(1);
        self
    }
}
impl Default for ImageBasic {
    fn default() -> Self {
        Self::new()
    }
}

fn format_name(format: ImageFormat) -> String {
    format.extensions_str().first().copied().unwrap_or("unknown").to_string()
}

/// Average colour of the image as `#rrggbb`.
fn average_color(image: &DynamicImage) -> String {
    // Averaging the thumbnail is close enough and bounded in cost.
    let rgb = image.thumbnail(64, 64).to_rgb8();
    let pixels = u64::from(rgb.width()) * u64::from(rgb.height());
    if pixels == 0 {
        return "#000000".to_string();
    }
    let mut sums = [0u64; 3];
    for pixel in rgb.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
    }
    format!("#{:02x}{:02x}{:02x}", sums[0] / pixels, sums[1] / pixels, sums[2] / pixels)
}

fn extract_blocking(bytes: &[u8], wanted: impl Fn(&str) -> bool, thumbnail_size: u32) -> Result<Vec<Produced>> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .or_raise(|| ErrorKind::Malformed("could not read image header".to_string()))?;
    let Some(format) = reader.format() else {
        exn::bail!(ErrorKind::Unsupported("unrecognised image format".to_string()));
    };

    let mut produced = Vec::new();
    if wanted(keys::IMAGE_FORMAT) {
        produced.push(Produced::new(keys::IMAGE_FORMAT, format_name(format)));
    }
    let needs_pixels = wanted(keys::IMAGE_THUMBNAIL) || wanted(keys::IMAGE_DOMINANT_COLOR);
    if !needs_pixels {
        // Header-only read: no need to decode the whole image for its size.
        let (width, height) = reader
            .into_dimensions()
            .or_raise(|| ErrorKind::Malformed("could not read image dimensions".to_string()))?;
        if wanted(keys::IMAGE_WIDTH) {
            produced.push(Produced::new(keys::IMAGE_WIDTH, width));
        }
        if wanted(keys::IMAGE_HEIGHT) {
            produced.push(Produced::new(keys::IMAGE_HEIGHT, height));
        }
        return Ok(produced);
    }

    let image = reader.decode().or_raise(|| ErrorKind::Malformed("could not decode image".to_string()))?;
    if wanted(keys::IMAGE_WIDTH) {
        produced.push(Produced::new(keys::IMAGE_WIDTH, image.width()));
    }
    if wanted(keys::IMAGE_HEIGHT) {
        produced.push(Produced::new(keys::IMAGE_HEIGHT, image.height()));
    }
    if wanted(keys::IMAGE_THUMBNAIL) {
        let thumbnail = image.thumbnail(thumbnail_size, thumbnail_size);
        let mut png = Cursor::new(Vec::new());
        thumbnail
            .write_to(&mut png, ImageFormat::Png)
            .or_raise(|| ErrorKind::Malformed("could not encode thumbnail".to_string()))?;
        produced.push(
            Produced::new(keys::IMAGE_THUMBNAIL, png.into_inner())
                .with_metadata("media_type", "image/png")
                .with_metadata("width", thumbnail.width().to_string())
                .with_metadata("height", thumbnail.height().to_string()),
        );
    }
    if wanted(keys::IMAGE_DOMINANT_COLOR) {
        produced.push(Produced::new(keys::IMAGE_DOMINANT_COLOR, average_color(&image)));
    }
    Ok(produced)
}

#[async_trait]
impl Provider for ImageBasic {
    fn name(&self) -> &str {
        "image-basic"
    }

    fn media_types(&self) -> &[&str] {
        &["image/png", "image/jpeg", "image/gif", "image/webp", "image/bmp", "image/tiff"]
    }

    fn keys(&self) -> &[&str] {
        &[
            keys::IMAGE_FORMAT,
            keys::IMAGE_WIDTH,
            keys::IMAGE_HEIGHT,
            keys::IMAGE_THUMBNAIL,
            keys::IMAGE_DOMINANT_COLOR,
        ]
    }

    fn priority(&self) -> i32 {
        100
    }

    #[instrument(level = "trace", skip_all, fields(size = input.bytes.len(), media_type = %input.media_type))]
    async fn extract(&self, input: &Input) -> Result<Vec<Produced>> {
        let input = input.clone();
        let thumbnail_size = self.thumbnail_size;
        tokio::task::spawn_blocking(move || extract_blocking(&input.bytes, |key| input.wants(key), thumbnail_size))
            .await
            .or_raise(|| ErrorKind::Malformed("image decoding task failed".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;
    use std::time::Duration;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image).write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    async fn run(bytes: Vec<u8>, wanted: &[&str]) -> HashMap<String, FeatureValue> {
        let input = Input::new(bytes, "image/png", Duration::from_secs(60)).wanting(wanted.iter().copied());
        ImageBasic::new().extract(&input).await.unwrap().into_iter().map(|p| (p.key, p.value)).collect()
    }

    #[tokio::test]
    async fn test_header_only() {
        let values = run(png(640, 480, [255, 0, 0]), &[keys::IMAGE_FORMAT, keys::IMAGE_WIDTH, keys::IMAGE_HEIGHT]).await;
        assert_eq!(values[keys::IMAGE_FORMAT], FeatureValue::Text("png".to_string()));
        assert_eq!(values[keys::IMAGE_WIDTH], FeatureValue::Number(640.0));
        assert_eq!(values[keys::IMAGE_HEIGHT], FeatureValue::Number(480.0));
        assert_eq!(values.len(), 3);
    }

    #[tokio::test]
    async fn test_thumbnail_and_color() {
        let values = run(png(1024, 512, [0, 128, 255]), &[]).await;
        let FeatureValue::Binary(thumbnail) = &values[keys::IMAGE_THUMBNAIL] else {
            panic!("thumbnail should be binary");
        };
        let decoded = image::load_from_memory(thumbnail).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 128));
        assert_eq!(values[keys::IMAGE_DOMINANT_COLOR], FeatureValue::Text("#0080ff".to_string()));
    }

    #[tokio::test]
    async fn test_garbage_is_an_error() {
        let input = Input::new(b"definitely not an image".to_vec(), "image/png", Duration::from_secs(1));
        assert!(ImageBasic::new().extract(&input).await.is_err());
    }
}
