// src/services/image_processor.rs
use crate::errors::AdlensError;
use crate::models::UploadedImage;
use image::{GenericImageView, ImageFormat as ImgFormat};

/// Checks uploaded creatives and shrinks oversized ones before they are
/// forwarded for review.
pub struct ImageProcessor {
    max_edge: u32,
}

impl ImageProcessor {
    pub fn new(max_edge: u32) -> Self {
        Self { max_edge }
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), AdlensError> {
        if data.is_empty() {
            return Err(AdlensError::ImageProcessing("Empty image upload".to_string()));
        }

        let img = image::load_from_memory(data)
            .map_err(|e| AdlensError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        Ok(img.dimensions())
    }

    /// Returns the bytes unchanged when both edges fit, otherwise a PNG
    /// scaled so the longer edge equals `max_edge`.
    pub fn resize_if_needed(&self, data: &[u8]) -> Result<Option<Vec<u8>>, AdlensError> {
        let img = image::load_from_memory(data)
            .map_err(|e| AdlensError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();

        if width <= self.max_edge && height <= self.max_edge {
            return Ok(None);
        }

        let ratio = (self.max_edge as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                AdlensError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(Some(output))
    }

    pub fn prepare(
        &self,
        filename: String,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Result<UploadedImage, AdlensError> {
        self.validate_image(&data)?;

        if let Some(resized) = self.resize_if_needed(&data)? {
            return Ok(UploadedImage {
                filename,
                content_type: "image/png".to_string(),
                data: resized,
            });
        }

        let content_type = content_type
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| sniff_mime(&data).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(UploadedImage {
            filename,
            content_type,
            data,
        })
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImgFormat::Png => Some("image/png"),
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::Gif => Some("image/gif"),
        ImgFormat::WebP => Some("image/webp"),
        ImgFormat::Bmp => Some("image/bmp"),
        ImgFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn rejects_non_images() {
        let processor = ImageProcessor::new(2048);
        assert!(matches!(
            processor.validate_image(b"definitely not a png"),
            Err(AdlensError::ImageProcessing(_))
        ));
        assert!(processor.validate_image(&[]).is_err());
    }

    #[test]
    fn small_images_pass_through_untouched() {
        let processor = ImageProcessor::new(64);
        let data = png(32, 16);
        let prepared = processor
            .prepare("ad.png".to_string(), None, data.clone())
            .unwrap();
        assert_eq!(prepared.data, data);
        assert_eq!(prepared.content_type, "image/png");
    }

    #[test]
    fn oversized_images_are_scaled_to_the_max_edge() {
        let processor = ImageProcessor::new(50);
        let prepared = processor
            .prepare("wide.png".to_string(), Some("image/png".to_string()), png(200, 100))
            .unwrap();
        assert_eq!(processor.validate_image(&prepared.data).unwrap(), (50, 25));
    }

    #[test]
    fn declared_image_content_type_is_kept() {
        let processor = ImageProcessor::new(64);
        let prepared = processor
            .prepare("ad".to_string(), Some("image/x-custom".to_string()), png(4, 4))
            .unwrap();
        assert_eq!(prepared.content_type, "image/x-custom");
    }
}
