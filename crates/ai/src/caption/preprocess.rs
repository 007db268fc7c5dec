use crate::CaptionError;
use image::{imageops::FilterType, ImageFormat, RgbImage};
use ndarray::Array4;

pub const TARGET_IMAGE_SIZE: u32 = 224;

const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif];

/// Decode raw bytes into an RGB image, sniffing the format from the content.
pub fn decode_image(data: &[u8]) -> Result<RgbImage, CaptionError> {
    let format =
        image::guess_format(data).map_err(|e| CaptionError::ImageDecode(e.to_string()))?;

    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(CaptionError::ImageDecode(format!(
            "unsupported image format: {:?}",
            format
        )));
    }

    let image = image::load_from_memory_with_format(data, format)
        .map_err(|e| CaptionError::ImageDecode(e.to_string()))?;

    Ok(image.to_rgb8())
}

/// Resize to `size` x `size` and scale pixels into [0, 1], NHWC with a batch axis.
///
/// Nearest sampling matches how the caption model's training images were loaded.
pub fn preprocess_rgb8_image(image: &RgbImage, size: u32) -> Array4<f32> {
    let image = image::imageops::resize(image, size, size, FilterType::Nearest);

    let mut array = Array4::zeros((1, size as usize, size as usize, 3));
    for (x, y, p) in image.enumerate_pixels() {
        for c in 0..3 {
            array[[0, y as usize, x as usize, c]] = p[c] as f32 / 255.0;
        }
    }

    array
}
