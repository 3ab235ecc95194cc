use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder};

use crate::gallery::GalleryError;

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, GalleryError> {
    let rgb_image = image.to_rgb8();
    let mut output = Vec::new();

    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(output)
}
