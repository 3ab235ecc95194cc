use image::{DynamicImage, ImageReader, imageops::FilterType};
use std::io::Cursor;
use tracing::debug;

use super::formats;
use super::orientation::{apply_orientation, read_orientation, swaps_dimensions};
use super::types::{ImageSize, OutputFormat};
use crate::gallery::{Dimensions, GalleryError};

#[derive(Debug, Clone)]
pub struct RenditionSpec {
    pub name: String,
    pub size: ImageSize,
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    pub webp_quality: f32,
}

/// Orientation-corrected dimensions, read from the header only.
pub fn probe_dimensions(data: &[u8]) -> Result<Dimensions, GalleryError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| GalleryError::Validation(format!("Unreadable image: {}", e)))?;
    if reader.format().is_none() {
        return Err(GalleryError::Validation(
            "Unrecognized image format".to_string(),
        ));
    }

    let (width, height) = reader.into_dimensions()?;
    if swaps_dimensions(read_orientation(data)) {
        Ok(Dimensions {
            width: height,
            height: width,
        })
    } else {
        Ok(Dimensions { width, height })
    }
}

/// Decode and rotate upright according to the embedded orientation.
pub fn decode_oriented(data: &[u8]) -> Result<DynamicImage, GalleryError> {
    let image = image::load_from_memory(data)?;
    let orientation = read_orientation(data);
    if orientation != 1 {
        debug!("Applying EXIF orientation {}", orientation);
    }
    Ok(apply_orientation(image, orientation))
}

/// Decode once and encode every rendition. Returns `(name, bytes)` pairs in
/// the order given.
pub fn derive_renditions(
    data: &[u8],
    renditions: &[RenditionSpec],
    settings: &EncodeSettings,
) -> Result<Vec<(String, Vec<u8>)>, GalleryError> {
    let image = decode_oriented(data)?;

    renditions
        .iter()
        .map(|rendition| {
            let resized = resize_image(&image, rendition.size);
            debug!(
                "Rendition {}: {}x{} -> {}x{}",
                rendition.name,
                image.width(),
                image.height(),
                resized.width(),
                resized.height()
            );
            let encoded = encode(&resized, settings)?;
            Ok((rendition.name.clone(), encoded))
        })
        .collect()
}

/// Fit inside `bounds` preserving aspect ratio. Never upscales.
pub(crate) fn resize_image(img: &DynamicImage, bounds: ImageSize) -> DynamicImage {
    let (orig_width, orig_height) = (img.width(), img.height());

    let final_width = bounds.width.min(orig_width);
    let final_height = bounds.height.min(orig_height);

    if final_width != orig_width || final_height != orig_height {
        img.resize(final_width, final_height, FilterType::Lanczos3)
    } else {
        img.clone()
    }
}

fn encode(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, GalleryError> {
    match settings.format {
        OutputFormat::Jpeg => formats::jpeg::encode(image, settings.jpeg_quality),
        OutputFormat::WebP => Ok(formats::webp::encode(image, settings.webp_quality)),
    }
}
