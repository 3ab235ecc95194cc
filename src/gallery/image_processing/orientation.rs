use image::DynamicImage;
use tracing::trace;

/// EXIF orientation of an encoded image, 1 (upright) when absent or unreadable.
pub fn read_orientation(data: &[u8]) -> u16 {
    let exif = match rexif::parse_buffer(data) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data: {}", e);
            return 1;
        }
    };

    exif.entries
        .iter()
        .find(|entry| entry.tag == rexif::ExifTag::Orientation)
        .and_then(|entry| match &entry.value {
            rexif::TagValue::U16(values) => values.first().copied(),
            _ => None,
        })
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Orientations 5-8 are stored rotated by a quarter turn.
pub fn swaps_dimensions(orientation: u16) -> bool {
    (5..=8).contains(&orientation)
}

pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
