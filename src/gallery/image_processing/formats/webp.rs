use image::DynamicImage;

/// Lossy WebP at `quality` (0-100).
pub fn encode(image: &DynamicImage, quality: f32) -> Vec<u8> {
    let rgb_image = image.to_rgb8();
    let (width, height) = rgb_image.dimensions();
    let rgb_data = rgb_image.into_raw();

    let encoder = webp::Encoder::from_rgb(&rgb_data, width, height);
    encoder.encode(quality).to_vec()
}
