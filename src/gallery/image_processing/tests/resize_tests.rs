use super::{sample_image, sample_jpeg};
use crate::gallery::image_processing::{
    EncodeSettings, ImageSize, OutputFormat, RenditionSpec, derive_renditions, probe_dimensions,
};
use image::ImageFormat;

fn renditions() -> Vec<RenditionSpec> {
    vec![
        RenditionSpec {
            name: "small".to_string(),
            size: ImageSize::new(320, 320),
        },
        RenditionSpec {
            name: "large".to_string(),
            size: ImageSize::new(1280, 1280),
        },
    ]
}

fn settings(format: OutputFormat) -> EncodeSettings {
    EncodeSettings {
        format,
        jpeg_quality: 85,
        webp_quality: 80.0,
    }
}

fn decoded_size(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).unwrap();
    (image.width(), image.height())
}

#[test]
fn test_landscape_fits_inside_bounds() {
    let original = sample_jpeg(2000, 1000);
    let output = derive_renditions(&original, &renditions(), &settings(OutputFormat::WebP)).unwrap();

    assert_eq!(output.len(), 2);
    assert_eq!(output[0].0, "small");
    assert_eq!(decoded_size(&output[0].1), (320, 160));
    assert_eq!(output[1].0, "large");
    assert_eq!(decoded_size(&output[1].1), (1280, 640));
}

#[test]
fn test_small_images_are_not_upscaled() {
    let original = sample_image(200, 150, ImageFormat::Png);
    let output = derive_renditions(&original, &renditions(), &settings(OutputFormat::Jpeg)).unwrap();

    for (_, bytes) in &output {
        assert_eq!(decoded_size(bytes), (200, 150));
    }
}

#[test]
fn test_jpeg_output_is_jpeg() {
    let original = sample_image(400, 400, ImageFormat::Png);
    let output = derive_renditions(&original, &renditions(), &settings(OutputFormat::Jpeg)).unwrap();

    assert_eq!(
        image::guess_format(&output[0].1).unwrap(),
        ImageFormat::Jpeg
    );
    assert_eq!(decoded_size(&output[0].1), (320, 320));
}

#[test]
fn test_probe_dimensions() {
    let dims = probe_dimensions(&sample_image(64, 48, ImageFormat::Gif)).unwrap();
    assert_eq!((dims.width, dims.height), (64, 48));
}

#[test]
fn test_probe_rejects_garbage() {
    assert!(probe_dimensions(b"definitely not an image").is_err());
    assert!(derive_renditions(b"nope", &renditions(), &settings(OutputFormat::WebP)).is_err());
}
