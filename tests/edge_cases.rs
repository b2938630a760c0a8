// tests/edge_cases.rs
//
// Edge case tests for image-compressor
// Tests boundary values, invalid inputs, and error handling

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_compressor::engine::{
    calc_resize_dimensions, check_dimensions, decode_image, encode_avif, encode_jpeg,
    encode_png, encode_webp, make_even, plan_resize, trim, ProcessTask,
};
use image_compressor::ops::{
    EvenDimensionsMode, HeightSide, ProcessingOptions, ResizeMode, TrimMode, WidthSide,
};
use image_compressor::{CompressorError, ErrorCategory, ImageBuffer, UploadLimits};
use std::io::Cursor;

// Helper function to create test images
fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn encode_with(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn run(bytes: Vec<u8>, mime: &str, options: ProcessingOptions) -> Result<(u32, u32), CompressorError> {
    ProcessTask::new(ImageBuffer::new(bytes, mime), options, UploadLimits::disabled())
        .run()
        .map(|out| (out.width, out.height))
}

mod minimal_image_tests {
    use super::*;

    #[test]
    fn test_1x1_encode_every_format() {
        let img = create_test_image(1, 1);
        assert!(encode_jpeg(&img, 75).is_ok());
        assert!(encode_png(&img).is_ok());
        assert!(encode_webp(&img, 75).is_ok());
    }

    #[test]
    fn test_1x1_even_add_grows_both_axes() {
        let (out, adj) = make_even(
            create_test_image(1, 1),
            EvenDimensionsMode::Add,
            WidthSide::Left,
            HeightSide::Bottom,
            true,
        )
        .unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(adj.unwrap().log_details(), "Added 1px to left and 1px to bottom");
    }

    #[test]
    fn test_1x1_even_remove_is_rejected() {
        let err = make_even(
            create_test_image(1, 1),
            EvenDimensionsMode::Remove,
            WidthSide::Left,
            HeightSide::Top,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CompressorError::InvalidCropDimensions { .. }));
        assert_eq!(err.category(), ErrorCategory::UserError);
    }

    #[test]
    fn test_1x1_percentage_floor_is_one_pixel() {
        let opts = ProcessingOptions {
            resize_enabled: true,
            resize_mode: ResizeMode::Percentage,
            resize_percentage: Some(1),
            ..Default::default()
        };
        let plan = plan_resize((1, 1), &opts).unwrap().unwrap();
        assert_eq!((plan.width, plan.height), (1, 1));
    }
}

mod large_image_tests {
    use super::*;

    #[test]
    fn test_max_dimension_boundary() {
        // Within MAX_DIMENSION but 1,073,741,824 pixels > MAX_PIXELS
        let err = check_dimensions(32768, 32768).unwrap_err();
        assert!(matches!(err, CompressorError::PixelCountExceedsLimit { .. }));
    }

    #[test]
    fn test_exceed_max_dimension() {
        assert!(check_dimensions(32769, 1)
            .unwrap_err()
            .to_string()
            .contains("exceeds maximum"));
        assert!(check_dimensions(1, 32769).is_err());
    }

    #[test]
    fn test_max_pixels_boundary() {
        assert!(check_dimensions(10000, 10000).is_ok());
        assert!(check_dimensions(10001, 10000).is_err());
    }

    #[test]
    fn test_extreme_aspect_ratios() {
        assert!(check_dimensions(32768, 1).is_ok());
        assert!(check_dimensions(1, 32768).is_ok());
    }

    #[test]
    fn test_calc_resize_extreme_aspect_ratio_clamps_to_one() {
        let (w, h) = calc_resize_dimensions(32768, 1, Some(100), None);
        assert_eq!((w, h), (100, 1));
    }

    #[test]
    fn test_upscale_past_limit_is_rejected() {
        let opts = ProcessingOptions {
            resize_enabled: true,
            resize_mode: ResizeMode::Percentage,
            resize_percentage: Some(400),
            ..Default::default()
        };
        let err = plan_resize((10000, 10), &opts).unwrap_err();
        assert!(matches!(err, CompressorError::DimensionExceedsLimit { .. }));
        assert_eq!(err.http_status(), 413);
    }

    #[test]
    fn test_strict_pixel_limit_applies_before_pipeline_work() {
        let bytes = encode_with(&create_test_image(64, 64), ImageFormat::Png);
        let limits = UploadLimits {
            max_pixels: Some(1000),
            ..UploadLimits::custom()
        };
        let err = ProcessTask::new(
            ImageBuffer::new(bytes, "image/png"),
            ProcessingOptions::default(),
            limits,
        )
        .run()
        .unwrap_err();
        assert!(matches!(err, CompressorError::PixelCountExceedsLimit { .. }));
    }
}

mod corrupted_image_tests {
    use super::*;

    fn valid_jpeg(width: u32, height: u32) -> Vec<u8> {
        encode_jpeg(&create_test_image(width, height), 80).unwrap()
    }

    #[test]
    fn test_jpeg_header_only() {
        let result = decode_image(&[0xFF, 0xD8, 0xFF]);
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_jpeg_does_not_panic() {
        let jpeg = valid_jpeg(100, 100);
        let truncated = jpeg[..jpeg.len() / 2].to_vec();
        // libjpeg may decode a truncated scan partially; it must not panic
        let result = run(truncated, "image/jpeg", ProcessingOptions::default());
        if let Err(err) = result {
            assert_ne!(err.category(), ErrorCategory::UserError);
        }
    }

    #[test]
    fn test_wrong_magic_bytes() {
        let mut fake = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        fake.extend_from_slice(&valid_jpeg(10, 10)[8..]);
        assert!(decode_image(&fake).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        let err = run(Vec::new(), "image/png", ProcessingOptions::default()).unwrap_err();
        assert_eq!(err, CompressorError::CorruptedImage);
    }
}

mod non_image_tests {
    use super::*;

    #[test]
    fn test_text_file() {
        let err = run(
            b"Hello, this is not an image!".to_vec(),
            "image/png",
            ProcessingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompressorError::UnsupportedFormat { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_random_binary() {
        let random: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();
        assert!(run(random, "image/jpeg", ProcessingOptions::default()).is_err());
    }
}

mod quality_boundary_tests {
    use super::*;

    #[test]
    fn test_quality_out_of_range_is_clamped() {
        let img = create_test_image(32, 32);
        assert!(encode_jpeg(&img, 0).is_ok());
        assert!(encode_jpeg(&img, 255).is_ok());
        assert!(encode_webp(&img, 0).is_ok());
        assert!(encode_webp(&img, 100).is_ok());
    }

    #[test]
    fn test_avif_extremes() {
        let img = create_test_image(16, 16);
        assert!(encode_avif(&img, 1).is_ok());
        assert!(encode_avif(&img, 100).is_ok());
    }

    #[test]
    fn test_png_ignores_quality() {
        let bytes = encode_with(&create_test_image(24, 24), ImageFormat::Png);
        let sizes: Vec<usize> = [10u8, 90]
            .into_iter()
            .map(|quality| {
                let opts = ProcessingOptions {
                    quality,
                    ..Default::default()
                };
                ProcessTask::new(
                    ImageBuffer::new(bytes.clone(), "image/png"),
                    opts,
                    UploadLimits::disabled(),
                )
                .run()
                .unwrap()
                .bytes
                .len()
            })
            .collect();
        assert_eq!(sizes[0], sizes[1]);
    }
}

mod zero_dimension_tests {
    use super::*;

    #[test]
    fn test_resize_to_zero_width() {
        let opts = ProcessingOptions {
            resize_enabled: true,
            resize_width: Some(0),
            ..Default::default()
        };
        let err = plan_resize((100, 100), &opts).unwrap_err();
        assert!(matches!(err, CompressorError::InvalidResizeDimensions { .. }));
    }

    #[test]
    fn test_resize_enabled_without_dimensions_is_noop() {
        let opts = ProcessingOptions {
            resize_enabled: true,
            ..Default::default()
        };
        assert_eq!(plan_resize((100, 100), &opts).unwrap(), None);
    }
}

mod trim_edge_tests {
    use super::*;

    #[test]
    fn test_fully_transparent_image_is_left_alone() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(9, 7, Rgba([0, 0, 0, 0])));
        assert_eq!(trim(img, TrimMode::Transparency).dimensions(), (9, 7));
    }

    #[test]
    fn test_fully_white_image_is_left_alone() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(9, 7, Rgb([255, 255, 255])));
        assert_eq!(trim(img, TrimMode::Both).dimensions(), (9, 7));
    }

    #[test]
    fn test_near_white_is_content() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(10, 10, |x, _| {
            if x == 0 {
                Rgb([254, 255, 255])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert_eq!(trim(img, TrimMode::White).dimensions(), (1, 10));
    }

    #[test]
    fn test_white_trim_on_jpeg_target_through_pipeline() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(30, 30, |x, y| {
            if (5..25).contains(&x) && (5..25).contains(&y) {
                Rgb([10, 10, 10])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let opts = ProcessingOptions {
            trim_enabled: true,
            trim_mode: TrimMode::White,
            ..Default::default()
        };
        let dims = run(encode_with(&img, ImageFormat::Png), "image/jpeg", opts).unwrap();
        assert_eq!(dims, (20, 20));
    }
}
