// src/engine/encoder.rs
//
// Encoder operations: one function per output format, selected once through
// `encode`. Encoders write pixel data only; no metadata is carried over.

use crate::codecs::avif_safe::{SafeAvifEncoder, SafeAvifImage};
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::MAX_DIMENSION;
use crate::error::CompressorError;
use crate::ops::OutputFormat;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage, RgbaImage};
use libavif_sys::AVIF_PIXEL_FORMAT_YUV420;
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

/// oxipng preset used for every PNG: the slowest, smallest-output level.
pub const PNG_OPTIMIZATION_PRESET: u8 = 6;

/// Per-format encoder knobs derived from the 1-100 quality value.
///
/// Bands:
/// - High (>=85): visual quality first, AVIF speed 6
/// - Balanced (70-84): AVIF speed 7
/// - Fast (50-69): AVIF speed 8
/// - Fastest (<50): AVIF speed 9
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100) as f32,
        }
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        match self.band() {
            QualityBand::High => 0,
            QualityBand::Balanced => 5,
            QualityBand::Fast => 10,
            QualityBand::Fastest => 18,
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            _ => 0,
        }
    }

    /// libavif speed: 0 (slowest/best) to 10 (fastest)
    pub fn avif_speed(&self) -> i32 {
        match self.band() {
            QualityBand::High => 6,
            QualityBand::Balanced => 7,
            QualityBand::Fast => 8,
            QualityBand::Fastest => 9,
        }
    }
}

/// Encode `img` in the chosen output format.
pub fn encode(img: &DynamicImage, format: OutputFormat) -> EngineResult<Vec<u8>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(CompressorError::encode_failed(
            format.as_str(),
            format!("cannot encode empty image ({w}x{h})"),
        ));
    }
    match format {
        OutputFormat::Jpeg { quality } => encode_jpeg(img, quality),
        // PNG is lossless; quality only matters for lossy formats
        OutputFormat::Png { .. } => encode_png(img),
        OutputFormat::WebP { quality } => encode_webp(img, quality),
        OutputFormat::Avif { quality } => encode_avif(img, quality),
    }
}

/// True when the image carries an alpha channel with at least one
/// non-opaque pixel.
fn has_visible_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    match img {
        DynamicImage::ImageRgba8(rgba) => rgba.pixels().any(|p| p.0[3] != 255),
        other => other.to_rgba8().pixels().any(|p| p.0[3] != 255),
    }
}

/// Progressive JPEG through mozjpeg with optimized Huffman tables and scans.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let settings = QualitySettings::new(quality);

        // Zero-copy when already RGB8
        let rgb: Cow<'_, RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(CompressorError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
        }
        let pixels: &[u8] = rgb.as_raw();
        if pixels.len() != (w as usize) * (h as usize) * 3 {
            return Err(CompressorError::corrupted_image());
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let mut output = Vec::with_capacity((w as usize * h as usize * 3 / 10).max(4096));
        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            CompressorError::encode_failed("jpeg", format!("mozjpeg: failed to start: {e:?}"))
        })?;
        for row in pixels.chunks(w as usize * 3) {
            writer.write_scanlines(row).map_err(|e| {
                CompressorError::encode_failed("jpeg", format!("mozjpeg: write failed: {e:?}"))
            })?;
        }
        writer.finish().map_err(|e| {
            CompressorError::encode_failed("jpeg", format!("mozjpeg: finish failed: {e:?}"))
        })?;
        Ok(output)
    })
}

/// PNG via the image crate, then losslessly re-compressed by oxipng.
pub fn encode_png(img: &DynamicImage) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        // 16-bit and float buffers are narrowed; the pipeline is 8-bit throughout
        let img: Cow<'_, DynamicImage> = match img {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
            other if other.color().has_alpha() => {
                Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
            }
            other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
        };

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| CompressorError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(PNG_OPTIMIZATION_PRESET);
        options.strip = oxipng::StripChunks::Safe;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            CompressorError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Lossy WebP through libwebp. Alpha is kept only when some pixel uses it.
pub fn encode_webp(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let settings = QualitySettings::new(quality);
        let mut config = webp::WebPConfig::new()
            .map_err(|_| CompressorError::internal_panic("failed to create WebPConfig"))?;
        config.quality = settings.quality;
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = if has_visible_alpha(img) {
            let rgba: Cow<'_, RgbaImage> = match img {
                DynamicImage::ImageRgba8(buf) => Cow::Borrowed(buf),
                other => Cow::Owned(other.to_rgba8()),
            };
            let (w, h) = rgba.dimensions();
            webp::Encoder::from_rgba(&rgba, w, h)
                .encode_advanced(&config)
                .map_err(webp_error)?
        } else {
            let rgb: Cow<'_, RgbImage> = match img {
                DynamicImage::ImageRgb8(buf) => Cow::Borrowed(buf),
                other => Cow::Owned(other.to_rgb8()),
            };
            let (w, h) = rgb.dimensions();
            webp::Encoder::from_rgb(&rgb, w, h)
                .encode_advanced(&config)
                .map_err(webp_error)?
        };
        Ok(mem.to_vec())
    })
}

fn webp_error(e: impl std::fmt::Debug) -> CompressorError {
    CompressorError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
}

/// AVIF through libavif (rav1e), 8-bit 4:2:0, sRGB.
pub fn encode_avif(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:avif", || {
        let settings = QualitySettings::new(quality);
        let (width, height) = img.dimensions();
        let with_alpha = has_visible_alpha(img);

        let rgba: Cow<'_, RgbaImage> = match img {
            DynamicImage::ImageRgba8(buf) => Cow::Borrowed(buf),
            other => Cow::Owned(other.to_rgba8()),
        };

        let mut avif_image = SafeAvifImage::new(width, height, 8, AVIF_PIXEL_FORMAT_YUV420)?;
        avif_image.set_srgb_color_properties();
        avif_image.import_rgba(&rgba, with_alpha)?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(2, 8) as i32;

        let mut encoder = SafeAvifEncoder::new()?;
        encoder.configure(quality.clamp(1, 100), settings.avif_speed(), threads);
        encoder.encode(&mut avif_image)
    })
}
