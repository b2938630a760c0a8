// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), WebP (libwebp),
// AVIF (libavif), everything else through the image crate.
//
// The format is sniffed from magic bytes, not the declared mime type: the
// declared type only picks the *output* format.

use crate::codecs::avif_safe::SafeAvifDecoder;
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::CompressorError;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

/// Input format as seen in the bytes themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    /// Anything else the image crate recognizes (BMP, GIF, ...)
    Other(ImageFormat),
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Jpeg => "jpeg",
            InputFormat::Png => "png",
            InputFormat::WebP => "webp",
            InputFormat::Avif => "avif",
            InputFormat::Other(f) => f.extensions_str().first().copied().unwrap_or("unknown"),
        }
    }
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<InputFormat> {
    if is_avif_data(bytes) {
        return Some(InputFormat::Avif);
    }
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some(InputFormat::Jpeg),
        ImageFormat::Png => Some(InputFormat::Png),
        ImageFormat::WebP => Some(InputFormat::WebP),
        ImageFormat::Avif => Some(InputFormat::Avif),
        other => Some(InputFormat::Other(other)),
    }
}

/// ISO-BMFF `ftyp` box with an AVIF brand.
pub(crate) fn is_avif_data(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let end = box_len.clamp(12, data.len());
    // major brand at 8..12, compatible brands from 16 onward
    let major = &data[8..12];
    if major == b"avif" || major == b"avis" {
        return true;
    }
    data.get(16..end)
        .map(|brands| {
            brands
                .chunks_exact(4)
                .any(|b| b == b"avif" || b == b"avis")
        })
        .unwrap_or(false)
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Route each format to its fastest decoder
/// - Return decoded image and detected format
pub fn decode_image(bytes: &[u8]) -> EngineResult<(DynamicImage, InputFormat)> {
    if bytes.is_empty() {
        return Err(CompressorError::corrupted_image());
    }
    let format = detect_format(bytes)
        .ok_or_else(|| CompressorError::unsupported_format("unrecognized image data"))?;
    let img = match format {
        InputFormat::Jpeg => decode_jpeg_mozjpeg(bytes)?,
        InputFormat::Png => decode_png_zune(bytes)?,
        InputFormat::WebP => decode_webp_libwebp(bytes)?,
        InputFormat::Avif => decode_avif_libavif(bytes)?,
        InputFormat::Other(_) => decode_with_image_crate(bytes)?,
    };
    check_dimensions(img.width(), img.height())?;
    Ok((img, format))
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(CompressorError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            CompressorError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;
        let mut decompress = decompress.rgb().map_err(|e| {
            CompressorError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| CompressorError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| CompressorError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            CompressorError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();

        RgbImage::from_raw(width, height, flat)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| CompressorError::decode_failed("mozjpeg: truncated scanline data"))
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        decoder
            .decode_headers()
            .map_err(|e| CompressorError::decode_failed(format!("png: bad header: {e}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| CompressorError::decode_failed("png: missing header info"))?;
        let (width, height) = (info.width as u32, info.height as u32);
        check_dimensions(width, height)?;

        let pixels = decoder
            .decode()
            .map_err(|e| CompressorError::decode_failed(format!("png: decode failed: {e}")))?;
        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(CompressorError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };
        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| CompressorError::decode_failed("png: missing colorspace"))?;

        let built = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => {
                GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
            }
            ColorSpace::LumaA => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            other => {
                return Err(CompressorError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };
        built.ok_or_else(|| CompressorError::decode_failed("png: pixel buffer size mismatch"))
    })
}

/// Decode WebP using libwebp. Animated WebP falls back to the image crate,
/// which yields the first frame.
pub fn decode_webp_libwebp(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            CompressorError::decode_failed("webp: failed to read bitstream features")
        })?;
        check_dimensions(features.width(), features.height())?;

        if features.has_animation() {
            return image::load_from_memory_with_format(data, ImageFormat::WebP).map_err(|e| {
                CompressorError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| CompressorError::decode_failed("webp: decode failed"))?;
        Ok(decoded.to_image())
    })
}

/// Decode AVIF through libavif. Needs a decoding codec compiled in.
pub fn decode_avif_libavif(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:avif", || {
        let mut decoder = SafeAvifDecoder::new()?;
        let image = decoder.decode(data)?;
        check_dimensions(image.width(), image.height())?;
        Ok(DynamicImage::ImageRgba8(image.to_rgba()?))
    })
}

/// Decode the remaining formats using the image crate.
pub fn decode_with_image_crate(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        ensure_dimensions_safe(data)?;
        image::load_from_memory(data)
            .map_err(|e| CompressorError::decode_failed(format!("decode failed: {e}")))
    })
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> EngineResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CompressorError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(CompressorError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> EngineResult<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height);
        }
    }
    Ok(())
}

/// Extract EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = u16::try_from(field.value.get_uint(0)?).ok()?;
    (1..=8).contains(&orientation).then_some(orientation)
}
