// src/engine/pipeline.rs
//
// Geometry stages of the compression pipeline:
// - orientation normalization (EXIF 1-8)
// - resize planning (manual / percentage) and SIMD resize
// - even-dimension padding / cropping
//
// Every stage takes an owned DynamicImage and returns a new owned one, so
// the next stage always measures settled pixel dimensions.

use crate::engine::decoder::check_dimensions;
use crate::error::{CompressorError, Result};
use crate::ops::{
    EvenDimensionsMode, HeightSide, ProcessingOptions, ResizeMode, WidthSide,
    MAX_RESIZE_PERCENTAGE,
};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use tracing::debug;

// =============================================================================
// ORIENTATION
// =============================================================================

/// Physically apply an EXIF orientation value. Values outside 1-8 are ignored.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(), // transpose
        6 => img.rotate90(),
        7 => img.rotate270().fliph(), // transverse
        8 => img.rotate270(),
        _ => img,
    }
}

// =============================================================================
// RESIZE
// =============================================================================

/// Target dimensions for a resize request.
///
/// Both dimensions given: exact fill, aspect ratio is not preserved.
/// One dimension given: the other follows the source aspect ratio.
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    match (target_w, target_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let ratio = w as f64 / orig_w.max(1) as f64;
            (w, ((orig_h as f64 * ratio).round() as u32).max(1))
        }
        (None, Some(h)) => {
            let ratio = h as f64 / orig_h.max(1) as f64;
            (((orig_w as f64 * ratio).round() as u32).max(1), h)
        }
        (None, None) => (orig_w, orig_h),
    }
}

/// `round(dimension * percent / 100)`, never below one pixel.
pub fn scale_dimension(dimension: u32, percent: u32) -> u32 {
    let scaled = (dimension as f64 * percent as f64 / 100.0).round();
    (scaled as u32).max(1)
}

/// What the caller asked for, kept for the log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeRequest {
    Manual {
        width: Option<u32>,
        height: Option<u32>,
    },
    Percentage {
        percent: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizePlan {
    pub request: ResizeRequest,
    pub width: u32,
    pub height: u32,
}

impl ResizePlan {
    pub fn log_details(&self) -> String {
        match self.request {
            ResizeRequest::Manual { width, height } => format!(
                "Resized to {} width and {} height",
                px_or_auto(width),
                px_or_auto(height)
            ),
            ResizeRequest::Percentage { percent } => format!(
                "Scaled to {percent}% ({}px width and {}px height)",
                self.width, self.height
            ),
        }
    }
}

fn px_or_auto(value: Option<u32>) -> String {
    value.map_or_else(|| "auto".to_string(), |v| format!("{v}px"))
}

/// Work out the resize for the current (post-trim) dimensions.
///
/// Returns `Ok(None)` when resize is disabled or the active mode has no
/// dimension to work with. Fields of the inactive mode are ignored.
pub fn plan_resize(current: (u32, u32), opts: &ProcessingOptions) -> Result<Option<ResizePlan>> {
    if !opts.resize_enabled {
        return Ok(None);
    }
    let (cur_w, cur_h) = current;
    let plan = match opts.resize_mode {
        ResizeMode::Manual => {
            let (width, height) = (opts.resize_width, opts.resize_height);
            if width.is_none() && height.is_none() {
                return Ok(None);
            }
            if width == Some(0) || height == Some(0) {
                return Err(CompressorError::invalid_resize_dimensions(width, height));
            }
            let (w, h) = calc_resize_dimensions(cur_w, cur_h, width, height);
            ResizePlan {
                request: ResizeRequest::Manual { width, height },
                width: w,
                height: h,
            }
        }
        ResizeMode::Percentage => {
            let Some(percent) = opts.resize_percentage else {
                return Ok(None);
            };
            let percent = percent.clamp(1, MAX_RESIZE_PERCENTAGE);
            ResizePlan {
                request: ResizeRequest::Percentage { percent },
                width: scale_dimension(cur_w, percent),
                height: scale_dimension(cur_h, percent),
            }
        }
    };
    check_dimensions(plan.width, plan.height)?;
    Ok(Some(plan))
}

/// Resize to exactly `dst_width` x `dst_height`. Same-size requests return
/// the input untouched.
pub fn resize_exact(img: DynamicImage, dst_width: u32, dst_height: u32) -> Result<DynamicImage> {
    if img.dimensions() == (dst_width, dst_height) {
        return Ok(img);
    }
    fast_resize_owned(img, dst_width, dst_height)
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Fast resize with owned DynamicImage (zero-copy for RGB/RGBA)
pub fn fast_resize_owned(img: DynamicImage, dst_width: u32, dst_height: u32) -> Result<DynamicImage> {
    let src_width = img.width();
    let src_height = img.height();
    let fail = |reason: String| {
        CompressorError::resize_failed((src_width, src_height), (dst_width, dst_height), reason)
    };

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(fail("invalid dimensions for resize".to_string()));
    }

    // Take ownership of the pixel buffer instead of cloning it
    let (pixel_type, src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other if other.color().has_alpha() => (PixelType::U8x4, other.to_rgba8().into_raw()),
        other => (PixelType::U8x3, other.to_rgb8().into_raw()),
    };

    fast_resize_internal(
        src_width,
        src_height,
        src_pixels,
        pixel_type,
        dst_width,
        dst_height,
        default_resize_options(),
    )
    .map_err(fail)
}

/// Decide whether alpha premultiplication is required for a given pixel layout.
#[inline]
fn requires_premultiply(pixel_type: PixelType) -> bool {
    matches!(pixel_type, PixelType::U8x4)
}

fn fast_resize_internal(
    src_width: u32,
    src_height: u32,
    mut src_pixels: Vec<u8>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
    options: ResizeOptions,
) -> std::result::Result<DynamicImage, String> {
    let required_bytes = (src_width as usize)
        .checked_mul(src_height as usize)
        .and_then(|n| n.checked_mul(pixel_type.size()))
        .ok_or_else(|| "image buffer size overflow during resize".to_string())?;

    if src_pixels.len() < required_bytes {
        return Err(format!(
            "source buffer too small: expected {required_bytes} bytes, got {}",
            src_pixels.len()
        ));
    }

    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(src_image) => resize_with_source_image(src_image, pixel_type, dst_width, dst_height, &options),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            aligned
                .buffer_mut()
                .copy_from_slice(&src_pixels[..required_bytes]);
            resize_with_source_image(aligned, pixel_type, dst_width, dst_height, &options)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    match primary {
        Ok(img) => Ok(img),
        Err(err) => {
            debug!(%err, "fast resize failed, falling back to image crate");
            resize_with_image_crate_fallback(
                &src_pixels,
                src_width,
                src_height,
                pixel_type,
                dst_width,
                dst_height,
            )
            .map_err(|fallback| format!("{err}; image crate fallback failed: {fallback}"))
        }
    }
}

fn resize_with_image_crate_fallback(
    src_pixels: &[u8],
    src_width: u32,
    src_height: u32,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let filter = FilterType::Lanczos3;
    match pixel_type {
        PixelType::U8x3 => {
            let rgb = RgbImage::from_raw(src_width, src_height, src_pixels.to_vec())
                .ok_or_else(|| "failed to build rgb image for fallback resize".to_string())?;
            Ok(DynamicImage::ImageRgb8(image::imageops::resize(
                &rgb, dst_width, dst_height, filter,
            )))
        }
        PixelType::U8x4 => {
            let rgba = RgbaImage::from_raw(src_width, src_height, src_pixels.to_vec())
                .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
            Ok(DynamicImage::ImageRgba8(image::imageops::resize(
                &rgba, dst_width, dst_height, filter,
            )))
        }
        _ => Err("fallback resize supports only U8x3/U8x4 pixel types".to_string()),
    }
}

fn resize_with_source_image(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
    options: &ResizeOptions,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    // Opaque RGBA needs no premultiply round trip
    let needs_premultiply = requires_premultiply(pixel_type)
        && src_image.buffer().iter().skip(3).step_by(4).any(|&a| a != 255);

    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}

// =============================================================================
// EVEN DIMENSIONS
// =============================================================================

/// Which edges the even-dimension stage touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvenAdjustment {
    pub mode: EvenDimensionsMode,
    pub width_side: Option<WidthSide>,
    pub height_side: Option<HeightSide>,
}

impl EvenAdjustment {
    /// e.g. `Added 1px to left and 1px to top`, `Removed 1px from right`
    pub fn log_details(&self) -> String {
        let (verb, prep) = match self.mode {
            EvenDimensionsMode::Add => ("Added", "to"),
            EvenDimensionsMode::Remove => ("Removed", "from"),
        };
        let parts: Vec<String> = self
            .width_side
            .map(|s| s.as_str())
            .into_iter()
            .chain(self.height_side.map(|s| s.as_str()))
            .map(|side| format!("1px {prep} {side}"))
            .collect();
        format!("{verb} {}", parts.join(" and "))
    }
}

/// Make both dimensions even by extending or cropping one pixel per odd axis.
///
/// Padding is transparent when `pad_transparent` is set, opaque white
/// otherwise. Returns the adjustment made, or None when both axes were
/// already even.
pub fn make_even(
    img: DynamicImage,
    mode: EvenDimensionsMode,
    width_side: WidthSide,
    height_side: HeightSide,
    pad_transparent: bool,
) -> Result<(DynamicImage, Option<EvenAdjustment>)> {
    let (width, height) = img.dimensions();
    let odd_w = width % 2 == 1;
    let odd_h = height % 2 == 1;
    if !odd_w && !odd_h {
        return Ok((img, None));
    }

    let adjustment = EvenAdjustment {
        mode,
        width_side: odd_w.then_some(width_side),
        height_side: odd_h.then_some(height_side),
    };
    let dx = u32::from(odd_w);
    let dy = u32::from(odd_h);
    let x_off = u32::from(odd_w && width_side == WidthSide::Left);
    let y_off = u32::from(odd_h && height_side == HeightSide::Top);

    let adjusted = match mode {
        EvenDimensionsMode::Add => {
            let (new_w, new_h) = (width + dx, height + dy);
            check_dimensions(new_w, new_h)?;
            if pad_transparent {
                let mut canvas = RgbaImage::from_pixel(new_w, new_h, Rgba([0, 0, 0, 0]));
                image::imageops::replace(&mut canvas, &img.to_rgba8(), x_off.into(), y_off.into());
                DynamicImage::ImageRgba8(canvas)
            } else {
                let mut canvas = RgbImage::from_pixel(new_w, new_h, Rgb([255, 255, 255]));
                image::imageops::replace(&mut canvas, &img.to_rgb8(), x_off.into(), y_off.into());
                DynamicImage::ImageRgb8(canvas)
            }
        }
        EvenDimensionsMode::Remove => {
            let (new_w, new_h) = (width - dx, height - dy);
            if new_w == 0 || new_h == 0 {
                return Err(CompressorError::invalid_crop_dimensions(new_w, new_h));
            }
            img.crop_imm(x_off, y_off, new_w, new_h)
        }
    };
    Ok((adjusted, Some(adjustment)))
}
