// src/codecs/avif_safe.rs
//
// RAII wrappers over the libavif FFI surface used by the encoder and the
// AVIF input path. Raw pointers stay inside this module; callers only see
// owned handles and CompressorError.
#![deny(unsafe_op_in_unsafe_fn)]

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::CompressorError;
use image::RgbaImage;
use libavif_sys::*;
use std::ptr::NonNull;

type AvifResult<T> = std::result::Result<T, CompressorError>;

fn encode_err(message: impl Into<std::borrow::Cow<'static, str>>) -> CompressorError {
    CompressorError::encode_failed("avif", message)
}

fn check_avif(result: avifResult, what: &str) -> AvifResult<()> {
    if result == AVIF_RESULT_OK {
        Ok(())
    } else {
        Err(encode_err(format!("{what}: libavif result {result:?}")))
    }
}

/// Reject sizes libavif would accept but the rest of the engine never
/// produces. Encoding an image this large means a bug upstream.
fn validate_dimensions(width: u32, height: u32) -> AvifResult<()> {
    if width == 0 || height == 0 {
        return Err(encode_err(format!(
            "dimensions must be non-zero ({width}x{height})"
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(encode_err(format!(
            "dimensions {width}x{height} exceed MAX_DIMENSION {MAX_DIMENSION}"
        )));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(encode_err(format!(
            "pixel count {pixels} exceeds MAX_PIXELS {MAX_PIXELS}"
        )));
    }
    Ok(())
}

/// Owned `avifImage`.
pub struct SafeAvifImage {
    ptr: NonNull<avifImage>,
}

impl SafeAvifImage {
    /// Allocate an image header for encoding. Planes are allocated later by
    /// `import_rgba`.
    pub fn new(width: u32, height: u32, depth: u32, format: avifPixelFormat) -> AvifResult<Self> {
        validate_dimensions(width, height)?;
        // SAFETY: plain constructor, returns null on allocation failure.
        let raw = unsafe { avifImageCreate(width, height, depth, format) };
        let ptr = NonNull::new(raw).ok_or_else(|| encode_err("avifImageCreate returned null"))?;
        Ok(Self { ptr })
    }

    fn empty() -> AvifResult<Self> {
        // SAFETY: plain constructor, returns null on allocation failure.
        let raw = unsafe { avifImageCreateEmpty() };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| CompressorError::decode_failed("avifImageCreateEmpty returned null"))?;
        Ok(Self { ptr })
    }

    pub fn width(&self) -> u32 {
        // SAFETY: ptr is a live avifImage owned by self.
        unsafe { (*self.ptr.as_ptr()).width }
    }

    pub fn height(&self) -> u32 {
        // SAFETY: ptr is a live avifImage owned by self.
        unsafe { (*self.ptr.as_ptr()).height }
    }

    /// sRGB primaries/transfer, BT.709 matrix, full range.
    pub fn set_srgb_color_properties(&mut self) {
        let raw = self.ptr.as_ptr();
        // SAFETY: exclusive access through &mut self.
        unsafe {
            (*raw).colorPrimaries = AVIF_COLOR_PRIMARIES_BT709 as u16;
            (*raw).transferCharacteristics = AVIF_TRANSFER_CHARACTERISTICS_SRGB as u16;
            (*raw).matrixCoefficients = AVIF_MATRIX_COEFFICIENTS_BT709 as u16;
            (*raw).yuvRange = AVIF_RANGE_FULL;
        }
    }

    /// Convert an RGBA8 buffer into the image's YUV planes, plus an alpha
    /// plane when `with_alpha` is set.
    pub fn import_rgba(&mut self, rgba: &RgbaImage, with_alpha: bool) -> AvifResult<()> {
        let (width, height) = rgba.dimensions();
        if (width, height) != (self.width(), self.height()) {
            return Err(encode_err(format!(
                "pixel buffer {width}x{height} does not match image {}x{}",
                self.width(),
                self.height()
            )));
        }
        let row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| encode_err("row bytes overflow"))?;

        let raw = self.ptr.as_ptr();
        // SAFETY: raw is live and exclusively borrowed.
        check_avif(
            unsafe { avifImageAllocatePlanes(raw, AVIF_PLANES_YUV) },
            "allocate YUV planes",
        )?;

        // SAFETY: zeroed avifRGBImage is a valid starting point for SetDefaults.
        let mut rgb: avifRGBImage = unsafe { std::mem::zeroed() };
        // SAFETY: rgb is a local; raw is live. libavif only reads `pixels`
        // during RGBToYUV, and the borrow of `rgba` outlives that call.
        unsafe {
            avifRGBImageSetDefaults(&mut rgb, raw);
            rgb.format = AVIF_RGB_FORMAT_RGBA;
            rgb.depth = 8;
            rgb.pixels = rgba.as_raw().as_ptr() as *mut u8;
            rgb.rowBytes = row_bytes;
        }
        // SAFETY: see above.
        check_avif(unsafe { avifImageRGBToYUV(raw, &rgb) }, "RGB to YUV")?;

        if with_alpha {
            // SAFETY: raw is live and exclusively borrowed.
            check_avif(
                unsafe { avifImageAllocatePlanes(raw, AVIF_PLANES_A) },
                "allocate alpha plane",
            )?;
            // SAFETY: the alpha plane was just allocated with alphaRowBytes
            // per row and `height` rows of at least `width` bytes each.
            unsafe {
                let plane = (*raw).alphaPlane;
                if plane.is_null() {
                    return Err(encode_err("alpha plane is not allocated"));
                }
                let stride = (*raw).alphaRowBytes as usize;
                for (y, row) in rgba.rows().enumerate() {
                    let dst = std::slice::from_raw_parts_mut(plane.add(y * stride), width as usize);
                    for (d, px) in dst.iter_mut().zip(row) {
                        *d = px.0[3];
                    }
                }
            }
        }
        Ok(())
    }

    /// Convert the decoded YUV(A) planes into an 8-bit RGBA buffer.
    pub fn to_rgba(&self) -> AvifResult<RgbaImage> {
        let (width, height) = (self.width(), self.height());
        crate::engine::check_dimensions(width, height)?;
        let raw = self.ptr.as_ptr();

        // SAFETY: zeroed avifRGBImage is a valid starting point for SetDefaults.
        let mut rgb: avifRGBImage = unsafe { std::mem::zeroed() };
        // SAFETY: raw is live; rgb pixels are allocated and freed by libavif
        // inside this block.
        unsafe {
            avifRGBImageSetDefaults(&mut rgb, raw);
            rgb.format = AVIF_RGB_FORMAT_RGBA;
            rgb.depth = 8;
        }
        let guard = RgbPixels::allocate(&mut rgb)?;
        // SAFETY: rgb has freshly allocated pixels sized for this image.
        let result = unsafe { avifImageYUVToRGB(raw, guard.rgb) };
        if result != AVIF_RESULT_OK {
            return Err(CompressorError::decode_failed(format!(
                "avif: YUV to RGB failed: {result:?}"
            )));
        }

        let row_len = width as usize * 4;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        // SAFETY: libavif filled `height` rows of `rowBytes` each.
        unsafe {
            let stride = (*guard.rgb).rowBytes as usize;
            let base = (*guard.rgb).pixels;
            for y in 0..height as usize {
                let row = std::slice::from_raw_parts(base.add(y * stride), row_len);
                pixels.extend_from_slice(row);
            }
        }
        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| CompressorError::decode_failed("avif: pixel buffer size mismatch"))
    }

    fn as_mut_ptr(&mut self) -> *mut avifImage {
        self.ptr.as_ptr()
    }
}

impl Drop for SafeAvifImage {
    fn drop(&mut self) {
        // SAFETY: we own the pointer and drop runs once.
        unsafe { avifImageDestroy(self.ptr.as_ptr()) };
    }
}

/// Frees pixels allocated by `avifRGBImageAllocatePixels` on every exit path.
struct RgbPixels {
    rgb: *mut avifRGBImage,
}

impl RgbPixels {
    fn allocate(rgb: &mut avifRGBImage) -> AvifResult<Self> {
        // SAFETY: rgb was initialised by avifRGBImageSetDefaults.
        let result = unsafe { avifRGBImageAllocatePixels(rgb) };
        if result != AVIF_RESULT_OK {
            return Err(CompressorError::decode_failed(format!(
                "avif: failed to allocate RGB pixels: {result:?}"
            )));
        }
        Ok(Self { rgb })
    }
}

impl Drop for RgbPixels {
    fn drop(&mut self) {
        // SAFETY: pixels were allocated by libavif and the rgb struct
        // outlives this guard.
        unsafe { avifRGBImageFreePixels(self.rgb) };
    }
}

/// Owned `avifEncoder`.
pub struct SafeAvifEncoder {
    ptr: NonNull<avifEncoder>,
}

impl SafeAvifEncoder {
    pub fn new() -> AvifResult<Self> {
        // SAFETY: plain constructor, returns null on allocation failure.
        let raw = unsafe { avifEncoderCreate() };
        let ptr = NonNull::new(raw).ok_or_else(|| encode_err("avifEncoderCreate returned null"))?;
        Ok(Self { ptr })
    }

    /// `quality` is 0-100 (libavif's own scale), `speed` 0-10 (0 = slowest).
    pub fn configure(&mut self, quality: u8, speed: i32, max_threads: i32) {
        let raw = self.ptr.as_ptr();
        // SAFETY: exclusive access through &mut self.
        unsafe {
            (*raw).quality = quality as i32;
            (*raw).qualityAlpha = quality as i32;
            (*raw).speed = speed;
            (*raw).maxThreads = max_threads;
        }
    }

    /// Encode a single still image.
    pub fn encode(&mut self, image: &mut SafeAvifImage) -> AvifResult<Vec<u8>> {
        let mut output = SafeAvifRwData::new();
        // SAFETY: encoder and image are live and exclusively borrowed.
        check_avif(
            unsafe {
                avifEncoderAddImage(
                    self.ptr.as_ptr(),
                    image.as_mut_ptr(),
                    1,
                    AVIF_ADD_IMAGE_FLAG_SINGLE,
                )
            },
            "add image",
        )?;
        // SAFETY: output is a zeroed avifRWData owned by this frame.
        check_avif(
            unsafe { avifEncoderFinish(self.ptr.as_ptr(), output.as_mut_ptr()) },
            "finish",
        )?;
        Ok(output.as_slice().to_vec())
    }
}

impl Drop for SafeAvifEncoder {
    fn drop(&mut self) {
        // SAFETY: we own the pointer and drop runs once.
        unsafe { avifEncoderDestroy(self.ptr.as_ptr()) };
    }
}

/// Owned `avifRWData` (encoder output buffer).
pub struct SafeAvifRwData {
    data: avifRWData,
}

impl SafeAvifRwData {
    pub fn new() -> Self {
        Self {
            // SAFETY: an all-zero avifRWData is the documented empty state.
            data: unsafe { std::mem::zeroed() },
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.data.data.is_null() || self.data.size == 0 {
            &[]
        } else {
            // SAFETY: libavif guarantees `size` readable bytes at `data`.
            unsafe { std::slice::from_raw_parts(self.data.data, self.data.size) }
        }
    }

    fn as_mut_ptr(&mut self) -> *mut avifRWData {
        &mut self.data
    }
}

impl Default for SafeAvifRwData {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SafeAvifRwData {
    fn drop(&mut self) {
        // SAFETY: freeing an empty avifRWData is a no-op.
        unsafe { avifRWDataFree(&mut self.data) };
    }
}

/// Owned `avifDecoder`, capped to the engine's pixel limits.
///
/// Decoding requires dav1d compiled into libavif through the default
/// `avif-decode` feature. A build without it fails every AVIF decode.
pub struct SafeAvifDecoder {
    ptr: NonNull<avifDecoder>,
}

impl SafeAvifDecoder {
    pub fn new() -> AvifResult<Self> {
        // SAFETY: plain constructor, returns null on allocation failure.
        let raw = unsafe { avifDecoderCreate() };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| CompressorError::decode_failed("avifDecoderCreate returned null"))?;
        // SAFETY: freshly created decoder, exclusively owned.
        unsafe {
            (*raw).imageDimensionLimit = MAX_DIMENSION;
            (*raw).imageSizeLimit = MAX_PIXELS.min(u32::MAX as u64) as u32;
        }
        Ok(Self { ptr })
    }

    /// Decode the primary image of an AVIF file.
    pub fn decode(&mut self, data: &[u8]) -> AvifResult<SafeAvifImage> {
        let mut image = SafeAvifImage::empty()?;
        // SAFETY: decoder and image are live; data is only read during the call.
        let result = unsafe {
            avifDecoderReadMemory(
                self.ptr.as_ptr(),
                image.as_mut_ptr(),
                data.as_ptr(),
                data.len(),
            )
        };
        if result != AVIF_RESULT_OK {
            return Err(CompressorError::decode_failed(format!(
                "avif: read failed: {result:?}"
            )));
        }
        Ok(image)
    }
}

impl Drop for SafeAvifDecoder {
    fn drop(&mut self) {
        // SAFETY: we own the pointer and drop runs once.
        unsafe { avifDecoderDestroy(self.ptr.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn new_rejects_zero_dimensions() {
        let err = SafeAvifImage::new(0, 10, 8, AVIF_PIXEL_FORMAT_YUV420)
            .err()
            .unwrap();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn new_rejects_dimension_limits() {
        let err = SafeAvifImage::new(MAX_DIMENSION + 1, 10, 8, AVIF_PIXEL_FORMAT_YUV420)
            .err()
            .unwrap();
        assert!(err.to_string().contains("MAX_DIMENSION"));
    }

    #[test]
    fn import_rejects_mismatched_buffer() {
        let mut img = SafeAvifImage::new(4, 4, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        let rgba = RgbaImage::new(2, 2);
        let err = img.import_rgba(&rgba, false).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn encode_produces_ftyp_box() {
        let rgba = RgbaImage::from_pixel(16, 16, Rgba([200, 40, 40, 255]));
        let mut img = SafeAvifImage::new(16, 16, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        img.set_srgb_color_properties();
        img.import_rgba(&rgba, false).unwrap();
        let mut encoder = SafeAvifEncoder::new().unwrap();
        encoder.configure(60, 10, 1);
        let bytes = encoder.encode(&mut img).unwrap();
        assert!(bytes.len() > 12);
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn encode_with_alpha_plane() {
        let rgba = RgbaImage::from_fn(8, 8, |x, _| Rgba([0, 0, 255, if x < 4 { 0 } else { 255 }]));
        let mut img = SafeAvifImage::new(8, 8, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        img.import_rgba(&rgba, true).unwrap();
        let mut encoder = SafeAvifEncoder::new().unwrap();
        encoder.configure(50, 10, 1);
        assert!(!encoder.encode(&mut img).unwrap().is_empty());
    }

    #[test]
    fn decoder_rejects_garbage() {
        let mut decoder = SafeAvifDecoder::new().unwrap();
        let err = decoder.decode(b"definitely not an avif file").err().unwrap();
        assert!(matches!(err, CompressorError::DecodeFailed { .. }));
    }

    #[test]
    fn empty_rwdata_is_empty_slice() {
        assert!(SafeAvifRwData::new().as_slice().is_empty());
    }
}
