// src/engine.rs
//
// The core of image-compressor. One pass per image:
// 1. Decode and normalize orientation
// 2. Trim, resize and even-dimension adjustment on the decoded pixels
// 3. Encode exactly once into the format chosen from the declared mime type
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod common;
mod decoder;
mod encoder;
mod io;
mod limits;
mod pipeline;
mod pool;
mod tasks;
mod trim;

pub use api::Compressor;
pub use common::{run_with_panic_policy, EngineResult};
pub use decoder::{
    check_dimensions, decode_image, detect_exif_orientation, detect_format, InputFormat,
};
pub use encoder::{
    encode, encode_avif, encode_jpeg, encode_png, encode_webp, QualitySettings,
    PNG_OPTIMIZATION_PRESET,
};
pub use io::{file_extension, file_stem, output_file_name, unique_file_name, ImageBuffer};
pub use limits::{UploadLimits, UploadPolicy, ALLOWED_TYPES};
pub use pipeline::{
    apply_orientation, calc_resize_dimensions, fast_resize_owned, make_even, plan_resize,
    resize_exact, scale_dimension, EvenAdjustment, ResizePlan, ResizeRequest,
};
pub use pool::{default_thread_count, get_pool, MAX_THREADS};
pub use tasks::{BatchResult, BatchTask, CompressionSummary, PipelineOutput, ProcessTask};
pub use trim::{content_bounds, trim, trim_pass, Border, Bounds};
