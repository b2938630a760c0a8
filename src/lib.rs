// lib.rs
//
// image-compressor: the core of a batch image compression service.
//
// An uploaded image plus a ProcessingOptions record goes in; re-encoded
// bytes, the output mime type and a log of the operations that actually
// changed the image come out.
//
// Pipeline order is fixed: orient -> trim -> resize -> format selection ->
// even dimensions -> filename bookkeeping -> encode.

// Memory allocator optimization - jemalloc for large decode/encode buffers
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod codecs;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod oplog;
pub mod request;
pub mod telemetry;

pub use config::CompressorConfig;
pub use engine::{
    BatchResult, CompressionSummary, Compressor, ImageBuffer, PipelineOutput, UploadLimits,
    UploadPolicy,
};
pub use error::{CompressorError, ErrorCategory, Result};
pub use ops::{
    EvenDimensionsMode, HeightSide, OutputFormat, ProcessingOptions, ResizeMode, TrimMode,
    WidthSide,
};
pub use oplog::{OperationLog, OperationLogEntry};
pub use request::{CompressionRequest, CompressionResponse, FieldValue, FormField};

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Declared mime types with a dedicated output format. Everything else is
/// re-encoded as JPEG.
pub fn supported_output_formats() -> &'static [&'static str] {
    &["image/jpeg", "image/png", "image/webp", "image/avif"]
}
