// src/error.rs
//
// Every way a compression request can fail, in one thiserror enum.
//
// Each variant belongs to exactly one ErrorCategory. The category decides
// whether the client can fix the problem and which HTTP status the request
// boundary answers with.

use std::borrow::Cow;
use thiserror::Error;

/// Coarse grouping of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Bad request: missing upload, rejected file, impossible geometry
    UserError,
    /// A codec could not read or write the image
    CodecError,
    /// Dimension, pixel or time budget exhausted
    ResourceLimit,
    /// A codec panicked or an internal assumption broke
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserError => "UserError",
            Self::CodecError => "CodecError",
            Self::ResourceLimit => "ResourceLimit",
            Self::InternalBug => "InternalBug",
        }
    }

    /// Stable code string for clients that branch on error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserError => "COMPRESSOR_USER_ERROR",
            Self::CodecError => "COMPRESSOR_CODEC_ERROR",
            Self::ResourceLimit => "COMPRESSOR_RESOURCE_LIMIT",
            Self::InternalBug => "COMPRESSOR_INTERNAL_BUG",
        }
    }
}

/// Failure of one image (or one request).
///
/// Terminal for the image it belongs to: there is no partial output and no
/// fallback to the uploaded bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompressorError {
    #[error("No image uploaded")]
    MissingInput,

    /// Upload validation failed; the message is shown to the user verbatim
    #[error("{message}")]
    UploadRejected { message: Cow<'static, str> },

    #[error("Image data is not a supported format ({format})")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Could not decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Image data is empty or corrupted")]
    CorruptedImage,

    #[error("Image side of {dimension}px exceeds maximum of {max}px")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image has {pixels} pixels, exceeds maximum of {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Processing took longer than {limit_ms}ms (stopped after {stage})")]
    Timeout {
        stage: Cow<'static, str>,
        limit_ms: u64,
    },

    #[error("Cropping would leave a {width}x{height} image")]
    InvalidCropDimensions { width: u32, height: u32 },

    #[error("Cannot resize to width {width:?} / height {height:?}")]
    InvalidResizeDimensions {
        width: Option<u32>,
        height: Option<u32>,
    },

    #[error("Resizing {from_width}x{from_height} to {to_width}x{to_height} failed: {message}")]
    ResizeFailed {
        from_width: u32,
        from_height: u32,
        to_width: u32,
        to_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Could not encode {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    /// A configuration value could not be used
    #[error("{name}={value:?} rejected: {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Internal failure: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl CompressorError {
    pub fn missing_input() -> Self {
        Self::MissingInput
    }

    pub fn upload_rejected(message: impl Into<Cow<'static, str>>) -> Self {
        Self::UploadRejected {
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn corrupted_image() -> Self {
        Self::CorruptedImage
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn timeout(stage: impl Into<Cow<'static, str>>, limit_ms: u64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            limit_ms,
        }
    }

    pub fn invalid_crop_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidCropDimensions { width, height }
    }

    pub fn invalid_resize_dimensions(width: Option<u32>, height: Option<u32>) -> Self {
        Self::InvalidResizeDimensions { width, height }
    }

    pub fn resize_failed(
        from: (u32, u32),
        to: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            from_width: from.0,
            from_height: from.1,
            to_width: to.0,
            to_height: to.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        use CompressorError::*;
        match self {
            MissingInput
            | UploadRejected { .. }
            | InvalidCropDimensions { .. }
            | InvalidResizeDimensions { .. }
            | InvalidArgument { .. } => ErrorCategory::UserError,

            UnsupportedFormat { .. }
            | DecodeFailed { .. }
            | CorruptedImage
            | ResizeFailed { .. }
            | EncodeFailed { .. } => ErrorCategory::CodecError,

            DimensionExceedsLimit { .. } | PixelCountExceedsLimit { .. } | Timeout { .. } => {
                ErrorCategory::ResourceLimit
            }

            InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }

    /// Whether a different upload or different options could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::UserError | ErrorCategory::ResourceLimit
        )
    }

    /// HTTP status the request boundary answers with.
    ///
    /// Decode failures are 500: upload validation should have rejected the
    /// file before it reached the pipeline. Timeouts answer 503, the other
    /// resource limits 413.
    pub fn http_status(&self) -> u16 {
        if matches!(self, Self::Timeout { .. }) {
            return 503;
        }
        match self.category() {
            ErrorCategory::UserError => 400,
            ErrorCategory::ResourceLimit => 413,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressorError>;
