// src/ops.rs
//
// Processing options and the output format variant.
// Options are plain data: cheap to clone, validated at the request boundary,
// interpreted only by the pipeline in engine/tasks.rs.

use serde::{Deserialize, Serialize};

/// Quality used when the request does not carry one.
pub const DEFAULT_QUALITY: u8 = 75;

/// Upper bound for percentage resizing.
pub const MAX_RESIZE_PERCENTAGE: u32 = 400;

/// Which border colour(s) the trim stage strips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// Rows/columns whose pixels all have alpha = 0
    #[default]
    Transparency,
    /// Rows/columns of opaque #FFFFFF
    White,
    /// Transparency pass, then a white pass on the materialized result
    Both,
}

impl TrimMode {
    /// Parse a form value. Unknown values yield None so the caller can
    /// fall back to the default.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transparency" | "transparent" => Some(Self::Transparency),
            "white" => Some(Self::White),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub(crate) fn log_details(&self) -> &'static str {
        match self {
            TrimMode::Both => "Removed transparent and white edges",
            TrimMode::Transparency => "Removed transparent edges",
            TrimMode::White => "Removed white edges",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Explicit width and/or height
    #[default]
    Manual,
    /// Uniform scale factor against the current (post-trim) size
    Percentage,
}

impl ResizeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "percentage" | "percent" => Some(Self::Percentage),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvenDimensionsMode {
    /// Extend an odd axis by one pixel
    #[default]
    Add,
    /// Crop one pixel from an odd axis
    Remove,
}

impl EvenDimensionsMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Horizontal edge touched by even-dimension adjustment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthSide {
    #[default]
    Left,
    Right,
}

impl WidthSide {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WidthSide::Left => "left",
            WidthSide::Right => "right",
        }
    }
}

/// Vertical edge touched by even-dimension adjustment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightSide {
    Top,
    #[default]
    Bottom,
}

impl HeightSide {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeightSide::Top => "top",
            HeightSide::Bottom => "bottom",
        }
    }
}

/// Everything a caller can ask of the pipeline for one image.
///
/// Resize fields that do not belong to the active `resize_mode` are carried
/// but ignored; they are never validated as errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    /// Encode quality for lossy formats (1-100)
    pub quality: u8,

    pub trim_enabled: bool,
    pub trim_mode: TrimMode,

    pub resize_enabled: bool,
    pub resize_mode: ResizeMode,
    /// Target width in pixels (manual mode)
    pub resize_width: Option<u32>,
    /// Target height in pixels (manual mode)
    pub resize_height: Option<u32>,
    /// Scale factor in percent (percentage mode, 1-400)
    pub resize_percentage: Option<u32>,

    pub even_dimensions_enabled: bool,
    pub even_dimensions_mode: EvenDimensionsMode,
    pub padding_width_side: WidthSide,
    pub padding_height_side: HeightSide,

    /// Cosmetic only: the suffix is recorded in the log, never applied to pixels
    pub append_filename_enabled: bool,
    pub append_filename_text: String,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            trim_enabled: false,
            trim_mode: TrimMode::default(),
            resize_enabled: false,
            resize_mode: ResizeMode::default(),
            resize_width: None,
            resize_height: None,
            resize_percentage: None,
            even_dimensions_enabled: false,
            even_dimensions_mode: EvenDimensionsMode::default(),
            padding_width_side: WidthSide::default(),
            padding_height_side: HeightSide::default(),
            append_filename_enabled: false,
            append_filename_text: String::new(),
        }
    }
}

impl ProcessingOptions {
    /// Quality clamped into the encodable range.
    pub fn effective_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }

    /// Suffix to append to the download name, if the option is active.
    pub fn filename_suffix(&self) -> Option<&str> {
        if self.append_filename_enabled && !self.append_filename_text.is_empty() {
            Some(self.append_filename_text.as_str())
        } else {
            None
        }
    }
}

/// Output format for encoding.
///
/// Chosen once from the declared input mime type. Anything that is not
/// PNG, WebP or AVIF is re-encoded as progressive JPEG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png { quality: u8 },
    WebP { quality: u8 },
    Avif { quality: u8 },
}

impl OutputFormat {
    pub fn from_mime(mime_type: &str, quality: u8) -> Self {
        let quality = quality.clamp(1, 100);
        match normalize_mime(mime_type).as_str() {
            "image/png" => Self::Png { quality },
            "image/webp" => Self::WebP { quality },
            "image/avif" => Self::Avif { quality },
            _ => Self::Jpeg { quality },
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "image/jpeg",
            OutputFormat::Png { .. } => "image/png",
            OutputFormat::WebP { .. } => "image/webp",
            OutputFormat::Avif { .. } => "image/avif",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "jpeg",
            OutputFormat::Png { .. } => "png",
            OutputFormat::WebP { .. } => "webp",
            OutputFormat::Avif { .. } => "avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "jpg",
            OutputFormat::Png { .. } => "png",
            OutputFormat::WebP { .. } => "webp",
            OutputFormat::Avif { .. } => "avif",
        }
    }

    /// JPEG cannot carry alpha, so padding is white there and transparent
    /// everywhere else.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpeg { .. })
    }
}

/// Lowercase a mime type and drop any parameters (`; charset=...`).
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
