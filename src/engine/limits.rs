// src/engine/limits.rs
//
// Upload limits: accepted types, byte size, pixel count and wall-clock
// budget per image. Off by default; Strict and Lenient are presets an
// upload front end opts into. The global MAX_DIMENSION / MAX_PIXELS checks
// in the decoder apply regardless of policy.

use crate::error::CompressorError;
use crate::ops::normalize_mime;
use std::time::{Duration, Instant};

const STRICT_MAX_BYTES: u64 = 2_621_440; // 2.5MB, the upload form's own limit
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024;
const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000;
const STRICT_TIMEOUT_MS: u64 = 30_000;
const LENIENT_TIMEOUT_MS: u64 = 120_000;

/// Declared mime types accepted at upload.
pub const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/avif"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadPolicy {
    #[default]
    Disabled,
    Strict,
    Lenient,
    Custom,
}

impl UploadPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Some(Self::Disabled),
            "strict" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub policy: UploadPolicy,
    pub max_bytes: Option<u64>,
    pub max_pixels: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::disabled()
    }
}

impl UploadLimits {
    pub fn disabled() -> Self {
        Self {
            policy: UploadPolicy::Disabled,
            max_bytes: None,
            max_pixels: None,
            timeout_ms: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            policy: UploadPolicy::Strict,
            max_bytes: Some(STRICT_MAX_BYTES),
            max_pixels: Some(STRICT_MAX_PIXELS),
            timeout_ms: Some(STRICT_TIMEOUT_MS),
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: UploadPolicy::Lenient,
            max_bytes: Some(LENIENT_MAX_BYTES),
            max_pixels: Some(LENIENT_MAX_PIXELS),
            timeout_ms: Some(LENIENT_TIMEOUT_MS),
        }
    }

    /// Custom limits start unbounded; set the fields you need.
    pub fn custom() -> Self {
        Self {
            policy: UploadPolicy::Custom,
            ..Self::disabled()
        }
    }

    pub fn apply_policy(policy: UploadPolicy) -> Self {
        match policy {
            UploadPolicy::Disabled => Self::disabled(),
            UploadPolicy::Strict => Self::strict(),
            UploadPolicy::Lenient => Self::lenient(),
            UploadPolicy::Custom => Self::custom(),
        }
    }

    fn enabled(&self) -> bool {
        self.policy != UploadPolicy::Disabled
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|_| self.enabled())
            .map(Duration::from_millis)
    }

    /// Check declared type and size of an upload before any decoding.
    pub fn validate(&self, name: &str, mime_type: &str, len: usize) -> Result<(), CompressorError> {
        if !self.enabled() {
            return Ok(());
        }
        let mime = normalize_mime(mime_type);
        if !ALLOWED_TYPES.contains(&mime.as_str()) {
            return Err(CompressorError::upload_rejected(format!(
                "{name}: Invalid file type. Only JPEG, PNG, WebP, and AVIF are allowed."
            )));
        }
        if let Some(limit) = self.max_bytes {
            if len as u64 > limit {
                return Err(CompressorError::upload_rejected(format!(
                    "{name}: File size exceeds {} limit.",
                    format_megabytes(limit)
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<(), CompressorError> {
        if !self.enabled() {
            return Ok(());
        }
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                return Err(CompressorError::pixel_count_exceeds_limit(pixels, limit));
            }
        }
        Ok(())
    }

    /// Fail with `Timeout` if the image has used up its wall-clock budget.
    /// Checked at stage boundaries only; a running codec call is not
    /// interrupted.
    pub fn enforce_timeout(&self, started_at: Instant, stage: &'static str) -> Result<(), CompressorError> {
        match self.timeout() {
            Some(limit) if started_at.elapsed() > limit => Err(CompressorError::timeout(
                stage,
                limit.as_millis() as u64,
            )),
            _ => Ok(()),
        }
    }
}

/// `2621440` -> `2.5MB`, `50331648` -> `48MB`
fn format_megabytes(bytes: u64) -> String {
    let mb = format!("{:.2}", bytes as f64 / (1024.0 * 1024.0));
    let trimmed = mb.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}MB")
}
