// src/config.rs
//
// Runtime configuration: upload limits, batch thread count and log filter.
// Defaults apply unless overridden through IMAGE_COMPRESSOR_* variables.

use crate::engine::{UploadLimits, UploadPolicy, MAX_THREADS};
use crate::error::{CompressorError, Result};

pub const ENV_POLICY: &str = "IMAGE_COMPRESSOR_POLICY";
pub const ENV_MAX_BYTES: &str = "IMAGE_COMPRESSOR_MAX_BYTES";
pub const ENV_TIMEOUT_MS: &str = "IMAGE_COMPRESSOR_TIMEOUT_MS";
pub const ENV_THREADS: &str = "IMAGE_COMPRESSOR_THREADS";
pub const ENV_LOG: &str = "RUST_LOG";

pub const DEFAULT_LOG_FILTER: &str = "image_compressor=info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressorConfig {
    pub limits: UploadLimits,
    /// Batch worker count; None uses available_parallelism()
    pub threads: Option<usize>,
    pub log_filter: String,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            threads: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CompressorConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key/value source.
    ///
    /// The policy is applied first; explicit byte and timeout values then
    /// override the policy's own numbers. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_POLICY) {
            let policy = UploadPolicy::parse(&raw).ok_or_else(|| {
                CompressorError::invalid_argument(
                    ENV_POLICY,
                    raw.clone(),
                    "expected one of strict, lenient, disabled, custom",
                )
            })?;
            config.limits = UploadLimits::apply_policy(policy);
        }
        if let Some(raw) = get(ENV_MAX_BYTES) {
            config.limits.max_bytes = Some(parse_positive(ENV_MAX_BYTES, &raw)?);
        }
        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            config.limits.timeout_ms = Some(parse_positive(ENV_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = get(ENV_THREADS) {
            let threads = parse_positive(ENV_THREADS, &raw)?;
            if threads > MAX_THREADS as u64 {
                return Err(CompressorError::invalid_argument(
                    ENV_THREADS,
                    raw,
                    format!("must be at most {MAX_THREADS}"),
                ));
            }
            config.threads = Some(threads as usize);
        }
        if let Some(filter) = get(ENV_LOG) {
            config.log_filter = filter;
        }
        Ok(config)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(CompressorError::invalid_argument(
            name,
            raw.to_string(),
            "expected a positive integer",
        )),
    }
}
