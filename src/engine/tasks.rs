// src/engine/tasks.rs
//
// Pipeline orchestration.
// ProcessTask runs one image through every stage in a fixed order and
// encodes exactly once; BatchTask fans a set of ProcessTasks out over the
// global pool.

use crate::engine::decoder::{decode_image, detect_exif_orientation, ensure_dimensions_safe};
use crate::engine::encoder::encode;
use crate::engine::io::{output_file_name, unique_file_name, ImageBuffer};
use crate::engine::limits::UploadLimits;
use crate::engine::pipeline::{apply_orientation, make_even, plan_resize, resize_exact};
use crate::engine::pool;
use crate::engine::trim::trim;
use crate::error::{CompressorError, Result};
use crate::ops::{OutputFormat, ProcessingOptions, DEFAULT_QUALITY};
use crate::oplog::{self, OperationLog};
use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name used in upload messages when the client sent no file name.
const UNNAMED_UPLOAD: &str = "image";

/// Size bookkeeping for one processed image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent saved, `(1 - compressed / original) * 100` rounded to two
    /// decimals. Negative when the output grew.
    pub compression_ratio: f64,
}

impl CompressionSummary {
    pub fn new(original_size: u64, compressed_size: u64) -> Self {
        let compression_ratio = if original_size == 0 {
            0.0
        } else {
            let saved = (1.0 - compressed_size as f64 / original_size as f64) * 100.0;
            (saved * 100.0).round() / 100.0
        };
        Self {
            original_size,
            compressed_size,
            compression_ratio,
        }
    }
}

/// Everything the pipeline hands back for one image.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub bytes: Vec<u8>,
    pub output_mime_type: &'static str,
    pub logs: OperationLog,
    pub width: u32,
    pub height: u32,
    pub summary: CompressionSummary,
}

/// Decoded and transformed pixels waiting for the final encode.
#[derive(Debug)]
pub(crate) struct PreparedImage {
    img: DynamicImage,
    format: OutputFormat,
    logs: OperationLog,
}

/// One image plus the options and limits it is processed under.
#[derive(Clone, Debug)]
pub struct ProcessTask {
    pub image: ImageBuffer,
    pub options: ProcessingOptions,
    pub limits: UploadLimits,
}

impl ProcessTask {
    pub fn new(image: ImageBuffer, options: ProcessingOptions, limits: UploadLimits) -> Self {
        Self {
            image,
            options,
            limits,
        }
    }

    /// Output format chosen from the declared mime type.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_mime(&self.image.mime_type(), self.options.effective_quality())
    }

    /// Run the whole pipeline: decode -> orient -> trim -> resize -> even
    /// dimensions -> encode.
    ///
    /// All-or-nothing: any stage error fails the image, and nothing of the
    /// partial work is returned.
    pub fn run(&self) -> Result<PipelineOutput> {
        let started_at = Instant::now();
        let prepared = self.prepare(started_at)?;
        self.finish(prepared, started_at)
    }

    /// Stages 1-6. The wall-clock budget is checked after each stage that ran.
    pub(crate) fn prepare(&self, started_at: Instant) -> Result<PreparedImage> {
        let opts = &self.options;
        let name = self.image.file_name().unwrap_or(UNNAMED_UPLOAD);
        let input = self.image.bytes();

        if input.is_empty() {
            return Err(CompressorError::corrupted_image());
        }
        self.limits
            .validate(name, &self.image.mime_type(), input.len())?;

        let mut logs = OperationLog::new();

        // 1. Decode, then normalize orientation from the source EXIF
        ensure_dimensions_safe(input)?;
        let orientation = detect_exif_orientation(input);
        let (img, input_format) = decode_image(input)?;
        self.limits.enforce_pixels(img.width(), img.height())?;
        self.limits.enforce_timeout(started_at, "decode")?;
        debug!(
            input_format = input_format.as_str(),
            width = img.width(),
            height = img.height(),
            "decoded"
        );

        let mut img = match orientation {
            Some(o) if o > 1 => {
                let oriented = apply_orientation(img, o);
                debug!(orientation = o, width = oriented.width(), height = oriented.height(), "oriented");
                oriented
            }
            _ => img,
        };

        // 2. Trim
        if opts.trim_enabled {
            let before = img.dimensions();
            img = trim(img, opts.trim_mode);
            let after = img.dimensions();
            if before != after {
                logs.push(oplog::TRIM_IMAGE, opts.trim_mode.log_details());
            }
            debug!(mode = ?opts.trim_mode, width = after.0, height = after.1, "trimmed");
            self.limits.enforce_timeout(started_at, "trim")?;
        }

        // 3. Resize, against post-trim dimensions
        if let Some(plan) = plan_resize(img.dimensions(), opts)? {
            img = resize_exact(img, plan.width, plan.height)?;
            logs.push(oplog::RESIZE_IMAGE, plan.log_details());
            debug!(width = plan.width, height = plan.height, "resized");
            self.limits.enforce_timeout(started_at, "resize")?;
        }

        // 4. Format selection
        let format = self.output_format();
        let quality = opts.effective_quality();
        if quality != DEFAULT_QUALITY {
            logs.push(oplog::IMAGE_QUALITY, format!("Set quality to {quality}%"));
        }

        // 5. Even dimensions
        if opts.even_dimensions_enabled {
            let (adjusted, adjustment) = make_even(
                img,
                opts.even_dimensions_mode,
                opts.padding_width_side,
                opts.padding_height_side,
                format.supports_alpha(),
            )?;
            img = adjusted;
            if let Some(adjustment) = adjustment {
                logs.push(oplog::EVEN_DIMENSIONS, adjustment.log_details());
                debug!(width = img.width(), height = img.height(), "even dimensions applied");
            }
            self.limits.enforce_timeout(started_at, "even dimensions")?;
        }

        // 6. Filename bookkeeping, pixels untouched
        if let Some(suffix) = opts.filename_suffix() {
            logs.push(
                oplog::APPEND_FILENAME,
                format!("Appended \"{suffix}\" to filename"),
            );
        }

        Ok(PreparedImage { img, format, logs })
    }

    /// Stage 7: the single encode. Once encoding has started the result is
    /// always returned, whatever the elapsed time.
    pub(crate) fn finish(&self, prepared: PreparedImage, started_at: Instant) -> Result<PipelineOutput> {
        let PreparedImage { img, format, logs } = prepared;
        let name = self.image.file_name().unwrap_or(UNNAMED_UPLOAD);
        let bytes = encode(&img, format)?;

        let (width, height) = img.dimensions();
        let summary = CompressionSummary::new(self.image.len() as u64, bytes.len() as u64);
        info!(
            file = name,
            output_mime = format.mime_type(),
            bytes_in = summary.original_size,
            bytes_out = summary.compressed_size,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "image processed"
        );

        Ok(PipelineOutput {
            bytes,
            output_mime_type: format.mime_type(),
            logs,
            width,
            height,
            summary,
        })
    }
}

/// Per-image outcome of a batch. A failure belongs to its image only.
#[derive(Debug)]
pub struct BatchResult {
    /// Name of the uploaded file, `image` when none was given
    pub source: String,
    /// Download name, unique within the batch. None when processing failed.
    pub output_file_name: Option<String>,
    pub result: Result<PipelineOutput>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct BatchTask {
    pub tasks: Vec<ProcessTask>,
    /// Worker count for the global pool; only the first batch decides
    pub threads: Option<usize>,
}

impl BatchTask {
    pub fn new(tasks: Vec<ProcessTask>, threads: Option<usize>) -> Self {
        Self { tasks, threads }
    }

    /// Process every task, returning results in input order.
    pub fn run(&self) -> Vec<BatchResult> {
        let run_one = |task: &ProcessTask| -> Result<PipelineOutput> {
            let outcome = task.run();
            if let Err(err) = &outcome {
                warn!(
                    file = task.image.file_name().unwrap_or(UNNAMED_UPLOAD),
                    category = err.category().as_str(),
                    error = %err,
                    "image failed"
                );
            }
            outcome
        };

        let outcomes: Vec<Result<PipelineOutput>> = match pool::get_pool(self.threads) {
            Some(pool) => pool.install(|| self.tasks.par_iter().map(run_one).collect()),
            None => self.tasks.iter().map(run_one).collect(),
        };

        // Naming runs after the parallel section so duplicates resolve in input order
        let mut used = HashSet::new();
        self.tasks
            .iter()
            .zip(outcomes)
            .map(|(task, result)| {
                let source = task
                    .image
                    .file_name()
                    .unwrap_or(UNNAMED_UPLOAD)
                    .to_string();
                let download_name = result.as_ref().ok().map(|_| {
                    let name = output_file_name(
                        &source,
                        task.options.filename_suffix(),
                        task.output_format(),
                    );
                    let name = unique_file_name(&name, &used);
                    used.insert(name.clone());
                    name
                });
                BatchResult {
                    source,
                    output_file_name: download_name,
                    result,
                }
            })
            .collect()
    }
}
