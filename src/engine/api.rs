// src/engine/api.rs
//
// Compressor: the public entry point. Holds configuration and hands each
// image to a ProcessTask; batches go through BatchTask on the global pool.

use crate::config::CompressorConfig;
use crate::engine::io::ImageBuffer;
use crate::engine::tasks::{BatchResult, BatchTask, PipelineOutput, ProcessTask};
use crate::error::Result;
use crate::ops::ProcessingOptions;
use crate::request::{CompressionRequest, CompressionResponse, FormField};

/// The image compression service core.
///
/// Usage:
/// ```no_run
/// use image_compressor::{Compressor, CompressorConfig, ImageBuffer, ProcessingOptions};
///
/// let compressor = Compressor::new(CompressorConfig::default());
/// let bytes = std::fs::read("photo.png").unwrap();
/// let output = compressor
///     .process(ImageBuffer::new(bytes, "image/png"), &ProcessingOptions::default())
///     .unwrap();
/// println!("{} -> {} bytes", output.summary.original_size, output.bytes.len());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Compressor {
    config: CompressorConfig,
}

impl Compressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Run one image through the pipeline.
    pub fn process(&self, image: ImageBuffer, options: &ProcessingOptions) -> Result<PipelineOutput> {
        self.task(image, options.clone()).run()
    }

    /// Run a parsed form request.
    pub fn process_request(&self, request: CompressionRequest) -> Result<PipelineOutput> {
        self.task(request.image, request.options).run()
    }

    /// Parse form fields, run the pipeline and frame the response.
    /// A request without an image never reaches the pipeline.
    pub fn handle_form(&self, fields: impl IntoIterator<Item = FormField>) -> CompressionResponse {
        let result = CompressionRequest::from_fields(fields).and_then(|req| self.process_request(req));
        CompressionResponse::from_result(&result)
    }

    /// Process several images in parallel. Results come back in input
    /// order, one per image, and a failure only affects its own entry.
    pub fn process_batch(&self, items: Vec<(ImageBuffer, ProcessingOptions)>) -> Vec<BatchResult> {
        let tasks = items
            .into_iter()
            .map(|(image, options)| self.task(image, options))
            .collect();
        BatchTask::new(tasks, self.config.threads).run()
    }

    fn task(&self, image: ImageBuffer, options: ProcessingOptions) -> ProcessTask {
        ProcessTask::new(image, options, self.config.limits.clone())
    }
}
