// src/engine/io.rs
//
// Input buffers and output file naming.

use crate::ops::{normalize_mime, OutputFormat};
use std::collections::HashSet;
use std::sync::Arc;

/// An uploaded image: encoded bytes plus what the client declared about them.
///
/// Bytes are shared, never mutated. Cloning an ImageBuffer is cheap, which
/// lets a batch hand the same upload to several workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    bytes: Arc<Vec<u8>>,
    mime_type: String,
    file_name: Option<String>,
}

impl ImageBuffer {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: Arc::new(bytes.into()),
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn from_shared(bytes: Arc<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    /// Declared mime type, normalized (lowercase, parameters dropped).
    pub fn mime_type(&self) -> String {
        normalize_mime(&self.mime_type)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// File name without its last extension: `photo.final.png` -> `photo.final`.
/// Names without a usable stem are returned whole.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Last extension without the dot, or `""` when there is none.
pub fn file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx + 1..],
        _ => "",
    }
}

/// Download name for a processed image.
///
/// The suffix goes before the extension. When the output was forced to JPEG
/// the extension follows the output, otherwise the original extension is
/// kept as uploaded (`photo.JPEG` stays `photo.JPEG`).
pub fn output_file_name(original: &str, suffix: Option<&str>, output: OutputFormat) -> String {
    let stem = file_stem(original);
    let ext = file_extension(original);
    let suffix = suffix.unwrap_or_default();

    let ext = match output {
        OutputFormat::Jpeg { .. } if !matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg") => {
            output.extension()
        }
        _ if ext.is_empty() => output.extension(),
        _ => ext,
    };
    format!("{stem}{suffix}.{ext}")
}

/// Disambiguate `name` against names already used in the same batch:
/// `a.png`, `a-v2.png`, `a-v3.png`, ...
pub fn unique_file_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }
    let stem = file_stem(name);
    let ext = file_extension(name);
    (2u32..)
        .map(|n| {
            if ext.is_empty() {
                format!("{stem}-v{n}")
            } else {
                format!("{stem}-v{n}.{ext}")
            }
        })
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
