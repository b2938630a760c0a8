// src/oplog.rs
//
// Operation log: the side channel describing which stages actually changed
// an image. Entries are appended in pipeline order and never edited.

use serde::{Deserialize, Serialize};

pub const TRIM_IMAGE: &str = "Trim Image";
pub const RESIZE_IMAGE: &str = "Resize Image";
pub const IMAGE_QUALITY: &str = "Image Quality";
pub const EVEN_DIMENSIONS: &str = "Even Dimensions";
pub const APPEND_FILENAME: &str = "Append Filename";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub operation: String,
    pub details: String,
}

impl OperationLogEntry {
    pub fn new(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            details: details.into(),
        }
    }
}

/// Append-only, ordered. Serializes as a plain JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog {
    entries: Vec<OperationLogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: impl Into<String>, details: impl Into<String>) {
        self.entries.push(OperationLogEntry::new(operation, details));
    }

    pub fn entries(&self) -> &[OperationLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry has the given operation name.
    pub fn contains(&self, operation: &str) -> bool {
        self.entries.iter().any(|e| e.operation == operation)
    }

    /// Value for the `X-Compression-Logs` response header.
    pub fn to_header_value(&self) -> String {
        // Serializing a Vec of two-string structs cannot fail
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn from_header_value(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }
}

impl IntoIterator for OperationLog {
    type Item = OperationLogEntry;
    type IntoIter = std::vec::IntoIter<OperationLogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperationLog {
    type Item = &'a OperationLogEntry;
    type IntoIter = std::slice::Iter<'a, OperationLogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
