// src/request.rs
//
// Form-field boundary: multipart fields in, ProcessingOptions out; pipeline
// output or error in, status + headers + body out. No HTTP server lives
// here, only the framing a server would forward.

use crate::engine::{ImageBuffer, PipelineOutput};
use crate::error::{CompressorError, ErrorCategory, Result};
use crate::ops::{
    EvenDimensionsMode, HeightSide, ProcessingOptions, ResizeMode, TrimMode, WidthSide,
    DEFAULT_QUALITY, MAX_RESIZE_PERCENTAGE,
};
use std::collections::HashMap;

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_COMPRESSION_LOGS: &str = "X-Compression-Logs";

/// Body message for codec and internal failures. Details stay in the logs.
pub const GENERIC_FAILURE_MESSAGE: &str = "Image processing failed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File {
        bytes: Vec<u8>,
        mime_type: String,
        file_name: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        file_name: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::File {
                bytes: bytes.into(),
                mime_type: mime_type.into(),
                file_name,
            },
        }
    }
}

/// A parsed compression request, ready for the pipeline.
#[derive(Clone, Debug)]
pub struct CompressionRequest {
    pub image: ImageBuffer,
    pub options: ProcessingOptions,
}

impl CompressionRequest {
    /// Parse multipart form fields.
    ///
    /// The first occurrence of a field wins. Malformed option values fall
    /// back to their defaults instead of failing; the only hard error is a
    /// missing `image` file.
    pub fn from_fields(fields: impl IntoIterator<Item = FormField>) -> Result<Self> {
        let mut texts: HashMap<String, String> = HashMap::new();
        let mut image = None;

        for field in fields {
            match field.value {
                FieldValue::File {
                    bytes,
                    mime_type,
                    file_name,
                } if field.name == "image" && image.is_none() => {
                    let mut buffer = ImageBuffer::new(bytes, mime_type);
                    if let Some(name) = file_name {
                        buffer = buffer.with_file_name(name);
                    }
                    image = Some(buffer);
                }
                FieldValue::Text(value) => {
                    texts.entry(field.name).or_insert(value);
                }
                FieldValue::File { .. } => {}
            }
        }

        let image = image.ok_or_else(CompressorError::missing_input)?;
        let options = parse_options(&texts);
        Ok(Self { image, options })
    }
}

fn parse_options(fields: &HashMap<String, String>) -> ProcessingOptions {
    let text = |name: &str| fields.get(name).map(String::as_str);
    let flag = |name: &str| text(name) == Some("true");

    let quality = match text("quality").and_then(parse_int) {
        Some(0) | None => DEFAULT_QUALITY,
        Some(q) => q.clamp(1, 100) as u8,
    };

    ProcessingOptions {
        quality,
        trim_enabled: flag("trimEnabled"),
        trim_mode: text("trimMode")
            .and_then(TrimMode::parse)
            .unwrap_or_default(),
        resize_enabled: flag("resizeEnabled"),
        resize_mode: text("resizeMode")
            .and_then(ResizeMode::parse)
            .unwrap_or_default(),
        resize_width: text("resizeWidth").and_then(parse_positive),
        resize_height: text("resizeHeight").and_then(parse_positive),
        resize_percentage: text("resizePercentage")
            .and_then(parse_int)
            .map(|p| p.clamp(1, i64::from(MAX_RESIZE_PERCENTAGE)) as u32),
        even_dimensions_enabled: flag("evenDimensionsEnabled"),
        even_dimensions_mode: text("evenDimensionsMode")
            .and_then(EvenDimensionsMode::parse)
            .unwrap_or_default(),
        padding_width_side: text("paddingWidthSide")
            .and_then(WidthSide::parse)
            .unwrap_or_default(),
        padding_height_side: text("paddingHeightSide")
            .and_then(HeightSide::parse)
            .unwrap_or_default(),
        append_filename_enabled: flag("appendFilenameEnabled"),
        append_filename_text: text("appendFilenameText")
            .unwrap_or_default()
            .to_string(),
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
/// Trailing garbage is ignored (`"80px"` -> 80); no digits -> None.
pub fn parse_int(value: &str) -> Option<i64> {
    let s = value.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    // Saturate instead of failing on absurdly long digit runs
    let magnitude = rest[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_positive(value: &str) -> Option<u32> {
    parse_int(value)
        .filter(|v| *v > 0)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// What a server should answer with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl CompressionResponse {
    pub fn from_output(output: &PipelineOutput) -> Self {
        Self {
            status: 200,
            headers: vec![
                (HEADER_CONTENT_TYPE, output.output_mime_type.to_string()),
                (HEADER_CONTENT_LENGTH, output.bytes.len().to_string()),
                (HEADER_COMPRESSION_LOGS, output.logs.to_header_value()),
            ],
            body: output.bytes.clone(),
        }
    }

    /// JSON error body `{"message": ...}`. User-facing messages are passed
    /// through; codec and internal failures get the generic message.
    pub fn from_error(err: &CompressorError) -> Self {
        let message = match err.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => err.to_string(),
            ErrorCategory::CodecError | ErrorCategory::InternalBug => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        };
        let body = serde_json::json!({ "message": message }).to_string().into_bytes();
        Self {
            status: err.http_status(),
            headers: vec![
                (HEADER_CONTENT_TYPE, "application/json".to_string()),
                (HEADER_CONTENT_LENGTH, body.len().to_string()),
            ],
            body,
        }
    }

    pub fn from_result(result: &Result<PipelineOutput>) -> Self {
        match result {
            Ok(output) => Self::from_output(output),
            Err(err) => Self::from_error(err),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompressionSummary;
    use crate::oplog::{OperationLog, RESIZE_IMAGE};

    fn image_field() -> FormField {
        FormField::file("image", vec![1, 2, 3], "image/png", Some("a.png".into()))
    }

    fn parse(fields: Vec<FormField>) -> ProcessingOptions {
        let mut all = vec![image_field()];
        all.extend(fields);
        CompressionRequest::from_fields(all).unwrap().options
    }

    mod parse_int_tests {
        use super::*;

        #[test]
        fn test_leading_digits() {
            assert_eq!(parse_int("80"), Some(80));
            assert_eq!(parse_int("  42px"), Some(42));
            assert_eq!(parse_int("-7"), Some(-7));
            assert_eq!(parse_int("+3"), Some(3));
            assert_eq!(parse_int("12.9"), Some(12));
        }

        #[test]
        fn test_no_digits() {
            assert_eq!(parse_int(""), None);
            assert_eq!(parse_int("abc"), None);
            assert_eq!(parse_int("-"), None);
            assert_eq!(parse_int("px42"), None);
        }

        #[test]
        fn test_huge_values_saturate() {
            assert_eq!(parse_int("99999999999999999999999"), Some(i64::MAX));
        }
    }

    mod request_tests {
        use super::*;

        #[test]
        fn test_missing_image_is_rejected() {
            let err = CompressionRequest::from_fields(vec![FormField::text("quality", "80")])
                .unwrap_err();
            assert_eq!(err, CompressorError::MissingInput);
        }

        #[test]
        fn test_text_image_field_is_not_an_upload() {
            let err = CompressionRequest::from_fields(vec![FormField::text("image", "x")])
                .unwrap_err();
            assert_eq!(err, CompressorError::MissingInput);
        }

        #[test]
        fn test_defaults_when_only_image_present() {
            let req = CompressionRequest::from_fields(vec![image_field()]).unwrap();
            assert_eq!(req.options, ProcessingOptions::default());
            assert_eq!(req.image.file_name(), Some("a.png"));
            assert_eq!(req.image.mime_type(), "image/png");
        }

        #[test]
        fn test_quality_rules() {
            let q = |v: &str| parse(vec![FormField::text("quality", v)]).quality;
            assert_eq!(q("60"), 60);
            assert_eq!(q("abc"), 75);
            assert_eq!(q("0"), 75);
            assert_eq!(q("250"), 100);
            assert_eq!(q("-5"), 1);
        }

        #[test]
        fn test_booleans_must_be_exactly_true() {
            let opts = parse(vec![
                FormField::text("trimEnabled", "true"),
                FormField::text("resizeEnabled", "TRUE"),
                FormField::text("evenDimensionsEnabled", "1"),
            ]);
            assert!(opts.trim_enabled);
            assert!(!opts.resize_enabled);
            assert!(!opts.even_dimensions_enabled);
        }

        #[test]
        fn test_resize_fields() {
            let opts = parse(vec![
                FormField::text("resizeMode", "percentage"),
                FormField::text("resizeWidth", "0"),
                FormField::text("resizeHeight", "600"),
                FormField::text("resizePercentage", "900"),
            ]);
            assert_eq!(opts.resize_mode, ResizeMode::Percentage);
            assert_eq!(opts.resize_width, None);
            assert_eq!(opts.resize_height, Some(600));
            assert_eq!(opts.resize_percentage, Some(400));
        }

        #[test]
        fn test_unknown_enums_fall_back() {
            let opts = parse(vec![
                FormField::text("trimMode", "sideways"),
                FormField::text("evenDimensionsMode", "remove"),
                FormField::text("paddingWidthSide", "middle"),
                FormField::text("paddingHeightSide", "top"),
            ]);
            assert_eq!(opts.trim_mode, TrimMode::Transparency);
            assert_eq!(opts.even_dimensions_mode, EvenDimensionsMode::Remove);
            assert_eq!(opts.padding_width_side, WidthSide::Left);
            assert_eq!(opts.padding_height_side, HeightSide::Top);
        }

        #[test]
        fn test_first_occurrence_wins() {
            let opts = parse(vec![
                FormField::text("quality", "40"),
                FormField::text("quality", "90"),
            ]);
            assert_eq!(opts.quality, 40);
        }
    }

    mod response_tests {
        use super::*;

        fn output() -> PipelineOutput {
            let mut logs = OperationLog::new();
            logs.push(RESIZE_IMAGE, "Resized to 10px width and auto height");
            PipelineOutput {
                bytes: vec![0u8; 12],
                output_mime_type: "image/webp",
                logs,
                width: 10,
                height: 8,
                summary: CompressionSummary::new(24, 12),
            }
        }

        #[test]
        fn test_success_headers() {
            let resp = CompressionResponse::from_output(&output());
            assert_eq!(resp.status, 200);
            assert_eq!(resp.header("content-type"), Some("image/webp"));
            assert_eq!(resp.header("Content-Length"), Some("12"));
            let logs = OperationLog::from_header_value(
                resp.header(HEADER_COMPRESSION_LOGS).unwrap(),
            )
            .unwrap();
            assert_eq!(logs.len(), 1);
        }

        #[test]
        fn test_missing_input_body() {
            let resp = CompressionResponse::from_error(&CompressorError::MissingInput);
            assert_eq!(resp.status, 400);
            assert_eq!(resp.body, br#"{"message":"No image uploaded"}"#);
        }

        #[test]
        fn test_codec_errors_are_generic() {
            let resp =
                CompressionResponse::from_error(&CompressorError::decode_failed("bad huffman"));
            assert_eq!(resp.status, 500);
            let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
            assert_eq!(body["message"], GENERIC_FAILURE_MESSAGE);
        }

        #[test]
        fn test_resource_limit_status() {
            let resp = CompressionResponse::from_error(
                &CompressorError::pixel_count_exceeds_limit(50_000_000, 40_000_000),
            );
            assert_eq!(resp.status, 413);
        }

        #[test]
        fn test_timeout_status_and_message() {
            let resp = CompressionResponse::from_error(&CompressorError::timeout("resize", 10));
            assert_eq!(resp.status, 503);
            let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
            assert_eq!(
                body["message"],
                "Processing took longer than 10ms (stopped after resize)"
            );
        }
    }
}
