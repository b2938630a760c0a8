// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Codec crates wrap C libraries (libjpeg, libwebp, libavif) and some of their
// Rust bindings panic on malformed input. Every codec call goes through
// run_with_panic_policy so a panic becomes a per-image error instead of
// tearing down a batch worker.

use crate::error::CompressorError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

pub type EngineResult<T> = std::result::Result<T, CompressorError>;

/// Run `f`, converting a panic into `CompressorError::InternalPanic`.
///
/// `context` names the codec call (e.g. `"decode:mozjpeg"`) and is included
/// in both the log event and the error message.
pub fn run_with_panic_policy<T, F>(context: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(context, %message, "codec panicked");
            Err(CompressorError::internal_panic(format!(
                "{context}: {message}"
            )))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
