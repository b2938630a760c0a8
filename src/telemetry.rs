// src/telemetry.rs
//
// tracing subscriber setup. Library code only emits events; installing a
// subscriber is left to the embedding binary or test.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `filter` (EnvFilter syntax, e.g.
/// `image_compressor=debug`).
///
/// Returns false when a global subscriber was already set; calling it
/// twice is harmless. An unparsable filter falls back to `info`.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing("image_compressor=debug");
        assert!(!init_tracing("not a [valid filter"));
    }
}
