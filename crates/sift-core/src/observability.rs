//! Observability infrastructure for Sift.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors so every conditioning run is
//! traceable by its run ID and file name across all components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `sift_conditioner=debug`)
///
/// # Example
///
/// ```rust
/// use sift_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one conditioning run with standard fields.
///
/// # Example
///
/// ```rust
/// use sift_core::observability::pipeline_span;
///
/// let span = pipeline_span("condition", "01J8ZQ4X9Y0000000000000000", "metrics.parquet");
/// let _guard = span.enter();
/// // ... do pipeline work
/// ```
#[must_use]
pub fn pipeline_span(operation: &str, run_id: &str, file: &str) -> Span {
    tracing::info_span!(
        "pipeline",
        op = operation,
        run_id = run_id,
        file = file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn span_helper_creates_span() {
        let span = pipeline_span("condition", "run_123", "metrics.parquet");
        let _guard = span.enter();
        tracing::info!("test message in span");
    }
}
