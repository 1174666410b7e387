//! Logging initialization and span helpers.
//!
//! All components log through `tracing` with structured fields; the binary
//! picks JSON output on the appliance and pretty output in debug mode.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (journald / log shipping).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Safe to call multiple times; subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `mediahub_core=debug`)
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

/// Creates a span for a presented-process transition.
#[must_use]
pub fn launch_span(operation: &str, target: &str) -> Span {
    tracing::info_span!("launch", op = operation, presented = target)
}

/// Creates a span for a CEC adapter invocation.
#[must_use]
pub fn cec_span(command: &str) -> Span {
    tracing::info_span!("cec", command = command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = launch_span("launch", "youtube");
        let _guard = span.enter();
        let inner = cec_span("standby");
        let _inner = inner.enter();
        tracing::info!("message in nested spans");
    }
}
