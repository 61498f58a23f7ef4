//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output for development.
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    /// Resolve the format from `RUST_ENV`.
    pub fn from_env() -> Self {
        Self::detect(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn detect(env: Option<&str>) -> Self {
        match env {
            Some("production") | Some("prod") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber.
///
/// `default_directives` seeds the filter when `RUST_LOG` is unset.
/// Fails when the directives are malformed or a subscriber is
/// already installed.
pub fn init_logging(default_directives: &str, format: LogFormat) -> TelemetryResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    }
    .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(LogFormat::detect(None), LogFormat::Pretty);
        assert_eq!(LogFormat::detect(Some("development")), LogFormat::Pretty);
        assert_eq!(LogFormat::detect(Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::detect(Some("prod")), LogFormat::Json);
    }
}
