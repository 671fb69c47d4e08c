//! # Structured Logging Module
//!
//! Environment-aware `tracing` initialization for services embedding the
//! mediator. Safe to call more than once and from processes that already
//! installed a global subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// The filter comes from `MEDIATE_LOG` (falling back to `RUST_LOG`, then an
/// environment-derived default). Output is JSON in production, or whenever
/// `MEDIATE_LOG_FORMAT=json`; human-readable otherwise. If a global
/// subscriber is already set, the existing one is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = std::env::var("MEDIATE_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| default_log_level(&environment));

        // Production emits JSON lines for log aggregation; everything else
        // keeps the human-readable format.
        let result = if use_json_format(&environment) {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(filter)),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_filter(EnvFilter::new(filter)),
                )
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized; keeping existing one");
        }
    });
}

fn use_json_format(environment: &str) -> bool {
    match std::env::var("MEDIATE_LOG_FORMAT") {
        Ok(format) => format.eq_ignore_ascii_case("json"),
        Err(_) => environment == "production",
    }
}

fn get_environment() -> String {
    std::env::var("MEDIATE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_levels() {
        assert_eq!(default_log_level("production"), "info");
        assert_eq!(default_log_level("development"), "debug");
        assert_eq!(default_log_level("test"), "debug");
    }

    #[test]
    fn test_json_format_defaults_by_environment() {
        if std::env::var("MEDIATE_LOG_FORMAT").is_ok() {
            return;
        }
        assert!(use_json_format("production"));
        assert!(!use_json_format("development"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
