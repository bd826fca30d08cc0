//! # Structured Logging Module
//!
//! Environment-aware tracing initialization for hosts embedding the core.
//! Console output by default; JSON output when `CADENCE_LOG_FORMAT=json`
//! for log aggregation pipelines.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Filter level comes from `CADENCE_LOG` (falling back to `RUST_LOG`, then
/// the environment default: `debug` for development/test, `info` otherwise).
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = env_filter(&environment);
        let json_output = std::env::var("CADENCE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json_output {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init()
        };

        // A host may have installed its own subscriber already; not an error
        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing one"
            );
        } else {
            tracing::info!(
                environment = %environment,
                json = json_output,
                "Structured logging initialized"
            );
        }
    });
}

fn get_environment() -> String {
    std::env::var("CADENCE_ENV").unwrap_or_else(|_| "development".to_string())
}

fn env_filter(environment: &str) -> EnvFilter {
    let default_level = match environment {
        "production" => "info",
        _ => "debug",
    };

    if let Ok(filter) = std::env::var("CADENCE_LOG") {
        EnvFilter::new(filter)
    } else if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else {
        EnvFilter::new(default_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
