//! Subscriber setup for applications embedding the database layer.
//!
//! # Environment Variables
//!
//! - `WATCHDOG_LOG_LEVEL=trace|debug|info|warn|error` - Log level for the
//!   `watchdog_*` crates (default: `info`)
//! - `WATCHDOG_LOG_FORMAT=json|pretty|compact` - Output format (default: `json`)
//!
//! Statements are logged at `debug`; pool lifecycle and commits at `info`;
//! rollbacks and discarded connections at `warn`.

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Log level from a variable lookup.
pub fn log_level(lookup: impl Fn(&str) -> Option<String>) -> &'static str {
    match lookup("WATCHDOG_LOG_LEVEL").map(|v| v.to_lowercase()).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

/// Output format from a variable lookup.
pub fn log_format(lookup: impl Fn(&str) -> Option<String>) -> &'static str {
    match lookup("WATCHDOG_LOG_FORMAT").map(|v| v.to_lowercase()).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Install a global subscriber configured from the environment.
///
/// Subsequent calls, and calls after another subscriber was installed, are
/// no-ops.
pub fn init() {
    INIT.call_once(|| {
        let lookup = |key: &str| env::var(key).ok();
        let level = log_level(lookup);
        let format = log_format(lookup);
        let filter = EnvFilter::try_new(format!(
            "watchdog_db={level},watchdog_query={level},watchdog_mysql={level},watchdog_sqlite={level}"
        ))
        .unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = match format {
            "pretty" => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init(),
            "compact" => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init(),
            _ => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init(),
        };

        if installed.is_ok() {
            tracing::info!(level, format, "watchdog logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(log_level(|_| None), "info");
        assert_eq!(log_format(|_| None), "json");
    }

    #[test]
    fn test_overrides() {
        let lookup = |key: &str| match key {
            "WATCHDOG_LOG_LEVEL" => Some("DEBUG".to_string()),
            "WATCHDOG_LOG_FORMAT" => Some("compact".to_string()),
            _ => None,
        };
        assert_eq!(log_level(lookup), "debug");
        assert_eq!(log_format(lookup), "compact");
        assert_eq!(log_level(|_| Some("loud".to_string())), "info");
    }
}
