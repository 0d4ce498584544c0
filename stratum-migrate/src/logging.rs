//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries that do not install
//! their own subscriber can call [`init`] or [`init_with_config`] with the
//! `tracing-subscriber` feature enabled.
//!
//! # Environment Variables
//!
//! - `STRATUM_DEBUG=true|1|yes` - Enable debug logging
//! - `STRATUM_LOG_LEVEL=trace|debug|info|warn|error` - Set the log level
//! - `STRATUM_LOG_FORMAT=json|pretty|compact` - Set the output format (default: json)
//!
//! Environment variables win over the `[logging]` section of `stratum.toml`.
//!
//! ```rust,no_run
//! use stratum_migrate::logging;
//!
//! logging::init();
//! ```
//!
//! Purged ledger rows are logged at `info` with the full record attached:
//!
//! ```rust,ignore
//! info!(script = %applied.script, record = %json, "... purged its ledger row ...");
//! ```

use std::env;
use std::sync::Once;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check if debug logging is enabled via `STRATUM_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("STRATUM_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the log level from the environment, then `config`.
///
/// Defaults to "debug" if `STRATUM_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level(config: &LoggingConfig) -> &'static str {
    resolve_level(
        env::var("STRATUM_LOG_LEVEL").ok().as_deref(),
        config.level.as_deref(),
        is_debug_enabled(),
    )
}

/// Get the log format from the environment, then `config`. Defaults to "json".
pub fn get_log_format(config: &LoggingConfig) -> &'static str {
    resolve_format(
        env::var("STRATUM_LOG_FORMAT").ok().as_deref(),
        config.format.as_deref(),
    )
}

fn resolve_level(from_env: Option<&str>, from_config: Option<&str>, debug: bool) -> &'static str {
    let known = |raw: &str| {
        let raw = raw.to_lowercase();
        LEVELS.into_iter().find(|level| *level == raw)
    };

    from_env
        .and_then(known)
        .or_else(|| from_config.and_then(known))
        .unwrap_or(if debug { "debug" } else { "warn" })
}

fn resolve_format(from_env: Option<&str>, from_config: Option<&str>) -> &'static str {
    match from_env.or(from_config).map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Initialize logging from the environment alone.
///
/// Does nothing unless `STRATUM_DEBUG` or `STRATUM_LOG_LEVEL` is set.
/// Subsequent calls are no-ops.
pub fn init() {
    if !is_debug_enabled() && env::var("STRATUM_LOG_LEVEL").is_err() {
        return;
    }
    init_with_config(&LoggingConfig::default());
}

/// Initialize logging from a `[logging]` section, with environment overrides.
///
/// Subsequent calls are no-ops.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level(config);
            let format = get_log_format(config);
            let filter = EnvFilter::try_new(format!("stratum={level},stratum_migrate={level}"))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            // Another subscriber may already be installed by the host.
            let installed = match format {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format, "Stratum logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = config;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_precedence() {
        assert_eq!(resolve_level(None, None, false), "warn");
        assert_eq!(resolve_level(None, None, true), "debug");
        assert_eq!(resolve_level(None, Some("INFO"), false), "info");
        assert_eq!(resolve_level(Some("trace"), Some("info"), false), "trace");
        assert_eq!(resolve_level(Some("loud"), Some("error"), false), "error");
    }

    #[test]
    fn test_format_precedence() {
        assert_eq!(resolve_format(None, None), "json");
        assert_eq!(resolve_format(None, Some("compact")), "compact");
        assert_eq!(resolve_format(Some("Pretty"), Some("compact")), "pretty");
        assert_eq!(resolve_format(Some("xml"), None), "json");
    }
}
