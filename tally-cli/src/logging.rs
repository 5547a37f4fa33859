//! Diagnostic logging for the CLI.
//!
//! Logs go to stderr and are off unless requested:
//!
//! - `TALLY_DEBUG=true` - Enable debug logging
//! - `TALLY_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `TALLY_LOG_FORMAT=json|pretty|compact` - Set output format (default: compact)

use std::env;

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human-readable output.
    Compact,
    /// Multi-line human-readable output.
    Pretty,
    /// One JSON object per event.
    Json,
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Resolve the level from `TALLY_LOG_LEVEL` and `TALLY_DEBUG` values.
///
/// Returns `None` when logging was not requested.
pub fn resolve_level(level: Option<&str>, debug: Option<&str>) -> Option<&'static str> {
    let debug = debug.is_some_and(is_truthy);
    let fallback = if debug { "debug" } else { "warn" };

    match level {
        Some(level) => Some(match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        }),
        None if debug => Some("debug"),
        None => None,
    }
}

/// Resolve the format from a `TALLY_LOG_FORMAT` value.
pub fn resolve_format(format: Option<&str>) -> LogFormat {
    match format.map(str::to_lowercase).as_deref() {
        Some("pretty") => LogFormat::Pretty,
        Some("json") => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

/// Install the global subscriber if logging was requested.
pub fn init() {
    let level = env::var("TALLY_LOG_LEVEL").ok();
    let debug = env::var("TALLY_DEBUG").ok();
    let Some(level) = resolve_level(level.as_deref(), debug.as_deref()) else {
        return;
    };
    let format = resolve_format(env::var("TALLY_LOG_FORMAT").ok().as_deref());

    let filter = EnvFilter::try_new(format!(
        "tally={0},tally_migrate={0},tally_postgres={0},tally_cli={0}",
        level
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(level, ?format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(None, None), None);
        assert_eq!(resolve_level(None, Some("0")), None);
        assert_eq!(resolve_level(None, Some("yes")), Some("debug"));
        assert_eq!(resolve_level(Some("INFO"), None), Some("info"));
        assert_eq!(resolve_level(Some("loud"), None), Some("warn"));
        assert_eq!(resolve_level(Some("loud"), Some("true")), Some("debug"));
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(None), LogFormat::Compact);
        assert_eq!(resolve_format(Some("JSON")), LogFormat::Json);
        assert_eq!(resolve_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(resolve_format(Some("xml")), LogFormat::Compact);
    }
}
