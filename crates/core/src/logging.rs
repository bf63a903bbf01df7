//! Logging infrastructure for Lumen.
//!
//! All logs go to stderr; stdout is reserved for assistant replies and
//! command output.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Filter used when neither a level nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "warn";

/// Initialize the tracing subscriber with stderr output.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "debug", "lumen_agent=trace")
/// * `no_color` - Disable colored output
///
/// Falls back to `RUST_LOG`, then to `warn` so the interactive chat stays
/// quiet unless asked otherwise.
///
/// # Example
/// ```no_run
/// use lumen_core::logging::init_logging;
///
/// init_logging(None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter_str = resolve_filter(log_level, std::env::var("RUST_LOG").ok());

    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Explicit level, else `RUST_LOG`, else [`DEFAULT_FILTER`].
fn resolve_filter(log_level: Option<&str>, rust_log: Option<String>) -> String {
    log_level
        .map(str::to_string)
        .or(rust_log)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Check if stderr is a color-capable terminal.
fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_config_error() {
        let result = init_logging(Some("lumen=loud"), true);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_resolve_filter_precedence() {
        assert_eq!(resolve_filter(Some("debug"), Some("info".to_string())), "debug");
        assert_eq!(resolve_filter(None, Some("info".to_string())), "info");
        assert_eq!(resolve_filter(None, None), "warn");
    }

    #[test]
    fn test_init_logging() {
        // Only the first subscriber in a process wins
        let result = init_logging(Some("info"), true);
        assert!(result.is_ok() || matches!(result, Err(AppError::Config(_))));
    }
}
