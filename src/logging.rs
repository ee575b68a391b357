// ABOUTME: Default tracing subscriber for plan programs and the hadron binary.
// ABOUTME: Level comes from the caller, else LOG_LEVEL, else info.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable read when no level is given.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Normalizes a level name, rejecting anything tracing does not know.
pub fn parse_level(level: &str) -> Result<&'static str> {
    let wanted = level.trim().to_ascii_lowercase();
    let wanted = if wanted == "warning" { "warn".to_string() } else { wanted };
    LEVELS
        .iter()
        .find(|l| **l == wanted)
        .copied()
        .ok_or_else(|| Error::InvalidLogLevel(level.to_string()))
}

/// The level `init_logging` would use.
pub fn resolve_level(level: Option<&str>) -> Result<&'static str> {
    match level {
        Some(level) => parse_level(level),
        None => match std::env::var(LOG_LEVEL_VAR) {
            Ok(level) if !level.trim().is_empty() => parse_level(&level),
            _ => Ok("info"),
        },
    }
}

/// Install a fmt subscriber. A subscriber that is already installed is kept.
pub fn init_logging(level: Option<&str>) -> Result<()> {
    let level = resolve_level(level)?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_case_insensitive() {
        assert_eq!(parse_level("DEBUG").unwrap(), "debug");
        assert_eq!(parse_level("warning").unwrap(), "warn");
        assert!(matches!(parse_level("loud"), Err(Error::InvalidLogLevel(_))));
    }

    #[test]
    fn explicit_level_beats_environment() {
        temp_env::with_var(LOG_LEVEL_VAR, Some("error"), || {
            assert_eq!(resolve_level(Some("trace")).unwrap(), "trace");
            assert_eq!(resolve_level(None).unwrap(), "error");
        });
        temp_env::with_var_unset(LOG_LEVEL_VAR, || {
            assert_eq!(resolve_level(None).unwrap(), "info");
        });
    }
}
