//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither settings nor environment provide one.
const DEFAULT_FILTER: &str = "spacesweep=info,warn";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format string. Unknown values fall back to `Pretty`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
    /// Optional file to append to instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from settings with env overrides.
    ///
    /// Filter precedence: `SPACESWEEP_LOG`, then `RUST_LOG`, then the
    /// settings file, then the built-in default. `verbose` raises the
    /// crate's own level to `debug` when no explicit filter is given.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .map(LogFormat::parse)
            .unwrap_or_default();
        let file = settings
            .and_then(|s| s.file.as_deref())
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);

        let directive = std::env::var("SPACESWEEP_LOG")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or_else(|| settings.and_then(|s| s.filter.clone()))
            .filter(|d| !d.trim().is_empty());
        let directive = match (directive, verbose) {
            (Some(d), _) => d,
            (None, true) => "spacesweep=debug,info".to_string(),
            (None, false) => DEFAULT_FILTER.to_string(),
        };
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        Self {
            format,
            filter,
            file,
        }
    }
}
