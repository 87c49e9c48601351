//! Tracing/logging initialization.
//!
//! JSON logs with timestamps. Level comes from `RUST_LOG` when set, otherwise
//! from [`LogConfig::level`], otherwise `info`.

use tracing_subscriber::EnvFilter;

const FALLBACK_LEVEL: &str = "info";

/// Logging settings resolved by the binary at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Level name such as `debug` or `warn` (from `LOG_LEVEL`).
    pub level: Option<String>,
}

impl LogConfig {
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: Some(level.into()),
        }
    }
}

/// Outcome of [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Filter directive in effect.
    pub directive: String,
    /// Configured level that was not recognised and replaced by `info`.
    pub rejected_level: Option<String>,
    /// `false` when a global subscriber was already installed.
    pub installed: bool,
}

/// Resolve the filter directive without touching global state.
pub fn resolve_directive(config: &LogConfig, rust_log: Option<&str>) -> (String, Option<String>) {
    if let Some(directive) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        return (directive.to_string(), None);
    }
    match config.level.as_deref().map(str::trim) {
        None | Some("") => (FALLBACK_LEVEL.to_string(), None),
        Some(level) => match parse_level(level) {
            Some(level) => (level.to_string(), None),
            None => (FALLBACK_LEVEL.to_string(), Some(level.to_string())),
        },
    }
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

/// Install the global subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) -> InitReport {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (directive, rejected_level) = resolve_directive(config, rust_log.as_deref());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if let Some(level) = &rejected_level {
        tracing::warn!(level = %level, "unknown log level, falling back to info");
    }

    InitReport {
        directive,
        rejected_level,
        installed,
    }
}
