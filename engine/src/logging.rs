//! Default `tracing` subscriber.
//!
//! Level comes from `AWS_LAMBDA_LOG_LEVEL` (falling back to `RUST_LOG`),
//! format from `AWS_LAMBDA_LOG_FORMAT`. Output goes to stderr without colour.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "AWS_LAMBDA_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "AWS_LAMBDA_LOG_FORMAT";

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Only the exact value `JSON` selects JSON lines.
    #[must_use]
    pub fn from_env_value(raw: Option<&str>) -> Self {
        match raw {
            Some("JSON") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Filter directive for a platform log level. `fatal` maps to `error`;
/// unrecognised values fall back to `info`.
#[must_use]
pub fn level_directive(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" | "fatal" => "error",
        _ => DEFAULT_LEVEL,
    }
}

fn env_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(raw) => EnvFilter::new(level_directive(raw)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    }
}

/// Install the default subscriber.
///
/// Returns `false` when a global subscriber was already installed; that one
/// stays in place.
pub fn init_default_subscriber() -> bool {
    let level = std::env::var(ENV_LOG_LEVEL).ok();
    let format = LogFormat::from_env_value(std::env::var(ENV_LOG_FORMAT).ok().as_deref());
    let filter = env_filter(level.as_deref());

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init(),
    };
    installed.is_ok()
}
