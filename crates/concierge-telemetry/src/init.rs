//! Subscriber installation for the CLI and tests.
//!
//! # Design
//! - One entry point installs the subscriber; logs go to stderr so command
//!   output on stdout stays machine-readable.
//! - The build SHA is recorded once and reused by the command span.

use anyhow::{Result, anyhow};
use concierge_config::LoggingSettings;
use concierge_config::model::LogFormatSetting;
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the process-wide subscriber described by `config`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let registry = tracing_subscriber::registry().with(env_filter(config.level));
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

/// Build SHA recorded by [`init_logging`], or `dev` before it runs.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Subscriber settings borrowed from [`LoggingSettings`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: &'a str,
    /// Event formatter.
    pub format: LogFormat,
    /// Build identifier attached to the command span.
    pub build_sha: &'a str,
}

impl<'a> LoggingConfig<'a> {
    /// Derive logging configuration from validated client settings.
    #[must_use]
    pub fn from_settings(settings: &'a LoggingSettings) -> Self {
        Self {
            level: &settings.level,
            format: settings.format.map_or_else(LogFormat::infer, LogFormat::from),
            build_sha: option_env!("CONCIERGE_BUILD_SHA").unwrap_or("dev"),
        }
    }
}

/// Event formatter choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One flattened JSON object per event.
    Json,
    /// Emit human-readable logs.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl From<LogFormatSetting> for LogFormat {
    fn from(value: LogFormatSetting) -> Self {
        match value {
            LogFormatSetting::Json => Self::Json,
            LogFormatSetting::Pretty => Self::Pretty,
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_map_onto_logging_config() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            format: Some(LogFormatSetting::Json),
        };
        let config = LoggingConfig::from_settings(&settings);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);

        let settings = LoggingSettings::default();
        let inferred = LoggingConfig::from_settings(&settings);
        assert_eq!(inferred.format, LogFormat::infer());
    }

    #[test]
    fn init_logging_installs_subscriber_once() {
        let config = LoggingConfig {
            level: "info",
            format: LogFormat::Pretty,
            build_sha: "dev",
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
        assert_eq!(build_sha(), "dev");
    }
}
