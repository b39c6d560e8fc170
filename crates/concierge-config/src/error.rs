//! Error types for configuration operations.

use std::io;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid value for '{field}' in '{section}': {reason}")]
    InvalidField {
        /// Section that failed validation.
        section: String,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A required field was not supplied by any layer.
    #[error("missing required field '{field}' in '{section}'")]
    MissingField {
        /// Section expecting the field.
        section: String,
        /// Name of the missing field.
        field: String,
    },
    /// Configuration document could not be parsed.
    #[error("failed to parse configuration file '{path}'")]
    Parse {
        /// Path of the offending document.
        path: String,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed: {operation}")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &str,
        field: &str,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section: section.to_string(),
            field: field.to_string(),
            value,
            reason,
        }
    }

    pub(crate) fn missing(section: &str, field: &str) -> Self {
        Self::MissingField {
            section: section.to_string(),
            field: field.to_string(),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
