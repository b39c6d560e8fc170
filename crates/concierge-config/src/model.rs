//! Typed configuration model.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::defaults::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_LOG_LEVEL, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::ConfigResult;
use crate::validate::{normalize_base_url, validate_token};

/// Authenticated API session passed explicitly to every request builder.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    base_url: Url,
    token: String,
}

impl SessionContext {
    /// Build a session from a raw base URL and bearer token.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the URL cannot be normalised or the token is blank.
    pub fn new(base_url: &str, token: &str) -> ConfigResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            token: validate_token(token)?,
        })
    }

    /// Normalised API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Bearer token attached to every request.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Resolve an absolute API path against the base URL, keeping any base path prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        url.set_path(&format!("{prefix}/{suffix}"));
        url.set_query(None);
        url
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionContext")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Tuning for list controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSettings {
    /// Rows per page assumed by the "next page" heuristic.
    pub page_size: u32,
    /// Quiet period applied to typed search text.
    pub debounce: Duration,
    /// Upper bound on a single request.
    pub request_timeout: Duration,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Requested log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; `None` lets the telemetry crate infer one.
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Fully validated client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API session.
    pub session: SessionContext,
    /// List controller tuning.
    pub list: ListSettings,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_prefix() {
        let session = SessionContext::new("https://fm.example.com/api/", "t0k").unwrap();
        assert_eq!(
            session.endpoint("/pms/users/non_fte_users.json").as_str(),
            "https://fm.example.com/api/pms/users/non_fte_users.json"
        );
        let session = SessionContext::new("fm.example.com", "t0k").unwrap();
        assert_eq!(
            session.endpoint("pms/admin/complaints.json").as_str(),
            "https://fm.example.com/pms/admin/complaints.json"
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let session = SessionContext::new("fm.example.com", "secret-token").unwrap();
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn list_defaults_match_backend() {
        let settings = ListSettings::default();
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.debounce, Duration::from_millis(500));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }
}
