//! Layered configuration loading.
//!
//! # Design
//! - Layers apply in order: defaults, optional JSON file, environment, explicit overrides.
//! - The environment is read through an injected lookup so callers (and tests) control it.
//! - Validation runs once on the merged result.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::defaults::ENV_PREFIX;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ClientConfig, ListSettings, LoggingSettings, SessionContext};
use crate::validate::{
    check_debounce_ms, check_page_size, check_request_timeout_secs, parse_log_format, parse_u64,
};

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Values supplied explicitly by the caller (typically CLI flags); highest precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// API base URL.
    pub base_url: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Page size.
    pub page_size: Option<u64>,
    /// Debounce window in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Log level directive.
    pub log_level: Option<String>,
    /// Log format name.
    pub log_format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDocument {
    #[serde(default)]
    session: FileSession,
    #[serde(default)]
    list: FileList,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSession {
    base_url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileList {
    page_size: Option<u64>,
    debounce_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    format: Option<String>,
}

/// Builder that merges configuration layers into a [`ClientConfig`].
pub struct ConfigLoader {
    file: Option<PathBuf>,
    overrides: ConfigOverrides,
    env: EnvLookup,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfigLoader")
            .field("file", &self.file)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            overrides: ConfigOverrides::default(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read an optional JSON document before applying the environment.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Apply explicit overrides last.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Replace the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Merge all layers and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, when a required
    /// session field is missing, or when any value fails validation.
    pub fn load(&self) -> ConfigResult<ClientConfig> {
        let document = match &self.file {
            Some(path) => read_document(path)?,
            None => FileDocument::default(),
        };

        let base_url = self
            .overrides
            .base_url
            .clone()
            .or_else(|| self.env_var("BASE_URL"))
            .or(document.session.base_url)
            .ok_or_else(|| ConfigError::missing("session", "base_url"))?;
        let token = self
            .overrides
            .token
            .clone()
            .or_else(|| self.env_var("TOKEN"))
            .or(document.session.token)
            .ok_or_else(|| ConfigError::missing("session", "token"))?;
        let session = SessionContext::new(&base_url, &token)?;

        let mut list = ListSettings::default();
        if let Some(value) = self.pick_number(
            self.overrides.page_size,
            "PAGE_SIZE",
            "page_size",
            document.list.page_size,
        )? {
            list.page_size = check_page_size(value)?;
        }
        if let Some(value) = self.pick_number(
            self.overrides.debounce_ms,
            "DEBOUNCE_MS",
            "debounce_ms",
            document.list.debounce_ms,
        )? {
            list.debounce = check_debounce_ms(value)?;
        }
        if let Some(value) = self.pick_number(
            self.overrides.request_timeout_secs,
            "REQUEST_TIMEOUT_SECS",
            "request_timeout_secs",
            document.list.request_timeout_secs,
        )? {
            list.request_timeout = check_request_timeout_secs(value)?;
        }

        let mut logging = LoggingSettings::default();
        if let Some(level) = self
            .overrides
            .log_level
            .clone()
            .or_else(|| self.env_var("LOG_LEVEL"))
            .or(document.logging.level)
        {
            logging.level = level;
        }
        if let Some(format) = self
            .overrides
            .log_format
            .clone()
            .or_else(|| self.env_var("LOG_FORMAT"))
            .or(document.logging.format)
        {
            logging.format = Some(parse_log_format(&format)?);
        }

        debug!(
            base_url = %session.base_url(),
            page_size = list.page_size,
            debounce_ms = list.debounce.as_millis(),
            "client configuration loaded"
        );

        Ok(ClientConfig {
            session,
            list,
            logging,
        })
    }

    fn env_var(&self, suffix: &str) -> Option<String> {
        (self.env)(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.trim().is_empty())
    }

    fn pick_number(
        &self,
        explicit: Option<u64>,
        env_suffix: &str,
        field: &str,
        from_file: Option<u64>,
    ) -> ConfigResult<Option<u64>> {
        if explicit.is_some() {
            return Ok(explicit);
        }
        if let Some(raw) = self.env_var(env_suffix) {
            return parse_u64("list", field, &raw).map(Some);
        }
        Ok(from_file)
    }
}

fn read_document(path: &Path) -> ConfigResult<FileDocument> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read configuration file",
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
