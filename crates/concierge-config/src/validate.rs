//! Validation helpers and parsing utilities for configuration values.

use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::LogFormatSetting;

/// Largest page size accepted from configuration.
pub const MAX_PAGE_SIZE: u32 = 500;
/// Longest accepted debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;
/// Longest accepted request timeout.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Normalise a base URL, assuming `https://` when no scheme is present.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is empty, unparseable, or
/// uses a scheme other than HTTP(S).
pub fn normalize_base_url(raw: &str) -> ConfigResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(
            "session",
            "base_url",
            None,
            "must not be empty",
        ));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|_| {
        ConfigError::invalid(
            "session",
            "base_url",
            Some(trimmed.to_string()),
            "must be a valid URL",
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "session",
            "base_url",
            Some(trimmed.to_string()),
            "scheme must be http or https",
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::invalid(
            "session",
            "base_url",
            Some(trimmed.to_string()),
            "must include a host",
        ));
    }
    Ok(url)
}

/// Validate the bearer token.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for blank tokens.
pub fn validate_token(raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(
            "session",
            "token",
            None,
            "must not be empty",
        ));
    }
    Ok(trimmed.to_string())
}

/// Parse an unsigned integer supplied as text (environment variables, CLI flags).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the text is not a non-negative integer.
pub fn parse_u64(section: &str, field: &str, raw: &str) -> ConfigResult<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        ConfigError::invalid(
            section,
            field,
            Some(raw.to_string()),
            "must be a non-negative integer",
        )
    })
}

/// Check the page size bounds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when outside `1..=MAX_PAGE_SIZE`.
pub fn check_page_size(value: u64) -> ConfigResult<u32> {
    if value == 0 || value > u64::from(MAX_PAGE_SIZE) {
        return Err(ConfigError::invalid(
            "list",
            "page_size",
            Some(value.to_string()),
            "must be between 1 and 500",
        ));
    }
    u32::try_from(value).map_err(|_| {
        ConfigError::invalid(
            "list",
            "page_size",
            Some(value.to_string()),
            "must fit within 32-bit unsigned range",
        )
    })
}

/// Check the debounce window bounds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when longer than [`MAX_DEBOUNCE_MS`].
pub fn check_debounce_ms(value: u64) -> ConfigResult<Duration> {
    if value > MAX_DEBOUNCE_MS {
        return Err(ConfigError::invalid(
            "list",
            "debounce_ms",
            Some(value.to_string()),
            "must be at most 10000",
        ));
    }
    Ok(Duration::from_millis(value))
}

/// Check the request timeout bounds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when outside `1..=MAX_REQUEST_TIMEOUT_SECS`.
pub fn check_request_timeout_secs(value: u64) -> ConfigResult<Duration> {
    if value == 0 || value > MAX_REQUEST_TIMEOUT_SECS {
        return Err(ConfigError::invalid(
            "list",
            "request_timeout_secs",
            Some(value.to_string()),
            "must be between 1 and 300",
        ));
    }
    Ok(Duration::from_secs(value))
}

/// Parse a log format name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for names other than `json` and `pretty`.
pub fn parse_log_format(raw: &str) -> ConfigResult<LogFormatSetting> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormatSetting::Json),
        "pretty" => Ok(LogFormatSetting::Pretty),
        _ => Err(ConfigError::invalid(
            "logging",
            "format",
            Some(raw.to_string()),
            "must be 'json' or 'pretty'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_https_scheme() {
        let url = normalize_base_url("fm.example.com").unwrap();
        assert_eq!(url.as_str(), "https://fm.example.com/");
        let url = normalize_base_url("http://127.0.0.1:8080/api").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/api");
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(normalize_base_url("   ").is_err());
        assert!(normalize_base_url("ftp://fm.example.com").is_err());
        assert!(matches!(
            normalize_base_url("https://"),
            Err(ConfigError::InvalidField { field, .. }) if field == "base_url"
        ));
    }

    #[test]
    fn numeric_bounds_are_enforced() {
        assert_eq!(check_page_size(25).unwrap(), 25);
        assert!(check_page_size(0).is_err());
        assert!(check_page_size(501).is_err());
        assert_eq!(check_debounce_ms(0).unwrap(), Duration::ZERO);
        assert!(check_debounce_ms(10_001).is_err());
        assert!(check_request_timeout_secs(0).is_err());
        assert_eq!(
            check_request_timeout_secs(30).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn text_parsers_report_field() {
        let err = parse_u64("list", "page_size", "ten").unwrap_err();
        assert!(err.to_string().contains("page_size"));
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormatSetting::Json);
        assert!(parse_log_format("xml").is_err());
        assert!(validate_token("  ").is_err());
        assert_eq!(validate_token(" abc ").unwrap(), "abc");
    }
}
