//! Default values applied when no layer provides a setting.

/// Rows the backend serves per page when `per_page` is not negotiated.
pub const DEFAULT_PAGE_SIZE: u32 = 25;
/// Quiet period before typed search text is used for querying.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
/// Upper bound on a single list or mutation request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Log level used when neither `RUST_LOG` nor configuration sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "CONCIERGE_";
