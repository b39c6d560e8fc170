//! Shared context, error types, and controller wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use anyhow::anyhow;
use concierge_config::{ClientConfig, ConfigError, ListSettings};
use concierge_list::{
    HttpTransport, ListController, ListResource, MutationError, ToastSink, Transport,
    TransportError,
};
use concierge_telemetry::ListMetrics;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::cli::OutputFormat;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Command failure, split by whose fault it is: bad input (exit 2) or a
/// failed operation (exit 3).
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { .. } => Self::failure(err),
            other => Self::validation(other.to_string()),
        }
    }
}

/// Map a refused or rolled-back mutation onto the CLI taxonomy: anything
/// decided locally is the caller's input, anything the server said is a failure.
pub(crate) fn mutation_error(err: MutationError, noun: &str) -> CliError {
    match err {
        MutationError::NotFound { item_id } => CliError::validation(format!(
            "{noun} {item_id} is not on the loaded page (narrow it with --search or --page)"
        )),
        MutationError::MissingIdentifier { item_id, identifier } => {
            CliError::validation(format!("{noun} {item_id} has no {identifier}"))
        }
        MutationError::Busy { .. } => CliError::validation(err.to_string()),
        MutationError::Rejected { item_id, source } => {
            CliError::failure(anyhow!(source).context(format!("{noun} {item_id} was not updated")))
        }
    }
}

/// Map a failed list fetch onto the CLI taxonomy.
pub(crate) fn fetch_error(err: TransportError, noun: &str) -> CliError {
    CliError::failure(anyhow!(err).context(format!("failed to load {noun}")))
}

/// Transport, list tuning and output format shared by every handler.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) settings: ListSettings,
    pub(crate) metrics: Option<ListMetrics>,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the HTTP transport for `config`, tagging every request with `trace_id`.
    pub(crate) fn from_config(
        config: &ClientConfig,
        trace_id: &str,
        output: OutputFormat,
    ) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(config.list.request_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        let metrics = match ListMetrics::new() {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                tracing::debug!(error = %err, "list metrics disabled");
                None
            }
        };

        Ok(Self {
            transport: Arc::new(HttpTransport::with_client(client, config.session.clone())),
            settings: config.list,
            metrics,
            output,
        })
    }

    /// Controller for `resource` delivering toasts to `toasts`.
    pub(crate) fn controller<R: ListResource>(
        &self,
        resource: R,
        toasts: Arc<dyn ToastSink>,
    ) -> ListController<R> {
        let builder = ListController::builder(resource, Arc::clone(&self.transport))
            .settings(self.settings)
            .toasts(toasts);
        match &self.metrics {
            Some(metrics) => builder.metrics(metrics.clone()).build(),
            None => builder.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_config::SessionContext;

    #[test]
    fn local_refusals_are_validation_errors() {
        let err = mutation_error(MutationError::NotFound { item_id: 4 }, "user");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("user 4 is not on the loaded page"));

        let err = mutation_error(
            MutationError::MissingIdentifier {
                item_id: 4,
                identifier: "permission id",
            },
            "user",
        );
        assert_eq!(err.display_message(), "user 4 has no permission id");
    }

    #[test]
    fn server_refusals_are_failures_with_context() {
        let err = mutation_error(
            MutationError::Rejected {
                item_id: 9,
                source: TransportError::Status {
                    status: 500,
                    body: String::new(),
                },
            },
            "ticket",
        );
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.display_message(),
            "ticket 9 was not updated: server responded with status 500"
        );
    }

    #[tokio::test]
    async fn context_builds_from_config() {
        let config = ClientConfig {
            session: SessionContext::new("https://fm.example.com", "t0k").expect("session"),
            list: ListSettings::default(),
            logging: concierge_config::LoggingSettings::default(),
        };
        let ctx = AppContext::from_config(&config, "trace-1", OutputFormat::Json)
            .expect("context");
        assert_eq!(ctx.settings.page_size, 25);
        assert!(matches!(ctx.output, OutputFormat::Json));
        assert!(AppContext::from_config(&config, "bad\ntrace", OutputFormat::Table).is_err());
    }
}
