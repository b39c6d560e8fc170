//! HTTP seam used by the fetch coordinator and the mutation layer.
//!
//! # Design
//! - [`Transport`] is the only I/O boundary; tests swap in a scripted fake.
//! - [`HttpTransport`] attaches the session's bearer token to every request and
//!   resolves paths against the session base URL.
//! - Success or failure of mutations is decided by status code alone.

use std::time::Duration;

use async_trait::async_trait;
use concierge_config::SessionContext;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// Query-string pairs in send order.
pub type QueryParams = Vec<(String, String)>;

/// Collection read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    /// Absolute API path, e.g. `/pms/users/non_fte_users.json`.
    pub path: String,
    /// Query-string pairs.
    pub query: QueryParams,
}

impl GetRequest {
    /// Value of the first query pair named `key`.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP verb for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMethod {
    /// Partial update.
    Put,
    /// Action endpoint.
    Post,
    /// Removal.
    Delete,
}

/// Write against a single record or sub-resource.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// Verb.
    pub method: MutationMethod,
    /// Absolute API path.
    pub path: String,
    /// Query-string pairs.
    pub query: QueryParams,
    /// JSON body, when the endpoint takes one.
    pub body: Option<Value>,
}

/// Request execution seam.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a list page and return its JSON body.
    async fn get(&self, request: &GetRequest) -> Result<Value, TransportError>;

    /// Issue a mutation; any 2xx status is success.
    async fn send(&self, request: &MutationRequest) -> Result<(), TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    session: SessionContext,
}

impl HttpTransport {
    /// Build a transport with its own client and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the TLS backend cannot be initialised.
    pub fn new(session: SessionContext, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Network(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, session })
    }

    /// Reuse an existing client (default headers, proxies, ...).
    #[must_use]
    pub const fn with_client(client: Client, session: SessionContext) -> Self {
        Self { client, session }
    }

    /// Session attached to every request.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Url {
        let mut url = self.session.endpoint(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &GetRequest) -> Result<Value, TransportError> {
        let url = self.url(&request.path, &request.query);
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(self.session.token())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_send_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn send(&self, request: &MutationRequest) -> Result<(), TransportError> {
        let url = self.url(&request.path, &request.query);
        debug!(%url, method = ?request.method, "mutation");
        let builder = match request.method {
            MutationMethod::Put => self.client.put(url),
            MutationMethod::Post => self.client.post(url),
            MutationMethod::Delete => self.client.delete(url),
        };
        let mut builder = builder
            .bearer_auth(self.session.token())
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(classify_send_error)?;
        ensure_success(response).await.map(drop)
    }
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidUrl(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}
