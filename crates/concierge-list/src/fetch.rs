//! Fetch coordinator: one outstanding list request, newest wins.
//!
//! # Design
//! - Installing a token cancels the previous one and bumps the generation under the
//!   state lock; committing checks the generation under the same lock, so a
//!   superseded response can never overwrite newer state regardless of resolution
//!   order.
//! - A cancelled fetch also drops its transport future, aborting the request.
//! - Failures clear the rows but keep the last pagination metadata.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use concierge_api_models::ListEnvelope;
use concierge_config::ListSettings;
use concierge_telemetry::{FetchOutcomeLabel, ListMetrics};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::pagination::PageInfo;
use crate::query::QuerySnapshot;
use crate::resources::{ListItem, ListResource, list_request};
use crate::state::{SharedState, lock_state};
use crate::transport::Transport;

/// Terminal state of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows and pagination were replaced.
    Committed {
        /// Records committed.
        records: usize,
    },
    /// A newer fetch (or shutdown) invalidated this one; nothing was written.
    Superseded,
    /// The request failed; rows were cleared.
    Failed(TransportError),
    /// No fetch was needed.
    Skipped,
}

impl FetchOutcome {
    /// Whether the outcome wrote new rows.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Turns query snapshots into list requests and reconciles their responses.
pub struct FetchCoordinator<R: ListResource> {
    resource: Arc<R>,
    transport: Arc<dyn Transport>,
    settings: ListSettings,
    metrics: Option<ListMetrics>,
    state: SharedState<R::Item>,
}

impl<R: ListResource> FetchCoordinator<R> {
    pub(crate) fn new(
        resource: Arc<R>,
        transport: Arc<dyn Transport>,
        settings: ListSettings,
        metrics: Option<ListMetrics>,
        state: SharedState<R::Item>,
    ) -> Self {
        Self {
            resource,
            transport,
            settings,
            metrics,
            state,
        }
    }

    /// Fetch `query` under `token`.
    ///
    /// The token is installed (and the previous one cancelled) when this method is
    /// called, not when the returned future is first polled, so call order decides
    /// which fetch is newest.
    pub fn fetch(
        &self,
        query: QuerySnapshot,
        token: CancellationToken,
    ) -> impl Future<Output = FetchOutcome> + Send + '_ {
        let generation = self.install(&token);
        self.run(query, token, generation)
    }

    /// Cancel the in-flight fetch, if any, and leave the loading state.
    pub fn cancel_in_flight(&self) {
        let mut state = lock_state(&self.state);
        if let Some(live) = state.live.take() {
            live.cancel();
        }
        state.loading = false;
    }

    /// Drop pagination metadata that no longer describes the query.
    pub(crate) fn invalidate_pagination(&self) {
        lock_state(&self.state).page_info = PageInfo::unknown();
    }

    pub(crate) fn install(&self, token: &CancellationToken) -> u64 {
        let mut state = lock_state(&self.state);
        if let Some(previous) = state.live.replace(token.clone()) {
            previous.cancel();
        }
        state.generation += 1;
        state.loading = true;
        state.generation
    }

    pub(crate) async fn run(
        &self,
        query: QuerySnapshot,
        token: CancellationToken,
        generation: u64,
    ) -> FetchOutcome {
        let request = list_request(self.resource.as_ref(), &query, self.settings.page_size);
        debug!(
            resource = self.resource.name(),
            generation,
            page = query.page,
            params = ?request.query,
            "list fetch issued"
        );
        if let Some(metrics) = &self.metrics {
            metrics.fetch_started();
        }
        let started = Instant::now();

        let response = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = timeout(self.settings.request_timeout, self.transport.get(&request)) => {
                Some(result.unwrap_or(Err(TransportError::Timeout)))
            }
        };

        let outcome = match response {
            None => self.abandon(generation),
            Some(Ok(body)) => {
                match ListEnvelope::<R::Item>::from_value(body, self.resource.records_key()) {
                    Ok(envelope) => self.commit(&token, generation, query.page, envelope),
                    Err(err) => {
                        self.fail(&token, generation, TransportError::Decode(err.to_string()))
                    }
                }
            }
            Some(Err(err)) => self.fail(&token, generation, err),
        };
        self.finish(generation, &outcome, started.elapsed());
        outcome
    }

    fn commit(
        &self,
        token: &CancellationToken,
        generation: u64,
        requested_page: u32,
        envelope: ListEnvelope<R::Item>,
    ) -> FetchOutcome {
        let mut records = envelope.records;
        records.iter_mut().for_each(ListItem::normalize);
        let count = records.len();
        let page_info = envelope.pagination.map_or_else(
            || PageInfo::synthesized(requested_page, count),
            |pagination| PageInfo::from_server(&pagination, requested_page, count),
        );

        let mut state = lock_state(&self.state);
        if !state.is_live(token, generation) {
            return FetchOutcome::Superseded;
        }
        state.rows = records;
        state.page_info = page_info;
        state.loading = false;
        state.last_error = None;
        state.live = None;
        FetchOutcome::Committed { records: count }
    }

    /// A cancelled fetch that is still the newest leaves the loading state.
    fn abandon(&self, generation: u64) -> FetchOutcome {
        let mut state = lock_state(&self.state);
        if state.generation == generation {
            state.loading = false;
            state.live = None;
        }
        FetchOutcome::Superseded
    }

    fn fail(&self, token: &CancellationToken, generation: u64, err: TransportError) -> FetchOutcome {
        let mut state = lock_state(&self.state);
        if !state.is_live(token, generation) {
            return FetchOutcome::Superseded;
        }
        state.rows.clear();
        state.last_error = Some(err.to_string());
        state.loading = false;
        state.live = None;
        FetchOutcome::Failed(err)
    }

    fn finish(&self, generation: u64, outcome: &FetchOutcome, latency: Duration) {
        let resource = self.resource.name();
        let label = match outcome {
            FetchOutcome::Committed { records } => {
                info!(resource, generation, records, "list fetch committed");
                FetchOutcomeLabel::Committed
            }
            FetchOutcome::Superseded | FetchOutcome::Skipped => {
                debug!(resource, generation, "list fetch superseded");
                FetchOutcomeLabel::Superseded
            }
            FetchOutcome::Failed(TransportError::Timeout) => {
                warn!(resource, generation, "list fetch timed out");
                FetchOutcomeLabel::TimedOut
            }
            FetchOutcome::Failed(err) => {
                warn!(resource, generation, error = %err, "list fetch failed");
                FetchOutcomeLabel::Failed
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.fetch_finished(resource, label, latency);
        }
    }
}
