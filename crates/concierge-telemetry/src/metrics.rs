//! Prometheus-backed metrics for list controllers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Labels are closed enums so call sites cannot invent new series.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Terminal state of a list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcomeLabel {
    /// Response committed to list state.
    Committed,
    /// Response discarded because a newer fetch started.
    Superseded,
    /// Transport or decode failure.
    Failed,
    /// Request exceeded the configured timeout.
    TimedOut,
}

impl FetchOutcomeLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Terminal state of an optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcomeLabel {
    /// Server confirmed the change.
    Committed,
    /// Server rejected the change and local state was restored.
    RolledBack,
    /// Precondition failed before any request was sent.
    Rejected,
    /// Server refused a confirmed (non-optimistic) mutation.
    Failed,
}

impl MutationOutcomeLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Metrics registry shared by all list controllers of a process.
#[derive(Clone)]
pub struct ListMetrics {
    inner: Arc<ListMetricsInner>,
}

struct ListMetricsInner {
    registry: Registry,
    fetch_total: IntCounterVec,
    mutation_total: IntCounterVec,
    fetch_inflight: IntGauge,
    fetch_latency_ms: IntGauge,
}

/// Per-resource view of the list counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ListMetricsSnapshot {
    /// Fetches committed to state.
    pub fetch_committed: u64,
    /// Fetches discarded as superseded.
    pub fetch_superseded: u64,
    /// Fetches that failed (including timeouts).
    pub fetch_failed: u64,
    /// Mutations confirmed by the server.
    pub mutation_committed: u64,
    /// Mutations rolled back after a server failure.
    pub mutation_rolled_back: u64,
    /// Fetches currently awaiting a response.
    pub fetch_inflight: i64,
}

impl ListMetrics {
    /// Construct a registry with the list collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fetch_total = IntCounterVec::new(
            Opts::new("concierge_list_fetch_total", "List fetches by outcome"),
            &["resource", "outcome"],
        )?;
        let mutation_total = IntCounterVec::new(
            Opts::new(
                "concierge_list_mutation_total",
                "Optimistic mutations by field and outcome",
            ),
            &["resource", "field", "outcome"],
        )?;
        let fetch_inflight = IntGauge::with_opts(Opts::new(
            "concierge_list_fetch_inflight",
            "List fetches awaiting a response",
        ))?;
        let fetch_latency_ms = IntGauge::with_opts(Opts::new(
            "concierge_list_fetch_latency_ms",
            "Latency of the most recent completed fetch (ms)",
        ))?;

        registry.register(Box::new(fetch_total.clone()))?;
        registry.register(Box::new(mutation_total.clone()))?;
        registry.register(Box::new(fetch_inflight.clone()))?;
        registry.register(Box::new(fetch_latency_ms.clone()))?;

        Ok(Self {
            inner: Arc::new(ListMetricsInner {
                registry,
                fetch_total,
                mutation_total,
                fetch_inflight,
                fetch_latency_ms,
            }),
        })
    }

    /// Mark a fetch as started.
    pub fn fetch_started(&self) {
        self.inner.fetch_inflight.inc();
    }

    /// Mark a fetch as finished with the given outcome and latency.
    pub fn fetch_finished(&self, resource: &str, outcome: FetchOutcomeLabel, latency: Duration) {
        self.inner.fetch_inflight.dec();
        self.inner
            .fetch_total
            .with_label_values(&[resource, outcome.as_str()])
            .inc();
        self.inner
            .fetch_latency_ms
            .set(i64::try_from(latency.as_millis()).unwrap_or(i64::MAX));
    }

    /// Record the outcome of a toggle or delete.
    pub fn mutation_finished(&self, resource: &str, field: &str, outcome: MutationOutcomeLabel) {
        self.inner
            .mutation_total
            .with_label_values(&[resource, field, outcome.as_str()])
            .inc();
    }

    /// Snapshot the counters for one resource, summing mutations over `fields`.
    #[must_use]
    pub fn snapshot(&self, resource: &str, fields: &[&str]) -> ListMetricsSnapshot {
        let fetch = |outcome: FetchOutcomeLabel| {
            self.inner
                .fetch_total
                .with_label_values(&[resource, outcome.as_str()])
                .get()
        };
        let mutation = |outcome: MutationOutcomeLabel| {
            fields
                .iter()
                .map(|field| {
                    self.inner
                        .mutation_total
                        .with_label_values(&[resource, *field, outcome.as_str()])
                        .get()
                })
                .sum::<u64>()
        };
        ListMetricsSnapshot {
            fetch_committed: fetch(FetchOutcomeLabel::Committed),
            fetch_superseded: fetch(FetchOutcomeLabel::Superseded),
            fetch_failed: fetch(FetchOutcomeLabel::Failed) + fetch(FetchOutcomeLabel::TimedOut),
            mutation_committed: mutation(MutationOutcomeLabel::Committed),
            mutation_rolled_back: mutation(MutationOutcomeLabel::RolledBack),
            fetch_inflight: self.inner.fetch_inflight.get(),
        }
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }
}
