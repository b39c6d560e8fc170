#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the Concierge workspace.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (command span),
//! `metrics.rs` (Prometheus counters for list controllers).

pub mod context;
pub mod init;
pub mod metrics;

pub use context::{command_span, record_exit_code};
pub use init::{LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{FetchOutcomeLabel, ListMetrics, ListMetricsSnapshot, MutationOutcomeLabel};
