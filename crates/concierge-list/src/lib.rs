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
#![allow(clippy::module_name_repetitions)]

//! Remote-backed list controller for the facility console.
//!
//! Layout: `query.rs` (page, search and filter state), `debounce.rs` (trailing-edge
//! debounce), `fetch.rs` (request coordination and cancellation),
//! `pagination.rs` (page metadata and pager controls), `mutation.rs` (optimistic
//! toggles and deletes), `toast.rs` (notifications), `transport.rs` (HTTP seam),
//! `resources/` (per-collection request mapping), `controller.rs` (composition).

pub mod controller;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod mutation;
pub mod pagination;
pub mod query;
pub mod resources;
pub mod state;
pub mod toast;
pub mod transport;

#[cfg(test)]
mod testing;

pub use controller::{ListController, ListControllerBuilder};
pub use debounce::{Debouncer, Settled};
pub use error::{MutationError, TransportError};
pub use fetch::{FetchCoordinator, FetchOutcome};
pub use mutation::{MutationLayer, ToggleField};
pub use pagination::{PageInfo, PageSlot, PagerControls, TotalPages, page_window, summary_label};
pub use query::{
    FilterSet, FilterValue, PageResetTracker, QueryChange, QueryConstraint, QuerySnapshot,
    QueryStateManager,
};
pub use resources::{
    ActiveToggle, DeletableResource, ExternalUsersResource, ListItem, ListResource, RemoteToggle,
    StatusTally, TicketFlag, TicketsResource, list_request,
};
pub use state::ListSnapshot;
pub use toast::{LogToasts, Toast, ToastKind, ToastLog, ToastSink};
pub use tokio_util::sync::CancellationToken;
pub use transport::{
    GetRequest, HttpTransport, MutationMethod, MutationRequest, QueryParams, Transport,
};
