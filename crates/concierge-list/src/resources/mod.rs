//! Resource descriptors: how a collection maps query state onto its endpoint.
//!
//! Layout: `users.rs` (external users), `tickets.rs` (helpdesk complaints).

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::mutation::ToggleField;
use crate::query::{FilterSet, QueryConstraint, QuerySnapshot};
use crate::transport::{GetRequest, MutationRequest, QueryParams};

pub mod tickets;
pub mod users;

pub use tickets::{TicketFlag, TicketsResource};
pub use users::{ActiveToggle, ExternalUsersResource, StatusTally};

/// Row type held by a list controller.
pub trait ListItem: Clone + Send + Sync + Serialize + 'static {
    /// Stable row identity.
    fn item_id(&self) -> u64;

    /// Post-fetch normalisation (derived display fields and the like).
    fn normalize(&mut self) {}
}

/// Remote collection a controller pages through.
pub trait ListResource: Send + Sync + 'static {
    /// Row type.
    type Item: ListItem + DeserializeOwned;

    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Collection endpoint path.
    fn collection_path(&self) -> &'static str;

    /// Key holding the records array in the list body.
    fn records_key(&self) -> &'static str;

    /// Toggle field names, used to scope mutation metrics.
    fn toggle_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Paging parameters; defaults to `page=<n>`.
    fn page_params(&self, page: u32, _page_size: u32) -> QueryParams {
        vec![("page".to_string(), page.to_string())]
    }

    /// Parameters for a free-text search.
    fn search_params(&self, term: &str) -> QueryParams;

    /// Parameters for the active filters. Only called when at least one is non-empty.
    fn filter_params(&self, filters: &FilterSet) -> QueryParams;
}

/// A toggle whose confirmation is a single request.
pub trait RemoteToggle<T: ListItem>: ToggleField<T> {
    /// Request confirming the already-applied toggle on `item`.
    fn request(&self, key: &Self::Key, item: &T) -> MutationRequest;
}

/// A resource whose rows can be deleted.
pub trait DeletableResource: ListResource {
    /// Singular noun used in notifications, e.g. `User`.
    fn noun(&self) -> &'static str;

    /// Request deleting `item`.
    fn delete_request(&self, item: &Self::Item) -> MutationRequest;
}

/// Build the list request for `query`: paging first, then either filter or search
/// parameters, never both.
#[must_use]
pub fn list_request<R: ListResource + ?Sized>(
    resource: &R,
    query: &QuerySnapshot,
    page_size: u32,
) -> GetRequest {
    let mut params = resource.page_params(query.page, page_size);
    match query.constraint() {
        QueryConstraint::Filters(filters) => params.extend(resource.filter_params(filters)),
        QueryConstraint::Search(term) => params.extend(resource.search_params(term)),
        QueryConstraint::Unconstrained => {}
    }
    GetRequest {
        path: resource.collection_path().to_string(),
        query: params,
    }
}

/// `q[<predicate>]` parameter name.
pub(crate) fn ransack(predicate: &str) -> String {
    format!("q[{predicate}]")
}
