//! Shared list state and the read-only view handed to callers.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::pagination::{PageInfo, PagerControls};
use crate::query::QuerySnapshot;

/// Mutable list state guarded by one lock.
///
/// The lock is never held across an `.await`; every access goes through
/// [`lock_state`] inside a synchronous helper.
#[derive(Debug)]
pub(crate) struct ListState<T> {
    pub(crate) rows: Vec<T>,
    pub(crate) page_info: PageInfo,
    pub(crate) loading: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) updating: BTreeSet<u64>,
    pub(crate) live: Option<CancellationToken>,
    pub(crate) generation: u64,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            page_info: PageInfo::unknown(),
            loading: false,
            last_error: None,
            updating: BTreeSet::new(),
            live: None,
            generation: 0,
        }
    }
}

impl<T> ListState<T> {
    /// Whether the fetch installed as `generation` under `token` may still commit.
    pub(crate) fn is_live(&self, token: &CancellationToken, generation: u64) -> bool {
        !token.is_cancelled() && self.live.is_some() && self.generation == generation
    }
}

pub(crate) type SharedState<T> = Arc<Mutex<ListState<T>>>;

/// Lock the state, recovering from poisoning. Critical sections never leave the
/// state half-written, so a poisoned guard is still consistent.
pub(crate) fn lock_state<T>(state: &Mutex<ListState<T>>) -> MutexGuard<'_, ListState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time view of a list controller.
#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot<T> {
    /// Rows of the last committed fetch, with optimistic edits applied.
    pub rows: Vec<T>,
    /// Pagination metadata of the last committed fetch.
    pub page_info: PageInfo,
    /// Previous/next state for the requested page.
    pub pager: PagerControls,
    /// Requested page.
    pub page: u32,
    /// Raw search text as typed.
    pub search_input: String,
    /// Query the next fetch will use.
    #[serde(skip)]
    pub query: QuerySnapshot,
    /// A fetch is in flight.
    pub loading: bool,
    /// Message of the last failed fetch, cleared by the next commit.
    pub last_error: Option<String>,
    /// Ids with a mutation in flight.
    pub updating: BTreeSet<u64>,
}

impl<T> ListSnapshot<T> {
    /// Whether `item_id` has a mutation in flight.
    #[must_use]
    pub fn is_updating(&self, item_id: u64) -> bool {
        self.updating.contains(&item_id)
    }
}
