//! Query state: page, debounced search text and structured filters.
//!
//! # Design
//! - Pure state; no I/O. The controller decides when to fetch based on the
//!   [`QueryChange`] each mutation reports.
//! - Filters win over search whenever any filter value is non-empty.
//! - Page resets are decided by [`PageResetTracker`], which compares values against
//!   the last observed snapshot so repeated observations never re-trigger a reset.

use std::collections::BTreeMap;
use std::fmt;

/// Single filter value as entered in a filter dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Free text; blank means "no constraint".
    Text(String),
    /// Numeric identifier (cluster id, department id, ...).
    Number(i64),
}

impl FilterValue {
    /// Whether the value constrains the query.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Query-string form of the value.
    #[must_use]
    pub fn to_param(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => formatter.write_str(text),
            Self::Number(number) => write!(formatter, "{number}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Filter mapping keyed by domain filter name. Ordered so comparisons and
/// generated query strings are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    /// Empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace one filter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value for `key`, blank or not.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    /// Query-string value for `key` when it constrains the query.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .map(FilterValue::to_param)
    }

    /// Whether any filter value is non-empty.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.values.values().any(|value| !value.is_empty())
    }

    /// Non-empty filters in key order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for FilterSet
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

/// What drives the server-side query for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryConstraint<'a> {
    /// At least one filter value is non-empty; search text is ignored.
    Filters(&'a FilterSet),
    /// No active filters and a non-blank debounced search term.
    Search(&'a str),
    /// Plain page fetch.
    Unconstrained,
}

/// Immutable view of the query used for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
    /// Requested page (1-based).
    pub page: u32,
    /// Debounced, trimmed search term.
    pub search: String,
    /// Filters at the time of the snapshot.
    pub filters: FilterSet,
}

impl QuerySnapshot {
    /// Snapshot for `page` with no search and no filters.
    #[must_use]
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            search: String::new(),
            filters: FilterSet::new(),
        }
    }

    /// Constraint precedence: filters, then search, then nothing.
    #[must_use]
    pub fn constraint(&self) -> QueryConstraint<'_> {
        if self.filters.is_active() {
            QueryConstraint::Filters(&self.filters)
        } else if self.search.is_empty() {
            QueryConstraint::Unconstrained
        } else {
            QueryConstraint::Search(&self.search)
        }
    }
}

/// Effect of a query mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryChange {
    /// Nothing observable changed; no fetch is needed.
    Unchanged,
    /// The query changed on the current page.
    Changed,
    /// The query changed and the page went back to 1; stale pagination should be dropped.
    PageReset,
}

impl QueryChange {
    /// Whether the change warrants a new fetch.
    #[must_use]
    pub const fn needs_fetch(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Value-based page reset decision.
#[derive(Debug, Clone, Default)]
pub struct PageResetTracker {
    last_search: String,
    last_filters: FilterSet,
}

impl PageResetTracker {
    /// Observe the current search and filters; returns `true` when page 1 should be requested.
    ///
    /// A reset is requested when the search became non-empty and differs from the last
    /// observation, or when the filters differ and at least one is non-empty. The
    /// snapshot advances on every call.
    pub fn reset_page_on_change(&mut self, debounced_search: &str, filters: &FilterSet) -> bool {
        let search_changed = debounced_search != self.last_search;
        let filters_changed = *filters != self.last_filters;
        if search_changed {
            debounced_search.clone_into(&mut self.last_search);
        }
        if filters_changed {
            self.last_filters = filters.clone();
        }
        (search_changed && !debounced_search.is_empty()) || (filters_changed && filters.is_active())
    }
}

/// Owner of the user-adjustable query parameters.
#[derive(Debug, Clone)]
pub struct QueryStateManager {
    page: u32,
    search_input: String,
    search: String,
    filters: FilterSet,
    tracker: PageResetTracker,
}

impl Default for QueryStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStateManager {
    /// Fresh query on page 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: 1,
            search_input: String::new(),
            search: String::new(),
            filters: FilterSet::new(),
            tracker: PageResetTracker::default(),
        }
    }

    /// Currently requested page.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Raw search text as typed.
    #[must_use]
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    /// Debounced search term used for querying.
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Current filters.
    #[must_use]
    pub const fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Store raw search text for display. Has no effect on the query until the
    /// debounced value is applied.
    pub fn set_search_term(&mut self, text: impl Into<String>) {
        self.search_input = text.into();
    }

    /// Apply a debounced search value. Whitespace-only input counts as empty.
    pub fn apply_debounced_search(&mut self, text: &str) -> QueryChange {
        let next = text.trim();
        if next == self.search {
            return QueryChange::Unchanged;
        }
        next.clone_into(&mut self.search);
        if self.tracker.reset_page_on_change(&self.search, &self.filters) {
            self.page = 1;
            QueryChange::PageReset
        } else {
            QueryChange::Changed
        }
    }

    /// Replace the filters wholesale and go back to page 1.
    ///
    /// Always reports [`QueryChange::PageReset`]: even clearing the filters must
    /// refetch on the search-only path.
    pub fn set_filters(&mut self, filters: FilterSet) -> QueryChange {
        self.filters = filters;
        self.tracker.reset_page_on_change(&self.search, &self.filters);
        self.page = 1;
        QueryChange::PageReset
    }

    /// Request a page. Ignored for `0` and for the current page.
    pub fn set_page(&mut self, page: u32) -> QueryChange {
        if page == 0 || page == self.page {
            return QueryChange::Unchanged;
        }
        self.page = page;
        QueryChange::Changed
    }

    /// Snapshot for the next fetch.
    #[must_use]
    pub fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            page: self.page,
            search: self.search.clone(),
            filters: self.filters.clone(),
        }
    }
}
