//! Remote-backed list controller.
//!
//! # Design
//! - Composes the query state manager, the fetch coordinator and the mutation layer
//!   over one shared list state.
//! - Typed search goes through a [`Debouncer`]; a driver task applies settled values
//!   and starts the fetch. The driver holds only a weak reference, so dropping the
//!   controller stops it. A settled value is applied only if no later search or
//!   explicit query replacement happened before the driver took the query lock.
//! - Query changes install their fetch token while still holding the query lock, so
//!   token order always matches query order.
//! - Dropping the controller cancels the in-flight fetch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use concierge_config::ListSettings;
use concierge_telemetry::{ListMetrics, ListMetricsSnapshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::debounce::{Debouncer, Settled};
use crate::error::{MutationError, TransportError};
use crate::fetch::{FetchCoordinator, FetchOutcome};
use crate::mutation::{MutationLayer, ToggleField};
use crate::pagination::PagerControls;
use crate::query::{FilterSet, QueryChange, QuerySnapshot, QueryStateManager};
use crate::resources::{DeletableResource, ListResource, RemoteToggle};
use crate::state::{ListState, ListSnapshot, SharedState, lock_state};
use crate::toast::{LogToasts, ToastSink};
use crate::transport::Transport;

/// Builder for [`ListController`].
pub struct ListControllerBuilder<R: ListResource> {
    resource: R,
    transport: Arc<dyn Transport>,
    settings: ListSettings,
    metrics: Option<ListMetrics>,
    toasts: Arc<dyn ToastSink>,
}

impl<R: ListResource> ListControllerBuilder<R> {
    /// Override the default list settings.
    #[must_use]
    pub const fn settings(mut self, settings: ListSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Record fetch and mutation outcomes.
    #[must_use]
    pub fn metrics(mut self, metrics: ListMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Deliver toasts somewhere other than the log.
    #[must_use]
    pub fn toasts(mut self, toasts: Arc<dyn ToastSink>) -> Self {
        self.toasts = toasts;
        self
    }

    /// Build the controller and start its search driver. Must run inside a tokio runtime.
    #[must_use]
    pub fn build(self) -> ListController<R> {
        let state: SharedState<R::Item> = Arc::new(Mutex::new(ListState::default()));
        let resource = Arc::new(self.resource);
        let coordinator = FetchCoordinator::new(
            Arc::clone(&resource),
            Arc::clone(&self.transport),
            self.settings,
            self.metrics.clone(),
            Arc::clone(&state),
        );
        let mutations = MutationLayer::new(
            resource.name(),
            Arc::clone(&state),
            self.toasts,
            self.metrics.clone(),
        );
        let shared = Arc::new(Shared {
            resource,
            transport: self.transport,
            settings: self.settings,
            metrics: self.metrics,
            query: Mutex::new(QueryStateManager::new()),
            state,
            coordinator,
            mutations,
        });
        let (debouncer, settled) = Debouncer::new(self.settings.debounce);
        let driver = spawn_search_driver(Arc::downgrade(&shared), settled);
        ListController {
            shared,
            debouncer,
            driver,
        }
    }
}

type Prepared = (QuerySnapshot, CancellationToken, u64);

struct Shared<R: ListResource> {
    resource: Arc<R>,
    transport: Arc<dyn Transport>,
    settings: ListSettings,
    metrics: Option<ListMetrics>,
    query: Mutex<QueryStateManager>,
    state: SharedState<R::Item>,
    coordinator: FetchCoordinator<R>,
    mutations: MutationLayer<R::Item>,
}

impl<R: ListResource> Shared<R> {
    fn query(&self) -> MutexGuard<'_, QueryStateManager> {
        self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a query change and, when it needs one, install a token for the fetch.
    ///
    /// Lock order is query, then list state.
    fn prepare(
        &self,
        change: impl FnOnce(&mut QueryStateManager) -> QueryChange,
    ) -> Option<Prepared> {
        let mut query = self.query();
        match change(&mut query) {
            QueryChange::Unchanged => None,
            outcome => {
                if matches!(outcome, QueryChange::PageReset) {
                    self.coordinator.invalidate_pagination();
                }
                let token = CancellationToken::new();
                let generation = self.coordinator.install(&token);
                Some((query.snapshot(), token, generation))
            }
        }
    }

    async fn execute(&self, prepared: Option<Prepared>) -> FetchOutcome {
        match prepared {
            Some((query, token, generation)) => self.coordinator.run(query, token, generation).await,
            None => FetchOutcome::Skipped,
        }
    }
}

/// Paginated, filterable view over one remote collection.
pub struct ListController<R: ListResource> {
    shared: Arc<Shared<R>>,
    debouncer: Debouncer<String>,
    driver: JoinHandle<()>,
}

impl<R: ListResource> ListController<R> {
    /// Start building a controller for `resource` over `transport`.
    #[must_use]
    pub fn builder(resource: R, transport: Arc<dyn Transport>) -> ListControllerBuilder<R> {
        ListControllerBuilder {
            resource,
            transport,
            settings: ListSettings::default(),
            metrics: None,
            toasts: Arc::new(LogToasts),
        }
    }

    /// Resource descriptor.
    #[must_use]
    pub fn resource(&self) -> &R {
        &self.shared.resource
    }

    /// Effective list settings.
    #[must_use]
    pub fn settings(&self) -> &ListSettings {
        &self.shared.settings
    }

    /// Fetch coordinator, for callers that manage their own tokens.
    #[must_use]
    pub fn coordinator(&self) -> &FetchCoordinator<R> {
        &self.shared.coordinator
    }

    /// Mutation layer, for toggles with custom mutation functions.
    #[must_use]
    pub fn mutations(&self) -> &MutationLayer<R::Item> {
        &self.shared.mutations
    }

    /// Fetch the current query.
    pub async fn refresh(&self) -> FetchOutcome {
        let prepared = self.shared.prepare(|_| QueryChange::Changed);
        self.shared.execute(prepared).await
    }

    /// Replace search, filters and page in one step and fetch the result.
    ///
    /// Filters still win over search, and `page` is applied after the reset a
    /// filter change implies.
    pub async fn open(&self, search: &str, filters: FilterSet, page: u32) -> FetchOutcome {
        self.debouncer.cancel();
        let prepared = self.shared.prepare(|query| {
            query.set_search_term(search);
            query.apply_debounced_search(search);
            query.set_filters(filters);
            query.set_page(page);
            QueryChange::PageReset
        });
        self.shared.execute(prepared).await
    }

    /// Record typed search text. The query picks it up after the debounce window.
    pub fn set_search_term(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.query().set_search_term(text.clone());
        self.debouncer.push(text);
    }

    /// Apply search text immediately, bypassing the debounce window.
    pub async fn search_now(&self, text: impl Into<String>) -> FetchOutcome {
        let text = text.into();
        self.debouncer.cancel();
        let prepared = self.shared.prepare(|query| {
            query.set_search_term(text.clone());
            query.apply_debounced_search(&text)
        });
        self.shared.execute(prepared).await
    }

    /// Replace the filters, go back to page 1 and fetch.
    pub async fn set_filters(&self, filters: FilterSet) -> FetchOutcome {
        let prepared = self.shared.prepare(|query| query.set_filters(filters));
        self.shared.execute(prepared).await
    }

    /// Remove every filter and fall back to the search-only query.
    pub async fn clear_filters(&self) -> FetchOutcome {
        self.set_filters(FilterSet::new()).await
    }

    /// Go to `page`. Skipped for `0` and for the current page.
    pub async fn set_page(&self, page: u32) -> FetchOutcome {
        let prepared = self.shared.prepare(|query| query.set_page(page));
        self.shared.execute(prepared).await
    }

    /// Go to the next page when the pager allows it.
    pub async fn next_page(&self) -> FetchOutcome {
        let snapshot = self.snapshot();
        if !snapshot.pager.next {
            return FetchOutcome::Skipped;
        }
        self.set_page(snapshot.page.saturating_add(1)).await
    }

    /// Go to the previous page when there is one.
    pub async fn previous_page(&self) -> FetchOutcome {
        let snapshot = self.snapshot();
        if !snapshot.pager.previous {
            return FetchOutcome::Skipped;
        }
        self.set_page(snapshot.page - 1).await
    }

    /// Optimistically toggle `field` on row `item_id` and confirm it with the field's request.
    ///
    /// # Errors
    ///
    /// See [`MutationLayer::toggle_field`].
    pub async fn toggle<F>(&self, item_id: u64, field: &F) -> Result<(), MutationError>
    where
        F: RemoteToggle<R::Item>,
    {
        let transport = Arc::clone(&self.shared.transport);
        self.shared
            .mutations
            .toggle_field(item_id, field, |key, item| async move {
                let request = field.request(&key, &item);
                transport.send(&request).await
            })
            .await
    }

    /// Toggle with a caller-supplied mutation function.
    ///
    /// # Errors
    ///
    /// See [`MutationLayer::toggle_field`].
    pub async fn toggle_with<F, M, Fut>(
        &self,
        item_id: u64,
        field: &F,
        mutation: M,
    ) -> Result<(), MutationError>
    where
        F: ToggleField<R::Item>,
        M: FnOnce(F::Key, R::Item) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.shared
            .mutations
            .toggle_field(item_id, field, mutation)
            .await
    }

    /// Current view.
    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot<R::Item> {
        let (query, search_input) = {
            let query = self.shared.query();
            (query.snapshot(), query.search_input().to_string())
        };
        let state = lock_state(&self.shared.state);
        let pager = PagerControls::derive(query.page, &state.page_info, self.shared.settings.page_size);
        ListSnapshot {
            rows: state.rows.clone(),
            page_info: state.page_info,
            pager,
            page: query.page,
            search_input,
            query,
            loading: state.loading,
            last_error: state.last_error.clone(),
            updating: state.updating.clone(),
        }
    }

    /// Counters for this controller's resource, when metrics are enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<ListMetricsSnapshot> {
        let resource = self.resource();
        self.shared
            .metrics
            .as_ref()
            .map(|metrics| metrics.snapshot(resource.name(), resource.toggle_fields()))
    }

    /// Cancel the in-flight fetch and any pending search.
    pub fn shutdown(&self) {
        self.debouncer.cancel();
        self.shared.coordinator.cancel_in_flight();
    }
}

impl<R: DeletableResource> ListController<R> {
    /// Delete row `item_id` on the server, then drop it from the list.
    ///
    /// # Errors
    ///
    /// See [`MutationLayer::remove_item`].
    pub async fn remove(&self, item_id: u64) -> Result<(), MutationError> {
        let transport = Arc::clone(&self.shared.transport);
        let resource = Arc::clone(&self.shared.resource);
        self.shared
            .mutations
            .remove_item(item_id, resource.noun(), |item| async move {
                let request = resource.delete_request(&item);
                transport.send(&request).await
            })
            .await
    }
}

impl<R: ListResource> Drop for ListController<R> {
    fn drop(&mut self) {
        self.driver.abort();
        self.shutdown();
    }
}

fn spawn_search_driver<R: ListResource>(
    shared: Weak<Shared<R>>,
    mut settled: Settled<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = settled.recv().await {
            let Some(strong) = shared.upgrade() else {
                break;
            };
            let prepared = strong.prepare(|query| {
                if settled.is_current() {
                    query.apply_debounced_search(&text)
                } else {
                    QueryChange::Unchanged
                }
            });
            let Some(prepared) = prepared else {
                debug!(resource = strong.resource.name(), "debounced search dropped");
                continue;
            };
            // Spawned so a newer settled value can supersede this fetch while it runs.
            tokio::spawn(async move {
                strong.execute(Some(prepared)).await;
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use concierge_test_support::fixtures;

    use crate::pagination::{TotalPages, summary_label};
    use crate::query::FilterValue;
    use crate::resources::{ActiveToggle, ExternalUsersResource, TicketFlag, TicketsResource};
    use crate::testing::FakeTransport;
    use crate::toast::{ToastKind, ToastLog};
    use crate::transport::{MutationMethod, QueryParams};

    const UPDATE_USER_1: &str = "/pms/users/1/update_vi_user";
    const UPDATE_USER_2: &str = "/pms/users/2/update_vi_user";

    fn controller<R: ListResource>(
        resource: R,
        fake: &Arc<FakeTransport>,
        toasts: &Arc<ToastLog>,
    ) -> ListController<R> {
        ListController::builder(resource, Arc::clone(fake) as Arc<dyn Transport>)
            .toasts(Arc::clone(toasts) as Arc<dyn ToastSink>)
            .build()
    }

    fn setup(default_body: serde_json::Value) -> (Arc<FakeTransport>, Arc<ToastLog>) {
        (
            Arc::new(FakeTransport::new(default_body)),
            Arc::new(ToastLog::new()),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    fn messages(toasts: &ToastLog) -> Vec<(ToastKind, String)> {
        toasts
            .entries()
            .into_iter()
            .map(|toast| (toast.kind, toast.message))
            .collect()
    }

    /// Let spawned tasks run until they block.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_fetches_commit_only_the_newest() {
        let (fake, toasts) = setup(fixtures::users_page(Vec::new(), None));
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));
        let [first, second, third] = [fake.gate(), fake.gate(), fake.gate()];

        let mut handles = Vec::new();
        for _ in 0..3 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move { controller.refresh().await }));
            settle().await;
        }
        assert_eq!(fake.gets().len(), 3);

        // Newest answers first; the stale answers arrive afterwards.
        let _ = third.send(Ok(fixtures::users_page(
            fixtures::numbered_users(20, 2),
            Some(fixtures::pagination(1, 1, 2)),
        )));
        let _ = first.send(Ok(fixtures::users_page(fixtures::numbered_users(1, 5), None)));
        let _ = second.send(Ok(fixtures::users_page(fixtures::numbered_users(10, 4), None)));

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("fetch task"));
        }
        assert_eq!(
            outcomes,
            vec![
                FetchOutcome::Superseded,
                FetchOutcome::Superseded,
                FetchOutcome::Committed { records: 2 },
            ]
        );

        let snapshot = controller.snapshot();
        let ids: Vec<u64> = snapshot.rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![20, 21]);
        assert_eq!(snapshot.page_info.total_count, 2);
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_issues_one_search_after_quiet_period() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 2), None));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        controller.set_search_term("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_search_term("ab");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_search_term("abc");
        assert_eq!(controller.snapshot().search_input, "abc");

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(fake.gets().is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let gets = fake.gets();
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].query, params(&[("page", "1"), ("q[email_cont]", "abc")]));
        assert_eq!(controller.snapshot().rows.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn filters_reset_page_and_replace_search() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 3), None));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        assert!(controller.search_now("ops").await.is_committed());
        assert!(controller.set_page(5).await.is_committed());
        assert_eq!(controller.snapshot().page, 5);
        assert_eq!(fake.gets()[1].param("page"), Some("5"));

        controller
            .set_filters(FilterSet::new().with("department", "X"))
            .await;
        assert_eq!(controller.snapshot().page, 1);
        assert_eq!(
            fake.gets()[2].query,
            params(&[
                ("page", "1"),
                (
                    "q[lock_user_permissions_pms_department_department_name_cont]",
                    "X"
                ),
            ])
        );

        controller.clear_filters().await;
        assert_eq!(
            fake.gets()[3].query,
            params(&[("page", "1"), ("q[email_cont]", "ops")])
        );

        assert_eq!(controller.set_page(1).await, FetchOutcome::Skipped);
        assert_eq!(controller.set_page(0).await, FetchOutcome::Skipped);
        assert_eq!(fake.gets().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_active_toggle_restores_linked_fields() {
        let (fake, toasts) = setup(fixtures::users_page(
            vec![fixtures::external_user(1, Some(40), false)],
            Some(fixtures::pagination(1, 1, 1)),
        ));
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));
        controller.refresh().await;
        let before = controller.snapshot().rows[0].clone();

        let gate = fake.gate_send(UPDATE_USER_1);
        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.toggle(1, &ActiveToggle).await })
        };
        settle().await;

        let during = controller.snapshot();
        assert!(during.is_updating(1));
        assert!(during.rows[0].is_active());
        assert_eq!(during.rows[0].status.as_deref(), Some("approved"));

        let _ = gate.send(Err(TransportError::Status {
            status: 500,
            body: String::new(),
        }));
        let result = task.await.expect("toggle task");
        assert!(matches!(
            result,
            Err(MutationError::Rejected { item_id: 1, .. })
        ));

        let after = controller.snapshot();
        assert_eq!(after.rows[0], before);
        assert!(!after.rows[0].is_active());
        assert_eq!(after.rows[0].status.as_deref(), Some("rejected"));
        assert!(after.updating.is_empty());
        assert_eq!(
            messages(&toasts),
            vec![(ToastKind::Error, "Failed to update active status".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_toggles_on_distinct_rows_settle_independently() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 2), None));
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));
        controller.refresh().await;

        let gate_a = fake.gate_send(UPDATE_USER_1);
        let gate_b = fake.gate_send(UPDATE_USER_2);
        let spawn_toggle = |item_id: u64| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.toggle(item_id, &ActiveToggle).await })
        };
        let task_a = spawn_toggle(1);
        let task_b = spawn_toggle(2);
        settle().await;

        let during = controller.snapshot();
        assert!(during.is_updating(1) && during.is_updating(2));
        assert!(during.rows.iter().all(|row| !row.is_active()));

        assert_eq!(
            controller.toggle(1, &ActiveToggle).await,
            Err(MutationError::Busy { item_id: 1 })
        );
        assert_eq!(fake.sends().len(), 2);

        let _ = gate_b.send(Ok(()));
        assert_eq!(task_b.await.expect("toggle b"), Ok(()));
        let mid = controller.snapshot();
        assert!(mid.is_updating(1));
        assert!(!mid.is_updating(2));

        let _ = gate_a.send(Err(TransportError::Network("connection reset".into())));
        assert!(task_a.await.expect("toggle a").is_err());

        let after = controller.snapshot();
        assert!(after.rows[0].is_active());
        assert!(!after.rows[1].is_active());
        assert_eq!(after.rows[1].status.as_deref(), Some("rejected"));
        assert!(after.updating.is_empty());
        assert_eq!(
            messages(&toasts),
            vec![
                (
                    ToastKind::Success,
                    "User deactivated (rejected) successfully".to_string()
                ),
                (ToastKind::Error, "Failed to update active status".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_total_enables_next_only_for_full_pages() {
        let (fake, toasts) = setup(fixtures::users_page(Vec::new(), None));
        fake.reply(Ok(fixtures::users_page(fixtures::numbered_users(1, 25), None)));
        fake.reply(Ok(fixtures::users_page(fixtures::numbered_users(26, 24), None)));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        controller.refresh().await;
        let first = controller.snapshot();
        assert_eq!(first.page_info.total_pages, TotalPages::Unknown);
        assert!(first.pager.next);
        assert!(first.pager.next_is_heuristic);
        assert!(!first.pager.previous);

        assert!(controller.next_page().await.is_committed());
        let second = controller.snapshot();
        assert_eq!(second.page, 2);
        assert_eq!(second.rows.len(), 24);
        assert!(!second.pager.next);
        assert!(second.pager.previous);
        assert_eq!(summary_label(second.page, &second.page_info), "Page 2 | Total 24");
        assert_eq!(fake.gets()[1].param("page"), Some("2"));

        assert_eq!(controller.next_page().await, FetchOutcome::Skipped);
        assert!(controller.previous_page().await.is_committed());
        assert_eq!(controller.snapshot().page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cluster_filter_overrides_search() {
        let (fake, toasts) = setup(fixtures::users_page(
            fixtures::numbered_users(1, 3),
            Some(fixtures::pagination(1, 1, 3)),
        ));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        controller.search_now("ops").await;
        controller
            .set_filters(FilterSet::new().with("cluster_id", "7"))
            .await;

        let gets = fake.gets();
        assert_eq!(
            gets[1].query,
            params(&[("page", "1"), ("q[company_cluster_id_eq]", "7")])
        );
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.rows.len(), 3);
        assert_eq!(snapshot.page_info.total_pages, TotalPages::Unknown);
        assert!(!snapshot.pager.next);
        assert!(!snapshot.pager.previous);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_permission_id_fails_fast() {
        let (fake, toasts) = setup(fixtures::users_page(
            vec![fixtures::external_user(5, None, true)],
            None,
        ));
        let controller = controller(ExternalUsersResource, &fake, &toasts);
        controller.refresh().await;

        assert_eq!(
            controller.toggle(5, &ActiveToggle).await,
            Err(MutationError::MissingIdentifier {
                item_id: 5,
                identifier: "permission id"
            })
        );
        assert!(fake.sends().is_empty());
        assert!(controller.snapshot().rows[0].is_active());
        assert_eq!(
            messages(&toasts),
            vec![(ToastKind::Error, "Missing permission id".to_string())]
        );
        assert_eq!(
            controller.toggle(99, &ActiveToggle).await,
            Err(MutationError::NotFound { item_id: 99 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_row_only_after_confirmation() {
        let (fake, toasts) = setup(fixtures::users_page(
            fixtures::numbered_users(1, 3),
            Some(fixtures::pagination(1, 1, 3)),
        ));
        let controller = controller(ExternalUsersResource, &fake, &toasts);
        controller.refresh().await;

        fake.on_send(
            "/pms/users/1/delete_vi_user",
            Err(TransportError::Status {
                status: 422,
                body: "has open tickets".into(),
            }),
        );
        assert!(controller.remove(1).await.is_err());
        assert_eq!(controller.snapshot().rows.len(), 3);

        assert_eq!(controller.remove(2).await, Ok(()));
        let snapshot = controller.snapshot();
        let ids: Vec<u64> = snapshot.rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(snapshot.page_info.total_count, 2);
        assert!(snapshot.updating.is_empty());

        let sends = fake.sends();
        assert!(sends.iter().all(|send| send.method == MutationMethod::Delete));
        assert_eq!(
            messages(&toasts),
            vec![
                (ToastKind::Error, "Failed to delete user".to_string()),
                (ToastKind::Success, "User deleted successfully".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_clear_rows_and_timeouts_are_reported() {
        let (fake, toasts) = setup(fixtures::users_page(
            fixtures::numbered_users(1, 3),
            Some(fixtures::pagination(1, 1, 3)),
        ));
        let metrics = ListMetrics::new().expect("metrics");
        let controller = ListController::builder(
            ExternalUsersResource,
            Arc::clone(&fake) as Arc<dyn Transport>,
        )
        .toasts(Arc::clone(&toasts) as Arc<dyn ToastSink>)
        .metrics(metrics)
        .build();

        assert!(controller.refresh().await.is_committed());

        fake.reply(Err(TransportError::Status {
            status: 500,
            body: "boom".into(),
        }));
        assert!(matches!(
            controller.refresh().await,
            FetchOutcome::Failed(TransportError::Status { status: 500, .. })
        ));
        let failed = controller.snapshot();
        assert!(failed.rows.is_empty());
        assert_eq!(
            failed.last_error.as_deref(),
            Some("server responded with status 500")
        );
        assert_eq!(failed.page_info.total_count, 3);

        fake.hang();
        assert_eq!(
            controller.refresh().await,
            FetchOutcome::Failed(TransportError::Timeout)
        );
        assert!(!controller.snapshot().loading);

        let counters = controller.metrics().expect("metrics enabled");
        assert_eq!(counters.fetch_committed, 1);
        assert_eq!(counters.fetch_failed, 2);
        assert_eq!(counters.fetch_inflight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_in_flight_fetch() {
        let (fake, toasts) = setup(fixtures::users_page(Vec::new(), None));
        fake.hang();
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.refresh().await })
        };
        settle().await;
        assert!(controller.snapshot().loading);

        controller.shutdown();
        assert_eq!(task.await.expect("fetch task"), FetchOutcome::Superseded);
        assert!(!controller.snapshot().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_flags_post_to_action_endpoints() {
        let (fake, toasts) = setup(fixtures::tickets_page(
            vec![fixtures::ticket(3, false, false)],
            Some(fixtures::pagination(1, 1, 1)),
        ));
        let controller = controller(TicketsResource, &fake, &toasts);
        controller
            .set_filters(FilterSet::new().with("priority_eq", FilterValue::from("P2")))
            .await;
        assert_eq!(fake.gets()[0].param("per_page"), Some("25"));

        assert_eq!(controller.toggle(3, &TicketFlag::Golden).await, Ok(()));
        let snapshot = controller.snapshot();
        assert!(snapshot.rows[0].is_golden_ticket);
        assert!(!snapshot.rows[0].is_flagged);

        let sends = fake.sends();
        assert_eq!(sends[0].path, "/pms/admin/complaints/mark_as_golden_ticket.json");
        assert_eq!(sends[0].query, params(&[("ids", "[3]")]));
        assert_eq!(
            messages(&toasts),
            vec![(ToastKind::Success, "Golden ticket set for ticket 3".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn partial_pagination_block_still_commits() {
        let (fake, toasts) = setup(serde_json::json!({
            "users": [{"id": 1}, {"id": 2}],
            "pagination": {"current_page": 1, "total_count": 2}
        }));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        assert_eq!(controller.refresh().await, FetchOutcome::Committed { records: 2 });
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.page_info.total_pages, TotalPages::Unknown);
        assert_eq!(snapshot.page_info.total_count, 2);
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.pager.next);
    }

    #[tokio::test(start_paused = true)]
    async fn reported_single_page_does_not_hide_a_full_page() {
        let (fake, toasts) = setup(fixtures::users_page(
            fixtures::numbered_users(1, 25),
            Some(fixtures::pagination(1, 1, 25)),
        ));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        controller
            .set_filters(FilterSet::new().with("department", "Security"))
            .await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.page_info.total_pages, TotalPages::Unknown);
        assert_eq!(snapshot.page_info.total_count, 25);
        assert!(snapshot.pager.next);
        assert!(snapshot.pager.next_is_heuristic);

        assert!(controller.next_page().await.is_committed());
        assert_eq!(fake.gets()[1].param("page"), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_search_supersedes_in_flight_search() {
        let (fake, toasts) = setup(fixtures::users_page(Vec::new(), None));
        let controller = controller(ExternalUsersResource, &fake, &toasts);
        let slow = fake.gate();
        let fast = fake.gate();

        controller.set_search_term("ab");
        tokio::time::sleep(Duration::from_millis(510)).await;
        assert_eq!(fake.gets().len(), 1);
        assert!(controller.snapshot().loading);

        controller.set_search_term("abc");
        tokio::time::sleep(Duration::from_millis(510)).await;
        let gets = fake.gets();
        assert_eq!(gets.len(), 2);
        assert_eq!(gets[0].param("q[email_cont]"), Some("ab"));
        assert_eq!(gets[1].param("q[email_cont]"), Some("abc"));

        // The first request was dropped on supersede, so this reply goes nowhere.
        let _ = slow.send(Ok(fixtures::users_page(fixtures::numbered_users(1, 9), None)));
        settle().await;
        let during = controller.snapshot();
        assert!(during.rows.is_empty());
        assert!(during.loading);

        let _ = fast.send(Ok(fixtures::users_page(fixtures::numbered_users(30, 3), None)));
        settle().await;
        let after = controller.snapshot();
        let ids: Vec<u64> = after.rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![30, 31, 32]);
        assert_eq!(after.search_input, "abc");
        assert!(!after.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_open_discards_pending_typed_search() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 2), None));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        controller.set_search_term("stale");
        assert!(controller.open("fresh", FilterSet::new(), 1).await.is_committed());
        tokio::time::sleep(Duration::from_secs(2)).await;

        let gets = fake.gets();
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].param("q[email_cont]"), Some("fresh"));
        assert_eq!(controller.snapshot().search_input, "fresh");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_page_changes_commit_the_final_query() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 2), None));
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));

        for round in 0..200_u32 {
            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let tasks = [round * 10 + 2, round * 10 + 3].map(|page| {
                let controller = Arc::clone(&controller);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    (page, controller.set_page(page).await)
                })
            });
            let mut outcomes = Vec::new();
            for task in tasks {
                outcomes.push(task.await.expect("page task"));
            }

            let snapshot = controller.snapshot();
            let (_, outcome) = outcomes
                .iter()
                .find(|(page, _)| *page == snapshot.page)
                .expect("final page was requested");
            assert!(
                outcome.is_committed(),
                "round {round}: page {} was not committed",
                snapshot.page
            );
            assert!(!snapshot.loading);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancelled_fetch_leaves_state_idle() {
        let (fake, toasts) = setup(fixtures::users_page(fixtures::numbered_users(1, 2), None));
        let controller = controller(ExternalUsersResource, &fake, &toasts);

        let token = CancellationToken::new();
        let fetch = controller
            .coordinator()
            .fetch(controller.snapshot().query, token.clone());
        assert!(controller.snapshot().loading);
        token.cancel();
        assert_eq!(fetch.await, FetchOutcome::Superseded);

        let snapshot = controller.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.rows.is_empty());
        assert!(controller.refresh().await.is_committed());
        assert_eq!(controller.snapshot().rows.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_toggle_rolls_back() {
        let (fake, toasts) = setup(fixtures::users_page(
            vec![fixtures::external_user(1, Some(40), false)],
            None,
        ));
        let controller = Arc::new(controller(ExternalUsersResource, &fake, &toasts));
        controller.refresh().await;
        let before = controller.snapshot().rows[0].clone();

        let _gate = fake.gate_send(UPDATE_USER_1);
        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.toggle(1, &ActiveToggle).await })
        };
        settle().await;
        assert!(controller.snapshot().rows[0].is_active());

        task.abort();
        assert!(task.await.expect_err("toggle aborted").is_cancelled());
        let after = controller.snapshot();
        assert_eq!(after.rows[0], before);
        assert!(after.updating.is_empty());
        assert!(toasts.entries().is_empty());
        assert_eq!(fake.sends().len(), 1);
    }
}
