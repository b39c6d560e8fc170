//! Optimistic mutation layer.
//!
//! # Design
//! - A toggle is applied to the row before the network call and undone from an
//!   exact snapshot if the call fails; the snapshot covers every field the toggle
//!   touches so linked fields roll back together.
//! - Each row carries at most one mutation; distinct rows never wait on each other.
//! - The "updating" mark is released by a guard so a dropped mutation future
//!   cannot leave a row locked. A toggle's guard also owns its snapshot, so a
//!   toggle abandoned mid-flight is rolled back like a failed one.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use concierge_telemetry::{ListMetrics, MutationOutcomeLabel};
use tracing::{debug, info, warn};

use crate::error::{MutationError, TransportError};
use crate::resources::ListItem;
use crate::state::{ListState, SharedState, lock_state};
use crate::toast::{Toast, ToastKind, ToastSink};

/// A field (plus any fields derived from it) that can be flipped optimistically.
pub trait ToggleField<T: ListItem>: Send + Sync {
    /// Sub-resource identifier the mutation needs (`()` when the row id suffices).
    type Key: Send;
    /// Values restored on failure.
    type Snapshot: Send;

    /// Field name for logs, metrics and notifications.
    fn name(&self) -> &'static str;

    /// Extract the identifier the mutation needs.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::MissingIdentifier`] when the row cannot be mutated.
    fn precondition(&self, item: &T) -> Result<Self::Key, MutationError>;

    /// Capture every value [`ToggleField::apply`] is about to change.
    fn capture(&self, item: &T) -> Self::Snapshot;

    /// Flip the field in place.
    fn apply(&self, item: &mut T);

    /// Put back exactly what [`ToggleField::capture`] saw.
    fn restore(&self, item: &mut T, snapshot: Self::Snapshot);

    /// Notification text after the server confirmed the change on `item`.
    fn success_message(&self, item: &T) -> String {
        format!("{} updated for item {}", self.name(), item.item_id())
    }

    /// Notification text after a rollback.
    fn failure_message(&self) -> String {
        format!("Failed to update {}", self.name())
    }
}

/// Applies optimistic toggles and confirmed deletes to shared list state.
pub struct MutationLayer<T> {
    resource: &'static str,
    state: SharedState<T>,
    toasts: Arc<dyn ToastSink>,
    metrics: Option<ListMetrics>,
    next_toast: AtomicU64,
}

impl<T: ListItem> MutationLayer<T> {
    pub(crate) fn new(
        resource: &'static str,
        state: SharedState<T>,
        toasts: Arc<dyn ToastSink>,
        metrics: Option<ListMetrics>,
    ) -> Self {
        Self {
            resource,
            state,
            toasts,
            metrics,
            next_toast: AtomicU64::new(1),
        }
    }

    /// Optimistically toggle `field` on row `item_id`, then run `mutation`.
    ///
    /// `mutation` receives the identifier extracted by the precondition and a copy of
    /// the row with the toggle already applied. The local change is visible before
    /// `mutation` is first polled.
    ///
    /// # Errors
    ///
    /// - [`MutationError::NotFound`], [`MutationError::MissingIdentifier`] or
    ///   [`MutationError::Busy`] when a precondition fails; nothing is sent.
    /// - [`MutationError::Rejected`] when `mutation` fails; the row is restored.
    pub async fn toggle_field<F, M, Fut>(
        &self,
        item_id: u64,
        field: &F,
        mutation: M,
    ) -> Result<(), MutationError>
    where
        F: ToggleField<T>,
        M: FnOnce(F::Key, T) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let (key, snapshot, updated) = match self.begin_toggle(item_id, field) {
            Ok(begun) => begun,
            Err(err) => {
                self.refuse(field.name(), &err);
                return Err(err);
            }
        };
        let mark = UpdatingMark::with_undo(&self.state, item_id, move |item: &mut T| {
            field.restore(item, snapshot);
        });

        match mutation(key, updated).await {
            Ok(()) => {
                let message = mark.settle(|state| {
                    find(&mut state.rows, item_id).map(|item| field.success_message(item))
                });
                info!(resource = self.resource, field = field.name(), item_id, "toggle committed");
                self.record(field.name(), MutationOutcomeLabel::Committed);
                self.notify(
                    ToastKind::Success,
                    message.unwrap_or_else(|| format!("{} updated", field.name())),
                );
                Ok(())
            }
            Err(source) => {
                drop(mark);
                warn!(
                    resource = self.resource,
                    field = field.name(),
                    item_id,
                    error = %source,
                    "toggle rolled back"
                );
                self.record(field.name(), MutationOutcomeLabel::RolledBack);
                self.notify(ToastKind::Error, field.failure_message());
                Err(MutationError::Rejected { item_id, source })
            }
        }
    }

    /// Delete row `item_id` once `mutation` succeeds. Nothing changes locally until
    /// then; on success the row is removed and the total count decremented.
    ///
    /// # Errors
    ///
    /// - [`MutationError::NotFound`] or [`MutationError::Busy`] before anything is sent.
    /// - [`MutationError::Rejected`] when `mutation` fails.
    pub async fn remove_item<M, Fut>(
        &self,
        item_id: u64,
        noun: &str,
        mutation: M,
    ) -> Result<(), MutationError>
    where
        M: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let item = match self.begin_remove(item_id) {
            Ok(item) => item,
            Err(err) => {
                self.refuse("delete", &err);
                return Err(err);
            }
        };
        let mark = UpdatingMark::new(&self.state, item_id);

        match mutation(item).await {
            Ok(()) => {
                mark.settle(|state| {
                    state.rows.retain(|row| row.item_id() != item_id);
                    state.page_info.total_count = state.page_info.total_count.saturating_sub(1);
                });
                info!(resource = self.resource, item_id, "item deleted");
                self.record("delete", MutationOutcomeLabel::Committed);
                self.notify(ToastKind::Success, format!("{noun} deleted successfully"));
                Ok(())
            }
            Err(source) => {
                drop(mark);
                warn!(resource = self.resource, item_id, error = %source, "delete failed");
                self.record("delete", MutationOutcomeLabel::Failed);
                self.notify(
                    ToastKind::Error,
                    format!("Failed to delete {}", noun.to_lowercase()),
                );
                Err(MutationError::Rejected { item_id, source })
            }
        }
    }

    fn begin_toggle<F: ToggleField<T>>(
        &self,
        item_id: u64,
        field: &F,
    ) -> Result<(F::Key, F::Snapshot, T), MutationError> {
        let mut guard = lock_state(&self.state);
        let ListState { rows, updating, .. } = &mut *guard;
        let item = find(rows, item_id).ok_or(MutationError::NotFound { item_id })?;
        let key = field.precondition(item)?;
        if updating.contains(&item_id) {
            return Err(MutationError::Busy { item_id });
        }
        let snapshot = field.capture(item);
        field.apply(item);
        updating.insert(item_id);
        Ok((key, snapshot, item.clone()))
    }

    fn begin_remove(&self, item_id: u64) -> Result<T, MutationError> {
        let mut guard = lock_state(&self.state);
        let ListState { rows, updating, .. } = &mut *guard;
        let item = find(rows, item_id)
            .ok_or(MutationError::NotFound { item_id })?
            .clone();
        if !updating.insert(item_id) {
            return Err(MutationError::Busy { item_id });
        }
        Ok(item)
    }

    fn refuse(&self, field: &'static str, err: &MutationError) {
        match err {
            MutationError::Busy { item_id } => {
                debug!(resource = self.resource, field, item_id, "mutation already in flight");
            }
            MutationError::MissingIdentifier { identifier, .. } => {
                self.record(field, MutationOutcomeLabel::Rejected);
                self.notify(ToastKind::Error, format!("Missing {identifier}"));
            }
            _ => {
                self.record(field, MutationOutcomeLabel::Rejected);
                self.notify(ToastKind::Error, err.to_string());
            }
        }
    }

    fn record(&self, field: &str, outcome: MutationOutcomeLabel) {
        if let Some(metrics) = &self.metrics {
            metrics.mutation_finished(self.resource, field, outcome);
        }
    }

    fn notify(&self, kind: ToastKind, message: String) {
        let id = self.next_toast.fetch_add(1, Ordering::Relaxed);
        self.toasts.push(Toast { id, message, kind });
    }
}

fn find<T: ListItem>(rows: &mut [T], item_id: u64) -> Option<&mut T> {
    rows.iter_mut().find(|row| row.item_id() == item_id)
}

/// Holds a row's "updating" mark; releases it on drop unless settled first.
///
/// When built with an undo, dropping the mark unsettled also runs the undo on the
/// row, under the same lock that releases the mark.
struct UpdatingMark<'a, T: ListItem, U: FnOnce(&mut T) = fn(&mut T)> {
    state: &'a SharedState<T>,
    item_id: u64,
    undo: Option<U>,
    armed: bool,
}

impl<'a, T: ListItem> UpdatingMark<'a, T> {
    const fn new(state: &'a SharedState<T>, item_id: u64) -> Self {
        Self {
            state,
            item_id,
            undo: None,
            armed: true,
        }
    }
}

impl<'a, T: ListItem, U: FnOnce(&mut T)> UpdatingMark<'a, T, U> {
    const fn with_undo(state: &'a SharedState<T>, item_id: u64, undo: U) -> Self {
        Self {
            state,
            item_id,
            undo: Some(undo),
            armed: true,
        }
    }

    /// Run `apply` and release the mark under a single lock. The undo is discarded.
    fn settle<R>(mut self, apply: impl FnOnce(&mut ListState<T>) -> R) -> R {
        self.armed = false;
        self.undo = None;
        let mut state = lock_state(self.state);
        let out = apply(&mut state);
        state.updating.remove(&self.item_id);
        out
    }
}

impl<T: ListItem, U: FnOnce(&mut T)> Drop for UpdatingMark<'_, T, U> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock_state(self.state);
        if let Some(undo) = self.undo.take()
            && let Some(item) = find(&mut state.rows, self.item_id)
        {
            undo(item);
        }
        state.updating.remove(&self.item_id);
    }
}
