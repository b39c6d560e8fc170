//! Transient user notifications raised by mutations.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    /// Mutation confirmed.
    Success,
    /// Mutation refused or rolled back.
    Error,
}

/// Notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    /// Monotonic identifier, unique per controller.
    pub id: u64,
    /// Display message.
    pub message: String,
    /// Severity.
    pub kind: ToastKind,
}

/// Destination for toasts.
pub trait ToastSink: Send + Sync {
    /// Deliver one toast.
    fn push(&self, toast: Toast);
}

/// Sink that writes toasts to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogToasts;

impl ToastSink for LogToasts {
    fn push(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Success => info!(toast_id = toast.id, "{}", toast.message),
            ToastKind::Error => warn!(toast_id = toast.id, "{}", toast.message),
        }
    }
}

/// Sink that buffers toasts until drained.
#[derive(Debug, Default)]
pub struct ToastLog {
    entries: Mutex<Vec<Toast>>,
}

impl ToastLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of the buffered toasts.
    #[must_use]
    pub fn entries(&self) -> Vec<Toast> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ToastSink for ToastLog {
    fn push(&self, toast: Toast) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(toast);
    }
}
