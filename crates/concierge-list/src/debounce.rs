//! Reusable trailing-edge debounce primitive.
//!
//! # Design
//! - One timer task at a time: each push aborts the pending task and arms a new one.
//! - Settled values are delivered through a [`Settled`] receiver owned by the caller.
//! - Every push and cancel starts a new epoch. Values are tagged with the epoch they
//!   were pushed in, and the receiver drops any whose epoch has since ended, so a
//!   cancel also discards a value that was already emitted but not yet received.
//! - A zero delay forwards values immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Emits the last value pushed once no new value has arrived for `delay`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    epoch: Arc<AtomicU64>,
    output: mpsc::UnboundedSender<(u64, T)>,
}

/// Receiving end of a [`Debouncer`].
#[derive(Debug)]
pub struct Settled<T> {
    epoch: Arc<AtomicU64>,
    delivered: u64,
    input: mpsc::UnboundedReceiver<(u64, T)>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Debouncer plus the receiver settled values arrive on.
    #[must_use]
    pub fn new(delay: Duration) -> (Self, Settled<T>) {
        let (output, input) = mpsc::unbounded_channel();
        let epoch = Arc::new(AtomicU64::new(0));
        (
            Self {
                delay,
                pending: Mutex::new(None),
                epoch: Arc::clone(&epoch),
                output,
            },
            Settled {
                epoch,
                delivered: 0,
                input,
            },
        )
    }

    /// Configured quiet period.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending value with `value` and restart the quiet period.
    pub fn push(&self, value: T) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        if self.delay.is_zero() {
            // A closed receiver means the consumer is gone; nothing left to notify.
            let _ = self.output.send((epoch, value));
            return;
        }
        let output = self.output.clone();
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = output.send((epoch, value));
        }));
    }

    /// Drop the pending value, if any, without emitting it. A value emitted but not
    /// yet received is dropped as well.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl<T: Send> Settled<T> {
    /// Next settled value. `None` once the debouncer is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let (epoch, value) = self.input.recv().await?;
            if self.accept(epoch) {
                return Some(value);
            }
        }
    }

    /// Next settled value, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        while let Ok((epoch, value)) = self.input.try_recv() {
            if self.accept(epoch) {
                return Some(value);
            }
        }
        None
    }

    /// Whether no push or cancel has happened since the last value was received.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.delivered
    }

    fn accept(&mut self, epoch: u64) -> bool {
        self.delivered = epoch;
        self.is_current()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = pending.take() {
            task.abort();
        }
    }
}
