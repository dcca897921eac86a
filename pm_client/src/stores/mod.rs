//! # Stores
//!
//! Stateful caches in front of the services. Each store publishes its state
//! through a `tokio::sync::watch` channel: read a snapshot at any time or
//! `subscribe()` to be woken on every change.
//!
//! Error policy: reads record a failure in the store's `error` field and
//! return normally; mutations record it *and* return it. Optimistic
//! mutations put the previous value back before returning the error.

use tokio::sync::watch;

use crate::error::ClientError;

pub mod accounting;
pub mod habits;
pub mod modules;
pub mod notifications;
pub mod todo;

pub use accounting::{AccountingState, AccountingStore};
pub use habits::{HabitState, HabitStore};
pub use modules::{ModulePreferences, ModuleSettings, DEFAULT_MODULE_ORDER};
pub use notifications::{NotificationState, NotificationStore, MAX_NOTIFICATIONS, TOAST_TIMEOUT};
pub use todo::{TodoState, TodoStore};

/// Watch-channel cell shared by the stores.
#[derive(Debug)]
pub(crate) struct Reactive<T> {
    tx: watch::Sender<T>,
}

impl<T> Reactive<T> {
    pub(crate) fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutates in place and notifies subscribers.
    pub(crate) fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Reactive<T> {
    pub(crate) fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }
}

/// Message stored in a store's `error` field.
pub(crate) fn error_message(err: &ClientError, fallback: &str) -> String {
    let msg = err.to_string();
    if msg.is_empty() {
        fallback.to_string()
    } else {
        msg
    }
}
