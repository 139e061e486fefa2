//! Observable value cells.
//!
//! An `Observable` holds a value that can be read as a point-in-time snapshot
//! at any moment. Writes that leave the value unchanged are silent. Each
//! `Subscription` sees every actual change once: awaiting `next_change`
//! yields the newest value and re-arms for the following change. Changes
//! that land before the subscriber looks again are coalesced into the
//! latest value.

use tokio::sync::watch;

use crate::error::{Result, SignalError};

/// Shared value cell with change notification.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Default + Clone + PartialEq> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Store a value, notifying subscribers only if it differs from the
    /// current one. Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Subscribe to changes made after this call.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription { rx: self.tx.subscribe() }
    }
}

/// Change stream over an `Observable`.
#[derive(Debug, Clone)]
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next change and return the new value.
    pub async fn next_change(&mut self) -> Result<T> {
        self.rx.changed().await.map_err(|_| SignalError::SourceDropped)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Whether a change is pending that `next_change` would return at once.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
