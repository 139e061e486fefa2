//! Fire-once broadcast signal.
//!
//! A `Trigger` starts unfired and can be fired exactly once. Every listener,
//! whether created before or after the fire, observes it. Listeners created
//! after the fire resolve immediately.

use tokio::sync::watch;

use crate::error::{Result, SignalError};

/// Sending side of a fire-once broadcast.
#[derive(Debug)]
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Trigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the trigger.
    ///
    /// Returns `true` if this call fired it and `false` if it had already
    /// fired. Listeners are only woken by the first call.
    pub fn fire(&self) -> bool {
        let mut fired_now = false;
        self.tx.send_if_modified(|fired| {
            if *fired {
                return false;
            }
            *fired = true;
            fired_now = true;
            true
        });
        fired_now
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Register a new listener.
    pub fn listener(&self) -> TriggerListener {
        TriggerListener { rx: self.tx.subscribe() }
    }
}

/// Receiving side of a `Trigger`.
#[derive(Debug, Clone)]
pub struct TriggerListener {
    rx: watch::Receiver<bool>,
}

impl TriggerListener {
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the trigger fires.
    ///
    /// Resolves immediately if it already has. Fails only if the trigger was
    /// dropped without firing.
    pub async fn wait(&mut self) -> Result<()> {
        let res = self.rx.wait_for(|fired| *fired).await.map(|_| ());
        res.map_err(|_| SignalError::SourceDropped)
    }
}
