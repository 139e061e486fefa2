//! Health state of a single storage server.
//!
//! The state is a set of orthogonal signals rather than one enum. Writers are
//! partitioned by field: the metrics poller owns the metrics snapshot, the
//! registry owns the store type and interface fields. Readers may take a
//! snapshot of any field at any time.
//!
//! Once the removal trigger fires the state is frozen and every setter
//! becomes a no-op.

use std::sync::atomic::{AtomicI64, Ordering};

use corelib::{MetricsOutcome, ProcessClass, ServerId, StorageServerInterface};
use parking_lot::RwLock;
use signals::{Observable, Subscription, Trigger, TriggerListener};
use tokio::sync::Notify;

/// Interface and process class as last observed together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub interface: StorageServerInterface,
    pub process_class: ProcessClass,
}

/// Effective disposition derived from the health flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Healthy and eligible for team membership.
    Active,
    /// Temporarily excluded from new work.
    VersionTooFarBehind,
    /// Must be destroyed and recreated.
    WrongStoreType,
    /// Gone.
    Removed,
}

/// Mutable health signals of one storage server.
#[derive(Debug)]
pub struct ServerHealth {
    server_id: ServerId,
    in_desired_dc: bool,
    interface: Observable<InterfaceInfo>,
    /// `None` until the first poll completes.
    server_metrics: RwLock<Option<MetricsOutcome>>,
    wrong_store_type: Observable<bool>,
    version_too_far_behind: Observable<bool>,
    data_in_flight: AtomicI64,
    removed: Trigger,
    wake_up: Notify,
}

impl ServerHealth {
    pub fn new(info: InterfaceInfo, in_desired_dc: bool) -> Self {
        Self {
            server_id: info.interface.id,
            in_desired_dc,
            interface: Observable::new(info),
            server_metrics: RwLock::new(None),
            wrong_store_type: Observable::new(false),
            version_too_far_behind: Observable::new(false),
            data_in_flight: AtomicI64::new(0),
            removed: Trigger::new(),
            wake_up: Notify::new(),
        }
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub fn in_desired_dc(&self) -> bool {
        self.in_desired_dc
    }

    pub fn interface(&self) -> InterfaceInfo {
        self.interface.get()
    }

    /// Subscribe to interface changes.
    ///
    /// Each call to `next_change` on the subscription yields the new pair once
    /// per actual change, then must be awaited again for the next one.
    pub fn on_interface_changed(&self) -> Subscription<InterfaceInfo> {
        self.interface.subscribe()
    }

    /// Record a newly observed interface. Returns whether anything changed.
    pub fn update_interface(&self, info: InterfaceInfo) -> bool {
        if self.is_removed() {
            return false;
        }
        self.interface.set(info)
    }

    /// Snapshot of the last stored metrics outcome.
    pub fn server_metrics(&self) -> Option<MetricsOutcome> {
        self.server_metrics.read().clone()
    }

    /// Replace the metrics snapshot. Last write wins, whatever the outcomes.
    ///
    /// Returns `false` without writing once the server is removed.
    pub(crate) fn store_metrics(&self, outcome: MetricsOutcome) -> bool {
        let mut slot = self.server_metrics.write();
        if self.removed.is_fired() {
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub fn is_wrong_store_type(&self) -> bool {
        self.wrong_store_type.get()
    }

    /// Flag the server as running the wrong storage engine.
    ///
    /// The flag never clears: the only remedy is replacing the server.
    /// Returns whether the flag was newly set.
    pub fn mark_wrong_store_type(&self) -> bool {
        if self.is_removed() {
            return false;
        }
        self.wrong_store_type.set(true)
    }

    pub fn on_wrong_store_type(&self) -> Subscription<bool> {
        self.wrong_store_type.subscribe()
    }

    pub fn is_version_too_far_behind(&self) -> bool {
        self.version_too_far_behind.get()
    }

    /// Set or clear the version lag flag. Returns whether it flipped.
    pub fn set_version_too_far_behind(&self, behind: bool) -> bool {
        if self.is_removed() {
            return false;
        }
        self.version_too_far_behind.set(behind)
    }

    pub fn on_version_lag_changed(&self) -> Subscription<bool> {
        self.version_too_far_behind.subscribe()
    }

    /// Bytes currently being moved onto this server.
    pub fn data_in_flight(&self) -> i64 {
        self.data_in_flight.load(Ordering::Acquire)
    }

    /// Adjust the in-flight byte count, returning the new value.
    ///
    /// Once removed the count is left as is and the current value returned.
    pub fn add_data_in_flight(&self, delta: i64) -> i64 {
        if self.is_removed() {
            return self.data_in_flight();
        }
        self.data_in_flight.fetch_add(delta, Ordering::AcqRel) + delta
    }

    pub fn is_removed(&self) -> bool {
        self.removed.is_fired()
    }

    /// Listen for removal. Listeners created after removal resolve at once.
    pub fn on_removed(&self) -> TriggerListener {
        self.removed.listener()
    }

    /// Fire the removal trigger. Returns `false` if it had already fired.
    ///
    /// Holds the metrics lock while firing, so no metrics write can land
    /// after this returns.
    pub(crate) fn fire_removed(&self) -> bool {
        let _slot = self.server_metrics.write();
        self.removed.fire()
    }

    /// Ask the poller to re-evaluate now instead of at its next tick.
    ///
    /// A wake-up raised while the poller is busy is kept until it next waits.
    pub fn wake_up_tracker(&self) {
        self.wake_up.notify_one();
    }

    pub(crate) async fn woken(&self) {
        self.wake_up.notified().await
    }

    pub fn disposition(&self) -> Disposition {
        if self.is_removed() {
            Disposition::Removed
        } else if self.is_wrong_store_type() {
            Disposition::WrongStoreType
        } else if self.is_version_too_far_behind() {
            Disposition::VersionTooFarBehind
        } else {
            Disposition::Active
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.disposition() == Disposition::Active
    }
}
