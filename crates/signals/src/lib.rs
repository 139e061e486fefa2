//! Notification channels for storage server bookkeeping.
//!
//! This crate provides the two signalling shapes the team collection needs:
//! - `Trigger`: a broadcast that fires at most once and is never missed
//! - `Observable`: a value cell whose changes are observed once per change

pub mod error;
pub mod observable;
pub mod trigger;

pub use error::{Result, SignalError};
pub use observable::{Observable, Subscription};
pub use trigger::{Trigger, TriggerListener};
