//! Shared bridge state: lifecycle machine, registered callback, and the
//! single-slot launch notification queue.
//!
//! One mutex guards all of it. `event_callback` and `pending_launch` are
//! touched from the UI thread (lifecycle hooks), worker-pool threads
//! (`registerCallback` handler), and push-delivery threads
//! (`set_launch_notification`), so every decision that reads-then-clears the
//! pending slot happens under the lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

/// Flat three-state lifecycle of the hosting UI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Detached,
    AttachedBackground,
    AttachedForeground,
}

impl Lifecycle {
    pub fn is_foreground(self) -> bool {
        matches!(self, Lifecycle::AttachedForeground)
    }

    pub fn is_attached(self) -> bool {
        !matches!(self, Lifecycle::Detached)
    }
}

/// A launch notification waiting for the script runtime to become ready.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    lifecycle: Lifecycle,
    event_callback: Option<String>,
    pending_launch: Option<PendingNotification>,
}

/// Process-wide bridge state, shared across threads behind one mutex.
///
/// Survives UI-surface teardown: a surface may be destroyed and recreated
/// (orientation change) without losing the process, and a pending launch
/// notification must outlive that cycle. The callback name and foreground
/// flag, by contrast, reset on every attach and detach.
#[derive(Debug, Default)]
pub struct BridgeState {
    inner: Mutex<Inner>,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    pub fn is_foreground(&self) -> bool {
        self.lifecycle().is_foreground()
    }

    /// Bridge attached to a fresh UI surface: foregrounded, callback cleared.
    pub fn attach(&self) {
        let mut inner = self.inner.lock();
        inner.lifecycle = Lifecycle::AttachedForeground;
        inner.event_callback = None;
        debug!("Bridge attached; foregrounded, event callback cleared");
    }

    /// Surface paused: foreground flag drops.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::AttachedForeground => {
                inner.lifecycle = Lifecycle::AttachedBackground;
            }
            other => warn!(state = ?other, "Ignoring pause outside foreground"),
        }
    }

    /// Surface resumed: foreground flag returns.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::AttachedBackground => {
                inner.lifecycle = Lifecycle::AttachedForeground;
            }
            other => warn!(state = ?other, "Ignoring resume outside background"),
        }
    }

    /// Surface torn down: callback and foreground reset. The pending launch
    /// notification is deliberately left in place.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        if !inner.lifecycle.is_attached() {
            warn!("Ignoring detach while already detached");
            return;
        }
        inner.lifecycle = Lifecycle::Detached;
        inner.event_callback = None;
        debug!("Bridge detached; event callback cleared");
    }

    pub fn register_event_callback(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(callback = %name, "Registered script event callback");
        self.inner.lock().event_callback = Some(name);
    }

    pub fn event_callback(&self) -> Option<String> {
        self.inner.lock().event_callback.clone()
    }

    /// Store a launch notification, unconditionally overwriting any previous
    /// undelivered one. Only the latest payload is representable.
    pub fn set_launch_notification(&self, payload: Value) {
        let mut inner = self.inner.lock();
        if inner.pending_launch.is_some() {
            debug!("Replacing undelivered launch notification");
        }
        inner.pending_launch = Some(PendingNotification {
            payload,
            received_at: Utc::now(),
        });
    }

    /// The launch-delivery guard: hand out the pending payload only when the
    /// surface is foregrounded AND a callback is registered, clearing the
    /// slot in the same critical section so it can never deliver twice.
    pub fn take_deliverable_launch(&self) -> Option<(String, PendingNotification)> {
        let mut inner = self.inner.lock();
        if !inner.lifecycle.is_foreground() {
            return None;
        }
        let callback = inner.event_callback.clone()?;
        let pending = inner.pending_launch.take()?;
        Some((callback, pending))
    }

    #[cfg(test)]
    pub(crate) fn has_pending_launch(&self) -> bool {
        self.inner.lock().pending_launch.is_some()
    }
}
