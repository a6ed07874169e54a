//! Event relay: pushes native-originated events into the script runtime.
//!
//! An emission is one invocation of the script-side registered callback with
//! a JSON payload as its sole argument; no return value is read. Emissions
//! with no registered callback or no attached surface are dropped, not
//! queued. Only the launch-notification path gets durability, because only
//! that path races app startup.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

/// The host's script-injection seam.
///
/// `invoke` receives a complete `javascript:` snippet. The bridge may call
/// it from worker-pool or push-delivery threads; implementations must
/// marshal the invocation onto the thread owning the script runtime, since
/// injecting code is only safe from there.
pub trait ScriptSurface: Send + Sync {
    fn invoke(&self, snippet: &str);
}

/// Holds the non-owning surface reference and renders callback invocations.
///
/// The surface slot is set on attach and cleared on detach so a torn-down
/// surface is never invoked.
#[derive(Default)]
pub struct EventRelay {
    surface: Mutex<Option<Arc<dyn ScriptSurface>>>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_surface(&self, surface: Arc<dyn ScriptSurface>) {
        *self.surface.lock() = Some(surface);
    }

    pub fn clear_surface(&self) {
        *self.surface.lock() = None;
    }

    /// Invoke `callback(payload)` in the script runtime. Silent no-op when
    /// no surface is attached.
    pub fn emit(&self, callback: &str, payload: &Value) {
        if callback.is_empty() {
            debug!("Dropping event: empty callback name");
            return;
        }
        let surface = self.surface.lock().clone();
        match surface {
            Some(surface) => {
                let snippet = render_invocation(callback, payload);
                trace!(snippet = %snippet, "Relaying event to script runtime");
                surface.invoke(&snippet);
            }
            None => debug!(callback = %callback, "Dropping event: no surface attached"),
        }
    }
}

fn render_invocation(callback: &str, payload: &Value) -> String {
    format!("javascript:{}({})", callback, payload)
}
