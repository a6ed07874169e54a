//! The bridge: command dispatch, handlers, and lifecycle entry points.
//!
//! `dispatch` resolves a command name against the action registry and hands
//! the matching handler to the worker pool, returning immediately; it is safe
//! to call from the UI thread and never blocks on the SDK. Handlers run on
//! pool threads with no cross-command ordering and resolve their reply
//! channel exactly once, mapping any collaborator failure to an error reply.
//!
//! Lifecycle hooks mirror the hosting surface: attach (fresh surface,
//! foregrounded, callback cleared), pause/resume (foreground flag), detach
//! (surface gone, callback cleared). Launch-notification delivery is
//! re-evaluated through one guard after every event that can satisfy it:
//! a callback registration or a foreground transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::InitKeys;
use crate::error::Result;
use crate::executor::WorkerPool;
use crate::protocol::{Action, Command, ReplyChannel};
use crate::relay::{EventRelay, ScriptSurface};
use crate::sdk::PushSdk;
use crate::state::BridgeState;

/// Handlers may block on SDK network/disk I/O; a few workers keep one slow
/// call from delaying the rest.
const POOL_SIZE: usize = 4;

/// The dispatch/relay layer between the script runtime and the native SDK.
pub struct Bridge {
    state: Arc<BridgeState>,
    relay: Arc<EventRelay>,
    sdk: Arc<dyn PushSdk>,
    keys: Arc<InitKeys>,
    pool: WorkerPool,
}

impl Bridge {
    /// Build a bridge around an initialized SDK. `keys` are the credentials
    /// resolved by [`crate::config::initialize_once`]; the `initialize`
    /// action returns them to script code.
    pub fn new(sdk: Arc<dyn PushSdk>, keys: InitKeys) -> Self {
        Bridge {
            state: Arc::new(BridgeState::new()),
            relay: Arc::new(EventRelay::new()),
            sdk,
            keys: Arc::new(keys),
            pool: WorkerPool::new(POOL_SIZE),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle entry points (called on the UI-owning thread)
    // ------------------------------------------------------------------

    /// Bridge attached to a fresh UI surface.
    pub fn attach(&self, surface: Arc<dyn ScriptSurface>) {
        self.relay.set_surface(surface);
        self.state.attach();
        // Foreground flag just changed; a freshly attached surface has no
        // callback yet, so this only fires on re-entrant attach patterns.
        self.deliver_pending_launch();
    }

    pub fn pause(&self) {
        self.state.pause();
    }

    pub fn resume(&self) {
        self.state.resume();
        self.deliver_pending_launch();
    }

    /// Surface teardown: never invoke into a destroyed surface.
    pub fn detach(&self) {
        self.state.detach();
        self.relay.clear_surface();
    }

    // ------------------------------------------------------------------
    // Native event entry points (push-delivery threads)
    // ------------------------------------------------------------------

    /// Queue the notification that launched the app, replacing any
    /// undelivered predecessor. Delivered once the script runtime has
    /// registered its callback and the surface is foregrounded.
    pub fn set_launch_notification(&self, payload: Value) {
        self.state.set_launch_notification(payload);
    }

    /// Relay a notification arriving while the app is running. Dropped, not
    /// queued, when no callback is registered yet.
    pub fn emit_event(&self, payload: &Value) {
        match self.state.event_callback() {
            Some(callback) => self.relay.emit(&callback, payload),
            None => debug!("Dropping native event: no callback registered"),
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Route a named command to its handler on the worker pool.
    ///
    /// Returns `false` for unknown names without touching the reply channel,
    /// letting the host framework report its own unhandled-command error.
    pub fn dispatch(&self, command: Command, reply: ReplyChannel) -> bool {
        let Some(action) = Action::parse(&command.name) else {
            debug!(command = %command.name, "Unhandled command");
            return false;
        };

        debug!(command = %command.name, args = command.args.len(), "Dispatching command");

        let state = Arc::clone(&self.state);
        let relay = Arc::clone(&self.relay);
        let sdk = Arc::clone(&self.sdk);
        let keys = Arc::clone(&self.keys);

        self.pool.submit(move || {
            run_action(action, &command, &reply, &state, &relay, &*sdk, &keys)
        });
        true
    }

    fn deliver_pending_launch(&self) {
        deliver_pending_launch(&self.state, &self.relay);
    }
}

fn run_action(
    action: Action,
    command: &Command,
    reply: &ReplyChannel,
    state: &BridgeState,
    relay: &EventRelay,
    sdk: &dyn PushSdk,
    keys: &InitKeys,
) {
    match action {
        Action::Initialize => reply.resolve_with(handle_initialize(sdk, keys)),
        Action::GetInstallationId => {
            reply.resolve_with(
                sdk.installation_id()
                    .map(|id| Some(Value::String(id)))
                    .map_err(Into::into),
            );
        }
        Action::GetInstallationObjectId => {
            reply.resolve_with(
                sdk.installation_object_id()
                    .map(|id| Some(Value::String(id)))
                    .map_err(Into::into),
            );
        }
        Action::GetSubscriptions => reply.resolve_with(handle_get_subscriptions(sdk)),
        Action::Subscribe => reply.resolve_with(handle_subscribe(command, sdk)),
        Action::Unsubscribe => reply.resolve_with(handle_unsubscribe(command, sdk)),
        Action::RegisterCallback => handle_register_callback(command, reply, state, relay),
        Action::TrackEvent => reply.resolve_with(handle_track_event(command, sdk)),
    }
}

fn handle_initialize(sdk: &dyn PushSdk, keys: &InitKeys) -> Result<Option<Value>> {
    // Real I/O on every call: idempotent from the script's view, not free.
    sdk.save_installation()?;
    sdk.track_app_opened()?;
    Ok(Some(keys.to_value()))
}

fn handle_get_subscriptions(sdk: &dyn PushSdk) -> Result<Option<Value>> {
    let channels = sdk.subscriptions()?;
    Ok(Some(Value::String(render_channel_list(&channels))))
}

fn handle_subscribe(command: &Command, sdk: &dyn PushSdk) -> Result<Option<Value>> {
    let channel = command.string_arg(0)?;
    sdk.subscribe(channel)?;
    Ok(None)
}

fn handle_unsubscribe(command: &Command, sdk: &dyn PushSdk) -> Result<Option<Value>> {
    let channel = command.string_arg(0)?;
    sdk.unsubscribe(channel)?;
    Ok(None)
}

fn handle_register_callback(
    command: &Command,
    reply: &ReplyChannel,
    state: &BridgeState,
    relay: &EventRelay,
) {
    match command.string_arg(0) {
        Ok(name) => {
            state.register_event_callback(name);
            reply.success(None);
            // The script runtime is ready; if the app was opened from a
            // notification, hand it over now.
            deliver_pending_launch(state, relay);
        }
        Err(e) => reply.error(e.to_string()),
    }
}

fn handle_track_event(command: &Command, sdk: &dyn PushSdk) -> Result<Option<Value>> {
    let name = command.string_arg(0)?;
    let dimensions = flatten_dimensions(command.object_arg(1)?);
    sdk.track_event(name, dimensions)?;
    Ok(None)
}

/// Flatten a JSON dimensions object to string-to-string, the shape the
/// analytics collaborator accepts. Lossy by contract: numbers, booleans and
/// nested structures all become their textual form.
fn flatten_dimensions(object: &Map<String, Value>) -> HashMap<String, String> {
    object
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

/// Textual rendering of the channel list, e.g. `[news, sports]`.
fn render_channel_list(channels: &[String]) -> String {
    format!("[{}]", channels.join(", "))
}

/// Evaluate the launch-delivery guard and emit the pending payload if both
/// conditions hold. The state clears the slot atomically with the decision,
/// so the payload is delivered at most once no matter which event fires the
/// guard.
fn deliver_pending_launch(state: &BridgeState, relay: &EventRelay) {
    if let Some((callback, pending)) = state.take_deliverable_launch() {
        let waited_ms = (Utc::now() - pending.received_at).num_milliseconds();
        info!(callback = %callback, waited_ms, "Delivering launch notification");
        relay.emit(&callback, &pending.payload);
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod bridge_tests;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_dimensions_to_string_values() {
        let object = json!({"amount": 9.99, "ok": true, "label": "sale"});
        let flat = flatten_dimensions(object.as_object().unwrap());

        assert_eq!(flat.get("amount").map(String::as_str), Some("9.99"));
        assert_eq!(flat.get("ok").map(String::as_str), Some("true"));
        // String values keep their raw text, not a quoted JSON rendering.
        assert_eq!(flat.get("label").map(String::as_str), Some("sale"));
    }

    #[test]
    fn flattens_nested_structures_to_json_text() {
        let object = json!({"meta": {"a": 1}, "tags": ["x", "y"]});
        let flat = flatten_dimensions(object.as_object().unwrap());

        assert_eq!(flat.get("meta").map(String::as_str), Some(r#"{"a":1}"#));
        assert_eq!(flat.get("tags").map(String::as_str), Some(r#"["x","y"]"#));
    }

    #[test]
    fn renders_channel_list_like_a_plain_list() {
        assert_eq!(render_channel_list(&[]), "[]");
        assert_eq!(
            render_channel_list(&["news".to_string(), "sports".to_string()]),
            "[news, sports]"
        );
    }
}
