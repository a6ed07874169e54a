//! Command/reply protocol between the script runtime and the bridge.
//!
//! Script code issues named commands with positional JSON arguments; the
//! bridge resolves each command to an action and eventually completes a
//! one-shot reply channel with either a success payload or an error string.
//!
//! Recognized actions:
//! - 'initialize': save installation, track app open, return the resolved keys
//! - 'getInstallationId' / 'getInstallationObjectId': installation identity
//! - 'getSubscriptions' / 'subscribe' / 'unsubscribe': channel membership
//! - 'registerCallback': register the script-side event callback name
//! - 'trackEvent': analytics event with string-flattened dimensions

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{BridgeError, Result};

/// The exact set of command names the bridge handles.
///
/// `Action::parse` is the action registry: unknown names resolve to `None`
/// and are reported as unhandled without touching the reply channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Initialize,
    GetInstallationId,
    GetInstallationObjectId,
    GetSubscriptions,
    Subscribe,
    Unsubscribe,
    RegisterCallback,
    TrackEvent,
}

impl Action {
    pub fn parse(name: &str) -> Option<Action> {
        match name {
            "initialize" => Some(Action::Initialize),
            "getInstallationId" => Some(Action::GetInstallationId),
            "getInstallationObjectId" => Some(Action::GetInstallationObjectId),
            "getSubscriptions" => Some(Action::GetSubscriptions),
            "subscribe" => Some(Action::Subscribe),
            "unsubscribe" => Some(Action::Unsubscribe),
            "registerCallback" => Some(Action::RegisterCallback),
            "trackEvent" => Some(Action::TrackEvent),
            _ => None,
        }
    }
}

/// One named, argument-bearing request dispatched through the bridge.
///
/// Ephemeral: exists only for the duration of one dispatch. Argument arity
/// and types are validated by the handler, not the registry.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Command {
            name: name.into(),
            args,
        }
    }

    /// Positional string argument, or `InvalidArgument` if absent or not a string.
    pub fn string_arg(&self, position: usize) -> Result<&str> {
        self.args
            .get(position)
            .and_then(Value::as_str)
            .ok_or(BridgeError::InvalidArgument {
                position,
                expected: "string",
            })
    }

    /// Positional object argument, or `InvalidArgument` if absent or not an object.
    pub fn object_arg(&self, position: usize) -> Result<&Map<String, Value>> {
        self.args
            .get(position)
            .and_then(Value::as_object)
            .ok_or(BridgeError::InvalidArgument {
                position,
                expected: "object",
            })
    }
}

/// The single asynchronous resolution of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success, optionally carrying a JSON payload.
    Success(Option<Value>),
    /// Failure, carrying an error message for the script-side error callback.
    Error(String),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }
}

type Completion = Box<dyn FnOnce(Reply) + Send + 'static>;

/// One-shot success/error completion contract for a command.
///
/// Callable from any thread. Exactly one of `success`/`error` resolves the
/// channel; a second resolution is dropped with a warning so the first
/// outcome always wins. The channel performs no retries and no timeout: a
/// handler that never resolves it leaves the caller pending indefinitely.
#[derive(Clone)]
pub struct ReplyChannel {
    completion: Arc<Mutex<Option<Completion>>>,
}

impl ReplyChannel {
    pub fn new(on_reply: impl FnOnce(Reply) + Send + 'static) -> Self {
        ReplyChannel {
            completion: Arc::new(Mutex::new(Some(Box::new(on_reply)))),
        }
    }

    pub fn success(&self, payload: Option<Value>) {
        self.resolve(Reply::Success(payload));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.resolve(Reply::Error(message.into()));
    }

    /// Resolve with a success payload when `result` is Ok, an error reply
    /// otherwise. Collaborator failures always surface to the caller instead
    /// of hanging the pending reply.
    pub fn resolve_with(&self, result: Result<Option<Value>>) {
        match result {
            Ok(payload) => self.success(payload),
            Err(e) => self.error(e.to_string()),
        }
    }

    fn resolve(&self, reply: Reply) {
        let completion = self.completion.lock().take();
        match completion {
            Some(complete) => complete(reply),
            None => warn!(?reply, "Duplicate reply dropped; channel already resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    fn collector() -> (ReplyChannel, mpsc::Receiver<Reply>) {
        let (tx, rx) = mpsc::channel();
        let channel = ReplyChannel::new(move |reply| {
            let _ = tx.send(reply);
        });
        (channel, rx)
    }

    #[test]
    fn parses_every_recognized_action() {
        assert_eq!(Action::parse("initialize"), Some(Action::Initialize));
        assert_eq!(
            Action::parse("getInstallationId"),
            Some(Action::GetInstallationId)
        );
        assert_eq!(
            Action::parse("getInstallationObjectId"),
            Some(Action::GetInstallationObjectId)
        );
        assert_eq!(
            Action::parse("getSubscriptions"),
            Some(Action::GetSubscriptions)
        );
        assert_eq!(Action::parse("subscribe"), Some(Action::Subscribe));
        assert_eq!(Action::parse("unsubscribe"), Some(Action::Unsubscribe));
        assert_eq!(
            Action::parse("registerCallback"),
            Some(Action::RegisterCallback)
        );
        assert_eq!(Action::parse("trackEvent"), Some(Action::TrackEvent));
    }

    #[test]
    fn unknown_action_names_do_not_parse() {
        assert_eq!(Action::parse("bogus"), None);
        assert_eq!(Action::parse(""), None);
        // Command names are case-sensitive
        assert_eq!(Action::parse("Subscribe"), None);
    }

    #[test]
    fn string_arg_returns_value_at_position() {
        let cmd = Command::new("subscribe", vec![json!("news")]);
        assert_eq!(cmd.string_arg(0).unwrap(), "news");
    }

    #[test]
    fn string_arg_rejects_missing_and_wrong_type() {
        let cmd = Command::new("subscribe", vec![json!(42)]);
        assert!(cmd.string_arg(0).is_err());
        assert!(cmd.string_arg(1).is_err());
    }

    #[test]
    fn object_arg_returns_map() {
        let cmd = Command::new("trackEvent", vec![json!("purchase"), json!({"ok": true})]);
        let dims = cmd.object_arg(1).unwrap();
        assert_eq!(dims.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn reply_channel_delivers_success_payload() {
        let (channel, rx) = collector();
        channel.success(Some(json!({"id": "abc"})));
        assert_eq!(rx.recv().unwrap(), Reply::Success(Some(json!({"id": "abc"}))));
    }

    #[test]
    fn reply_channel_delivers_error_message() {
        let (channel, rx) = collector();
        channel.error("boom");
        assert_eq!(rx.recv().unwrap(), Reply::Error("boom".to_string()));
    }

    #[test]
    fn second_resolution_is_dropped() {
        let (channel, rx) = collector();
        channel.success(None);
        channel.error("late");

        assert_eq!(rx.recv().unwrap(), Reply::Success(None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reply_channel_resolves_across_threads() {
        let (channel, rx) = collector();
        let worker = std::thread::spawn(move || channel.success(Some(json!("done"))));
        worker.join().unwrap();
        assert!(rx.recv().unwrap().is_success());
    }

    #[test]
    fn resolve_with_maps_err_to_error_reply() {
        let (channel, rx) = collector();
        channel.resolve_with(Err(crate::sdk::SdkError("save failed".into()).into()));
        assert_eq!(rx.recv().unwrap(), Reply::Error("save failed".to_string()));
    }
}
