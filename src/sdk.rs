//! Collaborator boundary: the native push/analytics/installation SDK.
//!
//! The bridge owns no push delivery, analytics upload, or installation
//! persistence; everything behind this trait belongs to the SDK, including
//! its network behavior, retries, and local storage. Channel membership in
//! particular is never cached bridge-side: `subscriptions` re-queries the
//! SDK every time.

use std::collections::HashMap;

use thiserror::Error;

/// A failed collaborator call, carrying the SDK's own description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SdkError(pub String);

pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Operations the bridge delegates to the native SDK.
///
/// Every method is fallible: handlers convert an `Err` into an error reply
/// rather than letting a collaborator failure strand the caller's pending
/// reply. Implementations may block on network or disk; the bridge only
/// invokes them from worker-pool threads.
pub trait PushSdk: Send + Sync {
    /// One-time SDK setup with the resolved application credentials.
    fn initialize(&self, app_id: &str, client_key: &str) -> SdkResult<()>;

    fn enable_crash_reporting(&self) -> SdkResult<()>;

    fn enable_local_datastore(&self) -> SdkResult<()>;

    fn installation_id(&self) -> SdkResult<String>;

    fn installation_object_id(&self) -> SdkResult<String>;

    /// Persist the current installation record. Real I/O on every call.
    fn save_installation(&self) -> SdkResult<()>;

    /// Channels the current installation is subscribed to.
    fn subscriptions(&self) -> SdkResult<Vec<String>>;

    fn subscribe(&self, channel: &str) -> SdkResult<()>;

    fn unsubscribe(&self, channel: &str) -> SdkResult<()>;

    /// Record an analytics event. Dimensions are string-to-string by
    /// contract; the bridge flattens richer JSON values before this call.
    fn track_event(&self, name: &str, dimensions: HashMap<String, String>) -> SdkResult<()>;

    /// Record the "app opened" analytics event.
    fn track_app_opened(&self) -> SdkResult<()>;
}
