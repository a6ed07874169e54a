//! Parse Push Bridge
//!
//! An asynchronous command-dispatch and event-relay bridge between a managed
//! scripting environment and the native push/analytics/installation SDK.
//! Script-side callers issue named commands with JSON arguments; handlers run
//! on a background worker pool and resolve a one-shot reply channel. Native
//! events (notably "app opened from a push notification") flow back into the
//! script runtime through a single registered callback name.

pub mod bridge;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod sdk;
pub mod state;
