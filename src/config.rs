//! Credential resolution and one-time SDK initialization.
//!
//! The host application ships three string resources: an application id and
//! client key (required) plus an auxiliary script-side key (optional, empty
//! by default). They are resolved once at process start, handed to the SDK's
//! own initialize, and kept for the `initialize` action to return to script
//! code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::sdk::PushSdk;

pub const PARSE_APP_ID: &str = "parse_app_id";
pub const PARSE_CLIENT_KEY: &str = "parse_client_key";
pub const PARSE_JS_KEY: &str = "parse_js_key";

/// Platform string-resource table boundary.
///
/// On-device this is backed by the application's resource bundle; in tests
/// and simpler hosts a [`ResourceTable`] works the same way.
pub trait StringResources {
    fn string(&self, key: &str) -> Option<String>;
}

/// In-memory string-resource table.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    entries: HashMap<String, String>,
}

impl ResourceTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        ResourceTable { entries }
    }

    /// Load a table from a JSON object file of string keys to string values.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading resource table {}", path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing resource table {}", path.display()))?;
        debug!(path = %path.display(), count = entries.len(), "Loaded resource table");
        Ok(ResourceTable { entries })
    }
}

impl StringResources for ResourceTable {
    fn string(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ResourceTable {
    fn from(pairs: [(&str, &str); N]) -> Self {
        ResourceTable {
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// The resolved credential set, captured once and immutable afterward.
///
/// Serializes with the original resource key names so the `initialize`
/// action returns the same object shape script code has always seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitKeys {
    #[serde(rename = "parse_app_id")]
    pub app_id: String,
    #[serde(rename = "parse_client_key")]
    pub client_key: String,
    #[serde(rename = "parse_js_key")]
    pub js_key: String,
}

impl InitKeys {
    /// Resolve the three keys from the resource table. The app id and client
    /// key are required; the auxiliary key defaults to the empty string.
    pub fn resolve(resources: &dyn StringResources) -> Result<InitKeys> {
        let app_id = resources
            .string(PARSE_APP_ID)
            .ok_or_else(|| BridgeError::MissingResource(PARSE_APP_ID.to_string()))?;
        let client_key = resources
            .string(PARSE_CLIENT_KEY)
            .ok_or_else(|| BridgeError::MissingResource(PARSE_CLIENT_KEY.to_string()))?;
        let js_key = resources.string(PARSE_JS_KEY).unwrap_or_default();

        Ok(InitKeys {
            app_id,
            client_key,
            js_key,
        })
    }

    pub fn to_value(&self) -> serde_json::Value {
        // InitKeys serializes to a flat string map; this cannot fail.
        serde_json::to_value(self).expect("InitKeys serialization is infallible")
    }
}

static INIT_KEYS: OnceLock<InitKeys> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Run SDK initialization exactly once per process lifetime.
///
/// The first call resolves the credentials, enables crash reporting and the
/// local datastore, and hands the credentials to the SDK's own initialize.
/// Subsequent calls return the stored keys without touching the SDK again.
/// Not tied to any UI-surface lifetime: surfaces come and go, this doesn't.
pub fn initialize_once(resources: &dyn StringResources, sdk: &dyn PushSdk) -> Result<InitKeys> {
    if let Some(keys) = INIT_KEYS.get() {
        return Ok(keys.clone());
    }

    // Serialize the first-run path: the SDK side effects must happen once,
    // so a racing caller waits here instead of re-running them.
    let _first_run = INIT_LOCK.lock();
    if let Some(keys) = INIT_KEYS.get() {
        return Ok(keys.clone());
    }

    let keys = run_initialization(resources, sdk)?;
    Ok(INIT_KEYS.get_or_init(|| keys).clone())
}

fn run_initialization(resources: &dyn StringResources, sdk: &dyn PushSdk) -> Result<InitKeys> {
    let keys = InitKeys::resolve(resources)?;

    sdk.enable_crash_reporting()?;
    sdk.enable_local_datastore()?;

    info!(app_id = %keys.app_id, "Initializing push SDK");
    sdk.initialize(&keys.app_id, &keys.client_key)?;

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{SdkError, SdkResult};
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSdk {
        calls: Mutex<Vec<String>>,
        fail_initialize: bool,
    }

    impl PushSdk for RecordingSdk {
        fn initialize(&self, app_id: &str, client_key: &str) -> SdkResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("initialize({}, {})", app_id, client_key));
            if self.fail_initialize {
                return Err(SdkError("init refused".to_string()));
            }
            Ok(())
        }
        fn enable_crash_reporting(&self) -> SdkResult<()> {
            self.calls.lock().unwrap().push("crash_reporting".into());
            Ok(())
        }
        fn enable_local_datastore(&self) -> SdkResult<()> {
            self.calls.lock().unwrap().push("local_datastore".into());
            Ok(())
        }
        fn installation_id(&self) -> SdkResult<String> {
            unimplemented!()
        }
        fn installation_object_id(&self) -> SdkResult<String> {
            unimplemented!()
        }
        fn save_installation(&self) -> SdkResult<()> {
            unimplemented!()
        }
        fn subscriptions(&self) -> SdkResult<Vec<String>> {
            unimplemented!()
        }
        fn subscribe(&self, _channel: &str) -> SdkResult<()> {
            unimplemented!()
        }
        fn unsubscribe(&self, _channel: &str) -> SdkResult<()> {
            unimplemented!()
        }
        fn track_event(
            &self,
            _name: &str,
            _dimensions: HashMap<String, String>,
        ) -> SdkResult<()> {
            unimplemented!()
        }
        fn track_app_opened(&self) -> SdkResult<()> {
            unimplemented!()
        }
    }

    fn full_table() -> ResourceTable {
        ResourceTable::from([
            (PARSE_APP_ID, "app-123"),
            (PARSE_CLIENT_KEY, "client-456"),
            (PARSE_JS_KEY, "js-789"),
        ])
    }

    #[test]
    fn resolves_all_three_keys() {
        let keys = InitKeys::resolve(&full_table()).unwrap();
        assert_eq!(keys.app_id, "app-123");
        assert_eq!(keys.client_key, "client-456");
        assert_eq!(keys.js_key, "js-789");
    }

    #[test]
    fn js_key_defaults_to_empty_string() {
        let table = ResourceTable::from([
            (PARSE_APP_ID, "app-123"),
            (PARSE_CLIENT_KEY, "client-456"),
        ]);
        let keys = InitKeys::resolve(&table).unwrap();
        assert_eq!(keys.js_key, "");
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let table = ResourceTable::from([(PARSE_APP_ID, "app-123")]);
        let err = InitKeys::resolve(&table).unwrap_err();
        assert!(err.to_string().contains(PARSE_CLIENT_KEY));
    }

    #[test]
    fn keys_serialize_with_resource_key_names() {
        let keys = InitKeys::resolve(&full_table()).unwrap();
        assert_eq!(
            keys.to_value(),
            serde_json::json!({
                "parse_app_id": "app-123",
                "parse_client_key": "client-456",
                "parse_js_key": "js-789",
            })
        );
    }

    #[test]
    fn initialization_enables_features_before_sdk_initialize() {
        let sdk = RecordingSdk::default();
        run_initialization(&full_table(), &sdk).unwrap();

        let calls = sdk.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "crash_reporting".to_string(),
                "local_datastore".to_string(),
                "initialize(app-123, client-456)".to_string(),
            ]
        );
    }

    #[test]
    fn racing_first_callers_run_sdk_setup_exactly_once() {
        let sdk = RecordingSdk::default();
        let table = full_table();
        let barrier = std::sync::Barrier::new(2);

        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    barrier.wait();
                    let keys = initialize_once(&table, &sdk).unwrap();
                    assert_eq!(keys.app_id, "app-123");
                });
            }
        });

        // Both callers resolved, but crash reporting, the datastore, and the
        // SDK's own initialize each ran a single time.
        let calls = sdk.calls.lock().unwrap();
        assert_eq!(
            calls.iter().filter(|c| c.starts_with("initialize(")).count(),
            1
        );
        assert_eq!(calls.iter().filter(|c| *c == "crash_reporting").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "local_datastore").count(), 1);
        drop(calls);

        // A later caller gets the stored keys without touching the SDK again.
        let keys = initialize_once(&table, &sdk).unwrap();
        assert_eq!(keys.client_key, "client-456");
        assert_eq!(sdk.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn initialization_surfaces_sdk_failure() {
        let sdk = RecordingSdk {
            fail_initialize: true,
            ..Default::default()
        };
        let err = run_initialization(&full_table(), &sdk).unwrap_err();
        assert_eq!(err.to_string(), "init refused");
    }

    #[test]
    fn resource_table_loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"parse_app_id": "from-file", "parse_client_key": "ck"}}"#
        )
        .unwrap();

        let table = ResourceTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.string(PARSE_APP_ID).as_deref(), Some("from-file"));
        assert_eq!(table.string(PARSE_JS_KEY), None);
    }

    #[test]
    fn resource_table_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ResourceTable::from_json_file(file.path()).is_err());
    }
}
