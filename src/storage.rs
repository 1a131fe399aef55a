/// Storage access for chrome.storage.local (or any key-value backend)
///
/// `Store` never lets a backend failure escape: reads come back empty, writes
/// report `false`, and the failure is logged and appended to the error log.
use crate::constants::{
    storage_keys, ERROR_LOG_CAPACITY, STORAGE_QUOTA_BYTES, STORAGE_WARNING_THRESHOLD, VERSION,
};
use crate::errors::{ErrorLogEntry, ErrorReporter, NovaTabError};
use crate::site_data::{ActiveDisplayData, AppData, AppSettings};
use crate::validation::{app_data_from_value, drop_sites_without_url, settings_from_value, to_object};
use log::{error, warn};
use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};

/// Asynchronous key-value persistence, shaped like `chrome.storage.local`
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, NovaTabError>;
    async fn set(&self, items: Map<String, Value>) -> Result<(), NovaTabError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), NovaTabError>;
    async fn bytes_in_use(&self) -> Result<u64, NovaTabError>;
}

/// In-process backend, for hosts without chrome.storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<Map<String, Value>>,
    writes: RefCell<Vec<Vec<String>>>,
    failing: Cell<bool>,
    reported_bytes: Cell<Option<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Map<String, Value>) -> Self {
        MemoryStore {
            data: RefCell::new(data),
            ..Self::default()
        }
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }

    /// Make every call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Report a fixed usage instead of measuring the stored JSON
    pub fn set_bytes_in_use(&self, bytes: Option<u64>) {
        self.reported_bytes.set(bytes);
    }

    /// Number of successful `set` calls that wrote `key`
    pub fn write_count(&self, key: &str) -> usize {
        self.writes
            .borrow()
            .iter()
            .filter(|keys| keys.iter().any(|k| k == key))
            .count()
    }

    fn check_available(&self) -> Result<(), NovaTabError> {
        if self.failing.get() {
            Err(NovaTabError::Storage("storage unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, NovaTabError> {
        self.check_available()?;
        let data = self.data.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), NovaTabError> {
        self.check_available()?;
        self.writes.borrow_mut().push(items.keys().cloned().collect());
        self.data.borrow_mut().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), NovaTabError> {
        self.check_available()?;
        let mut data = self.data.borrow_mut();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, NovaTabError> {
        self.check_available()?;
        if let Some(bytes) = self.reported_bytes.get() {
            return Ok(bytes);
        }
        let serialized = serde_json::to_string(&*self.data.borrow())?;
        Ok(serialized.len() as u64)
    }
}

/// Storage usage against the extension quota
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUsage {
    pub bytes_in_use: u64,
    pub quota: u64,
    pub available: u64,
    pub percent_used: f64,
    pub is_near_limit: bool,
}

impl StorageUsage {
    pub fn from_bytes(bytes_in_use: u64) -> Self {
        let percent_used = bytes_in_use as f64 / STORAGE_QUOTA_BYTES as f64 * 100.0;
        StorageUsage {
            bytes_in_use,
            quota: STORAGE_QUOTA_BYTES,
            available: STORAGE_QUOTA_BYTES.saturating_sub(bytes_in_use),
            percent_used,
            is_near_limit: percent_used >= STORAGE_WARNING_THRESHOLD * 100.0,
        }
    }
}

/// Typed, failure-contained access to the extension's persisted state
pub struct Store<K: KeyValueStore> {
    backend: K,
}

impl<K: KeyValueStore> Store<K> {
    pub fn new(backend: K) -> Self {
        Store { backend }
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Read keys; an empty map on failure
    pub async fn get(&self, keys: &[&str]) -> Map<String, Value> {
        match self.backend.get(keys).await {
            Ok(items) => items,
            Err(err) => {
                self.log_error(&err, "Store::get", json!({ "keys": keys })).await;
                Map::new()
            }
        }
    }

    /// Write items; `false` on failure
    pub async fn set(&self, items: Map<String, Value>) -> bool {
        let keys: Vec<String> = items.keys().cloned().collect();
        match self.backend.set(items).await {
            Ok(()) => true,
            Err(err) => {
                self.log_error(&err, "Store::set", json!({ "keys": keys })).await;
                false
            }
        }
    }

    pub async fn remove(&self, keys: &[&str]) -> bool {
        match self.backend.remove(keys).await {
            Ok(()) => true,
            Err(err) => {
                self.log_error(&err, "Store::remove", json!({ "keys": keys })).await;
                false
            }
        }
    }

    /// Stored settings merged over the defaults
    pub async fn get_settings(&self) -> AppSettings {
        let stored = self.get(&[storage_keys::APP_SETTINGS]).await;
        stored
            .get(storage_keys::APP_SETTINGS)
            .map(settings_from_value)
            .unwrap_or_default()
    }

    /// Stored app data, validated, with defaults for anything missing
    pub async fn get_app_data(&self) -> AppData {
        let stored = self.get(&[storage_keys::APP_DATA]).await;
        let mut app = app_data_from_value(stored.get(storage_keys::APP_DATA).unwrap_or(&Value::Null));
        drop_sites_without_url(&mut app);
        app
    }

    pub async fn get_active_display_data(&self) -> ActiveDisplayData {
        let mut stored = self.get(&[storage_keys::ACTIVE_DISPLAY_DATA]).await;
        stored
            .remove(storage_keys::ACTIVE_DISPLAY_DATA)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    pub async fn save_active_display_data(&self, display: &ActiveDisplayData) -> bool {
        let mut items = Map::new();
        items.insert(
            storage_keys::ACTIVE_DISPLAY_DATA.to_string(),
            Value::Object(to_object(display)),
        );
        self.set(items).await
    }

    /// Current usage, or `None` if the backend can't tell
    pub async fn check_usage(&self) -> Option<StorageUsage> {
        match self.backend.bytes_in_use().await {
            Ok(bytes) => Some(StorageUsage::from_bytes(bytes)),
            Err(err) => {
                error!("NovaTab: Error checking storage usage: {}", err);
                None
            }
        }
    }

    /// Write items unless the quota is already used up
    pub async fn safe_set(&self, items: Map<String, Value>) -> Result<(), NovaTabError> {
        if let Some(usage) = self.check_usage().await {
            if usage.is_near_limit {
                warn!("NovaTab: Storage nearly full: {:.2}%", usage.percent_used);
            }
            if usage.percent_used >= 100.0 {
                return Err(NovaTabError::QuotaExceeded);
            }
        }

        self.backend.set(items).await.map_err(|err| match err {
            NovaTabError::Storage(message) if message.contains("QUOTA_BYTES") => {
                NovaTabError::QuotaExceeded
            }
            other => other,
        })
    }

    /// Persisted error log, oldest first
    pub async fn error_logs(&self) -> Vec<ErrorLogEntry> {
        match self.backend.get(&[storage_keys::ERROR_LOG]).await {
            Ok(mut stored) => stored
                .remove(storage_keys::ERROR_LOG)
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default(),
            Err(err) => {
                error!("NovaTab: Failed to retrieve error logs: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn clear_error_logs(&self) -> bool {
        match self.backend.remove(&[storage_keys::ERROR_LOG]).await {
            Ok(()) => true,
            Err(err) => {
                error!("NovaTab: Failed to clear error logs: {}", err);
                false
            }
        }
    }

    async fn append_error_log(&self, entry: ErrorLogEntry) -> Result<(), NovaTabError> {
        let mut stored = self.backend.get(&[storage_keys::ERROR_LOG]).await?;
        let mut entries = match stored.remove(storage_keys::ERROR_LOG) {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };

        entries.push(serde_json::to_value(entry)?);
        if entries.len() > ERROR_LOG_CAPACITY {
            let excess = entries.len() - ERROR_LOG_CAPACITY;
            entries.drain(..excess);
        }

        let mut items = Map::new();
        items.insert(storage_keys::ERROR_LOG.to_string(), Value::Array(entries));
        self.backend.set(items).await
    }
}

impl<K: KeyValueStore> ErrorReporter for Store<K> {
    async fn log_error(&self, error: &NovaTabError, context: &str, details: Value) {
        error!("NovaTab Error: [{}] {} ({})", context, error, error.code());

        let entry = ErrorLogEntry {
            message: error.to_string(),
            code: error.code().to_string(),
            context: context.to_string(),
            details,
            timestamp: crate::now_millis(),
            version: VERSION.to_string(),
        };

        // Written straight to the backend so a failing store can't recurse
        if let Err(err) = self.append_error_log(entry).await {
            warn!("NovaTab: Failed to store error log: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_data::ActiveMode;

    fn create_test_store(data: Value) -> Store<MemoryStore> {
        let map = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Store::new(MemoryStore::with_data(map))
    }

    #[tokio::test]
    async fn test_get_and_set() {
        let store = create_test_store(json!({}));
        let mut items = Map::new();
        items.insert("a".to_string(), json!(1));

        assert!(store.set(items).await);

        let result = store.get(&["a", "missing"]).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result["a"], json!(1));
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let store = create_test_store(json!({"a": 1}));
        store.backend().set_failing(true);

        assert!(store.get(&["a"]).await.is_empty());
        assert!(!store.set(Map::new()).await);
        assert!(!store.remove(&["a"]).await);
        assert_eq!(store.get_app_data().await, AppData::default());
        assert_eq!(store.get_settings().await, AppSettings::default());
    }

    #[tokio::test]
    async fn test_get_settings_merges_defaults() {
        let store = create_test_store(json!({
            "appSettings": {"maxSiteCardsPerRow": "8", "gradientEndColor": "#000000"}
        }));

        let settings = store.get_settings().await;

        assert_eq!(settings.max_site_cards_per_row, "8");
        assert_eq!(settings.gradient_end_color, "#000000");
        assert_eq!(settings.max_categories_per_row, "2");
    }

    #[tokio::test]
    async fn test_get_app_data_defaults_when_missing() {
        let store = create_test_store(json!({}));
        let app = store.get_app_data().await;

        assert_eq!(app.active_mode, ActiveMode::Manual);
        assert!(app.manual.categories.is_empty());
        assert_eq!(app.bookmarks.folder_id, None);
    }

    #[tokio::test]
    async fn test_get_app_data_backfills_order_and_drops_empty_sites() {
        let store = create_test_store(json!({
            "appData": {
                "manual": {
                    "categories": [
                        {"id": "a", "name": "A", "sites": [{"name": "x", "url": ""}, {"name": "y", "url": "y.com"}]},
                        {"id": "b", "name": "B"}
                    ]
                }
            }
        }));

        let app = store.get_app_data().await;

        assert_eq!(app.manual.category_order, vec!["a", "b"]);
        assert_eq!(app.manual.categories[0].sites.len(), 1);
    }

    #[tokio::test]
    async fn test_active_display_data_round_trip() {
        let store = create_test_store(json!({}));
        assert_eq!(store.get_active_display_data().await, ActiveDisplayData::empty());

        let display = ActiveDisplayData {
            categories: vec![crate::site_data::Category::new("1", "One")],
            category_order: vec!["1".to_string()],
        };
        assert!(store.save_active_display_data(&display).await);
        assert_eq!(store.get_active_display_data().await, display);
    }

    #[tokio::test]
    async fn test_log_error_appends_entry() {
        let store = create_test_store(json!({}));

        store
            .log_error(&NovaTabError::Bookmarks("gone".to_string()), "ctx", json!({"id": "1"}))
            .await;

        let logs = store.error_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].context, "ctx");
        assert_eq!(logs[0].code, "BOOKMARKS_ERROR");
        assert_eq!(logs[0].version, VERSION);
        assert_eq!(logs[0].details["id"], "1");
    }

    #[tokio::test]
    async fn test_error_log_is_capped() {
        let store = create_test_store(json!({}));

        for i in 0..60 {
            store
                .log_error(&NovaTabError::Runtime(format!("error {}", i)), "loop", Value::Null)
                .await;
        }

        let logs = store.error_logs().await;
        assert_eq!(logs.len(), 50);
        assert_eq!(logs[0].message, "error 10");
        assert_eq!(logs[49].message, "error 59");
    }

    #[tokio::test]
    async fn test_clear_error_logs() {
        let store = create_test_store(json!({}));
        store.log_error(&NovaTabError::Runtime("x".to_string()), "ctx", Value::Null).await;

        assert!(store.clear_error_logs().await);
        assert!(store.error_logs().await.is_empty());
    }

    #[test]
    fn test_storage_usage() {
        let usage = StorageUsage::from_bytes(STORAGE_QUOTA_BYTES / 2);
        assert!(!usage.is_near_limit);
        assert_eq!(usage.available, STORAGE_QUOTA_BYTES / 2);

        let usage = StorageUsage::from_bytes(STORAGE_QUOTA_BYTES);
        assert!(usage.is_near_limit);
        assert_eq!(usage.available, 0);
    }

    #[tokio::test]
    async fn test_safe_set_refuses_when_full() {
        let store = create_test_store(json!({}));
        store.backend().set_bytes_in_use(Some(STORAGE_QUOTA_BYTES));

        let mut items = Map::new();
        items.insert("a".to_string(), json!(1));

        assert_eq!(store.safe_set(items).await, Err(NovaTabError::QuotaExceeded));
        assert_eq!(store.backend().value("a"), None);
    }

    #[tokio::test]
    async fn test_safe_set_writes_when_near_limit() {
        let store = create_test_store(json!({}));
        store.backend().set_bytes_in_use(Some(STORAGE_QUOTA_BYTES - 1));

        let mut items = Map::new();
        items.insert("a".to_string(), json!(1));

        assert_eq!(store.safe_set(items).await, Ok(()));
        assert_eq!(store.backend().value("a"), Some(json!(1)));
    }
}
