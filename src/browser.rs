/// chrome.* bindings: storage, bookmarks, runtime events and timers
use crate::background::{Background, IconTarget, InstallReason, Message};
use crate::bookmarks::{folder_options, BookmarkNode, BookmarkProvider};
use crate::debounce::Timer;
use crate::errors::NovaTabError;
use crate::operations::export_configuration;
use crate::site_data::{AppSettings, ActiveMode};
use crate::storage::{KeyValueStore, Store};
use crate::sync;
use crate::validation::{app_data_from_value, settings_from_value};
use js_sys::{Function, Promise, Reflect};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn storage_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn storage_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = remove)]
    async fn storage_remove(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = getBytesInUse)]
    async fn storage_bytes_in_use(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "bookmarks"], js_name = getChildren)]
    async fn bookmarks_get_children(id: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "bookmarks"], js_name = getTree)]
    async fn bookmarks_get_tree() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onInstalled"], js_name = addListener)]
    fn on_installed_add_listener(callback: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onStartup"], js_name = addListener)]
    fn on_startup_add_listener(callback: &Closure<dyn FnMut()>);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn on_message_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue, Function) -> bool>);

    #[wasm_bindgen(js_namespace = ["chrome", "bookmarks", "onCreated"], js_name = addListener)]
    fn on_bookmark_created_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "bookmarks", "onRemoved"], js_name = addListener)]
    fn on_bookmark_removed_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "bookmarks", "onChanged"], js_name = addListener)]
    fn on_bookmark_changed_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "bookmarks", "onMoved"], js_name = addListener)]
    fn on_bookmark_moved_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_name = setTimeout)]
    fn set_timeout(handler: &Function, timeout: i32) -> JsValue;
}

/// Readable message out of a rejected promise value
fn js_error_message(err: &JsValue) -> String {
    if let Some(message) = err.as_string() {
        return message;
    }
    Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, NovaTabError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| NovaTabError::Serialization(e.to_string()))
}

fn from_js<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<T, NovaTabError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| NovaTabError::Serialization(e.to_string()))
}

fn to_js_error(err: NovaTabError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// `chrome.storage.local`
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, NovaTabError> {
        let result = storage_get(to_js(&keys)?)
            .await
            .map_err(|e| NovaTabError::Storage(js_error_message(&e)))?;
        from_js(result)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), NovaTabError> {
        storage_set(to_js(&items)?)
            .await
            .map_err(|e| NovaTabError::Storage(js_error_message(&e)))?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), NovaTabError> {
        storage_remove(to_js(&keys)?)
            .await
            .map_err(|e| NovaTabError::Storage(js_error_message(&e)))?;
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, NovaTabError> {
        let bytes = storage_bytes_in_use(JsValue::NULL)
            .await
            .map_err(|e| NovaTabError::Storage(js_error_message(&e)))?;
        bytes
            .as_f64()
            .map(|b| b as u64)
            .ok_or_else(|| NovaTabError::Storage("getBytesInUse returned a non-number".to_string()))
    }
}

/// `chrome.bookmarks`
pub struct ChromeBookmarks;

impl ChromeBookmarks {
    /// `None` when the extension has no bookmarks permission
    pub fn available() -> Option<ChromeBookmarks> {
        let chrome = Reflect::get(&js_sys::global(), &JsValue::from_str("chrome")).ok()?;
        let bookmarks = Reflect::get(&chrome, &JsValue::from_str("bookmarks")).ok()?;
        if bookmarks.is_undefined() || bookmarks.is_null() {
            None
        } else {
            Some(ChromeBookmarks)
        }
    }
}

impl BookmarkProvider for ChromeBookmarks {
    async fn get_children(&self, id: &str) -> Result<Vec<BookmarkNode>, NovaTabError> {
        let children = bookmarks_get_children(id)
            .await
            .map_err(|e| NovaTabError::Bookmarks(js_error_message(&e)))?;
        from_js(children)
    }

    async fn get_tree(&self) -> Result<Vec<BookmarkNode>, NovaTabError> {
        let tree = bookmarks_get_tree()
            .await
            .map_err(|e| NovaTabError::Bookmarks(js_error_message(&e)))?;
        from_js(tree)
    }
}

/// `setTimeout` as a future
pub struct JsTimer;

impl Timer for JsTimer {
    async fn sleep(&self, duration: Duration) {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = Promise::new(&mut |resolve, _reject| {
            set_timeout(&resolve, millis);
        });
        let _ = JsFuture::from(promise).await;
    }
}

type ChromeBackground = Background<ChromeStorage, ChromeBookmarks, JsTimer>;

fn chrome_background() -> ChromeBackground {
    Background::new(ChromeStorage, ChromeBookmarks::available(), JsTimer)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallDetails {
    reason: String,
    #[serde(default)]
    previous_version: Option<String>,
}

fn bookmark_change_listener(background: &Rc<ChromeBackground>) -> Closure<dyn FnMut(JsValue, JsValue)> {
    let background = background.clone();
    Closure::new(move |_id: JsValue, _info: JsValue| {
        let background = background.clone();
        spawn_local(async move {
            background.on_bookmark_changed().await;
        });
    })
}

fn install_runtime_listeners(background: &Rc<ChromeBackground>) {
    let bg = background.clone();
    let on_installed = Closure::new(move |details: JsValue| {
        let details: InstallDetails = match from_js(details) {
            Ok(details) => details,
            Err(err) => {
                warn!("NovaTab: Unreadable install details: {}", err);
                return;
            }
        };
        let Some(reason) = InstallReason::parse(&details.reason) else {
            return;
        };
        let bg = bg.clone();
        spawn_local(async move {
            bg.on_installed(reason, details.previous_version.as_deref()).await;
        });
    });
    on_installed_add_listener(&on_installed);
    on_installed.forget();

    let bg = background.clone();
    let on_startup = Closure::new(move || {
        let bg = bg.clone();
        spawn_local(async move {
            bg.on_startup().await;
        });
    });
    on_startup_add_listener(&on_startup);
    on_startup.forget();

    let bg = background.clone();
    let on_message = Closure::new(move |request: JsValue, _sender: JsValue, send_response: Function| {
        let Ok(message) = from_js::<Message>(request) else {
            return false;
        };
        let bg = bg.clone();
        spawn_local(async move {
            let response = bg.handle_message(message).await;
            match to_js(&response) {
                Ok(response) => {
                    if let Err(err) = send_response.call1(&JsValue::NULL, &response) {
                        warn!("NovaTab: Failed to send response: {}", js_error_message(&err));
                    }
                }
                Err(err) => warn!("NovaTab: Failed to serialize response: {}", err),
            }
        });
        // Keep the channel open for the async response
        true
    });
    on_message_add_listener(&on_message);
    on_message.forget();
}

fn install_bookmark_listeners(background: &Rc<ChromeBackground>) {
    let listeners: [fn(&Closure<dyn FnMut(JsValue, JsValue)>); 4] = [
        on_bookmark_created_add_listener,
        on_bookmark_removed_add_listener,
        on_bookmark_changed_add_listener,
        on_bookmark_moved_add_listener,
    ];
    for add_listener in listeners {
        let listener = bookmark_change_listener(background);
        add_listener(&listener);
        listener.forget();
    }
}

/// Entry point of the service worker: registers every listener
#[wasm_bindgen]
pub fn start_background() {
    let background = Rc::new(chrome_background());
    install_runtime_listeners(&background);
    if background.bookmarks().is_some() {
        install_bookmark_listeners(&background);
    } else {
        warn!("NovaTab: Bookmarks API unavailable, bookmark sync disabled");
    }
    info!("NovaTab: Background service worker initialized");
}

/// Display data for the given app data (pages call this before saving)
#[wasm_bindgen]
pub async fn generate_active_display_data(app_data: JsValue) -> Result<JsValue, JsValue> {
    let raw: Value = from_js(app_data).map_err(to_js_error)?;
    let app = app_data_from_value(&raw);
    let reporter = Store::new(ChromeStorage);
    let display =
        sync::generate_active_display_data(Some(&app), ChromeBookmarks::available().as_ref(), &reporter).await;
    to_js(&display).map_err(to_js_error)
}

/// Ask the service worker to re-read the bookmark folder
#[wasm_bindgen]
pub async fn request_refresh() -> Result<JsValue, JsValue> {
    let message = to_js(&serde_json::json!({ "action": "refreshBookmarks" })).map_err(to_js_error)?;
    runtime_send_message(message).await
}

/// Folders for the bookmark folder selector
#[wasm_bindgen]
pub async fn bookmark_folder_options() -> Result<JsValue, JsValue> {
    let provider = ChromeBookmarks::available()
        .ok_or_else(|| to_js_error(NovaTabError::Configuration("bookmarks API unavailable".to_string())))?;
    let tree = provider.get_tree().await.map_err(to_js_error)?;
    let options = tree.first().map(folder_options).unwrap_or_default();
    to_js(&options).map_err(to_js_error)
}

/// Options page save: settings, app data and the display data derived from them
#[wasm_bindgen]
pub async fn save_settings(settings: JsValue, app_data: JsValue) -> Result<JsValue, JsValue> {
    let settings: AppSettings = settings_from_value(&from_js::<Value>(settings).map_err(to_js_error)?);
    let app = app_data_from_value(&from_js::<Value>(app_data).map_err(to_js_error)?);
    let display = chrome_background().save_all(&settings, &app).await.map_err(to_js_error)?;
    to_js(&display).map_err(to_js_error)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IconRequest {
    #[serde(default)]
    is_bookmark_site_context: bool,
    #[serde(default)]
    category_id: String,
    site_url: String,
    #[serde(default)]
    site_name: String,
}

impl From<IconRequest> for IconTarget {
    fn from(request: IconRequest) -> Self {
        if request.is_bookmark_site_context {
            IconTarget::Bookmark {
                site_url: request.site_url,
            }
        } else {
            IconTarget::Manual {
                category_id: request.category_id,
                site_url: request.site_url,
                site_name: request.site_name,
            }
        }
    }
}

/// New tab page icon editor save; an empty icon clears the custom icon
#[wasm_bindgen]
pub async fn save_custom_icon(site: JsValue, icon_url: String) -> Result<bool, JsValue> {
    let target: IconTarget = from_js::<IconRequest>(site).map_err(to_js_error)?.into();
    chrome_background()
        .save_icon(&target, &icon_url)
        .await
        .map_err(to_js_error)
}

#[wasm_bindgen]
pub async fn import_settings(text: String) -> Result<(), JsValue> {
    chrome_background().import(&text).await.map_err(to_js_error)?;
    Ok(())
}

#[wasm_bindgen]
pub async fn export_settings() -> Result<String, JsValue> {
    let store = Store::new(ChromeStorage);
    let settings = store.get_settings().await;
    let app = store.get_app_data().await;
    export_configuration(&settings, &app).map_err(to_js_error)
}

#[wasm_bindgen]
pub async fn reset_settings() -> Result<(), JsValue> {
    chrome_background().reset_all().await.map_err(to_js_error)?;
    Ok(())
}

/// Switch the displayed source and persist the result
#[wasm_bindgen]
pub async fn set_active_mode(mode: String) -> Result<JsValue, JsValue> {
    let background = chrome_background();
    let settings = background.store().get_settings().await;
    let mut app = background.store().get_app_data().await;
    crate::operations::switch_mode(&mut app, ActiveMode::parse(&mode));
    let display = background.save_all(&settings, &app).await.map_err(to_js_error)?;
    to_js(&display).map_err(to_js_error)
}
