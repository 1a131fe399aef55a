/// NovaTab - new tab page extension core
/// Built with Rust + WASM

pub mod background;
pub mod bookmarks;
pub mod constants;
pub mod debounce;
pub mod domain;
pub mod errors;
pub mod migration;
pub mod operations;
pub mod site_data;
pub mod storage;
pub mod sync;
pub mod validation;

#[cfg(target_arch = "wasm32")]
pub mod browser;

#[cfg(test)]
mod test_support;

use crate::constants::FALLBACK_FAVICON;
use crate::site_data::{AppSettings, Site};
use wasm_bindgen::prelude::*;

// Set up panic hook and logging for the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Milliseconds since the epoch
#[cfg(target_arch = "wasm32")]
pub(crate) fn now_millis() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

// Re-export URL helpers for the extension pages
#[wasm_bindgen]
pub fn normalize_url(url: &str) -> String {
    domain::normalize_url(url)
}

#[wasm_bindgen]
pub fn is_valid_url(url: &str) -> bool {
    domain::is_valid_url(url)
}

#[wasm_bindgen]
pub fn is_valid_image_url(url: &str) -> bool {
    domain::is_valid_image_url(url)
}

#[wasm_bindgen]
pub fn effective_hostname(url: &str) -> String {
    domain::effective_hostname(url)
}

#[wasm_bindgen]
pub fn favicon_url(site: JsValue) -> String {
    match serde_wasm_bindgen::from_value::<Site>(site) {
        Ok(site) => domain::favicon_url(&site),
        Err(_) => FALLBACK_FAVICON.to_string(),
    }
}

#[wasm_bindgen]
pub fn generate_id() -> String {
    validation::generate_id()
}

/// Messages for invalid settings; empty when all are valid
#[wasm_bindgen]
pub fn validate_settings(settings: JsValue) -> Result<JsValue, JsValue> {
    let settings: AppSettings = serde_wasm_bindgen::from_value(settings)?;
    Ok(serde_wasm_bindgen::to_value(&validation::validate_settings(&settings))?)
}
