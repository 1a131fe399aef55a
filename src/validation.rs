/// Sanitizing of raw records (stored, imported or typed in) into canonical shapes
use crate::constants::UNNAMED_CATEGORY;
use crate::domain::{is_valid_image_url, normalize_url};
use crate::site_data::{ActiveMode, AppData, AppSettings, BookmarksData, Category, ManualData, Site};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use uuid::Uuid;

static PIXEL_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)px$").expect("pixel pattern is valid"));
static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#[0-9a-f]{6}$").expect("hex color pattern is valid"));

/// Random v4 UUID, e.g. `123e4567-e89b-42d3-a456-426614174000`
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn string_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

/// Sanitize a site record. Missing or mistyped fields become empty strings.
pub fn validate_site(raw: &Value) -> Site {
    Site {
        name: string_field(raw, "name").map(str::trim).unwrap_or_default().to_string(),
        url: string_field(raw, "url").map(normalize_url).unwrap_or_default(),
        custom_icon_url: string_field(raw, "customIconUrl")
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Sanitize a category record
///
/// Keeps an existing id (numbers are rendered as strings), otherwise generates
/// one. A blank name becomes "Unnamed Category". Every site goes through
/// [`validate_site`].
pub fn validate_category(raw: &Value) -> Category {
    let id = match raw.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => generate_id(),
    };

    let name = match string_field(raw, "name").map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNNAMED_CATEGORY.to_string(),
    };

    let sites = raw
        .get("sites")
        .and_then(Value::as_array)
        .map(|sites| sites.iter().map(validate_site).collect())
        .unwrap_or_default();

    Category { id, name, sites }
}

fn string_list(raw: Option<&Value>) -> Vec<String> {
    raw.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn string_map(raw: Option<&Value>) -> std::collections::BTreeMap<String, String> {
    raw.and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Coerce stored or imported app data into a valid [`AppData`]
///
/// Unknown modes fall back to manual, categories are validated, and an empty
/// manual category order is filled from the categories.
pub fn app_data_from_value(raw: &Value) -> AppData {
    let mut app = AppData::default();

    if let Some(mode) = string_field(raw, "activeMode") {
        app.active_mode = ActiveMode::parse(mode);
    }

    if let Some(manual) = raw.get("manual").filter(|m| m.is_object()) {
        app.manual = ManualData {
            categories: manual
                .get("categories")
                .and_then(Value::as_array)
                .map(|cats| cats.iter().map(validate_category).collect())
                .unwrap_or_default(),
            category_order: string_list(manual.get("categoryOrder")),
        };
    }

    if let Some(bookmarks) = raw.get("bookmarks").filter(|b| b.is_object()) {
        app.bookmarks = BookmarksData {
            folder_id: match bookmarks.get("folderId") {
                Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            },
            category_order: string_list(bookmarks.get("categoryOrder")),
            icon_overrides: string_map(bookmarks.get("iconOverrides")),
        };
    }

    backfill_manual_order(&mut app);
    drop_unsafe_icons(&mut app);
    app
}

/// Fill an empty manual category order from the categories' ids
pub fn backfill_manual_order(app: &mut AppData) {
    if app.manual.category_order.is_empty() && !app.manual.categories.is_empty() {
        app.manual.category_order = app.manual.categories.iter().map(|c| c.id.clone()).collect();
    }
}

/// Blank custom icons and drop icon overrides that are not safe image URLs.
/// Returns how many were removed.
pub fn drop_unsafe_icons(app: &mut AppData) -> usize {
    let mut removed = 0;
    for site in app.manual.categories.iter_mut().flat_map(|c| c.sites.iter_mut()) {
        if !site.custom_icon_url.is_empty() && !is_valid_image_url(&site.custom_icon_url) {
            site.custom_icon_url.clear();
            removed += 1;
        }
    }

    let before = app.bookmarks.icon_overrides.len();
    app.bookmarks
        .icon_overrides
        .retain(|_, icon| is_valid_image_url(icon));
    removed + before - app.bookmarks.icon_overrides.len()
}

/// Drop sites without a URL from every manual category
pub fn drop_sites_without_url(app: &mut AppData) {
    for category in app.manual.categories.iter_mut() {
        category.sites.retain(|site| !site.url.is_empty());
    }
}

/// Merge stored settings over the defaults, key by key
///
/// Only keys known to [`AppSettings`] are taken; a stored value wins when it
/// is present. Numbers are accepted and kept as strings.
pub fn settings_from_value(raw: &Value) -> AppSettings {
    let defaults = AppSettings::default();
    let mut merged = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        _ => return defaults,
    };

    if let Some(stored) = raw.as_object() {
        for (key, slot) in merged.iter_mut() {
            match stored.get(key) {
                Some(Value::String(s)) => *slot = Value::String(s.clone()),
                Some(Value::Number(n)) => *slot = Value::String(n.to_string()),
                _ => {}
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}

fn leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// `"5"` and `"5px"` are positive, `"0"`, `"-5"` and `"abc"` are not
pub fn is_positive_number(value: &str) -> bool {
    leading_integer(value).is_some_and(|n| n > 0)
}

/// `Npx` with N > 0
pub fn is_valid_pixel_value(value: &str) -> bool {
    pixel_value(value).is_some_and(|n| n > 0)
}

fn pixel_value(value: &str) -> Option<u32> {
    PIXEL_VALUE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse().ok())
}

/// `#RRGGBB`, either case
pub fn is_valid_hex_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}

pub fn is_valid_categories_per_row(value: &str) -> bool {
    leading_integer(value).is_some_and(|n| (1..=4).contains(&n))
}

pub fn is_valid_site_cards_per_row(value: &str) -> bool {
    leading_integer(value).is_some_and(|n| (3..=10).contains(&n))
}

pub fn is_valid_card_min_width(value: &str) -> bool {
    pixel_value(value).is_some_and(|n| (50..=150).contains(&n))
}

pub fn is_valid_favicon_size(value: &str) -> bool {
    pixel_value(value).is_some_and(|n| (24..=64).contains(&n))
}

pub fn is_valid_font_size(value: &str) -> bool {
    pixel_value(value).is_some_and(|n| (8..=24).contains(&n))
}

/// Messages for every invalid setting, in the order the options page shows them
pub fn validate_settings(settings: &AppSettings) -> Vec<String> {
    let checks: [(bool, &str); 8] = [
        (
            is_positive_number(&settings.max_categories_per_row),
            "Max Categories Per Row must be a positive number",
        ),
        (
            is_positive_number(&settings.max_site_cards_per_row),
            "Max Site Cards Per Row must be a positive number",
        ),
        (
            is_valid_pixel_value(&settings.card_min_width),
            "Card Min Width must be a valid pixel value (e.g., 70px)",
        ),
        (
            is_valid_pixel_value(&settings.favicon_wrapper_size),
            "Favicon Wrapper Size must be a valid pixel value (e.g., 38px)",
        ),
        (
            is_valid_pixel_value(&settings.category_title_font_size),
            "Category Title Font Size must be a valid pixel value (e.g., 16px)",
        ),
        (
            is_valid_pixel_value(&settings.site_name_font_size),
            "Site Name Font Size must be a valid pixel value (e.g., 10px)",
        ),
        (
            is_valid_hex_color(&settings.gradient_start_color),
            "Gradient Start Color must be a valid hex color",
        ),
        (
            is_valid_hex_color(&settings.gradient_end_color),
            "Gradient End Color must be a valid hex color",
        ),
    ];

    checks
        .iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, message)| message.to_string())
        .collect()
}

/// Serialize any value to a JSON object, or an empty one if it isn't an object
pub(crate) fn to_object<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
