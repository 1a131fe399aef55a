/// Mutations of AppData: mode, folder, icons, categories, sites, import/export
use crate::constants::{storage_keys, UNNAMED_SITE};
use crate::domain::{is_valid_image_url, is_valid_url};
use crate::errors::NovaTabError;
use crate::site_data::{ActiveMode, AppData, AppSettings, Category, CategoryOrder};
use crate::validation::{app_data_from_value, drop_sites_without_url, generate_id, settings_from_value, validate_site};
use serde_json::{json, Value};

/// Change which source is displayed. The other side is left as it is.
pub fn switch_mode(app: &mut AppData, mode: ActiveMode) {
    app.active_mode = mode;
}

/// Select the bookmark folder to display; `None` or `""` clears it.
///
/// Picking a different folder drops the stored category order, so the new
/// folder's categories show in tree order until rearranged.
pub fn select_bookmark_folder(app: &mut AppData, folder_id: Option<&str>) {
    let folder_id = folder_id.filter(|id| !id.is_empty()).map(str::to_string);
    if app.bookmarks.folder_id != folder_id {
        app.bookmarks.category_order.clear();
    }
    app.bookmarks.folder_id = folder_id;
}

fn checked_icon(icon_url: &str) -> Result<&str, NovaTabError> {
    let icon_url = icon_url.trim();
    if !icon_url.is_empty() && !is_valid_image_url(icon_url) {
        return Err(NovaTabError::InvalidImageUrl);
    }
    Ok(icon_url)
}

/// Set the icon of a bookmark-derived site; an empty icon removes the override
pub fn set_icon_override(app: &mut AppData, site_url: &str, icon_url: &str) -> Result<(), NovaTabError> {
    let icon_url = checked_icon(icon_url)?;
    if icon_url.is_empty() {
        app.bookmarks.icon_overrides.remove(site_url);
    } else {
        app.bookmarks
            .icon_overrides
            .insert(site_url.to_string(), icon_url.to_string());
    }
    Ok(())
}

/// Set the icon of the manual site matching both url and name.
/// Returns whether such a site was found.
pub fn set_manual_site_icon(
    app: &mut AppData,
    category_id: &str,
    site_url: &str,
    site_name: &str,
    icon_url: &str,
) -> Result<bool, NovaTabError> {
    let icon_url = checked_icon(icon_url)?;

    let site = app
        .manual
        .categories
        .iter_mut()
        .find(|c| c.id == category_id)
        .and_then(|c| c.sites.iter_mut().find(|s| s.url == site_url && s.name == site_name));

    match site {
        Some(site) => {
            site.custom_icon_url = icon_url.to_string();
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Append a new empty manual category; returns its id
pub fn add_category(app: &mut AppData, name: &str) -> String {
    let id = generate_id();
    app.manual.categories.push(Category::new(&id, name));
    app.manual.category_order.push(id.clone());
    id
}

pub fn remove_category(app: &mut AppData, category_id: &str) -> bool {
    let before = app.manual.categories.len();
    app.manual.categories.retain(|c| c.id != category_id);
    app.manual.category_order.retain(|id| id != category_id);
    app.manual.categories.len() != before
}

/// Validate a raw site record and append it to a manual category
pub fn add_site(app: &mut AppData, category_id: &str, raw: &Value) -> Result<(), NovaTabError> {
    let mut site = validate_site(raw);
    if site.url.is_empty() || !is_valid_url(&site.url) {
        return Err(NovaTabError::InvalidUrl);
    }
    checked_icon(&site.custom_icon_url)?;
    if site.name.is_empty() {
        site.name = UNNAMED_SITE.to_string();
    }

    let category = app
        .manual
        .categories
        .iter_mut()
        .find(|c| c.id == category_id)
        .ok_or_else(|| NovaTabError::CategoryNotFound(category_id.to_string()))?;
    category.sites.push(site);
    Ok(())
}

pub fn remove_site(app: &mut AppData, category_id: &str, index: usize) -> bool {
    match app.manual.categories.iter_mut().find(|c| c.id == category_id) {
        Some(category) if index < category.sites.len() => {
            category.sites.remove(index);
            true
        }
        _ => false,
    }
}

/// Move a category id to `index`, clamped to the end of the order
pub fn move_category(order: &mut CategoryOrder, category_id: &str, index: usize) -> bool {
    let Some(from) = order.iter().position(|id| id == category_id) else {
        return false;
    };
    let id = order.remove(from);
    order.insert(index.min(order.len()), id);
    true
}

/// Parse an exported configuration file.
///
/// Both `appSettings` and `appData` must be present. Settings are merged over
/// the defaults and categories are validated like stored data.
pub fn import_configuration(text: &str) -> Result<(AppSettings, AppData), NovaTabError> {
    let imported: Value = serde_json::from_str(text)?;

    let settings = imported
        .get(storage_keys::APP_SETTINGS)
        .filter(|v| v.is_object())
        .ok_or_else(|| NovaTabError::MissingField(storage_keys::APP_SETTINGS.to_string()))?;
    let app_data = imported
        .get(storage_keys::APP_DATA)
        .filter(|v| v.is_object())
        .ok_or_else(|| NovaTabError::MissingField(storage_keys::APP_DATA.to_string()))?;

    let mut app = app_data_from_value(app_data);
    drop_sites_without_url(&mut app);
    Ok((settings_from_value(settings), app))
}

/// Pretty-printed JSON holding settings and app data
pub fn export_configuration(settings: &AppSettings, app: &AppData) -> Result<String, NovaTabError> {
    let exported = json!({
        (storage_keys::APP_SETTINGS): settings,
        (storage_keys::APP_DATA): app,
    });
    Ok(serde_json::to_string_pretty(&exported)?)
}
