/// Version comparison and stored-data migrations
use crate::site_data::{AppData, AppSettings};
use crate::validation::{app_data_from_value, settings_from_value};
use log::info;
use serde_json::Value;
use std::cmp::Ordering;

fn version_part(part: Option<&str>) -> u64 {
    part.and_then(|p| p.trim().parse().ok()).unwrap_or(0)
}

/// Compare dotted versions numerically; missing or non-numeric parts count as 0
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();
    let len = a_parts.len().max(b_parts.len());

    (0..len)
        .map(|i| {
            let left = version_part(a_parts.get(i).copied());
            let right = version_part(b_parts.get(i).copied());
            left.cmp(&right)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Bring pre-1.1.0 settings and app data into the current shape.
///
/// Settings are merged over the defaults. App data gets both mode sections,
/// validated categories, and a manual order filled from the categories.
pub fn migrate_to_1_1_0(settings: &Value, app_data: &Value) -> (AppSettings, AppData) {
    info!("NovaTab: Migrating to version 1.1.0");
    (settings_from_value(settings), app_data_from_value(app_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_data::ActiveMode;
    use serde_json::json;

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.3", "1.2.4"), Ordering::Less);
        assert_eq!(compare_versions("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2.0", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_compare_versions_non_numeric_parts() {
        assert_eq!(compare_versions("1.beta", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("", "0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.x", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_migrate_empty_data() {
        let (settings, app) = migrate_to_1_1_0(&Value::Null, &Value::Null);

        assert_eq!(settings, AppSettings::default());
        assert_eq!(app, AppData::default());
    }

    #[test]
    fn test_migrate_legacy_data() {
        let settings = json!({"maxSiteCardsPerRow": "7"});
        let app_data = json!({
            "manual": {
                "categories": [
                    {"id": "old-1", "sites": [{"url": "news.com"}]},
                    {"name": "No Id"}
                ]
            }
        });

        let (settings, app) = migrate_to_1_1_0(&settings, &app_data);

        assert_eq!(settings.max_site_cards_per_row, "7");
        assert_eq!(settings.card_min_width, "70px");
        assert_eq!(app.active_mode, ActiveMode::Manual);
        assert_eq!(app.manual.categories[0].name, "Unnamed Category");
        assert_eq!(app.manual.categories[0].sites[0].url, "https://news.com");
        assert_eq!(app.manual.categories[0].sites[0].name, "");
        assert_eq!(app.manual.categories[1].id.len(), 36);
        assert_eq!(app.manual.category_order.len(), 2);
        assert_eq!(app.manual.category_order[0], "old-1");
        assert!(app.bookmarks.icon_overrides.is_empty());
    }
}
