/// Data structures for NovaTab
use crate::constants::UNNAMED_CATEGORY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single shortcut shown on the new tab page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Empty when the site has no custom icon
    #[serde(default)]
    pub custom_icon_url: String,
}

impl Site {
    pub fn new(name: &str, url: &str) -> Site {
        Site {
            name: name.to_string(),
            url: url.to_string(),
            custom_icon_url: String::new(),
        }
    }
}

/// A named group of sites
///
/// Manual categories carry a generated id, bookmark-derived ones carry the
/// bookmark folder's id so that renaming the folder keeps the id stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl Category {
    pub fn new(id: &str, name: &str) -> Category {
        let name = name.trim();
        Category {
            id: id.to_string(),
            name: if name.is_empty() { UNNAMED_CATEGORY.to_string() } else { name.to_string() },
            sites: Vec::new(),
        }
    }
}

/// Display order of categories, by id
pub type CategoryOrder = Vec<String>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActiveMode {
    #[default]
    Manual,
    Bookmarks,
}

impl ActiveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveMode::Manual => "manual",
            ActiveMode::Bookmarks => "bookmarks",
        }
    }

    /// Unknown mode names fall back to manual
    pub fn parse(value: &str) -> ActiveMode {
        match value {
            "bookmarks" => ActiveMode::Bookmarks,
            _ => ActiveMode::Manual,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualData {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub category_order: CategoryOrder,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarksData {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub category_order: CategoryOrder,
    /// Site url -> icon url, only used for bookmark-derived sites
    #[serde(default)]
    pub icon_overrides: BTreeMap<String, String>,
}

impl BookmarksData {
    /// The selected root folder, if one is set and non-empty
    pub fn configured_folder(&self) -> Option<&str> {
        self.folder_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Full application state. Only the side named by `active_mode` is shown,
/// the other one is kept untouched so switching back loses nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub active_mode: ActiveMode,
    #[serde(default)]
    pub manual: ManualData,
    #[serde(default)]
    pub bookmarks: BookmarksData,
}

impl AppData {
    /// True when bookmark changes can affect what is displayed
    pub fn follows_bookmarks(&self) -> bool {
        self.active_mode == ActiveMode::Bookmarks && self.bookmarks.configured_folder().is_some()
    }
}

/// What the new tab page renders. Always derived from `AppData`, never edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDisplayData {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub category_order: CategoryOrder,
}

impl ActiveDisplayData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Categories in display order
    pub fn ordered_categories(&self) -> Vec<&Category> {
        self.category_order
            .iter()
            .filter_map(|id| self.categories.iter().find(|c| &c.id == id))
            .collect()
    }

    /// Every site url shown, across all categories
    pub fn site_urls(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.sites.iter())
            .map(|s| s.url.as_str())
    }
}

/// Layout and appearance settings, stored as the strings the options page edits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub max_categories_per_row: String,
    pub max_site_cards_per_row: String,
    pub card_min_width: String,
    pub category_title_font_size: String,
    pub site_name_font_size: String,
    pub favicon_wrapper_size: String,
    pub gradient_start_color: String,
    pub gradient_end_color: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            max_categories_per_row: "2".to_string(),
            max_site_cards_per_row: "5".to_string(),
            card_min_width: "70px".to_string(),
            category_title_font_size: "16px".to_string(),
            site_name_font_size: "10px".to_string(),
            favicon_wrapper_size: "38px".to_string(),
            gradient_start_color: "#F5F7FA".to_string(),
            gradient_end_color: "#E0E5EC".to_string(),
        }
    }
}
