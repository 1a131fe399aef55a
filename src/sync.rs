/// Reconciliation of manual data or the bookmark tree into active display data
use crate::bookmarks::{BookmarkNode, BookmarkProvider};
use crate::constants::{UNNAMED_BOOKMARK, UNNAMED_CATEGORY};
use crate::errors::{safe_async, ErrorReporter, NovaTabError};
use crate::site_data::{ActiveDisplayData, ActiveMode, AppData, Category, CategoryOrder, Site};
use futures::future::join_all;
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Keep the previous order for ids that still exist, then append new ids in
/// the order the categories are listed. Duplicate ids are collapsed.
pub fn reconcile_order(previous: &[String], categories: &[Category]) -> CategoryOrder {
    let known: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(categories.len());

    let retained = previous.iter().map(String::as_str).filter(|id| known.contains(id));
    let appended = categories.iter().map(|c| c.id.as_str());
    for id in retained.chain(appended) {
        if seen.insert(id) {
            order.push(id.to_string());
        }
    }

    order
}

fn site_from_bookmark(node: &BookmarkNode, overrides: &BTreeMap<String, String>) -> Option<Site> {
    let url = node.url.as_deref().filter(|url| !url.is_empty())?;
    let name = if node.title.is_empty() { UNNAMED_BOOKMARK } else { node.title.as_str() };
    Some(Site {
        name: name.to_string(),
        url: url.to_string(),
        custom_icon_url: overrides.get(url).cloned().unwrap_or_default(),
    })
}

async fn category_from_folder<B, R>(
    folder: &BookmarkNode,
    overrides: &BTreeMap<String, String>,
    provider: &B,
    reporter: &R,
) -> Option<Category>
where
    B: BookmarkProvider,
    R: ErrorReporter,
{
    let context = format!("bookmarks.getChildren_subfolder_{}", folder.id);
    let children = safe_async(reporter, &context, provider.get_children(&folder.id)).await?;

    let sites: Vec<Site> = children
        .iter()
        .filter_map(|child| site_from_bookmark(child, overrides))
        .collect();
    if sites.is_empty() {
        return None;
    }

    let name = if folder.title.is_empty() { UNNAMED_CATEGORY } else { folder.title.as_str() };
    Some(Category {
        id: folder.id.clone(),
        name: name.to_string(),
        sites,
    })
}

/// Categories for each non-empty sub-folder of `folder_id`, in tree order.
///
/// Bookmarks sitting directly in the root folder are ignored. A sub-folder
/// that can't be read is skipped. `None` means the root folder itself
/// couldn't be read.
pub async fn derive_bookmark_categories<B, R>(
    folder_id: &str,
    overrides: &BTreeMap<String, String>,
    provider: &B,
    reporter: &R,
) -> Option<Vec<Category>>
where
    B: BookmarkProvider,
    R: ErrorReporter,
{
    let root = safe_async(reporter, "bookmarks.getChildren_root", provider.get_children(folder_id)).await?;

    let folders = root
        .iter()
        .filter(|node| node.is_folder())
        .map(|folder| category_from_folder(folder, overrides, provider, reporter));

    Some(join_all(folders).await.into_iter().flatten().collect())
}

/// Compute what the new tab page shows.
///
/// Never fails: missing inputs and provider errors are reported and yield
/// empty data. The result shares nothing with `app_data`.
pub async fn generate_active_display_data<B, R>(
    app_data: Option<&AppData>,
    bookmarks: Option<&B>,
    reporter: &R,
) -> ActiveDisplayData
where
    B: BookmarkProvider,
    R: ErrorReporter,
{
    let Some(app) = app_data else {
        reporter
            .log_error(
                &NovaTabError::MissingField("appData".to_string()),
                "sync::generate_active_display_data",
                Value::Null,
            )
            .await;
        return ActiveDisplayData::empty();
    };

    match app.active_mode {
        ActiveMode::Manual => {
            let categories = app.manual.categories.clone();
            let category_order = reconcile_order(&app.manual.category_order, &categories);
            ActiveDisplayData {
                categories,
                category_order,
            }
        }
        ActiveMode::Bookmarks => {
            let Some(folder_id) = app.bookmarks.configured_folder() else {
                warn!("NovaTab: Bookmarks mode is active but no folder is selected");
                return ActiveDisplayData::empty();
            };
            let Some(provider) = bookmarks else {
                reporter
                    .log_error(
                        &NovaTabError::Configuration("bookmark provider unavailable".to_string()),
                        "sync::generate_active_display_data",
                        Value::Null,
                    )
                    .await;
                return ActiveDisplayData::empty();
            };

            let categories =
                derive_bookmark_categories(folder_id, &app.bookmarks.icon_overrides, provider, reporter)
                    .await
                    .unwrap_or_default();
            let category_order = reconcile_order(&app.bookmarks.category_order, &categories);
            ActiveDisplayData {
                categories,
                category_order,
            }
        }
    }
}

/// Every distinct site url in the display data
pub fn collect_site_urls(display: &ActiveDisplayData) -> BTreeSet<String> {
    display.site_urls().map(str::to_string).collect()
}
