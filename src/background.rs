/// Background service worker logic: lifecycle, bookmark sync, messages, saves
use crate::bookmarks::BookmarkProvider;
use crate::constants::{storage_keys, BOOKMARK_QUIET_PERIOD_MS, MIGRATION_1_1_0, VERSION};
use crate::debounce::{Debouncer, Timer};
use crate::errors::{ErrorReporter, NovaTabError};
use crate::migration::{compare_versions, migrate_to_1_1_0};
use crate::operations::{import_configuration, set_icon_override, set_manual_site_icon};
use crate::site_data::{ActiveDisplayData, AppData, AppSettings};
use crate::storage::{KeyValueStore, Store};
use crate::sync::{derive_bookmark_categories, generate_active_display_data};
use crate::validation::{drop_unsafe_icons, to_object};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

impl InstallReason {
    pub fn parse(reason: &str) -> Option<InstallReason> {
        match reason {
            "install" => Some(InstallReason::Install),
            "update" => Some(InstallReason::Update),
            "chrome_update" => Some(InstallReason::ChromeUpdate),
            "shared_module_update" => Some(InstallReason::SharedModuleUpdate),
            _ => None,
        }
    }
}

/// Runtime messages sent by the extension pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    GetVersion,
    RefreshBookmarks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageResponse {
    Version { version: String },
    Refresh(RefreshOutcome),
}

/// The site whose icon is being changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconTarget {
    /// A bookmark-derived site, keyed by url in the override map
    Bookmark { site_url: String },
    /// A manual site, matched by url and name within its category
    Manual {
        category_id: String,
        site_url: String,
        site_name: String,
    },
}

fn state_items(
    settings: Option<&AppSettings>,
    app: &AppData,
    display: &ActiveDisplayData,
) -> Map<String, Value> {
    let mut items = Map::new();
    if let Some(settings) = settings {
        items.insert(storage_keys::APP_SETTINGS.to_string(), Value::Object(to_object(settings)));
    }
    items.insert(storage_keys::APP_DATA.to_string(), Value::Object(to_object(app)));
    items.insert(
        storage_keys::ACTIVE_DISPLAY_DATA.to_string(),
        Value::Object(to_object(display)),
    );
    items
}

/// Keeps `activeDisplayData` in step with app data and the bookmark tree
pub struct Background<K: KeyValueStore, B: BookmarkProvider, T: Timer> {
    store: Store<K>,
    bookmarks: Option<B>,
    debouncer: Debouncer<T>,
}

impl<K, B, T> Background<K, B, T>
where
    K: KeyValueStore,
    B: BookmarkProvider,
    T: Timer,
{
    /// `bookmarks` is `None` when the bookmarks API isn't available
    pub fn new(backend: K, bookmarks: Option<B>, timer: T) -> Self {
        Background {
            store: Store::new(backend),
            bookmarks,
            debouncer: Debouncer::new(timer, Duration::from_millis(BOOKMARK_QUIET_PERIOD_MS)),
        }
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    pub fn bookmarks(&self) -> Option<&B> {
        self.bookmarks.as_ref()
    }

    pub async fn display_for(&self, app: &AppData) -> ActiveDisplayData {
        generate_active_display_data(Some(app), self.bookmarks.as_ref(), &self.store).await
    }

    /// Recompute from stored app data and persist
    pub async fn regenerate_display(&self) -> bool {
        let app = self.store.get_app_data().await;
        let display = self.display_for(&app).await;
        self.store.save_active_display_data(&display).await
    }

    pub async fn on_installed(&self, reason: InstallReason, previous_version: Option<&str>) {
        match reason {
            InstallReason::Install => self.handle_first_install().await,
            InstallReason::Update => self.handle_update(previous_version).await,
            other => {
                debug!("NovaTab: Ignoring install event {:?}", other);
                return;
            }
        }
        self.regenerate_display().await;
    }

    async fn handle_first_install(&self) {
        info!("NovaTab: First time installation");

        let mut items = state_items(
            Some(&AppSettings::default()),
            &AppData::default(),
            &ActiveDisplayData::empty(),
        );
        items.insert(storage_keys::EXTENSION_VERSION.to_string(), json!(VERSION));
        items.insert(storage_keys::INSTALL_DATE.to_string(), json!(crate::now_millis()));

        if self.store.set(items).await {
            info!("NovaTab: Default settings initialized");
        }
    }

    async fn handle_update(&self, previous_version: Option<&str>) {
        info!(
            "NovaTab: Updating from version {} to {}",
            previous_version.unwrap_or("unknown"),
            VERSION
        );

        if let Some(previous) = previous_version {
            if compare_versions(previous, MIGRATION_1_1_0) == Ordering::Less {
                self.migrate_stored_data().await;
            }
        }

        let mut items = Map::new();
        items.insert(storage_keys::EXTENSION_VERSION.to_string(), json!(VERSION));
        items.insert(storage_keys::LAST_UPDATE_DATE.to_string(), json!(crate::now_millis()));
        if self.store.set(items).await {
            info!("NovaTab: Update completed successfully");
        }
    }

    async fn migrate_stored_data(&self) {
        let stored = self
            .store
            .get(&[storage_keys::APP_SETTINGS, storage_keys::APP_DATA])
            .await;
        let (settings, app) = migrate_to_1_1_0(
            stored.get(storage_keys::APP_SETTINGS).unwrap_or(&Value::Null),
            stored.get(storage_keys::APP_DATA).unwrap_or(&Value::Null),
        );

        let mut items = Map::new();
        items.insert(storage_keys::APP_SETTINGS.to_string(), Value::Object(to_object(&settings)));
        items.insert(storage_keys::APP_DATA.to_string(), Value::Object(to_object(&app)));
        if self.store.set(items).await {
            info!("NovaTab: Migration to 1.1.0 completed");
        }
    }

    pub async fn on_startup(&self) -> usize {
        info!("NovaTab: Extension starting up");
        self.cleanup_orphaned_icon_overrides().await
    }

    /// Regenerate when displaying a bookmark folder. `None` when not.
    async fn sync_followed_bookmarks(&self) -> Option<bool> {
        let app = self.store.get_app_data().await;
        if !app.follows_bookmarks() {
            return None;
        }
        let display = self.display_for(&app).await;
        Some(self.store.save_active_display_data(&display).await)
    }

    /// Any bookmark created, removed, changed or moved.
    ///
    /// Waits for the quiet period; only the last event of a burst goes on to
    /// regenerate. Returns whether display data was written.
    pub async fn on_bookmark_changed(&self) -> bool {
        if !self.debouncer.settle().await {
            return false;
        }

        match self.sync_followed_bookmarks().await {
            Some(saved) => {
                info!("NovaTab: Updated activeDisplayData saved due to bookmark change.");
                saved
            }
            None => false,
        }
    }

    /// Explicit refresh requested by a page
    pub async fn refresh_bookmarks(&self) -> RefreshOutcome {
        match self.sync_followed_bookmarks().await {
            Some(true) => RefreshOutcome {
                success: true,
                message: "Bookmarks refreshed and display data updated.".to_string(),
            },
            Some(false) => RefreshOutcome {
                success: false,
                message: "Failed to save display data.".to_string(),
            },
            None => RefreshOutcome {
                success: false,
                message: "Not in bookmarks mode or no folder selected.".to_string(),
            },
        }
    }

    /// Drop icon overrides for urls no longer in the selected bookmark folder.
    ///
    /// Runs whatever the active mode, so overrides are pruned while dormant
    /// too. Does nothing if the folder can't be read. Returns the number of
    /// overrides removed and persisted.
    pub async fn cleanup_orphaned_icon_overrides(&self) -> usize {
        let mut app = self.store.get_app_data().await;
        let Some(folder_id) = app.bookmarks.configured_folder() else {
            return 0;
        };
        if app.bookmarks.icon_overrides.is_empty() {
            return 0;
        }
        let Some(provider) = self.bookmarks.as_ref() else {
            return 0;
        };

        info!("NovaTab: Starting icon override cleanup...");
        let Some(categories) =
            derive_bookmark_categories(folder_id, &app.bookmarks.icon_overrides, provider, &self.store)
                .await
        else {
            warn!("NovaTab: Bookmark folder unreadable, skipping icon override cleanup");
            return 0;
        };

        let live: HashSet<&str> = categories
            .iter()
            .flat_map(|c| c.sites.iter())
            .map(|s| s.url.as_str())
            .collect();
        let before = app.bookmarks.icon_overrides.len();
        app.bookmarks
            .icon_overrides
            .retain(|url, _| live.contains(url.as_str()));
        let cleaned = before - app.bookmarks.icon_overrides.len();

        if cleaned == 0 {
            info!("NovaTab: No orphaned icon overrides found");
            return 0;
        }

        let mut items = Map::new();
        items.insert(storage_keys::APP_DATA.to_string(), Value::Object(to_object(&app)));
        if !self.store.set(items).await {
            return 0;
        }
        info!("NovaTab: Cleaned {} orphaned icon overrides", cleaned);
        cleaned
    }

    pub async fn handle_message(&self, message: Message) -> MessageResponse {
        debug!("NovaTab: Received message: {:?}", message);
        match message {
            Message::GetVersion => MessageResponse::Version {
                version: VERSION.to_string(),
            },
            Message::RefreshBookmarks => MessageResponse::Refresh(self.refresh_bookmarks().await),
        }
    }

    /// Persist settings and app data together with freshly derived display data
    pub async fn save_all(
        &self,
        settings: &AppSettings,
        app: &AppData,
    ) -> Result<ActiveDisplayData, NovaTabError> {
        let mut app = app.clone();
        let dropped = drop_unsafe_icons(&mut app);
        if dropped > 0 {
            warn!("NovaTab: Dropped {} unsafe icon URLs before saving", dropped);
        }

        let display = self.display_for(&app).await;
        if let Err(err) = self
            .store
            .safe_set(state_items(Some(settings), &app, &display))
            .await
        {
            self.store
                .log_error(&err, "Background::save_all", json!({ "activeMode": app.active_mode }))
                .await;
            return Err(err);
        }
        Ok(display)
    }

    pub async fn reset_all(&self) -> Result<ActiveDisplayData, NovaTabError> {
        self.save_all(&AppSettings::default(), &AppData::default()).await
    }

    /// Replace everything with an exported configuration file
    pub async fn import(&self, text: &str) -> Result<ActiveDisplayData, NovaTabError> {
        let (settings, app) = import_configuration(text)?;
        self.save_all(&settings, &app).await
    }

    /// Store a custom icon for one site; an empty icon clears it.
    /// Returns whether a site was updated.
    pub async fn save_icon(&self, target: &IconTarget, icon_url: &str) -> Result<bool, NovaTabError> {
        let mut app = self.store.get_app_data().await;

        let updated = match target {
            IconTarget::Bookmark { site_url } => {
                set_icon_override(&mut app, site_url, icon_url)?;
                true
            }
            IconTarget::Manual {
                category_id,
                site_url,
                site_name,
            } => set_manual_site_icon(&mut app, category_id, site_url, site_name, icon_url)?,
        };
        if !updated {
            return Ok(false);
        }

        let display = self.display_for(&app).await;
        if let Err(err) = self.store.safe_set(state_items(None, &app, &display)).await {
            self.store
                .log_error(&err, "Background::save_icon", json!({ "iconUrl": icon_url }))
                .await;
            return Err(err);
        }
        Ok(true)
    }
}
