/// Fixed values shared across NovaTab: version, storage keys, defaults

pub const VERSION: &str = "1.1.1";

/// Versions older than this are migrated on update
pub const MIGRATION_1_1_0: &str = "1.1.0";

pub mod storage_keys {
    pub const APP_SETTINGS: &str = "appSettings";
    pub const APP_DATA: &str = "appData";
    pub const ACTIVE_DISPLAY_DATA: &str = "activeDisplayData";
    pub const EXTENSION_VERSION: &str = "extensionVersion";
    pub const INSTALL_DATE: &str = "installDate";
    pub const LAST_UPDATE_DATE: &str = "lastUpdateDate";
    pub const ERROR_LOG: &str = "errorLog";
}

pub const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";
pub const FAVICON_SIZE: u32 = 64;
pub const FALLBACK_FAVICON: &str = "icons/default_favicon.png";

/// Returned by hostname resolution when no usable favicon domain exists
pub const HOSTNAME_SENTINEL: &str = "example.com";

pub const UNNAMED_CATEGORY: &str = "Unnamed Category";
pub const UNNAMED_BOOKMARK: &str = "Unnamed Bookmark";
pub const UNNAMED_SITE: &str = "Unnamed Site";

pub const BOOKMARK_QUIET_PERIOD_MS: u64 = 500;

pub const ERROR_LOG_CAPACITY: usize = 50;

pub const STORAGE_QUOTA_BYTES: u64 = 10_485_760; // 10MB
pub const STORAGE_WARNING_THRESHOLD: f64 = 0.9;
