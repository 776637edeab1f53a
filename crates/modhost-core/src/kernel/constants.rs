/// Application name
pub const APP_NAME: &str = "modhost";

/// Application version, reported to the update server as the host's own entry
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Unique ID the host uses for itself in update checks
pub const HOST_UPDATE_ID: &str = "modhost";

/// Current mod API version
pub const API_VERSION: &str = "1.4.0";

/// Name of the manifest file expected in every mod folder
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Default mods directory, relative to the working directory
pub const DEFAULT_MODS_DIR: &str = "Mods";

/// Environment variable overriding the mods directory
pub const MODS_PATH_ENV: &str = "MODHOST_MODS_PATH";

/// Environment variable overriding the settings file
pub const CONFIG_PATH_ENV: &str = "MODHOST_CONFIG";

/// Directory (sibling of the mods root) holding global per-mod data
pub const DEFAULT_DATA_DIR_NAME: &str = ".modhost-data";

/// Default base URL of the update-check web API
pub const DEFAULT_WEB_API_URL: &str = "https://api.modhost.dev/v1";

/// Symbol every mod library exports to register its entry types
pub const REGISTER_SYMBOL: &[u8] = b"_modhost_register\0";

/// Symbol every mod library exports to report the API version it was built against
pub const API_VERSION_SYMBOL: &[u8] = b"_modhost_api_version\0";
