use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub catalog: Option<CatalogConfig>,
    pub cache: Option<CacheConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite database holding the cache and user collections.
    pub path: Option<String>,
    pub search_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

/// Platform config directory path: `<config_dir>/paperdesk/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperdesk").join("config.toml"))
}

/// Load config by cascading CWD `.paperdesk.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".paperdesk.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_catalog = base.catalog.unwrap_or_default();
    let base_cache = base.cache.unwrap_or_default();
    let base_server = base.server.unwrap_or_default();
    let catalog = overlay.catalog.unwrap_or_default();
    let cache = overlay.cache.unwrap_or_default();
    let server = overlay.server.unwrap_or_default();

    ConfigFile {
        catalog: Some(CatalogConfig {
            base_url: catalog.base_url.or(base_catalog.base_url),
            timeout_secs: catalog.timeout_secs.or(base_catalog.timeout_secs),
            user_agent: catalog.user_agent.or(base_catalog.user_agent),
        }),
        cache: Some(CacheConfig {
            path: cache.path.or(base_cache.path),
            search_ttl_secs: cache.search_ttl_secs.or(base_cache.search_ttl_secs),
        }),
        server: Some(ServerConfig {
            bind: server.bind.or(base_server.bind),
        }),
    }
}
