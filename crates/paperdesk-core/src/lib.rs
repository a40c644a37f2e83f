use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod catalog;
pub mod clock;
pub mod collections;
pub mod config_file;
pub mod gateway;
pub mod query;
pub mod record;
pub mod store;
pub mod subscriptions;

// Re-export for convenience
pub use catalog::{ArxivClient, CatalogClient, CatalogError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collections::{
    CollectionError, CollectionItem, CollectionKind, CollectionStore, NewItem, Upserted,
};
pub use gateway::{DEFAULT_SEARCH_TTL, RetrievalError, SearchGateway};
pub use query::{SearchCriteria, TranslationError, translate, translate_on};
pub use record::{Link, Record, RecordPage};
pub use store::{Backend, MemoryStore, SqliteStore, StoreError, build_backend, global_backend};
pub use subscriptions::{Subscription, SubscriptionError, SubscriptionStore};

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "PAPERDESK_DB";
/// Environment variable overriding the web server bind address.
pub const ENV_BIND: &str = "PAPERDESK_BIND";

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub catalog_base_url: String,
    pub catalog_timeout_secs: u64,
    pub user_agent: String,
    /// Path to the SQLite database. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// How long a cached search page stays fresh. Default: 24 hours.
    pub search_ttl_secs: u64,
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_base_url: catalog::arxiv::DEFAULT_BASE_URL.to_string(),
            catalog_timeout_secs: catalog::arxiv::DEFAULT_TIMEOUT.as_secs(),
            user_agent: format!("paperdesk/{}", env!("CARGO_PKG_VERSION")),
            db_path: None,
            search_ttl_secs: DEFAULT_SEARCH_TTL.as_secs(),
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever the config file sets.
    pub fn from_file(file: &config_file::ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(catalog) = &file.catalog {
            if let Some(url) = &catalog.base_url {
                config.catalog_base_url = url.clone();
            }
            if let Some(secs) = catalog.timeout_secs {
                config.catalog_timeout_secs = secs;
            }
            if let Some(agent) = &catalog.user_agent {
                config.user_agent = agent.clone();
            }
        }
        if let Some(cache) = &file.cache {
            if let Some(path) = &cache.path {
                config.db_path = Some(PathBuf::from(path));
            }
            if let Some(secs) = cache.search_ttl_secs {
                config.search_ttl_secs = secs;
            }
        }
        if let Some(bind) = file.server.as_ref().and_then(|s| s.bind.clone()) {
            config.bind = bind;
        }
        config
    }

    /// Config file cascade, then environment.
    pub fn load() -> Self {
        let mut config = Self::from_file(&config_file::load_config());
        config.apply_env();
        config
    }

    /// Apply `PAPERDESK_DB` and `PAPERDESK_BIND` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply environment-style overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.bind = bind;
        }
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }
}

/// The services a front end needs, wired to one backend.
#[derive(Clone)]
pub struct Paperdesk {
    pub gateway: Arc<SearchGateway>,
    pub collections: CollectionStore,
    pub subscriptions: SubscriptionStore,
    backend: Backend,
}

impl Paperdesk {
    pub fn new(catalog: Arc<dyn CatalogClient>, backend: Backend, config: &Config) -> Self {
        let gateway =
            SearchGateway::new(catalog, backend.cache.clone()).with_search_ttl(config.search_ttl());
        Self {
            gateway: Arc::new(gateway),
            collections: CollectionStore::new(backend.collections.clone()),
            subscriptions: SubscriptionStore::new(backend.subscriptions.clone()),
            backend,
        }
    }

    /// Build the arXiv client and open the process-wide backend.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        let catalog = ArxivClient::new(client)
            .with_base_url(config.catalog_base_url.clone())
            .with_timeout(config.catalog_timeout());
        let backend = global_backend(config.db_path.as_deref());
        Ok(Self::new(Arc::new(catalog), backend, config))
    }

    /// Whether collections and cache survive a restart.
    pub fn is_persistent(&self) -> bool {
        self.backend.is_persistent()
    }
}
