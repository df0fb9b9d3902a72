//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWROUTER_*)
//! 2. TOML config file (if SWROUTER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::route::{RouteSpec, default_routes};

mod validation;

pub use validation::ConfigError;

/// One build-time precache manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// URL relative to the worker scope, or absolute.
    pub url: String,
    /// Content revision; `None` when the URL itself is content-hashed.
    #[serde(default)]
    pub revision: Option<String>,
}

impl ManifestEntry {
    pub fn new(url: impl Into<String>, revision: Option<&str>) -> Self {
        Self { url: url.into(), revision: revision.map(str::to_string) }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWROUTER_*)
/// 2. TOML config file (if SWROUTER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache version tag embedded in every bucket name.
    ///
    /// Set via SWROUTER_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix of every bucket name owned by this worker.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Explicit runtime bucket name; derived from prefix and version when unset.
    #[serde(default)]
    pub runtime_bucket_name: Option<String>,

    /// URL the worker controls. Relative paths resolve against it.
    #[serde(default = "default_scope")]
    pub scope: Url,

    /// Scope-relative path of the offline fallback document.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Application shell fetched and stored at install time.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<ManifestEntry>,

    /// Ordered route table; first match wins.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteSpec>,

    /// Path to SQLite cache database.
    ///
    /// Set via SWROUTER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Deadline for the network-first strategy in milliseconds.
    ///
    /// Set via SWROUTER_NETWORK_TIMEOUT_MS environment variable.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Overall HTTP client timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Activate right after install instead of waiting for a skip-waiting message.
    #[serde(default)]
    pub skip_waiting_on_install: bool,
}

fn default_version() -> String {
    "v1".into()
}

fn default_cache_prefix() -> String {
    "ratewise".into()
}

fn default_scope() -> Url {
    Url::parse("http://localhost:4173/ratewise/").expect("static scope URL is valid")
}

fn default_offline_document() -> String {
    "offline.html".into()
}

fn default_precache_manifest() -> Vec<ManifestEntry> {
    vec![
        ManifestEntry::new("./", None),
        ManifestEntry::new("index.html", None),
        ManifestEntry::new("manifest.webmanifest", None),
        ManifestEntry::new("offline.html", None),
    ]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swrouter-cache.sqlite")
}

fn default_user_agent() -> String {
    "swrouter/0.1".into()
}

fn default_network_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            runtime_bucket_name: None,
            scope: default_scope(),
            offline_document: default_offline_document(),
            precache_manifest: default_precache_manifest(),
            routes: default_routes(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            network_timeout_ms: default_network_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            skip_waiting_on_install: false,
        }
    }
}

impl AppConfig {
    /// Network-first deadline as Duration.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    /// HTTP client timeout as Duration for use with reqwest.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Name of the install-time bucket, e.g. `ratewise-precache-v1`.
    pub fn precache_bucket_name(&self) -> String {
        format!("{}-precache-{}", self.cache_prefix, self.version)
    }

    /// Name of the lazily populated bucket, e.g. `ratewise-runtime-v1`.
    pub fn runtime_bucket_name(&self) -> String {
        self.runtime_bucket_name
            .clone()
            .unwrap_or_else(|| format!("{}-runtime-{}", self.cache_prefix, self.version))
    }

    /// Resolve a scope-relative path (leading `/` is ignored) or absolute URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the result is not a valid URL.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let relative = path.strip_prefix('/').unwrap_or(path);
        self.scope
            .join(relative)
            .map_err(|e| ConfigError::Invalid { field: "url".into(), reason: format!("{path}: {e}") })
    }

    /// Absolute URL of the offline fallback document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the document path does not resolve.
    pub fn offline_document_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.offline_document)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWROUTER_`
    /// 2. TOML file from `SWROUTER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWROUTER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWROUTER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
