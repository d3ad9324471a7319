use std::time::Duration;

use serde::Deserialize;

use crate::domain::cache::{CacheEntryOptions, ExpiryPolicy};
use crate::infrastructure::auth::JwtConfig;
use crate::infrastructure::cache::{CacheConfig, InvalidationStrategy, SweepBounds};
use crate::infrastructure::logging;
use crate::infrastructure::storage::{PostgresConfig, StorageConfig, StorageType};

/// Application configuration
///
/// Loaded from `config/default.*`, `config/local.*`, then `APP__*`
/// environment variables (e.g. `APP__CACHE__REMOTE_URL`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageType,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub local_ttl_cap_secs: u64,
    pub promotion_ttl_secs: u64,
    pub remote_url: Option<String>,
    pub remote_key_prefix: Option<String>,
    pub remote_timeout_ms: u64,
    pub remote_connect_timeout_ms: u64,
    pub remote_prefix_scan: bool,
    pub invalidation: InvalidationStrategy,
    pub sweep_max_page: u32,
    pub sweep_max_page_size: u32,
    pub singleton_sliding_secs: u64,
    pub singleton_absolute_secs: u64,
    pub list_sliding_secs: u64,
    pub list_absolute_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    /// Admin account ensured at startup when both are set
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let postgres = PostgresConfig::default();

        Self {
            backend: StorageType::InMemory,
            database_url: None,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let cache = CacheConfig::default();
        let expiry = ExpiryPolicy::default();
        let secs = |d: Option<Duration>| d.map_or(0, |d| d.as_secs());

        Self {
            max_capacity: cache.max_capacity,
            local_ttl_cap_secs: cache.local_cap.as_secs(),
            promotion_ttl_secs: cache.promotion_ttl.as_secs(),
            remote_url: None,
            remote_key_prefix: None,
            remote_timeout_ms: cache.remote_timeout.as_millis() as u64,
            remote_connect_timeout_ms: cache.connection_timeout.as_millis() as u64,
            remote_prefix_scan: cache.allow_prefix_scan,
            invalidation: cache.invalidation,
            sweep_max_page: cache.sweep_bounds.max_page,
            sweep_max_page_size: cache.sweep_bounds.max_page_size,
            singleton_sliding_secs: secs(expiry.singleton.sliding),
            singleton_absolute_secs: secs(expiry.singleton.absolute),
            list_sliding_secs: secs(expiry.list.sliding),
            list_absolute_secs: secs(expiry.list.absolute),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        let jwt = JwtConfig::default();

        Self {
            jwt_secret: jwt.secret,
            jwt_expiration_hours: jwt.expiration_hours,
            admin_username: None,
            admin_password: None,
        }
    }
}

/// Zero disables that expiry
fn entry_options(sliding_secs: u64, absolute_secs: u64) -> CacheEntryOptions {
    let mut options = CacheEntryOptions::new();

    if sliding_secs > 0 {
        options = options.with_sliding(Duration::from_secs(sliding_secs));
    }
    if absolute_secs > 0 {
        options = options.with_absolute(Duration::from_secs(absolute_secs));
    }

    options
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn logging_config(&self) -> logging::LoggingConfig {
        logging::LoggingConfig {
            level: self.logging.level.clone(),
            format: self.logging.format,
        }
    }

    /// Falls back to `DATABASE_URL` when no URL is configured
    pub fn storage_config(&self) -> StorageConfig {
        match self.storage.backend {
            StorageType::InMemory => StorageConfig::in_memory(),
            StorageType::Postgres => {
                let url = self
                    .storage
                    .database_url
                    .clone()
                    .or_else(|| std::env::var("DATABASE_URL").ok())
                    .unwrap_or_else(|| PostgresConfig::default().url);

                StorageConfig::postgres(
                    PostgresConfig::new(url)
                        .with_max_connections(self.storage.max_connections)
                        .with_min_connections(self.storage.min_connections),
                )
            }
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        let settings = &self.cache;

        CacheConfig {
            max_capacity: settings.max_capacity,
            local_cap: Duration::from_secs(settings.local_ttl_cap_secs),
            promotion_ttl: Duration::from_secs(settings.promotion_ttl_secs),
            remote_url: settings.remote_url.clone().filter(|url| !url.is_empty()),
            key_prefix: settings.remote_key_prefix.clone(),
            remote_timeout: Duration::from_millis(settings.remote_timeout_ms),
            connection_timeout: Duration::from_millis(settings.remote_connect_timeout_ms),
            allow_prefix_scan: settings.remote_prefix_scan,
            invalidation: settings.invalidation,
            sweep_bounds: SweepBounds {
                max_page: settings.sweep_max_page,
                max_page_size: settings.sweep_max_page_size,
            },
            expiry: ExpiryPolicy {
                singleton: entry_options(
                    settings.singleton_sliding_secs,
                    settings.singleton_absolute_secs,
                ),
                list: entry_options(settings.list_sliding_secs, settings.list_absolute_secs),
            },
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.auth.jwt_secret.clone(), self.auth.jwt_expiration_hours)
    }

    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.auth.admin_username, &self.auth.admin_password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username.as_str(), password.as_str()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cache_layer_defaults() {
        let config = AppConfig::default();
        let cache = config.cache_config();
        let defaults = CacheConfig::default();

        assert_eq!(cache.local_cap, defaults.local_cap);
        assert_eq!(cache.promotion_ttl, defaults.promotion_ttl);
        assert_eq!(cache.remote_timeout, defaults.remote_timeout);
        assert_eq!(cache.expiry, ExpiryPolicy::default());
        assert_eq!(cache.invalidation, InvalidationStrategy::Registry);
        assert!(cache.remote_url.is_none());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "server": { "port": 9000 },
            "cache": { "invalidation": "sweep", "remote_url": "", "list_absolute_secs": 0 },
            "storage": { "backend": "postgres", "database_url": "postgres://db/inv" }
        }))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");

        let cache = config.cache_config();
        assert_eq!(cache.invalidation, InvalidationStrategy::Sweep);
        assert!(cache.remote_url.is_none());
        assert_eq!(cache.expiry.list.absolute, None);
        assert!(cache.expiry.list.sliding.is_some());

        match config.storage_config() {
            StorageConfig::Postgres(pg) => assert_eq!(pg.url, "postgres://db/inv"),
            other => panic!("unexpected storage config: {:?}", other),
        }
    }

    #[test]
    fn test_bootstrap_admin_requires_both_fields() {
        let mut config = AppConfig::default();
        assert!(config.bootstrap_admin().is_none());

        config.auth.admin_username = Some("root".to_string());
        assert!(config.bootstrap_admin().is_none());

        config.auth.admin_password = Some("secret".to_string());
        assert_eq!(config.bootstrap_admin(), Some(("root", "secret")));
    }
}
