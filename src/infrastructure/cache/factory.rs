//! Cache factory: assembles the tiers, key policy and invalidation strategy

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::cache::{
    CacheStore, DefaultKeyPolicy, ExpiryPolicy, InvalidationPolicy, KeyPolicy,
};
use crate::domain::DomainError;

use super::hybrid::{HybridCache, HybridCacheConfig};
use super::in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
use super::invalidation::{
    RegistryInvalidation, SweepBounds, SweepInvalidation, DEFAULT_REGISTRY_TTL,
};
use super::redis::{RedisCacheConfig, RedisCacheStore};

/// How list keys are found on invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationStrategy {
    /// Remove the list keys recorded on population
    #[default]
    Registry,
    /// Enumerate a bounded parameter space
    Sweep,
}

impl std::fmt::Display for InvalidationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationStrategy::Registry => write!(f, "registry"),
            InvalidationStrategy::Sweep => write!(f, "sweep"),
        }
    }
}

impl std::str::FromStr for InvalidationStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registry" => Ok(InvalidationStrategy::Registry),
            "sweep" => Ok(InvalidationStrategy::Sweep),
            _ => Err(DomainError::configuration(format!(
                "Unknown invalidation strategy: {}. Valid strategies: registry, sweep",
                s
            ))),
        }
    }
}

/// Configuration for the cache layer
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries held by the local tier
    pub max_capacity: u64,
    /// Upper bound on any local expiry
    pub local_cap: Duration,
    /// Local TTL for entries promoted from the remote tier
    pub promotion_ttl: Duration,
    /// Remote tier URL; no remote tier when unset
    pub remote_url: Option<String>,
    /// Key prefix for namespacing in the remote tier
    pub key_prefix: Option<String>,
    /// Bound on each remote command
    pub remote_timeout: Duration,
    /// Bound on connecting to the remote tier
    pub connection_timeout: Duration,
    /// Whether the remote tier may SCAN for prefix removal
    pub allow_prefix_scan: bool,
    pub invalidation: InvalidationStrategy,
    pub sweep_bounds: SweepBounds,
    pub expiry: ExpiryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            local_cap: Duration::from_secs(60),
            promotion_ttl: Duration::from_secs(30),
            remote_url: None,
            key_prefix: None,
            remote_timeout: Duration::from_millis(250),
            connection_timeout: Duration::from_secs(2),
            allow_prefix_scan: false,
            invalidation: InvalidationStrategy::default(),
            sweep_bounds: SweepBounds::default(),
            expiry: ExpiryPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Local tier only
    pub fn local() -> Self {
        Self::default()
    }

    /// Local tier backed by a Redis tier
    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_invalidation(mut self, strategy: InvalidationStrategy) -> Self {
        self.invalidation = strategy;
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Lifetime of the list key registry sets
    ///
    /// Covers the absolute list expiry. Lists with sliding expiry only can be
    /// kept alive past it by reads and then leave the cache by eviction.
    pub fn registry_ttl(&self) -> Duration {
        let list = self.expiry.list;
        list.absolute
            .unwrap_or(DEFAULT_REGISTRY_TTL)
            .max(list.sliding.unwrap_or_default())
    }

    fn hybrid_config(&self) -> HybridCacheConfig {
        HybridCacheConfig {
            local_cap: self.local_cap,
            promotion_ttl: self.promotion_ttl,
        }
    }

    fn redis_config(&self, url: &str) -> RedisCacheConfig {
        let config = RedisCacheConfig::new(url)
            .with_default_ttl(self.expiry.list.initial_ttl().unwrap_or(self.local_cap))
            .with_connection_timeout(self.connection_timeout)
            .with_operation_timeout(self.remote_timeout)
            .with_prefix_scan(self.allow_prefix_scan);

        match &self.key_prefix {
            Some(prefix) => config.with_key_prefix(prefix.clone()),
            None => config,
        }
    }
}

/// Everything the read-through handlers need from the cache layer
#[derive(Debug, Clone)]
pub struct CacheLayer {
    pub store: Arc<dyn CacheStore>,
    pub key_policy: Arc<dyn KeyPolicy>,
    pub invalidation: Arc<dyn InvalidationPolicy>,
    pub expiry: ExpiryPolicy,
    /// Whether the store includes a connected remote tier
    pub remote_tier: bool,
}

impl CacheLayer {
    /// Wires the policies around an already built store
    pub fn from_store(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        let key_policy: Arc<dyn KeyPolicy> = Arc::new(DefaultKeyPolicy::new());

        let invalidation: Arc<dyn InvalidationPolicy> = match config.invalidation {
            InvalidationStrategy::Registry => {
                Arc::new(
                    RegistryInvalidation::new(store.clone(), key_policy.clone())
                        .with_registry_ttl(config.registry_ttl()),
                )
            }
            InvalidationStrategy::Sweep => Arc::new(SweepInvalidation::new(
                store.clone(),
                key_policy.clone(),
                config.sweep_bounds,
            )),
        };

        Self {
            store,
            key_policy,
            invalidation,
            expiry: config.expiry,
            remote_tier: false,
        }
    }
}

/// Factory for creating the cache layer
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the cache layer
    ///
    /// An unreachable remote tier is not an error: the layer runs local-only.
    pub async fn create(&self, config: &CacheConfig) -> Result<CacheLayer, DomainError> {
        let local: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::with_config(
            InMemoryCacheConfig::default()
                .with_max_capacity(config.max_capacity)
                .with_default_ttl(config.local_cap),
        ));

        let remote = match &config.remote_url {
            Some(url) => self.connect_remote(config, url).await?,
            None => {
                warn!("No remote cache configured, running with local cache only");
                None
            }
        };

        info!(
            remote = remote.is_some(),
            invalidation = %config.invalidation,
            "Cache layer initialized"
        );

        let remote_tier = remote.is_some();
        let store: Arc<dyn CacheStore> =
            Arc::new(HybridCache::new(local, remote, config.hybrid_config()));

        Ok(CacheLayer {
            remote_tier,
            ..CacheLayer::from_store(store, config)
        })
    }

    /// Local tier only, regardless of `remote_url`
    pub fn create_local(&self, config: &CacheConfig) -> CacheLayer {
        let local: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::with_config(
            InMemoryCacheConfig::default()
                .with_max_capacity(config.max_capacity)
                .with_default_ttl(config.local_cap),
        ));

        let store: Arc<dyn CacheStore> =
            Arc::new(HybridCache::local_only(local, config.hybrid_config()));

        CacheLayer::from_store(store, config)
    }

    async fn connect_remote(
        &self,
        config: &CacheConfig,
        url: &str,
    ) -> Result<Option<Arc<dyn CacheStore>>, DomainError> {
        match RedisCacheStore::connect(config.redis_config(url)).await {
            Ok(store) => {
                info!(url = %url, "Connected to remote cache");
                Ok(Some(Arc::new(store)))
            }
            Err(e) if e.is_cache_fault() => {
                warn!(error = %e, "Remote cache unreachable, running with local cache only");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheEntryOptions, ResourceQuery, ResourceType};

    #[test]
    fn test_invalidation_strategy_from_str() {
        assert_eq!(
            "registry".parse::<InvalidationStrategy>().unwrap(),
            InvalidationStrategy::Registry
        );
        assert_eq!(
            "SWEEP".parse::<InvalidationStrategy>().unwrap(),
            InvalidationStrategy::Sweep
        );
        assert!("invalid".parse::<InvalidationStrategy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();

        assert!(config.remote_url.is_none());
        assert_eq!(config.invalidation, InvalidationStrategy::Registry);
        assert_eq!(config.remote_timeout, Duration::from_millis(250));
        assert!(!config.allow_prefix_scan);
    }

    #[test]
    fn test_registry_ttl_covers_list_lifetime() {
        let config = CacheConfig::default();
        assert_eq!(config.registry_ttl(), Duration::from_secs(30 * 60));

        let sliding_only = CacheConfig::default().with_expiry(ExpiryPolicy {
            list: CacheEntryOptions::new().with_sliding(Duration::from_secs(45 * 60)),
            ..ExpiryPolicy::default()
        });
        assert_eq!(sliding_only.registry_ttl(), Duration::from_secs(45 * 60));
    }

    #[tokio::test]
    async fn test_create_local_only() {
        let layer = CacheFactory::new().create(&CacheConfig::local()).await.unwrap();

        let key = layer
            .key_policy
            .derive_key(&ResourceQuery::by_id(ResourceType::Order, 1, false));
        layer
            .store
            .set(&key, "payload", layer.expiry.singleton)
            .await
            .unwrap();

        assert_eq!(layer.store.get(&key).await.unwrap(), Some("payload".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back_to_local() {
        let mut config = CacheConfig::local().with_remote("redis://127.0.0.1:1");
        config.connection_timeout = Duration::from_millis(200);

        let layer = CacheFactory::new().create(&config).await.unwrap();

        layer
            .store
            .set("Order:1", "payload", layer.expiry.singleton)
            .await
            .unwrap();
        assert!(layer.store.get("Order:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_remote_url_is_configuration_error() {
        let config = CacheConfig::local().with_remote("not a url");

        let result = CacheFactory::new().create(&config).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
