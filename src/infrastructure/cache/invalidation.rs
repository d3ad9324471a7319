//! Invalidation strategies
//!
//! Both strategies remove the singleton keys of the affected entity. They
//! differ in how they find list keys:
//!
//! - [`RegistryInvalidation`] remembers every list key it saw populated
//! - [`SweepInvalidation`] enumerates a bounded page × page size × flag space

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::domain::cache::{
    CacheOperation, CacheStore, InvalidationPolicy, KeyPolicy, PrefixRemoval, ResourceQuery,
    ResourceType,
};
use crate::domain::pagination::PageRequest;

/// Concurrent removals issued per invalidation
const REMOVE_CONCURRENCY: usize = 16;

async fn remove_keys(cache: &dyn CacheStore, keys: Vec<String>) -> usize {
    stream::iter(keys)
        .map(|key| async move {
            match cache.remove(&key).await {
                Ok(()) => 0,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache removal failed during invalidation");
                    1
                }
            }
        })
        .buffer_unordered(REMOVE_CONCURRENCY)
        .fold(0usize, |failed, f| async move { failed + f })
        .await
}

fn singleton_keys(policy: &dyn KeyPolicy, resource_type: ResourceType, id: Option<i64>) -> Vec<String> {
    id.map(|id| policy.singleton_keys(resource_type, id).to_vec())
        .unwrap_or_default()
}

/// Default lifetime of a registry set; matches the longest list expiry
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(30 * 60);

/// Tracks live list keys per resource type in a key set held by the cache
///
/// With a remote tier the set lives there too, so keys populated by other
/// instances or before a restart are still found on invalidation. The set is
/// drained in one step and the removals run afterwards, so a concurrent read
/// may re-register a key while the write's removals are in flight.
#[derive(Debug)]
pub struct RegistryInvalidation {
    cache: Arc<dyn CacheStore>,
    key_policy: Arc<dyn KeyPolicy>,
    registry_ttl: Duration,
}

impl RegistryInvalidation {
    pub fn new(cache: Arc<dyn CacheStore>, key_policy: Arc<dyn KeyPolicy>) -> Self {
        Self {
            cache,
            key_policy,
            registry_ttl: DEFAULT_REGISTRY_TTL,
        }
    }

    /// Registry sets must outlive every list entry they point at
    pub fn with_registry_ttl(mut self, ttl: Duration) -> Self {
        self.registry_ttl = ttl;
        self
    }
}

#[async_trait]
impl InvalidationPolicy for RegistryInvalidation {
    async fn track(&self, query: &ResourceQuery, key: &str) {
        if query.operation() != CacheOperation::List {
            return;
        }

        let registry = self.key_policy.registry_key(query.resource_type());
        if let Err(e) = self.cache.add_to_set(&registry, key, self.registry_ttl).await {
            warn!(registry = %registry, key = %key, error = %e, "Failed to register list key, dropping entry");
            if let Err(e) = self.cache.remove(key).await {
                debug!(key = %key, error = %e, "Failed to drop unregistered list key");
            }
        }
    }

    async fn on_write(&self, resource_type: ResourceType, affected_id: Option<i64>) {
        let mut keys = singleton_keys(self.key_policy.as_ref(), resource_type, affected_id);

        let registry = self.key_policy.registry_key(resource_type);
        match self.cache.take_set(&registry).await {
            Ok(tracked) => keys.extend(tracked),
            Err(e) => warn!(registry = %registry, error = %e, "Failed to read list key registry"),
        }

        // Also catches entries written before the registry existed
        let prefix = self.key_policy.list_prefix(resource_type);
        match self.cache.remove_by_prefix(&prefix).await {
            Ok(PrefixRemoval::Removed(count)) => {
                debug!(prefix = %prefix, count, "Removed list keys by prefix");
            }
            Ok(PrefixRemoval::Unsupported) => {}
            Err(e) => warn!(prefix = %prefix, error = %e, "Prefix removal failed"),
        }

        let total = keys.len();
        let failed = remove_keys(self.cache.as_ref(), keys).await;

        debug!(
            resource = %resource_type,
            id = ?affected_id,
            removed = total - failed,
            failed,
            "Invalidated cache entries"
        );
    }
}

/// Bounds of the swept list parameter space
#[derive(Debug, Clone, Copy)]
pub struct SweepBounds {
    pub max_page: u32,
    pub max_page_size: u32,
}

impl Default for SweepBounds {
    fn default() -> Self {
        Self {
            max_page: 10,
            max_page_size: 100,
        }
    }
}

/// Removes every list key in a fixed parameter space
///
/// List pages beyond `max_page` are not swept and only leave the cache by
/// expiry.
#[derive(Debug)]
pub struct SweepInvalidation {
    cache: Arc<dyn CacheStore>,
    key_policy: Arc<dyn KeyPolicy>,
    bounds: SweepBounds,
}

impl SweepInvalidation {
    pub fn new(cache: Arc<dyn CacheStore>, key_policy: Arc<dyn KeyPolicy>, bounds: SweepBounds) -> Self {
        Self {
            cache,
            key_policy,
            bounds,
        }
    }

    /// Every list key the sweep covers for a resource type
    pub fn list_keys(&self, resource_type: ResourceType) -> Vec<String> {
        let mut keys = Vec::new();

        for page in 1..=self.bounds.max_page {
            for page_size in 1..=self.bounds.max_page_size {
                let Ok(request) = PageRequest::new(Some(page), Some(page_size)) else {
                    continue;
                };

                for include in [false, true] {
                    let query = ResourceQuery::list(resource_type, request, include);
                    keys.push(self.key_policy.derive_key(&query));
                }
            }
        }

        keys
    }
}

#[async_trait]
impl InvalidationPolicy for SweepInvalidation {
    async fn track(&self, _query: &ResourceQuery, _key: &str) {}

    async fn on_write(&self, resource_type: ResourceType, affected_id: Option<i64>) {
        let mut keys = singleton_keys(self.key_policy.as_ref(), resource_type, affected_id);
        keys.extend(self.list_keys(resource_type));

        let total = keys.len();
        let failed = remove_keys(self.cache.as_ref(), keys).await;

        debug!(
            resource = %resource_type,
            id = ?affected_id,
            swept = total,
            failed,
            "Swept cache entries"
        );
    }
}
