//! Cache-aside reads shared by the entity services

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::cache::{Cacheable, ResourceQuery, ResourceType};
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheLayer;

/// Whether a read was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read result tagged with its cache status
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Hit,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Miss,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }
}

/// Per-resource count of invalidations issued by this process
#[derive(Debug, Default)]
struct WriteGenerations {
    order: AtomicU64,
    inventory_item: AtomicU64,
}

impl WriteGenerations {
    fn counter(&self, resource_type: ResourceType) -> &AtomicU64 {
        match resource_type {
            ResourceType::Order => &self.order,
            ResourceType::InventoryItem => &self.inventory_item,
        }
    }

    fn current(&self, resource_type: ResourceType) -> u64 {
        self.counter(resource_type).load(Ordering::SeqCst)
    }

    fn bump(&self, resource_type: ResourceType) {
        self.counter(resource_type).fetch_add(1, Ordering::SeqCst);
    }
}

/// Cache-aside executor over a `CacheLayer`
///
/// Cache faults never fail a read: an unavailable tier is a miss, an
/// undecodable entry is removed and treated as a miss, and a failed write-back
/// only loses the cached copy.
#[derive(Debug, Clone)]
pub struct ReadThrough {
    cache: CacheLayer,
    generations: Arc<WriteGenerations>,
}

impl ReadThrough {
    pub fn new(cache: CacheLayer) -> Self {
        Self {
            cache,
            generations: Arc::new(WriteGenerations::default()),
        }
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    /// Serves `query` from the cache, or from `load` on a miss
    ///
    /// `load` returning `None` (entity not found) is passed through and
    /// nothing is cached.
    pub async fn fetch<T, F, Fut>(
        &self,
        query: ResourceQuery,
        load: F,
    ) -> Result<Option<Cached<T>>, DomainError>
    where
        T: Cacheable + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, DomainError>>,
    {
        let key = self.cache.key_policy.derive_key(&query);

        if let Some(value) = self.lookup::<T>(&key).await {
            debug!(key = %key, "Cache hit");
            return Ok(Some(Cached::hit(value)));
        }

        debug!(key = %key, "Cache miss");
        let generation = self.generations.current(query.resource_type());
        let Some(value) = load().await? else {
            return Ok(None);
        };

        self.populate(&query, &key, value.clone()).await;

        // A write invalidated this resource while `load` ran, so the value may
        // predate it. Entries set and tracked before the bump are removed by
        // that write; this catches the ones set after.
        if self.generations.current(query.resource_type()) != generation {
            debug!(key = %key, "Write raced the load, dropping cached copy");
            if let Err(e) = self.cache.store.remove(&key).await {
                debug!(key = %key, error = %e, "Failed to drop raced cache entry");
            }
        }

        Ok(Some(Cached::miss(value)))
    }

    /// Invalidates every `(resource, id)` pair in order
    ///
    /// Other processes sharing the remote tier have no view of the write
    /// generation; a read they load before this write and store after it
    /// stays until its expiry.
    pub async fn invalidate(&self, targets: &[(ResourceType, Option<i64>)]) {
        for (resource_type, id) in targets {
            self.generations.bump(*resource_type);
            self.cache.invalidation.on_write(*resource_type, *id).await;
        }
    }

    async fn lookup<T: Cacheable>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match T::decode(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                if let Err(e) = self.cache.store.remove(key).await {
                    debug!(key = %key, error = %e, "Failed to remove undecodable cache entry");
                }
                None
            }
        }
    }

    async fn populate<T: Cacheable>(&self, query: &ResourceQuery, key: &str, value: T) {
        let raw = match value.into_payload().encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode value for cache");
                return;
            }
        };

        let options = self.cache.expiry.for_operation(query.operation());

        match self.cache.store.set(key, &raw, options).await {
            Ok(()) => self.cache.invalidation.track(query, key).await,
            Err(e) => debug!(key = %key, error = %e, "Cache write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;

    use crate::domain::cache::{CacheOperation, CacheStore, MockCacheStore};
    use crate::domain::order::OrderSummary;
    use crate::domain::pagination::{Page, PageRequest};
    use crate::infrastructure::cache::{CacheConfig, CacheLayer};

    fn layer(store: Arc<MockCacheStore>) -> CacheLayer {
        CacheLayer::from_store(store, &CacheConfig::default())
    }

    fn order(id: i64) -> OrderSummary {
        OrderSummary {
            id,
            customer_name: Some("Ada".to_string()),
            date_placed: Utc::now(),
            items_count: 0,
            items: None,
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(MockCacheStore::new());
        let read_through = ReadThrough::new(layer(store.clone()));
        let loads = AtomicUsize::new(0);
        let query = ResourceQuery::by_id(ResourceType::Order, 1, false);

        for expected in [CacheStatus::Miss, CacheStatus::Hit] {
            let result = read_through
                .fetch(query.clone(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(order(1)))
                })
                .await
                .unwrap()
                .unwrap();

            assert_eq!(result.status, expected);
            assert_eq!(result.value.id, 1);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(store.contains("Order:1"));
    }

    #[tokio::test]
    async fn test_uses_expiry_for_operation() {
        let store = Arc::new(MockCacheStore::new());
        let layer = layer(store.clone());
        let expiry = layer.expiry;
        let read_through = ReadThrough::new(layer);

        read_through
            .fetch(ResourceQuery::by_id(ResourceType::Order, 1, false), || async {
                Ok(Some(order(1)))
            })
            .await
            .unwrap();

        let page = PageRequest::default();
        read_through
            .fetch(ResourceQuery::list(ResourceType::Order, page, false), || async {
                Ok(Some(Page::new(vec![order(1)], page, 1)))
            })
            .await
            .unwrap();

        assert_eq!(
            store.options_for("Order:1"),
            Some(expiry.for_operation(CacheOperation::GetById))
        );
        assert_eq!(
            store.options_for("Order:List:page=1&pageSize=10&withItems=false"),
            Some(expiry.for_operation(CacheOperation::List))
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = Arc::new(MockCacheStore::new());
        let read_through = ReadThrough::new(layer(store.clone()));

        let result = read_through
            .fetch::<OrderSummary, _, _>(
                ResourceQuery::by_id(ResourceType::Order, 9, false),
                || async { Ok(None) },
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_removed_and_reloaded() {
        let store = Arc::new(MockCacheStore::new().with_entry("Order:1", "{garbage"));
        let read_through = ReadThrough::new(layer(store.clone()));

        let result = read_through
            .fetch(ResourceQuery::by_id(ResourceType::Order, 1, false), || async {
                Ok(Some(order(1)))
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.status, CacheStatus::Miss);
        let raw = store.get("Order:1").await.unwrap().unwrap();
        assert!(<OrderSummary as Cacheable>::decode(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let store = Arc::new(MockCacheStore::new());
        let page = PageRequest::default();
        let wrong = Page::new(vec![order(1)], page, 1).into_payload().encode().unwrap();
        store.set("Order:1", &wrong, Default::default()).await.unwrap();

        let read_through = ReadThrough::new(layer(store));
        let result = read_through
            .fetch(ResourceQuery::by_id(ResourceType::Order, 1, false), || async {
                Ok(Some(order(1)))
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.status, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_failing_cache_degrades_to_store() {
        let store = Arc::new(MockCacheStore::new());
        store.set_failing(true);
        let read_through = ReadThrough::new(layer(store));

        for _ in 0..2 {
            let result = read_through
                .fetch(ResourceQuery::by_id(ResourceType::Order, 1, false), || async {
                    Ok(Some(order(1)))
                })
                .await
                .unwrap()
                .unwrap();
            assert_eq!(result.status, CacheStatus::Miss);
        }
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let read_through = ReadThrough::new(layer(Arc::new(MockCacheStore::new())));

        let result = read_through
            .fetch::<OrderSummary, _, _>(
                ResourceQuery::by_id(ResourceType::Order, 1, false),
                || async { Err(DomainError::storage("db down")) },
            )
            .await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_write_during_load_is_not_cached() {
        let store = Arc::new(MockCacheStore::new());
        let read_through = ReadThrough::new(layer(store.clone()));
        let page = PageRequest::default();
        let query = ResourceQuery::list(ResourceType::Order, page, false);

        let result = read_through
            .fetch(query.clone(), || async {
                // Commit and invalidate land after the store snapshot was taken
                read_through.invalidate(&[(ResourceType::Order, Some(1))]).await;
                Ok(Some(Page::new(vec![order(1)], page, 1)))
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.status, CacheStatus::Miss);
        assert!(!store.contains("Order:List:page=1&pageSize=10&withItems=false"));

        // A later read with no racing write caches normally
        read_through
            .fetch(query, || async { Ok(Some(Page::new(vec![order(1)], page, 1))) })
            .await
            .unwrap();
        assert!(store.contains("Order:List:page=1&pageSize=10&withItems=false"));
    }

    #[tokio::test]
    async fn test_write_to_other_resource_does_not_drop_entry() {
        let store = Arc::new(MockCacheStore::new());
        let read_through = ReadThrough::new(layer(store.clone()));

        read_through
            .fetch(ResourceQuery::by_id(ResourceType::Order, 1, false), || async {
                read_through
                    .invalidate(&[(ResourceType::InventoryItem, Some(7))])
                    .await;
                Ok(Some(order(1)))
            })
            .await
            .unwrap();

        assert!(store.contains("Order:1"));
    }
}
