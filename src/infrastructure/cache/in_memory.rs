//! In-memory cache store using moka

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::{CacheEntryOptions, CacheStore, PrefixRemoval};
use crate::domain::DomainError;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// TTL for entries written without any expiry
    pub default_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Value stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Arc<str>,
    sliding: Option<Duration>,
    /// Fixed at write time, never moved by reads
    absolute_deadline: Option<Instant>,
}

impl CacheEntry {
    fn new(data: &str, options: CacheEntryOptions, now: Instant) -> Self {
        Self {
            data: Arc::from(data),
            sliding: options.sliding,
            absolute_deadline: options.absolute.map(|a| now + a),
        }
    }

    /// Remaining lifetime as seen at `at`; the tighter of both windows
    fn ttl_at(&self, at: Instant, fallback: Duration) -> Duration {
        let absolute = self
            .absolute_deadline
            .map(|deadline| deadline.saturating_duration_since(at));

        match (self.sliding, absolute) {
            (Some(s), Some(a)) => s.min(a),
            (Some(s), None) => s,
            (None, Some(a)) => a,
            (None, None) => fallback,
        }
    }
}

/// Per-entry expiry: sliding windows re-arm on read, absolute deadlines do not
#[derive(Debug, Clone)]
struct EntryExpiry {
    default_ttl: Duration,
}

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl_at(created_at, self.default_ttl))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &CacheEntry,
        read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.sliding {
            Some(_) => Some(value.ttl_at(read_at, self.default_ttl)),
            None => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl_at(updated_at, self.default_ttl))
    }
}

/// Key set with a deadline that only moves forward
#[derive(Debug)]
struct KeySet {
    members: HashSet<String>,
    expires_at: Instant,
}

/// Process-local cache tier
///
/// Never touches the network; safe for concurrent use from any number of
/// requests. A read racing a write observes either the old or the new value.
#[derive(Debug, Clone)]
pub struct InMemoryCacheStore {
    cache: MokaCache<String, CacheEntry>,
    sets: Arc<Mutex<HashMap<String, KeySet>>>,
    config: InMemoryCacheConfig,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry {
                default_ttl: config.default_ttl,
            })
            .build();

        Self {
            cache,
            sets: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    fn sets(&self) -> MutexGuard<'_, HashMap<String, KeySet>> {
        match self.sets.lock() {
            Ok(sets) => sets,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data.to_string()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: CacheEntryOptions,
    ) -> Result<(), DomainError> {
        let entry = CacheEntry::new(value, options, Instant::now());
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<PrefixRemoval, DomainError> {
        let keys: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k)
            .collect();

        for key in &keys {
            self.cache.invalidate(key.as_str()).await;
        }

        Ok(PrefixRemoval::Removed(keys.len()))
    }

    async fn add_to_set(
        &self,
        set_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let now = Instant::now();
        let mut sets = self.sets();
        sets.retain(|_, set| set.expires_at > now);

        let set = sets.entry(set_key.to_string()).or_insert_with(|| KeySet {
            members: HashSet::new(),
            expires_at: now,
        });
        set.members.insert(member.to_string());
        set.expires_at = set.expires_at.max(now + ttl);

        Ok(())
    }

    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, DomainError> {
        let now = Instant::now();

        Ok(self
            .sets()
            .remove(set_key)
            .filter(|set| set.expires_at > now)
            .map(|set| set.members.into_iter().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryCacheStore::new();

        store
            .set("key1", "value1", CacheEntryOptions::new().with_absolute(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemoryCacheStore::new();
        let options = CacheEntryOptions::new().with_absolute(Duration::from_secs(60));

        store.set("key1", "old", options).await.unwrap();
        store.set("key1", "new", options).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = InMemoryCacheStore::new();

        store
            .set("key1", "value1", CacheEntryOptions::new().with_absolute(Duration::from_secs(60)))
            .await
            .unwrap();

        store.remove("key1").await.unwrap();
        store.remove("key1").await.unwrap();
        store.remove("never-set").await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_absolute_expiry_boundary() {
        let store = InMemoryCacheStore::new();

        store
            .set("key1", "value1", CacheEntryOptions::new().with_absolute(ms(200)))
            .await
            .unwrap();

        tokio::time::sleep(ms(100)).await;
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(ms(200)).await;
        assert!(store.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sliding_expiry_boundary_without_access() {
        let store = InMemoryCacheStore::new();

        store
            .set("key1", "value1", CacheEntryOptions::new().with_sliding(ms(200)))
            .await
            .unwrap();

        tokio::time::sleep(ms(100)).await;
        assert!(store.get("key1").await.unwrap().is_some());

        // 100ms was the last access; 300ms idle is past the window
        tokio::time::sleep(ms(300)).await;
        assert!(store.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sliding_expiry_resets_on_read() {
        let store = InMemoryCacheStore::new();

        store
            .set("key1", "value1", CacheEntryOptions::new().with_sliding(ms(300)))
            .await
            .unwrap();

        for _ in 0..4 {
            tokio::time::sleep(ms(150)).await;
            assert!(store.get("key1").await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_absolute_caps_sliding() {
        let store = InMemoryCacheStore::new();

        store
            .set(
                "key1",
                "value1",
                CacheEntryOptions::new().with_sliding(ms(300)).with_absolute(ms(400)),
            )
            .await
            .unwrap();

        tokio::time::sleep(ms(200)).await;
        assert!(store.get("key1").await.unwrap().is_some());

        // Still inside the sliding window, but past the absolute deadline
        tokio::time::sleep(ms(250)).await;
        assert!(store.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_without_expiry() {
        let store =
            InMemoryCacheStore::with_config(InMemoryCacheConfig::default().with_default_ttl(ms(100)));

        store.set("key1", "value1", CacheEntryOptions::new()).await.unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(ms(200)).await;
        assert!(store.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_by_prefix() {
        let store = InMemoryCacheStore::new();
        let options = CacheEntryOptions::new().with_absolute(Duration::from_secs(60));

        store.set("Order:List:page=1", "a", options).await.unwrap();
        store.set("Order:List:page=2", "b", options).await.unwrap();
        store.set("Order:1", "c", options).await.unwrap();

        let removed = store.remove_by_prefix("Order:List:").await.unwrap();
        assert_eq!(removed, PrefixRemoval::Removed(2));

        assert!(store.get("Order:List:page=1").await.unwrap().is_none());
        assert!(store.get("Order:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = Arc::new(InMemoryCacheStore::new());
        let options = CacheEntryOptions::new().with_absolute(Duration::from_secs(60));

        let mut handles = Vec::new();

        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let value = format!("value-{}", i);
                store.set("shared", &value, options).await.unwrap();
                let read = store.get("shared").await.unwrap().unwrap();
                assert!(read.starts_with("value-"));
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_take_set_drains_members() {
        let store = InMemoryCacheStore::new();
        let ttl = Duration::from_secs(60);

        store.add_to_set("Order:Registry", "a", ttl).await.unwrap();
        store.add_to_set("Order:Registry", "b", ttl).await.unwrap();
        store.add_to_set("Order:Registry", "a", ttl).await.unwrap();

        let mut members = store.take_set("Order:Registry").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);
        assert!(store.take_set("Order:Registry").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_set_expires() {
        let store = InMemoryCacheStore::new();

        store.add_to_set("Order:Registry", "a", ms(100)).await.unwrap();
        tokio::time::sleep(ms(200)).await;

        assert!(store.take_set("Order:Registry").await.unwrap().is_empty());
    }
}
