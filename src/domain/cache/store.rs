//! Cache store trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use super::key::CacheOperation;
use crate::domain::DomainError;

/// Expiry settings for a single entry
///
/// `sliding` resets on every read; `absolute` is measured from the moment the
/// entry is written and never moves. When both are set the tighter one wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntryOptions {
    pub sliding: Option<Duration>,
    pub absolute: Option<Duration>,
}

impl CacheEntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sliding(mut self, sliding: Duration) -> Self {
        self.sliding = Some(sliding);
        self
    }

    pub fn with_absolute(mut self, absolute: Duration) -> Self {
        self.absolute = Some(absolute);
        self
    }

    /// Time to live right after a write, if any expiry is set
    pub fn initial_ttl(&self) -> Option<Duration> {
        match (self.sliding, self.absolute) {
            (Some(s), Some(a)) => Some(s.min(a)),
            (s, a) => s.or(a),
        }
    }

    /// Bounds both expiries by `cap`; an entry without absolute expiry gets `cap`
    pub fn capped(&self, cap: Duration) -> Self {
        Self {
            sliding: self.sliding.map(|s| s.min(cap)),
            absolute: Some(self.absolute.map_or(cap, |a| a.min(cap))),
        }
    }
}

/// Expiry applied per read shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub singleton: CacheEntryOptions,
    pub list: CacheEntryOptions,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            singleton: CacheEntryOptions::new()
                .with_sliding(Duration::from_secs(10 * 60))
                .with_absolute(Duration::from_secs(2 * 60 * 60)),
            list: CacheEntryOptions::new()
                .with_sliding(Duration::from_secs(5 * 60))
                .with_absolute(Duration::from_secs(30 * 60)),
        }
    }
}

impl ExpiryPolicy {
    pub fn for_operation(&self, operation: CacheOperation) -> CacheEntryOptions {
        match operation {
            CacheOperation::List => self.list,
            CacheOperation::GetById => self.singleton,
        }
    }
}

/// Outcome of a prefix removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixRemoval {
    /// The store removed this many entries
    Removed(usize),
    /// The store cannot enumerate keys
    Unsupported,
}

/// Key/value store with per-entry expiry
///
/// Values are opaque strings; typed encoding lives in `CachedPayload`.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Gets a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Writes a value, overwriting any existing entry
    async fn set(&self, key: &str, value: &str, options: CacheEntryOptions)
        -> Result<(), DomainError>;

    /// Removes an entry; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<(), DomainError>;

    /// Best-effort removal of every key starting with `prefix`
    async fn remove_by_prefix(&self, prefix: &str) -> Result<PrefixRemoval, DomainError>;

    /// Adds `member` to the key set at `set_key`, keeping the set alive for
    /// at least `ttl` from now
    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration)
        -> Result<(), DomainError>;

    /// Reads and clears the key set at `set_key` in one step
    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock cache store for testing
    ///
    /// Expiry is recorded but not enforced. A failing store returns
    /// `CacheUnavailable` from every call, like an unreachable remote tier.
    #[derive(Debug, Default)]
    pub struct MockCacheStore {
        entries: Mutex<HashMap<String, (String, CacheEntryOptions)>>,
        sets: Mutex<HashMap<String, BTreeSet<String>>>,
        failing: AtomicBool,
        failing_sets: AtomicBool,
        supports_prefix: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockCacheStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entry(self, key: &str, value: &str) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), CacheEntryOptions::default()));
            self
        }

        pub fn with_prefix_support(self) -> Self {
            self.supports_prefix.store(true, Ordering::SeqCst);
            self
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Fails only the key set operations
        pub fn set_failing_sets(&self, failing: bool) {
            self.failing_sets.store(failing, Ordering::SeqCst);
        }

        fn check_sets(&self) -> Result<(), DomainError> {
            self.check()?;

            if self.failing_sets.load(Ordering::SeqCst) {
                return Err(DomainError::cache_unavailable("Mock key sets configured to fail"));
            }
            Ok(())
        }

        /// Total number of trait calls made against this store
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        pub fn options_for(&self, key: &str) -> Option<CacheEntryOptions> {
            self.entries.lock().unwrap().get(key).map(|(_, o)| *o)
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        /// Members of a key set, sorted
        pub fn set_members(&self, set_key: &str) -> Vec<String> {
            self.sets
                .lock()
                .unwrap()
                .get(set_key)
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default()
        }

        fn check(&self) -> Result<(), DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return Err(DomainError::cache_unavailable("Mock store configured to fail"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CacheStore for MockCacheStore {
        async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            options: CacheEntryOptions,
        ) -> Result<(), DomainError> {
            self.check()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), options));
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), DomainError> {
            self.check()?;
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn remove_by_prefix(&self, prefix: &str) -> Result<PrefixRemoval, DomainError> {
            self.check()?;

            if !self.supports_prefix.load(Ordering::SeqCst) {
                return Ok(PrefixRemoval::Unsupported);
            }

            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            Ok(PrefixRemoval::Removed(before - entries.len()))
        }

        async fn add_to_set(
            &self,
            set_key: &str,
            member: &str,
            _ttl: Duration,
        ) -> Result<(), DomainError> {
            self.check_sets()?;
            self.sets
                .lock()
                .unwrap()
                .entry(set_key.to_string())
                .or_default()
                .insert(member.to_string());
            Ok(())
        }

        async fn take_set(&self, set_key: &str) -> Result<Vec<String>, DomainError> {
            self.check_sets()?;
            Ok(self
                .sets
                .lock()
                .unwrap()
                .remove(set_key)
                .map(|members| members.into_iter().collect())
                .unwrap_or_default())
        }
    }
}
