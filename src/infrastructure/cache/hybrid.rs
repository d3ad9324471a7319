//! Two-tier cache: process-local first, shared remote second
//!
//! Lookups check the local tier first and fall back to the remote tier,
//! promoting remote hits into the local tier with a short fixed TTL. Writes go
//! to both tiers. The remote tier is an optimization only: its failures are
//! logged and read as misses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::cache::{CacheEntryOptions, CacheStore, PrefixRemoval};
use crate::domain::DomainError;

/// Tier settings
#[derive(Debug, Clone, Copy)]
pub struct HybridCacheConfig {
    /// Upper bound on any expiry written to the local tier
    pub local_cap: Duration,
    /// Local TTL for entries promoted from the remote tier
    pub promotion_ttl: Duration,
}

impl Default for HybridCacheConfig {
    fn default() -> Self {
        Self {
            local_cap: Duration::from_secs(60),
            promotion_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridCache {
    local: Arc<dyn CacheStore>,
    remote: Option<Arc<dyn CacheStore>>,
    config: HybridCacheConfig,
}

impl HybridCache {
    pub fn new(
        local: Arc<dyn CacheStore>,
        remote: Option<Arc<dyn CacheStore>>,
        config: HybridCacheConfig,
    ) -> Self {
        Self {
            local,
            remote,
            config,
        }
    }

    /// Local tier only
    pub fn local_only(local: Arc<dyn CacheStore>, config: HybridCacheConfig) -> Self {
        Self::new(local, None, config)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn config(&self) -> &HybridCacheConfig {
        &self.config
    }

    async fn promote(&self, key: &str, value: &str) {
        let options = CacheEntryOptions::new().with_absolute(self.config.promotion_ttl);

        if let Err(e) = self.local.set(key, value, options).await {
            warn!(key = %key, error = %e, "Failed to promote remote hit into local cache");
        }
    }
}

#[async_trait]
impl CacheStore for HybridCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.local.get(key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "hybrid cache: local hit");
                return Ok(Some(value));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Local cache read failed"),
        }

        let Some(remote) = &self.remote else {
            return Ok(None);
        };

        match remote.get(key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "hybrid cache: remote hit, promoting to local");
                self.promote(key, &value).await;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(key = %key, error = %e, "Remote cache read failed, treating as miss");
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: CacheEntryOptions,
    ) -> Result<(), DomainError> {
        let local_result = self
            .local
            .set(key, value, options.capped(self.config.local_cap))
            .await;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(key, value, options).await {
                warn!(key = %key, error = %e, "Remote cache write failed");
            }
        }

        local_result
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        let local_result = self.local.remove(key).await;

        let remote_result = match &self.remote {
            Some(remote) => remote.remove(key).await,
            None => Ok(()),
        };

        local_result.and(remote_result)
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<PrefixRemoval, DomainError> {
        let local = self.local.remove_by_prefix(prefix).await?;

        let Some(remote) = &self.remote else {
            return Ok(local);
        };

        let remote = match remote.remove_by_prefix(prefix).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Remote prefix removal failed");
                PrefixRemoval::Unsupported
            }
        };

        // Only report removal when no tier may still hold matching keys
        Ok(match (local, remote) {
            (PrefixRemoval::Removed(a), PrefixRemoval::Removed(b)) => PrefixRemoval::Removed(a + b),
            _ => PrefixRemoval::Unsupported,
        })
    }
    /// Registers `member` in both tiers
    ///
    /// If the remote set cannot record it, the remote copy of `member` is
    /// dropped so no remote entry outlives its registration.
    async fn add_to_set(
        &self,
        set_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let local_result = self.local.add_to_set(set_key, member, ttl).await;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.add_to_set(set_key, member, ttl).await {
                warn!(set = %set_key, key = %member, error = %e, "Remote key set update failed, dropping remote entry");
                if let Err(e) = remote.remove(member).await {
                    debug!(key = %member, error = %e, "Failed to drop unregistered remote entry");
                }
            }
        }

        local_result
    }

    /// Union of both tiers' sets; an unreachable remote contributes nothing
    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, DomainError> {
        let mut members = self.local.take_set(set_key).await?;

        if let Some(remote) = &self.remote {
            match remote.take_set(set_key).await {
                Ok(remote_members) => members.extend(remote_members),
                Err(e) => warn!(set = %set_key, error = %e, "Remote key set read failed"),
            }
        }

        members.sort();
        members.dedup();
        Ok(members)
    }
}
