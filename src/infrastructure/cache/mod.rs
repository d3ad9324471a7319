//! Cache infrastructure - tiers, invalidation strategies and factory

mod factory;
mod hybrid;
mod in_memory;
mod invalidation;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheLayer, InvalidationStrategy};
pub use hybrid::{HybridCache, HybridCacheConfig};
pub use in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
pub use invalidation::{RegistryInvalidation, SweepBounds, SweepInvalidation};
pub use redis::{RedisCacheConfig, RedisCacheStore};
