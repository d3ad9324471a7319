//! Cache domain - key derivation, store abstraction and typed payloads

mod invalidation;
mod key;
mod payload;
mod store;

pub use invalidation::InvalidationPolicy;
pub use key::{
    CacheOperation, DefaultKeyPolicy, KeyPolicy, ParamValue, ResourceQuery, ResourceType,
    PARAM_ID, PARAM_PAGE, PARAM_PAGE_SIZE,
};
pub use payload::{Cacheable, CachedPayload};
pub use store::{CacheEntryOptions, CacheStore, ExpiryPolicy, PrefixRemoval};

#[cfg(test)]
pub use store::mock::MockCacheStore;
