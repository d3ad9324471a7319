//! Invalidation policy trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::key::{ResourceQuery, ResourceType};

/// Decides which cache entries become stale after a write and removes them
///
/// Implementations prefer removing too much over leaving a stale entry
/// behind. `on_write` never fails; removal errors are logged and expiry
/// takes over.
#[async_trait]
pub trait InvalidationPolicy: Send + Sync + Debug {
    /// Records that `key` was populated for `query`
    async fn track(&self, query: &ResourceQuery, key: &str);

    /// Removes every entry a write to `resource_type` may have made stale
    async fn on_write(&self, resource_type: ResourceType, affected_id: Option<i64>);
}
