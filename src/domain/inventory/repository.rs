//! Inventory repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{InventoryItem, InventoryItemSummary, NewInventoryItem};
use crate::domain::pagination::PageRequest;
use crate::domain::DomainError;

/// Backing-store access for inventory items
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Loads the full entity for write paths
    async fn find(&self, id: i64) -> Result<Option<InventoryItem>, DomainError>;

    /// Read projection of one item, optionally with its order
    async fn summary(
        &self,
        id: i64,
        with_order: bool,
    ) -> Result<Option<InventoryItemSummary>, DomainError>;

    /// One page of item projections ordered by id, plus the total item count
    async fn page(
        &self,
        page: PageRequest,
        with_order: bool,
    ) -> Result<(Vec<InventoryItemSummary>, u64), DomainError>;

    /// Inserts a new item; fails with `NotFound` if `order_id` references no order
    async fn create(&self, item: NewInventoryItem) -> Result<InventoryItem, DomainError>;

    /// Persists every field of an existing item, including `order_id`
    async fn update(&self, item: &InventoryItem) -> Result<InventoryItem, DomainError>;

    /// Sets an item's `order_id` to `order_id` only while it still equals
    /// `expected`
    ///
    /// Returns false, changing nothing, when another write moved the item
    /// first. Fails with `NotFound` for a missing item or target order.
    async fn set_order_if(
        &self,
        item_id: i64,
        expected: Option<i64>,
        order_id: Option<i64>,
    ) -> Result<bool, DomainError>;

    /// Deletes an item, returning it as it was before deletion
    async fn delete(&self, id: i64) -> Result<Option<InventoryItem>, DomainError>;
}
