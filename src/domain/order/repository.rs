//! Order repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{NewOrder, Order, OrderSummary};
use crate::domain::pagination::PageRequest;
use crate::domain::DomainError;

/// Backing-store access for orders
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads the aggregate with its items for write paths
    async fn find(&self, id: i64) -> Result<Option<Order>, DomainError>;

    /// Read projection of one order, optionally with its items
    async fn summary(&self, id: i64, with_items: bool)
        -> Result<Option<OrderSummary>, DomainError>;

    /// One page of order projections ordered by id, plus the total order count
    async fn page(
        &self,
        page: PageRequest,
        with_items: bool,
    ) -> Result<(Vec<OrderSummary>, u64), DomainError>;

    async fn create(&self, order: NewOrder) -> Result<Order, DomainError>;

    /// Persists the scalar fields of an existing order
    async fn update(&self, order: &Order) -> Result<Order, DomainError>;

    /// Deletes an order and clears `order_id` on its items
    ///
    /// Returns the ids of the released items, or `None` if the order did not exist.
    async fn delete(&self, id: i64) -> Result<Option<Vec<i64>>, DomainError>;
}
