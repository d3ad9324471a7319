//! Order service: cached reads and invalidating writes

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::read_through::{Cached, ReadThrough};
use crate::domain::cache::{ResourceQuery, ResourceType};
use crate::domain::inventory::InventoryRepository;
use crate::domain::order::{NewOrder, Order, OrderRepository, OrderSummary};
use crate::domain::pagination::{Page, PageRequest};
use crate::domain::DomainError;

/// Request to create an order
#[derive(Debug, Clone, Default)]
pub struct CreateOrderRequest {
    pub customer_name: Option<String>,
    /// Defaults to now
    pub date_placed: Option<DateTime<Utc>>,
}

/// Request to replace an order's fields
///
/// `customer_name` is replaced as given; `date_placed` is kept when omitted.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrderRequest {
    pub customer_name: Option<String>,
    pub date_placed: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryRepository>,
    read_through: ReadThrough,
}

impl fmt::Debug for OrderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderService")
            .field("read_through", &self.read_through)
            .finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryRepository>,
        read_through: ReadThrough,
    ) -> Self {
        Self {
            orders,
            inventory,
            read_through,
        }
    }

    pub async fn list(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
        with_items: bool,
    ) -> Result<Cached<Page<OrderSummary>>, DomainError> {
        let page = PageRequest::new(page, page_size)?;
        let query = ResourceQuery::list(ResourceType::Order, page, with_items);

        let cached = self
            .read_through
            .fetch(query, || async {
                let (orders, total) = self.orders.page(page, with_items).await?;
                Ok(Some(Page::new(orders, page, total)))
            })
            .await?;

        cached.ok_or_else(|| DomainError::internal("Order page loader returned nothing"))
    }

    pub async fn get(&self, id: i64, with_items: bool) -> Result<Cached<OrderSummary>, DomainError> {
        let query = ResourceQuery::by_id(ResourceType::Order, id, with_items);

        self.read_through
            .fetch(query, || self.orders.summary(id, with_items))
            .await?
            .ok_or_else(|| order_not_found(id))
    }

    pub async fn create(&self, request: CreateOrderRequest) -> Result<OrderSummary, DomainError> {
        let order = self
            .orders
            .create(NewOrder {
                customer_name: request.customer_name,
                date_placed: request.date_placed.unwrap_or_else(Utc::now),
            })
            .await?;

        info!(order_id = order.id(), "Created order");
        self.read_through
            .invalidate(&[(ResourceType::Order, Some(order.id()))])
            .await;

        Ok(order.to_summary(false))
    }

    pub async fn update(
        &self,
        id: i64,
        request: UpdateOrderRequest,
    ) -> Result<OrderSummary, DomainError> {
        let mut order = self.find(id).await?;

        order.set_customer_name(request.customer_name);
        if let Some(date_placed) = request.date_placed {
            order.set_date_placed(date_placed);
        }

        let updated = self.orders.update(&order).await?;

        info!(order_id = id, "Updated order");
        // Item projections embed the order reference
        self.read_through.invalidate(&order_and_items(&order)).await;

        Ok(updated.to_summary(false))
    }

    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let released = self
            .orders
            .delete(id)
            .await?
            .ok_or_else(|| order_not_found(id))?;

        info!(order_id = id, released = released.len(), "Deleted order");

        let mut targets = vec![(ResourceType::Order, Some(id))];
        targets.extend(
            released
                .into_iter()
                .map(|item_id| (ResourceType::InventoryItem, Some(item_id))),
        );
        self.read_through.invalidate(&targets).await;

        Ok(())
    }

    /// Assigns an unassigned item to the order
    ///
    /// Fails with `Conflict` when the item belongs to another order or is
    /// already part of this one.
    pub async fn add_item(&self, order_id: i64, item_id: i64) -> Result<OrderSummary, DomainError> {
        let mut order = self.find(order_id).await?;
        let mut item = self
            .inventory
            .find(item_id)
            .await?
            .ok_or_else(|| item_not_found(item_id))?;

        if !order.add_item(&mut item) {
            return Err(DomainError::conflict(match item.order_id() {
                Some(owner) if owner != order_id => {
                    format!("Inventory item {} belongs to order {}", item_id, owner)
                }
                _ => format!("Inventory item {} is already in order {}", item_id, order_id),
            }));
        }

        if !self
            .inventory
            .set_order_if(item_id, None, Some(order_id))
            .await?
        {
            return Err(DomainError::conflict(format!(
                "Inventory item {} was assigned to another order",
                item_id
            )));
        }

        info!(order_id, item_id, "Added item to order");
        self.read_through
            .invalidate(&[
                (ResourceType::Order, Some(order_id)),
                (ResourceType::InventoryItem, Some(item_id)),
            ])
            .await;

        Ok(order.to_summary(true))
    }

    pub async fn remove_item(
        &self,
        order_id: i64,
        item_id: i64,
    ) -> Result<OrderSummary, DomainError> {
        let mut order = self.find(order_id).await?;

        let not_in_order = || {
            DomainError::not_found(format!(
                "Inventory item {} is not in order {}",
                item_id, order_id
            ))
        };

        order.remove_item(item_id).ok_or_else(not_in_order)?;

        if !self
            .inventory
            .set_order_if(item_id, Some(order_id), None)
            .await?
        {
            return Err(not_in_order());
        }

        info!(order_id, item_id, "Removed item from order");
        self.read_through
            .invalidate(&[
                (ResourceType::Order, Some(order_id)),
                (ResourceType::InventoryItem, Some(item_id)),
            ])
            .await;

        Ok(order.to_summary(true))
    }

    async fn find(&self, id: i64) -> Result<Order, DomainError> {
        self.orders
            .find(id)
            .await?
            .ok_or_else(|| order_not_found(id))
    }
}

fn order_and_items(order: &Order) -> Vec<(ResourceType, Option<i64>)> {
    std::iter::once((ResourceType::Order, Some(order.id())))
        .chain(
            order
                .items()
                .iter()
                .map(|item| (ResourceType::InventoryItem, Some(item.id()))),
        )
        .collect()
}

fn order_not_found(id: i64) -> DomainError {
    DomainError::not_found(format!("Order {} not found", id))
}

fn item_not_found(id: i64) -> DomainError {
    DomainError::not_found(format!("Inventory item {} not found", id))
}
