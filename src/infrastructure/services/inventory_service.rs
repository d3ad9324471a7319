//! Inventory service: cached reads and invalidating writes

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::read_through::{Cached, ReadThrough};
use crate::domain::cache::{ResourceQuery, ResourceType};
use crate::domain::inventory::{
    validate_quantity, InventoryItemSummary, InventoryRepository, NewInventoryItem,
};
use crate::domain::pagination::{Page, PageRequest};
use crate::domain::DomainError;

#[derive(Debug, Clone, Default)]
pub struct CreateInventoryItemRequest {
    pub name: Option<String>,
    pub quantity: i32,
    pub location: Option<String>,
    pub order_id: Option<i64>,
}

/// Full replacement of an item's fields, including its order assignment
#[derive(Debug, Clone, Default)]
pub struct UpdateInventoryItemRequest {
    pub name: Option<String>,
    pub quantity: i32,
    pub location: Option<String>,
    pub order_id: Option<i64>,
}

#[derive(Clone)]
pub struct InventoryService {
    inventory: Arc<dyn InventoryRepository>,
    read_through: ReadThrough,
}

impl fmt::Debug for InventoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryService")
            .field("read_through", &self.read_through)
            .finish_non_exhaustive()
    }
}

impl InventoryService {
    pub fn new(inventory: Arc<dyn InventoryRepository>, read_through: ReadThrough) -> Self {
        Self {
            inventory,
            read_through,
        }
    }

    pub async fn list(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
        with_order: bool,
    ) -> Result<Cached<Page<InventoryItemSummary>>, DomainError> {
        let page = PageRequest::new(page, page_size)?;
        let query = ResourceQuery::list(ResourceType::InventoryItem, page, with_order);

        let cached = self
            .read_through
            .fetch(query, || async {
                let (items, total) = self.inventory.page(page, with_order).await?;
                Ok(Some(Page::new(items, page, total)))
            })
            .await?;

        cached.ok_or_else(|| DomainError::internal("Inventory page loader returned nothing"))
    }

    pub async fn get(
        &self,
        id: i64,
        with_order: bool,
    ) -> Result<Cached<InventoryItemSummary>, DomainError> {
        let query = ResourceQuery::by_id(ResourceType::InventoryItem, id, with_order);

        self.read_through
            .fetch(query, || self.inventory.summary(id, with_order))
            .await?
            .ok_or_else(|| item_not_found(id))
    }

    pub async fn create(
        &self,
        request: CreateInventoryItemRequest,
    ) -> Result<InventoryItemSummary, DomainError> {
        let new_item = NewInventoryItem {
            name: request.name,
            quantity: request.quantity,
            location: request.location,
            order_id: request.order_id,
        };
        new_item.validate()?;

        let item = self.inventory.create(new_item).await?;

        info!(item_id = item.id(), order_id = ?item.order_id(), "Created inventory item");

        let mut targets = vec![(ResourceType::InventoryItem, Some(item.id()))];
        if let Some(order_id) = item.order_id() {
            targets.push((ResourceType::Order, Some(order_id)));
        }
        self.read_through.invalidate(&targets).await;

        Ok(item.to_summary(None))
    }

    pub async fn update(
        &self,
        id: i64,
        request: UpdateInventoryItemRequest,
    ) -> Result<InventoryItemSummary, DomainError> {
        validate_quantity(request.quantity)?;

        let mut item = self
            .inventory
            .find(id)
            .await?
            .ok_or_else(|| item_not_found(id))?;
        let previous_order = item.order_id();

        item.set_name(request.name);
        item.set_quantity(request.quantity)?;
        item.set_location(request.location);
        item.set_order_id(request.order_id);

        let item = self.inventory.update(&item).await?;

        info!(item_id = id, order_id = ?item.order_id(), "Updated inventory item");

        // Both orders' item counts or embedded items may have changed
        let mut targets = vec![(ResourceType::InventoryItem, Some(id))];
        targets.extend(affected_orders(previous_order, item.order_id()));
        self.read_through.invalidate(&targets).await;

        Ok(item.to_summary(None))
    }

    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let item = self
            .inventory
            .delete(id)
            .await?
            .ok_or_else(|| item_not_found(id))?;

        info!(item_id = id, "Deleted inventory item");

        let mut targets = vec![(ResourceType::InventoryItem, Some(id))];
        targets.extend(affected_orders(item.order_id(), None));
        self.read_through.invalidate(&targets).await;

        Ok(())
    }
}

fn affected_orders(
    previous: Option<i64>,
    current: Option<i64>,
) -> Vec<(ResourceType, Option<i64>)> {
    let mut orders: Vec<i64> = previous.into_iter().chain(current).collect();
    orders.dedup();

    orders
        .into_iter()
        .map(|id| (ResourceType::Order, Some(id)))
        .collect()
}

fn item_not_found(id: i64) -> DomainError {
    DomainError::not_found(format!("Inventory item {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheStore, MockCacheStore};
    use crate::domain::inventory::MockInventoryRepository;
    use crate::domain::order::{NewOrder, OrderRepository};
    use crate::infrastructure::cache::{
        CacheConfig, CacheLayer, InMemoryCacheStore, InvalidationStrategy,
    };
    use crate::infrastructure::services::CacheStatus;
    use crate::infrastructure::storage::InMemoryDatabase;
    use chrono::Utc;

    struct Fixture {
        service: InventoryService,
        db: Arc<InMemoryDatabase>,
        cache: Arc<InMemoryCacheStore>,
    }

    fn fixture_with(config: CacheConfig) -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = Arc::new(InMemoryCacheStore::new());
        let layer = CacheLayer::from_store(cache.clone(), &config);

        Fixture {
            service: InventoryService::new(db.clone(), ReadThrough::new(layer)),
            db,
            cache,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CacheConfig::default())
    }

    async fn create_order(db: &InMemoryDatabase) -> i64 {
        OrderRepository::create(
            db,
            NewOrder {
                customer_name: Some("Ada".to_string()),
                date_placed: Utc::now(),
            },
        )
        .await
        .unwrap()
        .id()
    }

    fn request(name: &str, order_id: Option<i64>) -> CreateInventoryItemRequest {
        CreateInventoryItemRequest {
            name: Some(name.to_string()),
            quantity: 5,
            location: Some("B2".to_string()),
            order_id,
        }
    }

    #[tokio::test]
    async fn test_list_is_cached_until_create() {
        let f = fixture();
        f.service.create(request("bolt", None)).await.unwrap();

        assert_eq!(
            f.service.list(None, None, false).await.unwrap().status,
            CacheStatus::Miss
        );
        assert_eq!(
            f.service.list(None, None, false).await.unwrap().status,
            CacheStatus::Hit
        );

        f.service.create(request("nut", None)).await.unwrap();

        let page = f.service.list(None, None, false).await.unwrap();
        assert_eq!(page.status, CacheStatus::Miss);
        assert_eq!(page.value.total_items, 2);
    }

    #[tokio::test]
    async fn test_sweep_strategy_invalidates_lists() {
        let f = fixture_with(CacheConfig::default().with_invalidation(InvalidationStrategy::Sweep));
        f.service.create(request("bolt", None)).await.unwrap();

        f.service.list(Some(2), Some(5), true).await.unwrap();
        assert!(f.service.list(Some(2), Some(5), true).await.unwrap().is_hit());

        f.service.create(request("nut", None)).await.unwrap();
        assert!(!f.service.list(Some(2), Some(5), true).await.unwrap().is_hit());
    }

    #[tokio::test]
    async fn test_get_with_order_embeds_reference() {
        let f = fixture();
        let order_id = create_order(&f.db).await;
        let item = f.service.create(request("bolt", Some(order_id))).await.unwrap();

        let plain = f.service.get(item.id, false).await.unwrap();
        assert!(plain.value.order.is_none());
        assert_eq!(plain.value.order_id, Some(order_id));

        let expanded = f.service.get(item.id, true).await.unwrap();
        let reference = expanded.value.order.unwrap();
        assert_eq!(reference.id, order_id);
        assert_eq!(reference.customer_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_create_with_missing_order() {
        let f = fixture();

        let result = f.service.create(request("bolt", Some(99))).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected() {
        let f = fixture();
        let mut bad = request("bolt", None);
        bad.quantity = -1;

        let result = f.service.create(bad).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_update_moving_order_invalidates_both_orders() {
        let f = fixture();
        let first = create_order(&f.db).await;
        let second = create_order(&f.db).await;
        let item = f.service.create(request("bolt", Some(first))).await.unwrap();

        for order_id in [first, second] {
            f.cache
                .set(&format!("Order:{}", order_id), "stale", Default::default())
                .await
                .unwrap();
        }

        let updated = f
            .service
            .update(
                item.id,
                UpdateInventoryItemRequest {
                    name: Some("bolt".to_string()),
                    quantity: 7,
                    location: None,
                    order_id: Some(second),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.order_id, Some(second));
        assert_eq!(updated.quantity, 7);

        for order_id in [first, second] {
            let key = format!("Order:{}", order_id);
            assert!(f.cache.get(&key).await.unwrap().is_none(), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_item_write_keeps_unrelated_order_keys() {
        let f = fixture();
        let order_id = create_order(&f.db).await;
        let item = f.service.create(request("bolt", None)).await.unwrap();

        let order_key = format!("Order:{}", order_id);
        f.cache.set(&order_key, "cached", Default::default()).await.unwrap();

        f.service
            .update(
                item.id,
                UpdateInventoryItemRequest {
                    quantity: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(f.cache.get(&order_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_invalidates_owner() {
        let f = fixture();
        let order_id = create_order(&f.db).await;
        let item = f.service.create(request("bolt", Some(order_id))).await.unwrap();

        let order_key = format!("Order:{}:withItems", order_id);
        f.cache.set(&order_key, "stale", Default::default()).await.unwrap();

        f.service.delete(item.id).await.unwrap();

        assert!(f.cache.get(&order_key).await.unwrap().is_none());
        assert!(matches!(
            f.service.get(item.id, false).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            f.service.delete(item.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_pagination_touches_nothing() {
        let cache = Arc::new(MockCacheStore::new());
        let layer = CacheLayer::from_store(cache.clone(), &CacheConfig::default());
        let service =
            InventoryService::new(Arc::new(MockInventoryRepository::new()), ReadThrough::new(layer));

        let result = service.list(Some(1), Some(101), true).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(cache.calls(), 0);
    }

    #[test]
    fn test_affected_orders() {
        assert!(affected_orders(None, None).is_empty());
        assert_eq!(affected_orders(Some(1), Some(1)).len(), 1);
        assert_eq!(affected_orders(Some(1), Some(2)).len(), 2);
        assert_eq!(affected_orders(None, Some(3)), vec![(ResourceType::Order, Some(3))]);
    }
}
