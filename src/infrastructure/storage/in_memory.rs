//! In-memory backing store for orders and inventory items

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::inventory::{
    InventoryItem, InventoryItemSummary, InventoryRepository, NewInventoryItem, OrderReference,
};
use crate::domain::order::{NewOrder, Order, OrderRepository, OrderSummary};
use crate::domain::pagination::PageRequest;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct OrderRow {
    id: i64,
    customer_name: Option<String>,
    date_placed: DateTime<Utc>,
}

impl OrderRow {
    fn reference(&self) -> OrderReference {
        OrderReference {
            id: self.id,
            customer_name: self.customer_name.clone(),
            date_placed: self.date_placed,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<i64, OrderRow>,
    items: BTreeMap<i64, InventoryItem>,
    order_seq: i64,
    item_seq: i64,
}

impl Tables {
    fn items_of(&self, order_id: i64) -> impl Iterator<Item = &InventoryItem> {
        self.items
            .values()
            .filter(move |item| item.order_id() == Some(order_id))
    }

    fn load_order(&self, row: &OrderRow) -> Order {
        Order::new(row.id, row.customer_name.clone(), row.date_placed)
            .with_items(self.items_of(row.id).cloned().collect())
    }

    fn order_summary(&self, row: &OrderRow, with_items: bool) -> OrderSummary {
        let items: Vec<&InventoryItem> = self.items_of(row.id).collect();

        OrderSummary {
            id: row.id,
            customer_name: row.customer_name.clone(),
            date_placed: row.date_placed,
            items_count: items.len() as u64,
            items: with_items.then(|| items.iter().map(|i| i.to_summary(None)).collect()),
        }
    }

    fn item_summary(&self, item: &InventoryItem, with_order: bool) -> InventoryItemSummary {
        let order = with_order
            .then(|| item.order_id().and_then(|id| self.orders.get(&id)))
            .flatten()
            .map(OrderRow::reference);

        item.to_summary(order)
    }

    fn ensure_order_exists(&self, order_id: Option<i64>) -> Result<(), DomainError> {
        match order_id {
            Some(id) if !self.orders.contains_key(&id) => {
                Err(DomainError::not_found(format!("Order {} not found", id)))
            }
            _ => Ok(()),
        }
    }
}

/// Thread-safe in-memory backing store
///
/// Useful for testing and development. Data is lost when the process terminates.
/// Ids are assigned from per-table sequences starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DomainError> {
        self.tables
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DomainError> {
        self.tables
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

fn page_slice<T: Clone>(rows: impl Iterator<Item = T>, page: PageRequest) -> Vec<T> {
    rows.skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl OrderRepository for InMemoryDatabase {
    async fn find(&self, id: i64) -> Result<Option<Order>, DomainError> {
        let tables = self.read()?;
        Ok(tables.orders.get(&id).map(|row| tables.load_order(row)))
    }

    async fn summary(&self, id: i64, with_items: bool) -> Result<Option<OrderSummary>, DomainError> {
        let tables = self.read()?;
        Ok(tables
            .orders
            .get(&id)
            .map(|row| tables.order_summary(row, with_items)))
    }

    async fn page(
        &self,
        page: PageRequest,
        with_items: bool,
    ) -> Result<(Vec<OrderSummary>, u64), DomainError> {
        let tables = self.read()?;
        let rows = page_slice(tables.orders.values(), page);

        let summaries = rows
            .into_iter()
            .map(|row| tables.order_summary(row, with_items))
            .collect();

        Ok((summaries, tables.orders.len() as u64))
    }

    async fn create(&self, order: NewOrder) -> Result<Order, DomainError> {
        let mut tables = self.write()?;
        tables.order_seq += 1;

        let row = OrderRow {
            id: tables.order_seq,
            customer_name: order.customer_name,
            date_placed: order.date_placed,
        };
        let created = Order::new(row.id, row.customer_name.clone(), row.date_placed);
        tables.orders.insert(row.id, row);

        Ok(created)
    }

    async fn update(&self, order: &Order) -> Result<Order, DomainError> {
        let mut tables = self.write()?;

        let row = tables
            .orders
            .get_mut(&order.id())
            .ok_or_else(|| DomainError::not_found(format!("Order {} not found", order.id())))?;

        row.customer_name = order.customer_name().map(str::to_string);
        row.date_placed = order.date_placed();
        let row = row.clone();

        Ok(tables.load_order(&row))
    }

    async fn delete(&self, id: i64) -> Result<Option<Vec<i64>>, DomainError> {
        let mut tables = self.write()?;

        if tables.orders.remove(&id).is_none() {
            return Ok(None);
        }

        let mut released = Vec::new();
        for item in tables.items.values_mut() {
            if item.order_id() == Some(id) {
                item.set_order_id(None);
                released.push(item.id());
            }
        }

        Ok(Some(released))
    }
}

#[async_trait]
impl InventoryRepository for InMemoryDatabase {
    async fn find(&self, id: i64) -> Result<Option<InventoryItem>, DomainError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn summary(
        &self,
        id: i64,
        with_order: bool,
    ) -> Result<Option<InventoryItemSummary>, DomainError> {
        let tables = self.read()?;
        Ok(tables
            .items
            .get(&id)
            .map(|item| tables.item_summary(item, with_order)))
    }

    async fn page(
        &self,
        page: PageRequest,
        with_order: bool,
    ) -> Result<(Vec<InventoryItemSummary>, u64), DomainError> {
        let tables = self.read()?;
        let items = page_slice(tables.items.values(), page);

        let summaries = items
            .into_iter()
            .map(|item| tables.item_summary(item, with_order))
            .collect();

        Ok((summaries, tables.items.len() as u64))
    }

    async fn create(&self, item: NewInventoryItem) -> Result<InventoryItem, DomainError> {
        let mut tables = self.write()?;
        tables.ensure_order_exists(item.order_id)?;

        let id = tables.item_seq + 1;
        let created = item.into_item(id)?;
        tables.item_seq = id;
        tables.items.insert(id, created.clone());

        Ok(created)
    }

    async fn update(&self, item: &InventoryItem) -> Result<InventoryItem, DomainError> {
        let mut tables = self.write()?;
        tables.ensure_order_exists(item.order_id())?;

        let stored = tables.items.get_mut(&item.id()).ok_or_else(|| {
            DomainError::not_found(format!("Inventory item {} not found", item.id()))
        })?;
        *stored = item.clone();

        Ok(item.clone())
    }

    async fn set_order_if(
        &self,
        item_id: i64,
        expected: Option<i64>,
        order_id: Option<i64>,
    ) -> Result<bool, DomainError> {
        let mut tables = self.write()?;
        tables.ensure_order_exists(order_id)?;

        let item = tables.items.get_mut(&item_id).ok_or_else(|| {
            DomainError::not_found(format!("Inventory item {} not found", item_id))
        })?;

        if item.order_id() != expected {
            return Ok(false);
        }

        item.set_order_id(order_id);
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<Option<InventoryItem>, DomainError> {
        Ok(self.write()?.items.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(name: &str) -> NewOrder {
        NewOrder {
            customer_name: Some(name.to_string()),
            date_placed: Utc::now(),
        }
    }

    fn new_item(name: &str, order_id: Option<i64>) -> NewInventoryItem {
        NewInventoryItem {
            name: Some(name.to_string()),
            quantity: 3,
            location: Some("A1".to_string()),
            order_id,
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let db = InMemoryDatabase::new();

        let first = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        let second = OrderRepository::create(&db, new_order("Grace")).await.unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
    }

    #[tokio::test]
    async fn test_order_summary_counts_items() {
        let db = InMemoryDatabase::new();
        let order = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        InventoryRepository::create(&db, new_item("bolt", Some(order.id())))
            .await
            .unwrap();
        InventoryRepository::create(&db, new_item("nut", None)).await.unwrap();

        let summary = OrderRepository::summary(&db, order.id(), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.items_count, 1);
        assert!(summary.items.is_none());

        let expanded = OrderRepository::summary(&db, order.id(), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expanded.items.unwrap()[0].name.as_deref(), Some("bolt"));
    }

    #[tokio::test]
    async fn test_page_slices_and_counts() {
        let db = InMemoryDatabase::new();
        for i in 0..25 {
            OrderRepository::create(&db, new_order(&format!("customer-{}", i)))
                .await
                .unwrap();
        }

        let request = PageRequest::new(Some(3), Some(10)).unwrap();
        let (rows, total) = OrderRepository::page(&db, request, false).await.unwrap();

        assert_eq!(total, 25);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].id, 21);
    }

    #[tokio::test]
    async fn test_item_with_unknown_order_is_rejected() {
        let db = InMemoryDatabase::new();

        let result = InventoryRepository::create(&db, new_item("bolt", Some(42))).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_item_summary_with_order() {
        let db = InMemoryDatabase::new();
        let order = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        let item = InventoryRepository::create(&db, new_item("bolt", Some(order.id())))
            .await
            .unwrap();

        let summary = InventoryRepository::summary(&db, item.id(), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.order.unwrap().customer_name.as_deref(), Some("Ada"));

        let plain = InventoryRepository::summary(&db, item.id(), false)
            .await
            .unwrap()
            .unwrap();
        assert!(plain.order.is_none());
        assert_eq!(plain.order_id, Some(order.id()));
    }

    #[tokio::test]
    async fn test_delete_order_releases_items() {
        let db = InMemoryDatabase::new();
        let order = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        let item = InventoryRepository::create(&db, new_item("bolt", Some(order.id())))
            .await
            .unwrap();

        let released = OrderRepository::delete(&db, order.id()).await.unwrap();
        assert_eq!(released, Some(vec![item.id()]));

        let item = InventoryRepository::find(&db, item.id()).await.unwrap().unwrap();
        assert_eq!(item.order_id(), None);

        assert_eq!(OrderRepository::delete(&db, order.id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_order_loads_items() {
        let db = InMemoryDatabase::new();
        let order = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        let item = InventoryRepository::create(&db, new_item("bolt", Some(order.id())))
            .await
            .unwrap();

        let loaded = OrderRepository::find(&db, order.id()).await.unwrap().unwrap();
        assert!(loaded.contains_item(item.id()));
    }

    #[tokio::test]
    async fn test_set_order_if_only_moves_from_expected() {
        let db = InMemoryDatabase::new();
        let first = OrderRepository::create(&db, new_order("Ada")).await.unwrap();
        let second = OrderRepository::create(&db, new_order("Grace")).await.unwrap();
        let item = InventoryRepository::create(&db, new_item("bolt", None)).await.unwrap();

        assert!(db.set_order_if(item.id(), None, Some(first.id())).await.unwrap());
        // A second assignment that still believes the item is unassigned loses
        assert!(!db.set_order_if(item.id(), None, Some(second.id())).await.unwrap());

        let stored = InventoryRepository::find(&db, item.id()).await.unwrap().unwrap();
        assert_eq!(stored.order_id(), Some(first.id()));

        assert!(db.set_order_if(item.id(), Some(first.id()), None).await.unwrap());
        assert!(!db.set_order_if(item.id(), Some(first.id()), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_order_if_rejects_missing_targets() {
        let db = InMemoryDatabase::new();
        let item = InventoryRepository::create(&db, new_item("bolt", None)).await.unwrap();

        let missing_order = db.set_order_if(item.id(), None, Some(99)).await;
        assert!(matches!(missing_order, Err(DomainError::NotFound { .. })));

        let missing_item = db.set_order_if(42, None, None).await;
        assert!(matches!(missing_item, Err(DomainError::NotFound { .. })));
    }
}
