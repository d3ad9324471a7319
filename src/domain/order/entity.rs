//! Order aggregate and its read projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::inventory::{InventoryItem, InventoryItemSummary};

/// A customer order owning a set of item associations
///
/// The order owns the associations, not the items: deleting an order releases
/// its items instead of deleting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: i64,
    customer_name: Option<String>,
    date_placed: DateTime<Utc>,
    items: Vec<InventoryItem>,
}

impl Order {
    pub fn new(id: i64, customer_name: Option<String>, date_placed: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_name,
            date_placed,
            items: Vec::new(),
        }
    }

    /// Attaches already-loaded items (backing-store hydration)
    pub fn with_items(mut self, items: Vec<InventoryItem>) -> Self {
        self.items = items;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn date_placed(&self) -> DateTime<Utc> {
        self.date_placed
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn contains_item(&self, item_id: i64) -> bool {
        self.items.iter().any(|i| i.id() == item_id)
    }

    pub fn set_customer_name(&mut self, customer_name: Option<String>) {
        self.customer_name = customer_name;
    }

    pub fn set_date_placed(&mut self, date_placed: DateTime<Utc>) {
        self.date_placed = date_placed;
    }

    /// Associates an item with this order
    ///
    /// Returns false without mutating anything when the item belongs to a
    /// different order or its id is already in this order's item set.
    pub fn add_item(&mut self, item: &mut InventoryItem) -> bool {
        if matches!(item.order_id(), Some(owner) if owner != self.id) {
            return false;
        }

        if self.contains_item(item.id()) {
            return false;
        }

        item.set_order_id(Some(self.id));
        self.items.push(item.clone());
        true
    }

    /// Detaches an item, returning it with its order cleared
    pub fn remove_item(&mut self, item_id: i64) -> Option<InventoryItem> {
        let index = self.items.iter().position(|i| i.id() == item_id)?;
        let mut item = self.items.remove(index);
        item.set_order_id(None);
        Some(item)
    }

    pub fn to_summary(&self, with_items: bool) -> OrderSummary {
        OrderSummary {
            id: self.id,
            customer_name: self.customer_name.clone(),
            date_placed: self.date_placed,
            items_count: self.items.len() as u64,
            items: with_items.then(|| self.items.iter().map(|i| i.to_summary(None)).collect()),
        }
    }
}

/// Fields for an order that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: Option<String>,
    pub date_placed: DateTime<Utc>,
}

/// Read projection of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    pub customer_name: Option<String>,
    pub date_placed: DateTime<Utc>,
    pub items_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InventoryItemSummary>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, order_id: Option<i64>) -> InventoryItem {
        InventoryItem::new(id, Some(format!("item-{}", id)), 1, None, order_id).unwrap()
    }

    #[test]
    fn test_add_unassigned_item() {
        let mut order = Order::new(1, Some("Ada".into()), Utc::now());
        let mut unassigned = item(10, None);

        assert!(order.add_item(&mut unassigned));
        assert_eq!(unassigned.order_id(), Some(1));
        assert!(order.contains_item(10));
        assert_eq!(order.to_summary(false).items_count, 1);
    }

    #[test]
    fn test_add_item_owned_by_other_order_is_refused() {
        let mut order = Order::new(1, None, Utc::now());
        let mut foreign = item(10, Some(2));

        assert!(!order.add_item(&mut foreign));
        assert_eq!(foreign.order_id(), Some(2));
        assert!(order.items().is_empty());
    }

    #[test]
    fn test_add_duplicate_item_is_refused() {
        let mut order = Order::new(1, None, Utc::now());
        let mut first = item(10, None);
        assert!(order.add_item(&mut first));

        let mut again = item(10, Some(1));
        assert!(!order.add_item(&mut again));
        assert_eq!(order.items().len(), 1);
    }

    #[test]
    fn test_remove_item_clears_order_id() {
        let mut order = Order::new(1, None, Utc::now());
        let mut it = item(10, None);
        order.add_item(&mut it);

        let removed = order.remove_item(10).unwrap();
        assert_eq!(removed.order_id(), None);
        assert!(order.remove_item(10).is_none());
    }

    #[test]
    fn test_summary_items_only_when_requested() {
        let order = Order::new(1, None, Utc::now()).with_items(vec![item(1, Some(1))]);

        assert!(order.to_summary(false).items.is_none());
        assert_eq!(order.to_summary(true).items.map(|i| i.len()), Some(1));
        assert_eq!(order.to_summary(false).items_count, 1);
    }
}
