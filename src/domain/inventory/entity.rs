//! Inventory item entity and its read projections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A stock item, optionally assigned to one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: i64,
    name: Option<String>,
    quantity: i32,
    location: Option<String>,
    order_id: Option<i64>,
}

impl InventoryItem {
    pub fn new(
        id: i64,
        name: Option<String>,
        quantity: i32,
        location: Option<String>,
        order_id: Option<i64>,
    ) -> Result<Self, DomainError> {
        validate_quantity(quantity)?;

        Ok(Self {
            id,
            name,
            quantity,
            location,
            order_id,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn order_id(&self) -> Option<i64> {
        self.order_id
    }

    pub fn is_assigned(&self) -> bool {
        self.order_id.is_some()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_quantity(&mut self, quantity: i32) -> Result<(), DomainError> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    /// Sets or clears the owning order
    ///
    /// Relationship rules are enforced by `Order::add_item`; this is the raw
    /// foreign-key assignment used by the backing store and by order deletion.
    pub fn set_order_id(&mut self, order_id: Option<i64>) {
        self.order_id = order_id;
    }

    pub fn to_summary(&self, order: Option<OrderReference>) -> InventoryItemSummary {
        InventoryItemSummary {
            id: self.id,
            name: self.name.clone(),
            quantity: self.quantity,
            location: self.location.clone(),
            order_id: self.order_id,
            order: order.filter(|o| Some(o.id) == self.order_id),
        }
    }
}

/// Fields for an item that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventoryItem {
    pub name: Option<String>,
    pub quantity: i32,
    pub location: Option<String>,
    pub order_id: Option<i64>,
}

impl NewInventoryItem {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_quantity(self.quantity)
    }

    /// Materializes the item once the store has assigned an id
    pub fn into_item(self, id: i64) -> Result<InventoryItem, DomainError> {
        InventoryItem::new(id, self.name, self.quantity, self.location, self.order_id)
    }
}

pub fn validate_quantity(quantity: i32) -> Result<(), DomainError> {
    if quantity < 0 {
        return Err(DomainError::validation("quantity must be greater than or equal to 0"));
    }
    Ok(())
}

/// Minimal order fields embedded in an item projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReference {
    pub id: i64,
    pub customer_name: Option<String>,
    pub date_placed: DateTime<Utc>,
}

/// Read projection of an inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemSummary {
    pub id: i64,
    pub name: Option<String>,
    pub quantity: i32,
    pub location: Option<String>,
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderReference>,
}
