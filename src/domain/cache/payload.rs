//! Typed cached payloads
//!
//! Every cached value is stored as a tagged JSON envelope so a value of the
//! wrong shape is detected on read instead of being returned as if valid.

use serde::{Deserialize, Serialize};

use crate::domain::inventory::InventoryItemSummary;
use crate::domain::order::OrderSummary;
use crate::domain::pagination::Page;
use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachedPayload {
    OrderPage(Page<OrderSummary>),
    Order(OrderSummary),
    InventoryPage(Page<InventoryItemSummary>),
    InventoryItem(InventoryItemSummary),
}

impl CachedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CachedPayload::OrderPage(_) => "order_page",
            CachedPayload::Order(_) => "order",
            CachedPayload::InventoryPage(_) => "inventory_page",
            CachedPayload::InventoryItem(_) => "inventory_item",
        }
    }

    pub fn encode(&self) -> Result<String, DomainError> {
        serde_json::to_string(self).map_err(|e| {
            DomainError::serialization(format!("Failed to serialize cache value: {}", e))
        })
    }

    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw).map_err(|e| {
            DomainError::serialization(format!("Failed to deserialize cache value: {}", e))
        })
    }
}

/// Read results that can round-trip through `CachedPayload`
pub trait Cacheable: Sized {
    fn into_payload(self) -> CachedPayload;

    /// Returns `None` when the payload holds a different shape
    fn from_payload(payload: CachedPayload) -> Option<Self>;

    fn decode(raw: &str) -> Result<Self, DomainError> {
        let payload = CachedPayload::decode(raw)?;
        let kind = payload.kind();

        Self::from_payload(payload).ok_or_else(|| {
            DomainError::serialization(format!("Unexpected cached payload kind '{}'", kind))
        })
    }
}

macro_rules! impl_cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_payload(self) -> CachedPayload {
                CachedPayload::$variant(self)
            }

            fn from_payload(payload: CachedPayload) -> Option<Self> {
                match payload {
                    CachedPayload::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_cacheable!(Page<OrderSummary>, OrderPage);
impl_cacheable!(OrderSummary, Order);
impl_cacheable!(Page<InventoryItemSummary>, InventoryPage);
impl_cacheable!(InventoryItemSummary, InventoryItem);
