//! Infrastructure services

mod inventory_service;
mod order_service;
mod read_through;

pub use inventory_service::{
    CreateInventoryItemRequest, InventoryService, UpdateInventoryItemRequest,
};
pub use order_service::{CreateOrderRequest, OrderService, UpdateOrderRequest};
pub use read_through::{CacheStatus, Cached, ReadThrough};
