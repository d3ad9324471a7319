//! Inventory domain

mod entity;
mod repository;

pub use entity::{
    validate_quantity, InventoryItem, InventoryItemSummary, NewInventoryItem, OrderReference,
};
pub use repository::InventoryRepository;

#[cfg(test)]
pub use repository::MockInventoryRepository;
