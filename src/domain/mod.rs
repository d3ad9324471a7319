//! Domain layer - Core business logic and entities

pub mod cache;
pub mod error;
pub mod inventory;
pub mod order;
pub mod pagination;
pub mod user;

pub use cache::{
    CacheEntryOptions, CacheOperation, CacheStore, Cacheable, CachedPayload, DefaultKeyPolicy,
    InvalidationPolicy, KeyPolicy, PrefixRemoval, ResourceQuery, ResourceType,
};
pub use error::DomainError;
pub use inventory::{
    InventoryItem, InventoryItemSummary, InventoryRepository, NewInventoryItem, OrderReference,
};
pub use order::{NewOrder, Order, OrderRepository, OrderSummary};
pub use pagination::{Page, PageRequest};
pub use user::{Role, User, UserRepository};
