//! Order domain

mod entity;
mod repository;

pub use entity::{NewOrder, Order, OrderSummary};
pub use repository::OrderRepository;

#[cfg(test)]
pub use repository::MockOrderRepository;
