//! User domain
//!
//! Users authenticate with a password and carry roles that gate write access.

mod entity;
mod repository;

pub use entity::{Role, User};
pub use repository::UserRepository;
