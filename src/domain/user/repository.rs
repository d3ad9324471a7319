//! User repository trait

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::User;
use crate::domain::DomainError;

/// Repository trait for user storage
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError>;

    /// Lookup for login
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;

    /// Inserts a user; `Conflict` if the username is taken
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Persists roles and login timestamp
    async fn update(&self, user: &User) -> Result<User, DomainError>;
}
