//! In-memory user repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<Uuid, User>,
    /// Lowercased username -> id
    by_username: HashMap<String, Uuid>,
}

/// In-memory implementation of `UserRepository`
///
/// Usernames are unique case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.table.read().await.users.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let table = self.table.read().await;

        Ok(table
            .by_username
            .get(&username.to_lowercase())
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut table = self.table.write().await;
        let key = user.username().to_lowercase();

        if table.by_username.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                user.username()
            )));
        }

        table.by_username.insert(key, user.id());
        table.users.insert(user.id(), user.clone());

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut table = self.table.write().await;

        let stored = table
            .users
            .get_mut(&user.id())
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", user.id())))?;
        *stored = user.clone();

        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(User::new("Alice", "hash")).await.unwrap();

        assert_eq!(repo.get(user.id()).await.unwrap().unwrap().username(), "Alice");
        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(User::new("alice", "hash")).await.unwrap();

        let result = repo.create(User::new("ALICE", "hash")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_persists_roles() {
        let repo = InMemoryUserRepository::new();
        let mut user = repo.create(User::new("alice", "hash")).await.unwrap();

        user.grant(Role::Admin);
        repo.update(&user).await.unwrap();

        let stored = repo.get(user.id()).await.unwrap().unwrap();
        assert!(stored.has_role(Role::Admin));
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let repo = InMemoryUserRepository::new();

        let result = repo.update(&User::new("ghost", "hash")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
