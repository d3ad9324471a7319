//! User service for registration, login and role management

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::user::{Role, User, UserRepository};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Credentials for a new account
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repository, hasher }
    }

    /// Registers a user holding the `User` role
    pub async fn register(&self, request: CreateUserRequest) -> Result<User, DomainError> {
        if self
            .repository
            .get_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                request.username
            )));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = self
            .repository
            .create(User::new(request.username, password_hash))
            .await?;

        info!(user_id = %user.id(), username = %user.username(), "Registered user");
        Ok(user)
    }

    /// Verifies credentials; `None` for an unknown user or a wrong password
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let Some(mut user) = self.repository.get_by_username(username).await? else {
            return Ok(None);
        };

        if !self.hasher.verify(password, user.password_hash()) {
            return Ok(None);
        }

        user.record_login();
        self.repository.update(&user).await.map(Some)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        self.repository.get(id).await
    }

    /// Grants a role; granting a role the user already holds is a no-op
    pub async fn assign_role(&self, username: &str, role: Role) -> Result<User, DomainError> {
        let mut user = self
            .repository
            .get_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", username)))?;

        if !user.grant(role) {
            return Ok(user);
        }

        info!(username = %user.username(), role = %role, "Assigned role");
        self.repository.update(&user).await
    }

    /// Creates the admin account if missing and makes sure it holds `Admin`
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<User, DomainError> {
        if self.repository.get_by_username(username).await?.is_none() {
            self.register(CreateUserRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        }

        self.assign_role(username, Role::Admin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::user::password::Argon2Hasher;
    use crate::infrastructure::user::repository::InMemoryUserRepository;

    fn service() -> UserService {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(Argon2Hasher::new()),
        )
    }

    fn request(username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let service = service();
        let user = service.register(request("alice", "password123")).await.unwrap();

        assert!(user.has_role(Role::User));
        assert_ne!(user.password_hash(), "password123");

        let authenticated = service
            .authenticate("alice", "password123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(authenticated.id(), user.id());
        assert!(authenticated.last_login_at().is_some());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_credentials() {
        let service = service();
        service.register(request("alice", "password123")).await.unwrap();

        assert!(service.authenticate("alice", "wrong").await.unwrap().is_none());
        assert!(service.authenticate("bob", "password123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_conflicts() {
        let service = service();
        service.register(request("alice", "password123")).await.unwrap();

        let result = service.register(request("alice", "password456")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent() {
        let service = service();
        service.register(request("alice", "password123")).await.unwrap();

        let user = service.assign_role("alice", Role::Admin).await.unwrap();
        assert!(user.has_role(Role::Admin));

        let again = service.assign_role("alice", Role::Admin).await.unwrap();
        assert_eq!(again.roles().len(), 2);
    }

    #[tokio::test]
    async fn test_assign_role_unknown_user() {
        let result = service().assign_role("ghost", Role::Admin).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_once() {
        let service = service();

        let first = service.ensure_admin("root", "password123").await.unwrap();
        let second = service.ensure_admin("root", "ignored-password").await.unwrap();

        assert!(first.has_role(Role::Admin));
        assert_eq!(first.id(), second.id());
    }
}
