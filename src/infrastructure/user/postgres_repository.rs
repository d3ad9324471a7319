//! PostgreSQL user repository

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::user::{Role, User, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::map_db_error;

const USER_COLUMNS: &str = "id, username, password_hash, roles, created_at, last_login_at";

#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn roles_to_strings(roles: &BTreeSet<Role>) -> Vec<String> {
    roles.iter().map(Role::to_string).collect()
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Failed to read user row: {}", e));

    let roles: Vec<String> = row.try_get("roles").map_err(read)?;
    let roles = roles
        .iter()
        .map(|r| r.parse::<Role>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| DomainError::storage(format!("Invalid role in users table: {}", e)))?;

    Ok(User::from_parts(
        row.try_get("id").map_err(read)?,
        row.try_get("username").map_err(read)?,
        row.try_get("password_hash").map_err(read)?,
        roles,
        row.try_get("created_at").map_err(read)?,
        row.try_get("last_login_at").map_err(read)?,
    ))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get user", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(username) = LOWER($1)",
            USER_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get user by username", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let existing = self.get_by_username(user.username()).await?;
        if existing.is_some() {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                user.username()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, roles, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id())
        .bind(user.username())
        .bind(user.password_hash())
        .bind(roles_to_strings(user.roles()))
        .bind(user.created_at())
        .bind(user.last_login_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to create user", e))?;

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, roles = $3, last_login_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user.id())
        .bind(user.password_hash())
        .bind(roles_to_strings(user.roles()))
        .bind(user.last_login_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to update user", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("User '{}' not found", user.id())));
        }

        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_to_strings_sorted() {
        let roles = BTreeSet::from([Role::User, Role::Admin]);
        assert_eq!(roles_to_strings(&roles), vec!["Admin", "User"]);
    }
}
