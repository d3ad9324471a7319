//! Storage factory for runtime backing-store selection

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::inventory::InventoryRepository;
use crate::domain::order::OrderRepository;
use crate::domain::user::UserRepository;
use crate::domain::DomainError;
use crate::infrastructure::user::{InMemoryUserRepository, PostgresUserRepository};

use super::in_memory::InMemoryDatabase;
use super::migrations::run_storage_migrations;
use super::postgres::{PostgresConfig, PostgresDatabase};

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    #[default]
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Repositories sharing one backing store
#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

/// Factory for creating the backing store
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates the repositories; PostgreSQL storage is migrated on startup
    pub async fn create(config: &StorageConfig) -> Result<Repositories, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory storage");
                Ok(Self::create_in_memory())
            }
            StorageConfig::Postgres(pg_config) => {
                let database = PostgresDatabase::connect(pg_config).await?;
                run_storage_migrations(database.pool()).await?;
                info!("Using PostgreSQL storage");

                let users = PostgresUserRepository::new(database.pool().clone());
                let database = Arc::new(database);

                Ok(Repositories {
                    orders: database.clone(),
                    inventory: database,
                    users: Arc::new(users),
                })
            }
        }
    }

    /// In-memory repositories
    pub fn create_in_memory() -> Repositories {
        let database = Arc::new(InMemoryDatabase::new());

        Repositories {
            orders: database.clone(),
            inventory: database,
            users: Arc::new(InMemoryUserRepository::new()),
        }
    }
}
