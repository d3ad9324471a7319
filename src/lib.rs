//! Inventory Tracker
//!
//! JWT-authenticated REST backend for orders and inventory items with a
//! cache-aside read path:
//! - Local (moka) and remote (Redis) cache tiers composed into a hybrid cache
//! - Deterministic cache keys per resource query
//! - Registry or sweep invalidation on every write
//! - In-memory or PostgreSQL backing store

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use infrastructure::{
    auth::{JwtGenerator, JwtService},
    cache::CacheFactory,
    services::{InventoryService, OrderService, ReadThrough},
    storage::StorageFactory,
    user::{Argon2Hasher, UserService},
};
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage_config = config.storage_config();
    info!(backend = ?storage_config.storage_type(), "Initializing storage");
    let repositories = StorageFactory::create(&storage_config).await?;

    let cache = CacheFactory::new().create(&config.cache_config()).await?;
    let remote_cache = cache.remote_tier;
    let read_through = ReadThrough::new(cache);

    let user_service = UserService::new(repositories.users.clone(), Arc::new(Argon2Hasher::new()));

    if let Some((username, password)) = config.bootstrap_admin() {
        let admin = user_service.ensure_admin(username, password).await?;
        info!(username = %admin.username(), "Bootstrap admin ready");
    }

    let jwt_service: Arc<dyn JwtGenerator> = Arc::new(JwtService::new(config.jwt_config()));

    let state = AppState::new(
        OrderService::new(
            repositories.orders.clone(),
            repositories.inventory.clone(),
            read_through.clone(),
        ),
        InventoryService::new(repositories.inventory, read_through),
        user_service,
        jwt_service,
    )
    .with_remote_cache(remote_cache);

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_state_is_in_memory_and_local() {
        let state = create_app_state().await.unwrap();
        assert!(!state.remote_cache);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created() {
        let mut config = AppConfig::default();
        config.auth.admin_username = Some("root".to_string());
        config.auth.admin_password = Some("root-password".to_string());

        let state = create_app_state_with_config(&config).await.unwrap();
        let admin = state
            .user_service
            .authenticate("root", "root-password")
            .await
            .unwrap()
            .unwrap();

        assert!(admin.has_role(domain::Role::Admin));
    }
}
