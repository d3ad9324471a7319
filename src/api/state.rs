//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::services::{InventoryService, OrderService};
use crate::infrastructure::user::UserService;

/// Application state shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub user_service: Arc<UserService>,
    pub jwt_service: Arc<dyn JwtGenerator>,
    /// Whether a remote cache tier is connected, reported by `/ready`
    pub remote_cache: bool,
}

impl AppState {
    pub fn new(
        orders: OrderService,
        inventory: InventoryService,
        user_service: UserService,
        jwt_service: Arc<dyn JwtGenerator>,
    ) -> Self {
        Self {
            orders: Arc::new(orders),
            inventory: Arc::new(inventory),
            user_service: Arc::new(user_service),
            jwt_service,
            remote_cache: false,
        }
    }

    pub fn with_remote_cache(mut self, connected: bool) -> Self {
        self.remote_cache = connected;
        self
    }
}
