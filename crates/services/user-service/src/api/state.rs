//! Application state shared by all handlers.

use std::sync::Arc;

use crate::infra::Database;
use crate::service::UserService;

#[derive(Clone)]
pub struct AppState {
    /// User use cases
    pub user_service: Arc<dyn UserService>,
    /// Connection pool, used for health checks
    pub database: Arc<Database>,
}

impl AppState {
    pub fn new(user_service: Arc<dyn UserService>, database: Arc<Database>) -> Self {
        Self {
            user_service,
            database,
        }
    }
}
