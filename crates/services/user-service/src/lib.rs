//! User Service Library
//!
//! HTTP service for user accounts. Business flows run inside database
//! sessions handed out by [`infra::UnitOfWork`].

pub mod api;
pub mod config;
pub mod infra;
pub mod logging;
pub mod repository;
pub mod service;

use std::sync::Arc;

use tracing::info;

use common::{AppError, AppResult};

use crate::api::{create_router, AppState};
use crate::config::UserServiceConfig;
use crate::infra::{Database, SessionMaker, SessionOptions, UnitOfWork};
use crate::service::UserManager;

/// Wire services on top of an established database.
pub fn app_state(database: Arc<Database>, options: SessionOptions) -> AppState {
    let uow = UnitOfWork::new(SessionMaker::new(database.get_connection()), options);
    let user_service = Arc::new(UserManager::new(uow));
    AppState::new(user_service, database)
}

/// Run the HTTP server until Ctrl+C.
pub async fn run_server(config: UserServiceConfig) -> AppResult<()> {
    // Reject a bad session mode before opening any connection
    let options = SessionOptions::from_config(&config.database)?;

    let database = Arc::new(Database::connect(&config.database).await?);
    let app = create_router(app_state(database, options));

    let addr = config.service.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("User service listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    info!("User service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(config: UserServiceConfig, action: MigrateAction) -> AppResult<()> {
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}
