//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::api::handlers::{health_handler, user_handler};
use domain::{CreatedUser, UserLanguage};

/// OpenAPI documentation for the user service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "User Service",
        version = "0.1.0",
        description = "User account management"
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        user_handler::create_user,
        health_handler::health_check,
    ),
    components(
        schemas(
            UserLanguage,
            CreatedUser,
            user_handler::CreateUserRequest,
            health_handler::HealthResponse,
            health_handler::ServiceStatus,
            health_handler::ServiceHealth,
        )
    ),
    tags(
        (name = "Users", description = "User management operations"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;
