//! User handlers.

use std::borrow::Cow;

use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use common::AppResult;
use domain::{CreatedUser, UserLanguage, SUPPORTED_LANGUAGES};

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;

/// User creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    /// Preferred language code, English when omitted
    #[serde(default = "default_language")]
    #[validate(custom(function = "validate_language"))]
    #[schema(example = "UZ", default = "EN")]
    pub language: String,
}

fn default_language() -> String {
    UserLanguage::default().code().to_string()
}

fn validate_language(language: &str) -> Result<(), ValidationError> {
    if SUPPORTED_LANGUAGES.contains(&language) {
        return Ok(());
    }
    Err(ValidationError::new("language").with_message(Cow::Owned(format!(
        "language must be one of {}",
        SUPPORTED_LANGUAGES.join(", ")
    ))))
}

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/create", post(create_user))
}

/// Create a user with a profile
#[utoipa::path(
    post,
    path = "/create",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = CreatedUser),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<Json<CreatedUser>> {
    let language: UserLanguage = payload.language.parse()?;
    let user = state.user_service.create_user(language).await?;

    Ok(Json(user))
}
