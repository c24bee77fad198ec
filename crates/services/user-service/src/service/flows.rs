//! Business flows.
//!
//! A flow runs all of its writes on the session it is given and decides
//! itself when that work becomes durable.

use common::AppResult;
use domain::{CreatedUser, UserLanguage};

use crate::infra::{DbSession, Session};
use crate::repository::{user_profiles, users, NewUser, NewUserProfile};

/// Input of [`create_user`]
#[derive(Debug, Clone, Default)]
pub struct CreateUserParams {
    pub language: UserLanguage,
}

/// Create a user together with its profile and commit both at once.
///
/// If either insert fails nothing is committed and the error is returned.
pub async fn create_user(
    session: &mut DbSession,
    params: CreateUserParams,
) -> AppResult<CreatedUser> {
    let user = users::create(session, NewUser::default()).await?;
    let profile = user_profiles::create(
        session,
        NewUserProfile {
            user_id: user.id,
            language: params.language,
        },
    )
    .await?;

    let created = CreatedUser::from_parts(user, profile)?;
    session.commit().await?;

    tracing::debug!(user_id = %created.id, language = %created.language, "User created");
    Ok(created)
}
