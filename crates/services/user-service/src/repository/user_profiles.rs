//! Queries on the user_profiles table.

use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use common::AppResult;
use domain::{UserLanguage, UserProfile};

use super::entities::user_profile::{ActiveModel, Entity as UserProfileEntity};
use crate::infra::DbSession;

/// Values for a new profile row
#[derive(Debug, Clone)]
pub struct NewUserProfile {
    pub user_id: Uuid,
    pub language: UserLanguage,
}

/// Insert a profile and return the persisted row.
pub async fn create(session: &mut DbSession, new_profile: NewUserProfile) -> AppResult<UserProfile> {
    let profile = UserProfile::new(new_profile.user_id, new_profile.language);
    let active_model = ActiveModel {
        user_id: Set(profile.user_id),
        language: Set(profile.language.into()),
        is_active: Set(profile.is_active),
        is_deleted: Set(profile.is_deleted),
    };

    let model = active_model.insert(session.connection().await?).await?;
    Ok(UserProfile::try_from(model)?)
}

/// Find the profile belonging to a user.
pub async fn find_by_user_id(
    session: &mut DbSession,
    user_id: Uuid,
) -> AppResult<Option<UserProfile>> {
    let result = UserProfileEntity::find_by_id(user_id)
        .one(session.connection().await?)
        .await?;

    Ok(result.map(UserProfile::try_from).transpose()?)
}
