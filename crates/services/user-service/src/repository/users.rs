//! Queries on the users table.

use sea_orm::{ActiveModelTrait, EntityTrait, NotSet, Set};
use uuid::Uuid;

use common::AppResult;
use domain::User;

use super::entities::user::{ActiveModel, Entity as UserEntity};
use crate::infra::DbSession;

/// Values for a new user row
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Generated when absent
    pub id: Option<Uuid>,
}

/// Insert a user and return the persisted row.
pub async fn create(session: &mut DbSession, new_user: NewUser) -> AppResult<User> {
    // Timestamps come from the column defaults
    let active_model = ActiveModel {
        id: Set(new_user.id.unwrap_or_else(Uuid::new_v4)),
        created_at: NotSet,
        updated_at: NotSet,
    };

    let model = active_model.insert(session.connection().await?).await?;
    Ok(User::from(model))
}

/// Find a user by ID.
pub async fn find_by_id(session: &mut DbSession, id: Uuid) -> AppResult<Option<User>> {
    let result = UserEntity::find_by_id(id)
        .one(session.connection().await?)
        .await?;

    Ok(result.map(User::from))
}
