//! User domain entity and related types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_PROFILE_ACTIVE, DEFAULT_PROFILE_DELETED, LANGUAGE_EN, LANGUAGE_RU, LANGUAGE_UZ,
};
use crate::error::DomainError;

/// Supported user languages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum UserLanguage {
    #[default]
    En,
    Uz,
    Ru,
}

impl UserLanguage {
    /// Language code as stored and serialized
    pub fn code(&self) -> &'static str {
        match self {
            UserLanguage::En => LANGUAGE_EN,
            UserLanguage::Uz => LANGUAGE_UZ,
            UserLanguage::Ru => LANGUAGE_RU,
        }
    }
}

impl FromStr for UserLanguage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            LANGUAGE_EN => Ok(UserLanguage::En),
            LANGUAGE_UZ => Ok(UserLanguage::Uz),
            LANGUAGE_RU => Ok(UserLanguage::Ru),
            other => Err(DomainError::unsupported_language(other)),
        }
    }
}

impl From<UserLanguage> for String {
    fn from(language: UserLanguage) -> Self {
        language.code().to_string()
    }
}

impl std::fmt::Display for UserLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile attached one-to-one to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub language: UserLanguage,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl UserProfile {
    /// Create a profile with default flags
    pub fn new(user_id: Uuid, language: UserLanguage) -> Self {
        Self {
            user_id,
            language,
            is_active: DEFAULT_PROFILE_ACTIVE,
            is_deleted: DEFAULT_PROFILE_DELETED,
        }
    }
}

/// Combined view of a freshly created user and its profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreatedUser {
    /// Unique user identifier
    pub id: Uuid,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Preferred language
    pub language: UserLanguage,
}

impl CreatedUser {
    /// Merge a user row with its profile row.
    ///
    /// Returns an error if the profile belongs to a different user.
    pub fn from_parts(user: User, profile: UserProfile) -> Result<Self, DomainError> {
        if profile.user_id != user.id {
            return Err(DomainError::internal(format!(
                "profile {} does not belong to user {}",
                profile.user_id, user.id
            )));
        }

        Ok(Self {
            id: user.id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            language: profile.language,
        })
    }
}
