//! SeaORM entity definitions.

pub mod user;
pub mod user_profile;

pub use user::Entity as UserEntity;
pub use user_profile::Entity as UserProfileEntity;
