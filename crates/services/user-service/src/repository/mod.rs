//! Repository layer for data access.
//!
//! Query functions take the caller's [`DbSession`](crate::infra::DbSession)
//! and never open, commit or roll it back.

pub mod entities;
pub mod user_profiles;
pub mod users;

pub use user_profiles::NewUserProfile;
pub use users::NewUser;
