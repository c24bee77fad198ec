//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! Types here are shared by the service crates and the HTTP layer.

pub mod constants;
pub mod error;
pub mod user;

pub use constants::*;
pub use error::DomainError;
pub use user::{CreatedUser, User, UserLanguage, UserProfile};
