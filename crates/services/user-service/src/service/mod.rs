//! Service layer - flows and the service boundary used by handlers.

pub mod flows;
mod user_service;

pub use flows::CreateUserParams;
pub use user_service::{UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use user_service::MockUserService;
