//! User service - entry point for user use cases.

use async_trait::async_trait;

use common::AppResult;
use domain::{CreatedUser, UserLanguage};

use super::flows::{self, CreateUserParams};
use crate::infra::{SessionMaker, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user with a profile in the given language
    async fn create_user(&self, language: UserLanguage) -> AppResult<CreatedUser>;
}

/// Concrete implementation of UserService.
///
/// Every call runs its flow in a session owned by the unit of work.
pub struct UserManager {
    uow: UnitOfWork<SessionMaker>,
}

impl UserManager {
    pub fn new(uow: UnitOfWork<SessionMaker>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl UserService for UserManager {
    async fn create_user(&self, language: UserLanguage) -> AppResult<CreatedUser> {
        let params = CreateUserParams { language };
        self.uow
            .run(None, move |session| Box::pin(flows::create_user(session, params)))
            .await
    }
}
