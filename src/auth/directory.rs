//! User lookup collaborator used by authentication and the auth flows.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{NewUser, User};

/// Default bound on a single user lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("Username or email already exists")]
    Duplicate,
    #[error("User store error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Read/create access to stored identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn create(&self, user: NewUser<'_>) -> Result<i64, DirectoryError>;
}

/// Run a directory call, failing with [`DirectoryError::Timeout`] if it exceeds `limit`.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, DirectoryError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(DirectoryError::Timeout(limit)))
}
