//! Storage backends for Warden
//!
//! The authorization server never issues queries directly; everything it
//! persists goes through the [`Storage`] trait.

pub mod memory;
pub mod sql_common;
pub mod sqlite;

use crate::{Result, model::*};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage trait for users, registered clients, and token shadow records
#[async_trait]
pub trait Storage: Send + Sync {
    // User methods
    /// Insert or replace a user, keyed by email
    async fn save_user(&self, user: &User) -> Result<()>;

    /// Find an active user by email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Link an external identity to a user
    async fn update_user_provider(
        &self,
        user_id: &str,
        provider: &str,
        provider_user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()>;

    /// Record a successful login
    async fn update_last_login(&self, user_id: &str) -> Result<()>;

    // Client methods
    /// Save a newly registered client
    async fn create_client(&self, client: &OAuthClient) -> Result<()>;

    /// Get an active client by ID
    async fn get_client(&self, id: &str) -> Result<Option<OAuthClient>>;

    // Token metadata methods
    /// Save the shadow record of an issued token
    async fn save_token_metadata(&self, record: &TokenRecord) -> Result<()>;

    /// Get a token record by token id
    async fn get_token_metadata(&self, token_id: &str) -> Result<Option<TokenRecord>>;

    /// Deactivate a token record.
    ///
    /// Returns `true` only for the call that flipped an active record, so
    /// concurrent callers can tell which one consumed the token. Unknown or
    /// already inactive ids return `false`.
    async fn revoke_token(&self, token_id: &str) -> Result<bool>;

    /// True when the record is missing or inactive
    async fn is_token_revoked(&self, token_id: &str) -> Result<bool>;

    /// Delete records whose expiry has passed, returning how many were removed
    async fn cleanup_expired_tokens(&self) -> Result<u64>;
}

/// Create storage backend from configuration
pub async fn create_storage_from_config(
    config: &crate::config::StorageConfig,
) -> Result<Arc<dyn Storage>> {
    match config.driver.as_str() {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        "sqlite" => Ok(Arc::new(SqliteStorage::new(&config.dsn).await?)),
        _ => Err(crate::WardenError::config(format!(
            "Unknown storage driver: {}. Supported: memory, sqlite",
            config.driver
        ))),
    }
}

#[cfg(test)]
mod sqlite_test;
#[cfg(test)]
mod storage_test;
