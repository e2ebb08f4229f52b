//! Error types for Warden
//!
//! This module provides the error hierarchy using thiserror.
//! All errors can be converted to WardenError for unified error handling.

use thiserror::Error;

/// Main error type for Warden operations
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Uniform token rejection. The concrete cause is only ever logged.
    #[error("invalid token")]
    InvalidToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for WardenError {
    fn from(err: sqlx::Error) -> Self {
        WardenError::Storage(StorageError::from(err))
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection timeout")]
    Timeout,

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<reqwest::Error> for WardenError {
    fn from(err: reqwest::Error) -> Self {
        WardenError::Network(NetworkError::Reqwest(err))
    }
}

/// Convenient result type for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

impl WardenError {
    /// Create a validation error
    #[inline]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        WardenError::Validation(msg.into())
    }

    /// Create a config error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        WardenError::Config(msg.into())
    }

    /// Create a storage error
    #[inline]
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        WardenError::Storage(StorageError::Database(msg.into()))
    }

    /// Create an auth error
    #[inline]
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        WardenError::OAuth(msg.into())
    }

    /// Create a not found error
    #[inline]
    pub fn not_found(entity: &str, id: &str) -> Self {
        WardenError::Storage(StorageError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    /// Create a network timeout error
    #[inline]
    pub fn timeout() -> Self {
        WardenError::Network(NetworkError::Timeout)
    }

    /// True for failures of the backing store (not for missing records)
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, WardenError::Storage(StorageError::Database(_)))
    }
}
