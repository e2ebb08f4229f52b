//! Warden - OAuth 2.0 authorization server for MCP services
//!
//! Warden sits in front of an MCP service and federates sign-in to a single
//! upstream identity provider. Only whitelisted users get tokens.
//!
//! # Architecture
//!
//! - Dynamic client registration with exact redirect URI matching
//! - Authorization-code flow through the upstream provider
//! - HS256 access and refresh tokens with revocable shadow records
//! - Bearer middleware guarding every non-public route
//! - Pluggable storage backends (in-memory, SQLite)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::config::Config;
//! use warden::storage::MemoryStorage;
//! use warden::auth::TokenManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.oauth.jwt_secret = std::env::var("JWT_SECRET")?;
//!
//!     let tokens = TokenManager::from_config(Arc::new(MemoryStorage::new()), &config)?;
//!     let claims = tokens.validate_token("eyJ...").await?;
//!     println!("{}", claims.email);
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;
pub mod model;

// Infrastructure
pub mod config;
pub mod storage;
pub mod telemetry;

// Interface layers
pub mod auth;
pub mod cli;
pub mod http;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use error::{Result, WardenError};

/// Initialize logging for the application
///
/// `RUST_LOG` wins when set; otherwise `level` (default `info`) applies to
/// this crate and the request tracing layer. `LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_logging(level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let level = level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("warden={level},tower_http={level}").into());

    let json = std::env::var(constants::ENV_LOG_FORMAT)
        .is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
