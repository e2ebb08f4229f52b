//! Constants used throughout Warden
//!
//! Endpoint paths, protocol defaults, and environment variable names.

use once_cell::sync::Lazy;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Get the home directory with fallback to current directory
pub fn get_home_dir() -> &'static str {
    static HOME_DIR: Lazy<String> = Lazy::new(|| {
        dirs::home_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string())
    });
    &HOME_DIR
}

/// Default data directory (~/.warden)
pub fn default_data_dir() -> &'static str {
    static DATA_DIR: Lazy<String> = Lazy::new(|| format!("{}/.warden", get_home_dir()));
    &DATA_DIR
}

/// Default SQLite DSN (~/.warden/warden.db)
pub fn default_sqlite_dsn() -> &'static str {
    static SQLITE_DSN: Lazy<String> = Lazy::new(|| format!("{}/warden.db", default_data_dir()));
    &SQLITE_DSN
}

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "warden.config.json";

/// Default HTTP host
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default per-request timeout for the whole router (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// TOKENS & GRANTS
// ============================================================================

/// Minimum length of the shared HS256 signing secret (bytes)
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Default access token lifetime: 7 days
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 604_800;

/// Default refresh token lifetime: 30 days
pub const DEFAULT_REFRESH_TOKEN_LIFETIME_SECS: i64 = 2_592_000;

/// Authorization codes expire 10 minutes after issuance
pub const DEFAULT_CODE_TTL_SECS: i64 = 600;

/// Expired token metadata purge interval: 1 hour
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

/// Longest accepted token lifetime: 10 years
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 315_360_000;

/// Longest accepted authorization code TTL: 1 day
pub const MAX_CODE_TTL_SECS: i64 = 86_400;

/// Longest accepted purge interval or timeout: 1 day
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Random bytes in authorization codes and client secrets
pub const RANDOM_TOKEN_BYTES: usize = 32;

/// `token_type` claim of access tokens
pub const TOKEN_TYPE_ACCESS: &str = "access_token";

/// `token_type` claim of refresh tokens
pub const TOKEN_TYPE_REFRESH: &str = "refresh_token";

/// Key id advertised in the JWKS placeholder
pub const JWKS_KEY_ID: &str = "main";

// ============================================================================
// CLIENT REGISTRATION DEFAULTS
// ============================================================================

/// Scope granted when a request names none
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// Supported scopes advertised in metadata
pub const SUPPORTED_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Client name used when registration omits one
pub const DEFAULT_CLIENT_NAME: &str = "MCP Client";

/// Prefix of generated client ids
pub const CLIENT_ID_PREFIX: &str = "mcp-";

/// Redirect URIs registered when a client supplies none
pub const DEFAULT_REDIRECT_URIS: &[&str] = &[
    "https://chatgpt.com/connector_platform_oauth_redirect",
    "https://chatgpt.com/aip/c/o/redirect",
    "http://localhost:3000/callback",
];

/// Grant types registered when a client supplies none
pub const DEFAULT_GRANT_TYPES: &[&str] = &["authorization_code", "refresh_token"];

/// Response types registered when a client supplies none
pub const DEFAULT_RESPONSE_TYPES: &[&str] = &["code"];

/// Default `token_endpoint_auth_method`
pub const DEFAULT_TOKEN_ENDPOINT_AUTH_METHOD: &str = "none";

/// Default `application_type`
pub const DEFAULT_APPLICATION_TYPE: &str = "web";

// ============================================================================
// IDENTITY PROVIDER
// ============================================================================

/// Default provider name
pub const DEFAULT_PROVIDER: &str = "google";

/// Default provider scopes
pub const DEFAULT_PROVIDER_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Default timeout for calls to the identity provider (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// HTTP PATHS
// ============================================================================

pub const PATH_HEALTH: &str = "/health";
pub const PATH_METRICS: &str = "/metrics";
pub const PATH_OAUTH_METADATA: &str = "/.well-known/oauth-authorization-server";
pub const PATH_OPENID_CONFIGURATION: &str = "/.well-known/openid-configuration";
pub const PATH_JWKS: &str = "/.well-known/jwks.json";
pub const PATH_AUTHORIZE: &str = "/oauth/authorize";
pub const PATH_CALLBACK: &str = "/oauth/callback";
pub const PATH_TOKEN: &str = "/oauth/token";
pub const PATH_REGISTER: &str = "/oauth/register";
pub const PATH_USERINFO: &str = "/oauth/userinfo";
pub const PATH_INTROSPECT: &str = "/oauth/introspect";
pub const PATH_REVOKE: &str = "/oauth/revoke";

/// Path prefixes that bypass bearer authentication
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    PATH_HEALTH,
    PATH_METRICS,
    PATH_OAUTH_METADATA,
    PATH_OPENID_CONFIGURATION,
    PATH_JWKS,
    PATH_AUTHORIZE,
    PATH_CALLBACK,
    PATH_REGISTER,
    PATH_TOKEN,
    PATH_INTROSPECT,
    PATH_REVOKE,
];

/// Realm in `WWW-Authenticate` challenges
pub const AUTH_REALM: &str = "MCP OAuth";

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_SERVER_URL: &str = "OAUTH_SERVER_URL";
pub const ENV_ACCESS_TOKEN_LIFETIME: &str = "ACCESS_TOKEN_LIFETIME";
pub const ENV_REFRESH_TOKEN_LIFETIME: &str = "REFRESH_TOKEN_LIFETIME";
pub const ENV_PROVIDER: &str = "OAUTH_PROVIDER";
pub const ENV_PROVIDER_CLIENT_ID: &str = "OAUTH_CLIENT_ID";
pub const ENV_PROVIDER_CLIENT_SECRET: &str = "OAUTH_CLIENT_SECRET";
pub const ENV_PROVIDER_AUTH_URL: &str = "OAUTH_AUTH_URL";
pub const ENV_PROVIDER_TOKEN_URL: &str = "OAUTH_TOKEN_URL";
pub const ENV_PROVIDER_USERINFO_URL: &str = "OAUTH_USERINFO_URL";
pub const ENV_PROVIDER_SCOPES: &str = "OAUTH_SCOPES";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_ADMIN_EMAIL: &str = "DEFAULT_ADMIN_EMAIL";
pub const ENV_ADMIN_NAME: &str = "DEFAULT_ADMIN_NAME";
