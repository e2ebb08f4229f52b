//! Configuration management for Warden
//!
//! Loads configuration from `warden.config.json` (or YAML) and overlays
//! environment variables on top.

use crate::auth::SubjectFallback;
use crate::constants::{self, *};
use crate::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Complete Warden configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Storage configuration (required)
    pub storage: StorageConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Authorization server configuration
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Upstream identity provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,

    /// User seeded at startup when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminConfig>,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Driver name (sqlite, memory)
    pub driver: String,

    /// Data source name / connection string
    pub dsn: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Defaults to localhost on the configured port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,

    /// Upper bound on the time spent serving any single request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Authorization server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    /// Public base URL of this server; also the token issuer.
    /// Derived from host and port when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Shared HS256 signing secret
    #[serde(default, skip_serializing)]
    pub jwt_secret: String,

    #[serde(default = "default_access_lifetime")]
    pub access_token_lifetime_secs: i64,

    #[serde(default = "default_refresh_lifetime")]
    pub refresh_token_lifetime_secs: i64,

    /// Lifetime of one-time authorization codes
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: i64,

    /// Interval of the background purge of expired grants and token records
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Path prefixes served without a bearer token
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            jwt_secret: String::new(),
            access_token_lifetime_secs: default_access_lifetime(),
            refresh_token_lifetime_secs: default_refresh_lifetime(),
            code_ttl_secs: default_code_ttl(),
            purge_interval_secs: default_purge_interval(),
            public_paths: default_public_paths(),
        }
    }
}

/// Upstream identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider name (google, microsoft, cognito, or any OIDC provider)
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default, skip_serializing)]
    pub client_secret: String,

    #[serde(default)]
    pub auth_url: String,

    #[serde(default)]
    pub token_url: String,

    #[serde(default)]
    pub userinfo_url: String,

    #[serde(default = "default_provider_scopes")]
    pub scopes: Vec<String>,

    /// Timeout applied to each call to the provider
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Subject used when userinfo has no `sub`/`id` (`email` or `reject`)
    #[serde(default)]
    pub subject_fallback: SubjectFallback,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: String::new(),
            token_url: String::new(),
            userinfo_url: String::new(),
            scopes: default_provider_scopes(),
            timeout_secs: default_provider_timeout_secs(),
            subject_fallback: SubjectFallback::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Default administrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

fn default_host() -> String {
    DEFAULT_HTTP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_access_lifetime() -> i64 {
    DEFAULT_ACCESS_TOKEN_LIFETIME_SECS
}

fn default_refresh_lifetime() -> i64 {
    DEFAULT_REFRESH_TOKEN_LIFETIME_SECS
}

fn default_code_ttl() -> i64 {
    DEFAULT_CODE_TTL_SECS
}

fn default_purge_interval() -> u64 {
    DEFAULT_PURGE_INTERVAL_SECS
}

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_provider_name() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_provider_scopes() -> Vec<String> {
    DEFAULT_PROVIDER_SCOPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

impl Config {
    /// Load configuration from the default file, then apply the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(constants::CONFIG_FILE_NAME)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific path
    ///
    /// Supports both JSON and YAML formats based on file extension:
    /// - `.json` files are parsed as JSON
    /// - `.yaml` or `.yml` files are parsed as YAML
    /// - Files without extension default to JSON parsing
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;

        let config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                WardenError::config(format!("Failed to parse YAML config: {}", e))
            })?,
            _ => serde_json::from_str(&content).map_err(|e| {
                WardenError::config(format!("Failed to parse JSON config: {}", e))
            })?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Overlay environment variables on top of file configuration
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(secret) = env_non_empty(ENV_JWT_SECRET) {
            self.oauth.jwt_secret = secret;
        }
        if let Some(host) = env_non_empty(ENV_HOST) {
            self.http.host = host;
        }
        if let Some(port) = env_non_empty(ENV_PORT) {
            self.http.port = port
                .parse()
                .map_err(|e| WardenError::config(format!("Invalid {}: {}", ENV_PORT, e)))?;
        }
        if let Some(url) = env_non_empty(ENV_SERVER_URL) {
            self.oauth.server_url = Some(url);
        }
        if let Some(secs) = env_non_empty(ENV_ACCESS_TOKEN_LIFETIME) {
            self.oauth.access_token_lifetime_secs = parse_secs(ENV_ACCESS_TOKEN_LIFETIME, &secs)?;
        }
        if let Some(secs) = env_non_empty(ENV_REFRESH_TOKEN_LIFETIME) {
            self.oauth.refresh_token_lifetime_secs =
                parse_secs(ENV_REFRESH_TOKEN_LIFETIME, &secs)?;
        }

        if let Some(name) = env_non_empty(ENV_PROVIDER) {
            self.provider.name = name;
        }
        if let Some(id) = env_non_empty(ENV_PROVIDER_CLIENT_ID) {
            self.provider.client_id = id;
        }
        if let Some(secret) = env_non_empty(ENV_PROVIDER_CLIENT_SECRET) {
            self.provider.client_secret = secret;
        }
        if let Some(url) = env_non_empty(ENV_PROVIDER_AUTH_URL) {
            self.provider.auth_url = url;
        }
        if let Some(url) = env_non_empty(ENV_PROVIDER_TOKEN_URL) {
            self.provider.token_url = url;
        }
        if let Some(url) = env_non_empty(ENV_PROVIDER_USERINFO_URL) {
            self.provider.userinfo_url = url;
        }
        if let Some(scopes) = env_non_empty(ENV_PROVIDER_SCOPES) {
            self.provider.scopes = parse_comma_list(&scopes);
        }

        if let Some(dsn) = env_non_empty(ENV_DATABASE_URL) {
            self.storage.driver = if dsn == "memory" { "memory" } else { "sqlite" }.to_string();
            self.storage.dsn = dsn;
        }
        if let Some(level) = env_non_empty(ENV_LOG_LEVEL) {
            self.log = Some(LogConfig { level: Some(level) });
        }
        if let Some(email) = env_non_empty(ENV_ADMIN_EMAIL) {
            let name = env_non_empty(ENV_ADMIN_NAME).unwrap_or_default();
            self.admin = Some(AdminConfig { email, name });
        }

        Ok(())
    }

    /// Public base URL, also used as the token issuer
    pub fn server_url(&self) -> String {
        self.oauth
            .server_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.http.host, self.http.port))
            .trim_end_matches('/')
            .to_string()
    }

    /// Callback URL registered with the upstream provider
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.server_url(), PATH_CALLBACK)
    }

    /// Validate structural configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.driver.is_empty() {
            return Err(WardenError::config("storage.driver is required"));
        }

        match self.storage.driver.as_str() {
            "sqlite" => {
                if self.storage.dsn.is_empty() {
                    return Err(WardenError::config("storage.dsn is required"));
                }
            }
            "memory" => {}
            _ => {
                return Err(WardenError::config(format!(
                    "Unsupported storage driver: '{}'. Supported: sqlite, memory",
                    self.storage.driver
                )));
            }
        }

        if self.http.port == 0 {
            return Err(WardenError::config("http.port must be nonzero (1-65535)"));
        }

        if self.http.host.is_empty() {
            return Err(WardenError::config("http.host cannot be empty"));
        }

        if let Some(ref origins) = self.http.allowed_origins {
            for origin in origins {
                if !origin.starts_with("http://") && !origin.starts_with("https://") {
                    return Err(WardenError::config(format!(
                        "Invalid CORS origin '{}': must start with http:// or https://",
                        origin
                    )));
                }
            }
        }

        check_range(
            "oauth.accessTokenLifetimeSecs",
            self.oauth.access_token_lifetime_secs,
            MAX_TOKEN_LIFETIME_SECS,
        )?;
        check_range(
            "oauth.refreshTokenLifetimeSecs",
            self.oauth.refresh_token_lifetime_secs,
            MAX_TOKEN_LIFETIME_SECS,
        )?;
        check_range("oauth.codeTtlSecs", self.oauth.code_ttl_secs, MAX_CODE_TTL_SECS)?;
        check_range(
            "oauth.purgeIntervalSecs",
            self.oauth.purge_interval_secs,
            MAX_INTERVAL_SECS,
        )?;
        check_range(
            "http.requestTimeoutSecs",
            self.http.request_timeout_secs,
            MAX_INTERVAL_SECS,
        )?;
        check_range(
            "provider.timeoutSecs",
            self.provider.timeout_secs,
            MAX_INTERVAL_SECS,
        )?;

        if let Some(ref server_url) = self.oauth.server_url {
            let parsed = url::Url::parse(server_url).map_err(|e| {
                WardenError::config(format!("Invalid oauth.serverUrl '{}': {}", server_url, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(WardenError::config(
                    "oauth.serverUrl must be an http:// or https:// URL",
                ));
            }
        }

        for (field, value) in [
            ("provider.authUrl", &self.provider.auth_url),
            ("provider.tokenUrl", &self.provider.token_url),
            ("provider.userinfoUrl", &self.provider.userinfo_url),
        ] {
            if !value.is_empty() && url::Url::parse(value).is_err() {
                return Err(WardenError::config(format!(
                    "Invalid {}: '{}'",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Validate everything the authorization server needs before it starts
    pub fn validate_for_server(&self) -> Result<()> {
        self.validate()?;

        if self.oauth.jwt_secret.is_empty() {
            return Err(WardenError::config(format!(
                "{} is required",
                ENV_JWT_SECRET
            )));
        }
        if self.oauth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(WardenError::config(format!(
                "{} must be at least {} characters long",
                ENV_JWT_SECRET, MIN_JWT_SECRET_LEN
            )));
        }

        for (field, value) in [
            ("provider.clientId", &self.provider.client_id),
            ("provider.clientSecret", &self.provider.client_secret),
            ("provider.authUrl", &self.provider.auth_url),
            ("provider.tokenUrl", &self.provider.token_url),
            ("provider.userinfoUrl", &self.provider.userinfo_url),
        ] {
            if value.is_empty() {
                return Err(WardenError::config(format!("{} is required", field)));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                driver: "sqlite".to_string(),
                dsn: default_sqlite_dsn().to_string(),
            },
            http: HttpConfig::default(),
            oauth: OAuthConfig::default(),
            provider: ProviderConfig::default(),
            log: Some(LogConfig {
                level: Some("info".to_string()),
            }),
            admin: None,
        }
    }
}

/// Reject durations outside `1..=max` seconds
fn check_range<T>(field: &str, value: T, max: T) -> Result<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(WardenError::config(format!("{} must be greater than 0", field)));
    }
    if value > max {
        return Err(WardenError::config(format!(
            "{} must be at most {} (got {})",
            field, max, value
        )));
    }
    Ok(())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_secs(key: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|e| WardenError::config(format!("Invalid {}: {}", key, e)))
}

/// Split a comma-separated list, dropping blanks
pub fn parse_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod config_test;
