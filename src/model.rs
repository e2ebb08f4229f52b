//! Core data models for Warden
//!
//! Users, registered clients, token shadow records, and the normalized
//! identity returned by the upstream identity provider.

use crate::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account status. Only active users may complete a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    /// Parse a stored status. Unknown values are treated as suspended.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => UserStatus::Active,
            _ => UserStatus::Suspended,
        }
    }
}

/// A whitelisted user. Provisioned out of band, updated on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier
    pub id: String,

    /// Unique email address (the whitelist key)
    pub email: String,

    /// Display name
    pub name: String,

    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Name of the linked external identity provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Subject of the linked identity at the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_user_id: Option<String>,

    pub status: UserStatus,

    /// Free-form role label (e.g. "admin", "user")
    pub role: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new active user with a fresh id
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            picture: None,
            provider: None,
            provider_user_id: None,
            status: UserStatus::Active,
            role: role.into(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Whether the account is already bound to an external identity
    pub fn has_linked_provider(&self) -> bool {
        self.provider.as_deref().is_some_and(|p| !p.is_empty())
            && self.provider_user_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Unique identifier (`mcp-<uuid>`)
    pub id: String,

    /// Shared secret, shown to the client once at registration
    pub secret: String,

    /// Client name
    pub name: String,

    /// Allowed redirect URIs, matched exactly
    pub redirect_uris: Vec<String>,

    /// Supported grant types
    pub grant_types: Vec<String>,

    /// Supported response types
    pub response_types: Vec<String>,

    /// OAuth scope
    pub scope: String,

    pub application_type: String,

    pub token_endpoint_auth_method: String,

    /// Inactive clients are invisible to lookups
    pub active: bool,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Exact, byte-for-byte redirect URI check
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }
}

/// Kind of a signed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => constants::TOKEN_TYPE_ACCESS,
            TokenKind::Refresh => constants::TOKEN_TYPE_REFRESH,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            constants::TOKEN_TYPE_ACCESS => Some(TokenKind::Access),
            constants::TOKEN_TYPE_REFRESH => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted shadow of an issued JWT. A token is only valid while its
/// record exists and is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Matches the `token_id` claim
    pub token_id: String,

    pub client_id: String,

    pub user_id: String,

    pub kind: TokenKind,

    pub scope: String,

    /// Absolute expiry, mirrors the `exp` claim
    pub expires_at: DateTime<Utc>,

    /// Cleared on revocation or rotation
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Identity resolved from the upstream provider, normalized across providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}
