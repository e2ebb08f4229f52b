//! Token manager
//!
//! Issues HS256 signed access/refresh pairs and keeps a shadow
//! [`TokenRecord`] for every token so that a signed, unexpired token can
//! still be revoked. A token is accepted only when its signature, issuer and
//! expiry check out and its record is still active.

use crate::config::Config;
use crate::constants::{JWKS_KEY_ID, MIN_JWT_SECRET_LEN};
use crate::model::{TokenKind, TokenRecord, User};
use crate::storage::Storage;
use crate::telemetry;
use crate::{Result, WardenError};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by every token this server signs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    /// Present on access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub client_id: String,
    pub scope: String,
    pub token_type: TokenKind,
    /// Key of the shadow record
    pub token_id: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub scope: String,
}

/// Token endpoint response body
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
            refresh_token: Some(pair.refresh_token),
            scope: Some(pair.scope),
        }
    }
}

/// Introspection response; only `active` is present for invalid tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Introspection {
    pub fn inactive() -> Self {
        Self::default()
    }
}

impl From<Claims> for Introspection {
    fn from(claims: Claims) -> Self {
        Self {
            active: true,
            sub: Some(claims.sub),
            client_id: Some(claims.client_id),
            scope: Some(claims.scope),
            token_type: Some(claims.token_type),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            iss: Some(claims.iss),
        }
    }
}

fn lifetime(secs: i64) -> Result<Duration> {
    Duration::try_seconds(secs)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| WardenError::config(format!("Invalid token lifetime: {}s", secs)))
}

/// Issues, validates, rotates and revokes signed tokens
pub struct TokenManager {
    storage: Arc<dyn Storage>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenManager {
    /// Create a token manager. Fails when the secret is shorter than
    /// [`MIN_JWT_SECRET_LEN`] bytes.
    pub fn new(
        storage: Arc<dyn Storage>,
        secret: &str,
        issuer: &str,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Result<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(WardenError::config(format!(
                "JWT secret must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            storage,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            access_lifetime,
            refresh_lifetime,
        })
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> Result<Self> {
        Self::new(
            storage,
            &config.oauth.jwt_secret,
            &config.server_url(),
            lifetime(config.oauth.access_token_lifetime_secs)?,
            lifetime(config.oauth.refresh_token_lifetime_secs)?,
        )
    }

    /// Issue an access/refresh pair for `user`.
    ///
    /// Both shadow records are saved before the tokens are returned; a token
    /// without a record could never validate, so a failed save aborts.
    pub async fn create_token_pair(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
    ) -> Result<TokenPair> {
        let access_token = self
            .issue(user, client_id, scope, TokenKind::Access, self.access_lifetime)
            .await?;
        let refresh_token = self
            .issue(user, client_id, scope, TokenKind::Refresh, self.refresh_lifetime)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_lifetime.num_seconds(),
            scope: scope.to_string(),
        })
    }

    async fn issue(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
        kind: TokenKind,
        lifetime: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let expires_at = now + lifetime;
        let token_id = Uuid::new_v4().to_string();

        let (name, picture) = match kind {
            TokenKind::Access => (Some(user.name.clone()), user.picture.clone()),
            TokenKind::Refresh => (None, None),
        };

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name,
            picture,
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            token_type: kind,
            token_id: token_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WardenError::auth(format!("Failed to sign token: {}", e)))?;

        self.storage
            .save_token_metadata(&TokenRecord {
                token_id,
                client_id: client_id.to_string(),
                user_id: user.id.clone(),
                kind,
                scope: scope.to_string(),
                expires_at,
                active: true,
                created_at: now,
            })
            .await?;

        telemetry::record_token_issued(kind);
        Ok(token)
    }

    /// Validate a token of either kind.
    ///
    /// Every rejection is reported as [`WardenError::InvalidToken`]; the cause
    /// is only logged. Storage failures propagate as storage errors.
    pub async fn validate_token(&self, token: &str) -> Result<Claims> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                WardenError::InvalidToken
            })?
            .claims;

        if self.storage.is_token_revoked(&claims.token_id).await? {
            tracing::debug!("Token rejected: token {} is revoked", claims.token_id);
            return Err(WardenError::InvalidToken);
        }

        Ok(claims)
    }

    /// Rotate a refresh token.
    ///
    /// The presented token is consumed before the new pair is minted, so it can
    /// never be used again even if issuance fails afterwards. Of several
    /// concurrent rotations of one token only the one that wins the revoke
    /// gets a pair.
    pub async fn refresh_token_pair(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.validate_token(refresh_token).await?;

        if claims.token_type != TokenKind::Refresh {
            tracing::debug!("Token rejected: {} presented as refresh token", claims.token_type);
            return Err(WardenError::InvalidToken);
        }

        let user = self
            .storage
            .find_user_by_email(&claims.email)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Refresh refused: user {} is no longer active", claims.email);
                WardenError::InvalidToken
            })?;

        if !self.storage.revoke_token(&claims.token_id).await? {
            tracing::warn!(
                "Refresh refused: token {} was already rotated",
                claims.token_id
            );
            return Err(WardenError::InvalidToken);
        }
        telemetry::record_refresh_rotation();

        self.create_token_pair(&user, &claims.client_id, &claims.scope)
            .await
    }

    /// Validate a token and deactivate its shadow record
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        let claims = self.validate_token(token).await?;
        self.storage.revoke_token(&claims.token_id).await?;
        telemetry::record_revocation();
        tracing::info!(
            "Revoked {} {} for client {}",
            claims.token_type,
            claims.token_id,
            claims.client_id
        );
        Ok(())
    }

    /// Describe a token. Never fails: anything invalid is `active: false`.
    pub async fn introspect(&self, token: &str) -> Introspection {
        match self.validate_token(token).await {
            Ok(claims) => claims.into(),
            Err(WardenError::InvalidToken) => Introspection::inactive(),
            Err(e) => {
                tracing::error!("Failed to introspect token: {}", e);
                Introspection::inactive()
            }
        }
    }

    /// Placeholder key set; a symmetric key has nothing to publish
    pub fn jwks(&self) -> serde_json::Value {
        json!({
            "keys": [{
                "kty": "oct",
                "use": "sig",
                "kid": JWKS_KEY_ID,
                "alg": "HS256",
            }]
        })
    }
}

#[cfg(test)]
mod tokens_test {
    include!("tokens_test.rs");
}
