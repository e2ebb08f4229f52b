//! Identity provider adapter
//!
//! Wraps the single upstream OpenID-Connect-like provider users sign in with:
//! authorization URL, code exchange, and a userinfo lookup normalized to an
//! [`Identity`]. Failures are reported as opaque auth errors; the callback
//! never forwards provider detail to the client.

use crate::config::ProviderConfig;
use crate::model::Identity;
use crate::{Result, WardenError};
use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// What to do when the provider's userinfo carries no subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectFallback {
    /// Use the email address as the subject
    #[default]
    Email,
    /// Refuse the identity
    Reject,
}

/// The upstream identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name (google, microsoft, ...)
    fn name(&self) -> &str;

    /// URL the user agent is sent to, carrying `state` verbatim
    fn authorization_url(&self, state: &str) -> Result<String>;

    /// Exchange the provider's authorization code for its access token
    async fn exchange_code(&self, code: &str) -> Result<String>;

    /// Resolve the signed-in identity with the provider's access token
    async fn fetch_identity(&self, access_token: &str) -> Result<Identity>;
}

/// Generic OAuth2/OIDC provider driven by configured endpoints
pub struct OidcProvider {
    config: ProviderConfig,
    redirect_uri: String,
    http_client: reqwest::Client,
    timeout: Duration,
    subject_fallback: SubjectFallback,
}

impl OidcProvider {
    pub fn new(config: ProviderConfig, redirect_uri: impl Into<String>) -> Result<Self> {
        // Redirects stay disabled so codes and tokens are never forwarded
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WardenError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            timeout: Duration::from_secs(config.timeout_secs),
            redirect_uri: redirect_uri.into(),
            http_client,
            subject_fallback: config.subject_fallback,
            config,
        })
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| WardenError::timeout())?
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(self.config.auth_url.clone())
                    .map_err(|e| WardenError::auth(format!("Invalid auth URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(self.redirect_uri.clone())
                    .map_err(|e| WardenError::auth(format!("Invalid redirect URI: {}", e)))?,
            );

        let state = state.to_string();
        let (url, _) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.config.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        // Can't share the client builder with authorization_url: oauth2 typestates differ
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.config.token_url.clone())
                    .map_err(|e| WardenError::auth(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(self.redirect_uri.clone())
                    .map_err(|e| WardenError::auth(format!("Invalid redirect URI: {}", e)))?,
            );

        let token = self
            .with_timeout(async {
                client
                    .exchange_code(AuthorizationCode::new(code.to_string()))
                    .request_async(&self.http_client)
                    .await
                    .map_err(|e| WardenError::auth(format!("Token exchange failed: {}", e)))
            })
            .await?;

        Ok(token.access_token().secret().clone())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity> {
        let raw: Value = self
            .with_timeout(async {
                let response = self
                    .http_client
                    .get(&self.config.userinfo_url)
                    .bearer_auth(access_token)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(WardenError::auth(format!(
                        "Userinfo request failed with status {}",
                        status
                    )));
                }

                Ok(response.json::<Value>().await?)
            })
            .await?;

        normalize_identity(&self.config.name, &raw, self.subject_fallback)
    }
}

/// Map a provider's userinfo document onto an [`Identity`].
///
/// Microsoft Graph uses `id`, `displayName`, `mail` and `userPrincipalName`;
/// everything else is read as standard OIDC claims.
pub fn normalize_identity(
    provider: &str,
    raw: &Value,
    fallback: SubjectFallback,
) -> Result<Identity> {
    let field = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let (subject, email, name, picture) = match provider {
        "microsoft" => (
            field("id").or_else(|| field("sub")),
            field("mail")
                .or_else(|| field("email"))
                .or_else(|| field("userPrincipalName")),
            field("displayName").or_else(|| field("name")),
            None,
        ),
        _ => (
            field("sub").or_else(|| field("id")),
            field("email"),
            field("name"),
            field("picture"),
        ),
    };

    let email = email.ok_or_else(|| WardenError::auth("Provider returned no email"))?;

    let subject = match (subject, fallback) {
        (Some(subject), _) => subject,
        (None, SubjectFallback::Email) => email.clone(),
        (None, SubjectFallback::Reject) => {
            return Err(WardenError::auth("Provider returned no subject"));
        }
    };

    Ok(Identity {
        subject,
        name: name.unwrap_or_default(),
        email,
        picture,
    })
}
