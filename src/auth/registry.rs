//! Client registry
//!
//! Dynamic client registration and the redirect URI checks every flow runs
//! before it will redirect anywhere.

use crate::auth::generate_secure_token;
use crate::constants::*;
use crate::model::OAuthClient;
use crate::storage::Storage;
use crate::{Result, WardenError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Dynamic client registration request.
///
/// Absent fields take server defaults; fields that are present are taken
/// as-is and validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRegistrationRequest {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,
    #[serde(default)]
    pub response_types: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub application_type: Option<String>,
}

/// Registration response. The secret is only ever shown here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub token_endpoint_auth_method: String,
    pub application_type: String,
    pub client_id_issued_at: i64,
    /// 0: never expires
    pub client_secret_expires_at: i64,
}

impl From<OAuthClient> for ClientRegistrationResponse {
    fn from(client: OAuthClient) -> Self {
        Self {
            client_id: client.id,
            client_secret: client.secret,
            client_name: client.name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            scope: client.scope,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            application_type: client.application_type,
            client_id_issued_at: client.created_at.timestamp(),
            client_secret_expires_at: 0,
        }
    }
}

/// Registered client lookup and validation
#[derive(Clone)]
pub struct ClientRegistry {
    storage: Arc<dyn Storage>,
}

impl ClientRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Register a new client and persist it
    pub async fn register(&self, request: ClientRegistrationRequest) -> Result<OAuthClient> {
        let name = match request.client_name {
            None => DEFAULT_CLIENT_NAME.to_string(),
            Some(name) if name.trim().is_empty() => {
                return Err(WardenError::validation("client_name cannot be empty"));
            }
            Some(name) => name.trim().to_string(),
        };

        let redirect_uris = match request.redirect_uris {
            None => to_strings(DEFAULT_REDIRECT_URIS),
            Some(uris) if uris.is_empty() => {
                return Err(WardenError::validation(
                    "redirect_uris must contain at least one URI",
                ));
            }
            Some(uris) => uris,
        };
        for uri in &redirect_uris {
            validate_redirect_uri_syntax(uri)?;
        }

        let grant_types = non_empty_or(request.grant_types, DEFAULT_GRANT_TYPES);
        if let Some(unsupported) = grant_types
            .iter()
            .find(|g| !DEFAULT_GRANT_TYPES.contains(&g.as_str()))
        {
            return Err(WardenError::validation(format!(
                "Unsupported grant type: {}",
                unsupported
            )));
        }

        let response_types = non_empty_or(request.response_types, DEFAULT_RESPONSE_TYPES);
        if let Some(unsupported) = response_types
            .iter()
            .find(|r| !DEFAULT_RESPONSE_TYPES.contains(&r.as_str()))
        {
            return Err(WardenError::validation(format!(
                "Unsupported response type: {}",
                unsupported
            )));
        }

        let now = Utc::now();
        let client = OAuthClient {
            id: format!("{}{}", CLIENT_ID_PREFIX, Uuid::new_v4()),
            secret: generate_client_secret(),
            name,
            redirect_uris,
            grant_types,
            response_types,
            scope: request
                .scope
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            application_type: request
                .application_type
                .unwrap_or_else(|| DEFAULT_APPLICATION_TYPE.to_string()),
            token_endpoint_auth_method: request
                .token_endpoint_auth_method
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT_AUTH_METHOD.to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.storage.create_client(&client).await?;
        tracing::info!("Registered OAuth client {} ({})", client.id, client.name);

        Ok(client)
    }

    /// Look up an active client
    pub async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        self.storage.get_client(client_id).await
    }

    /// Whether `client_id` names an active client
    pub async fn validate_client(&self, client_id: &str) -> Result<bool> {
        Ok(self.get_client(client_id).await?.is_some())
    }

    /// Whether `uri` is registered for the client, byte for byte
    pub async fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> Result<bool> {
        Ok(self
            .get_client(client_id)
            .await?
            .is_some_and(|client| client.has_redirect_uri(uri)))
    }
}

/// Generate a client secret: 32 random bytes, base64url
pub fn generate_client_secret() -> String {
    generate_secure_token()
}

/// Redirect URIs must be absolute and carry no fragment
fn validate_redirect_uri_syntax(uri: &str) -> Result<()> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| WardenError::validation(format!("Invalid redirect URI '{}': {}", uri, e)))?;

    if parsed.fragment().is_some() {
        return Err(WardenError::validation(format!(
            "Redirect URI '{}' must not contain a fragment",
            uri
        )));
    }

    Ok(())
}

fn non_empty_or(values: Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match values {
        Some(values) if !values.is_empty() => values,
        _ => to_strings(defaults),
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod registry_test {
    include!("registry_test.rs");
}
