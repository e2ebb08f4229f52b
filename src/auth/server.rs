//! OAuth 2.0 authorization server
//!
//! Drives the authorization-code flow through the upstream identity provider:
//!
//! 1. `/oauth/authorize` validates the client and redirect URI, signs the
//!    original request into `state` and sends the user to the provider.
//! 2. `/oauth/callback` resolves the provider identity, checks it against the
//!    user whitelist and redirects back to the client with a one-time code.
//! 3. `/oauth/token` redeems the code (or rotates a refresh token) for a
//!    signed token pair.
//!
//! Requests that fail before the redirect URI is known to be registered are
//! answered directly; nothing is ever redirected to an unvalidated URI.

use crate::auth::codes::AuthorizationCodeCache;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::provider::IdentityProvider;
use crate::auth::registry::{ClientRegistrationRequest, ClientRegistrationResponse, ClientRegistry};
use crate::auth::state::{AuthorizationState, StateSigner};
use crate::auth::tokens::{TokenManager, TokenResponse};
use crate::config::Config;
use crate::constants::*;
use crate::model::Identity;
use crate::storage::Storage;
use crate::telemetry;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// OAuth server state
pub struct OAuthServerState {
    pub storage: Arc<dyn Storage>,
    pub registry: ClientRegistry,
    pub tokens: Arc<TokenManager>,
    pub codes: Arc<AuthorizationCodeCache>,
    pub provider: Arc<dyn IdentityProvider>,
    pub state_signer: StateSigner,
    /// Public base URL, also the token issuer
    pub issuer: String,
}

impl OAuthServerState {
    pub fn new(
        config: &Config,
        storage: Arc<dyn Storage>,
        tokens: Arc<TokenManager>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let code_ttl = Duration::seconds(config.oauth.code_ttl_secs);

        Self {
            registry: ClientRegistry::new(storage.clone()),
            codes: Arc::new(AuthorizationCodeCache::new(code_ttl)),
            state_signer: StateSigner::new(&config.oauth.jwt_secret, code_ttl),
            issuer: config.server_url(),
            storage,
            tokens,
            provider,
        }
    }
}

/// Authorization request parameters.
///
/// Everything is optional so that missing parameters get an OAuth error
/// body instead of a bare extractor rejection.
#[derive(Debug, Deserialize)]
struct AuthorizeRequest {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    response_type: Option<String>,
    scope: Option<String>,
    state: Option<String>,
}

/// Provider callback parameters
#[derive(Debug, Deserialize)]
struct CallbackRequest {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Token request parameters
#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    client_id: Option<String>,
    refresh_token: Option<String>,
}

/// Introspection and revocation parameters
#[derive(Debug, Deserialize)]
struct TokenParam {
    token: Option<String>,
}

/// Grant types accepted at the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Unsupported(String),
}

impl GrantType {
    fn parse(value: &str) -> Self {
        match value {
            "authorization_code" => GrantType::AuthorizationCode,
            "refresh_token" => GrantType::RefreshToken,
            other => GrantType::Unsupported(other.to_string()),
        }
    }
}

/// Create OAuth routes
pub fn create_oauth_routes(state: Arc<OAuthServerState>) -> Router {
    Router::new()
        .route(PATH_OAUTH_METADATA, get(handle_metadata))
        .route(PATH_OPENID_CONFIGURATION, get(handle_metadata))
        .route(PATH_JWKS, get(handle_jwks))
        .route(PATH_REGISTER, post(handle_register))
        .route(PATH_AUTHORIZE, get(handle_authorize))
        .route(PATH_CALLBACK, get(handle_callback))
        .route(PATH_TOKEN, post(handle_token))
        .route(PATH_USERINFO, get(handle_userinfo))
        .route(PATH_INTROSPECT, post(handle_introspect))
        .route(PATH_REVOKE, post(handle_revoke))
        .with_state(state)
}

/// Authorization server metadata, derived from the issuer only
async fn handle_metadata(State(state): State<Arc<OAuthServerState>>) -> impl IntoResponse {
    let issuer = &state.issuer;

    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{}{}", issuer, PATH_AUTHORIZE),
        "token_endpoint": format!("{}{}", issuer, PATH_TOKEN),
        "registration_endpoint": format!("{}{}", issuer, PATH_REGISTER),
        "userinfo_endpoint": format!("{}{}", issuer, PATH_USERINFO),
        "revocation_endpoint": format!("{}{}", issuer, PATH_REVOKE),
        "introspection_endpoint": format!("{}{}", issuer, PATH_INTROSPECT),
        "jwks_uri": format!("{}{}", issuer, PATH_JWKS),
        "response_types_supported": DEFAULT_RESPONSE_TYPES,
        "grant_types_supported": DEFAULT_GRANT_TYPES,
        "token_endpoint_auth_methods_supported": ["none", "client_secret_post"],
        "scopes_supported": SUPPORTED_SCOPES,
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["HS256"],
    }))
}

async fn handle_jwks(State(state): State<Arc<OAuthServerState>>) -> impl IntoResponse {
    Json(state.tokens.jwks())
}

/// Handle dynamic client registration
async fn handle_register(
    State(state): State<Arc<OAuthServerState>>,
    payload: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(e) => {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", &e.body_text());
        }
    };

    match state.registry.register(request).await {
        Ok(client) => (
            StatusCode::CREATED,
            Json(ClientRegistrationResponse::from(client)),
        )
            .into_response(),
        Err(e) if e.is_storage_failure() => {
            tracing::error!("Failed to save OAuth client: {}", e);
            server_error()
        }
        Err(e) => oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_client_metadata",
            &e.to_string(),
        ),
    }
}

/// Handle authorization request
async fn handle_authorize(
    State(state): State<Arc<OAuthServerState>>,
    Query(req): Query<AuthorizeRequest>,
) -> Response {
    let (Some(client_id), Some(redirect_uri), Some(response_type)) = (
        non_empty(req.client_id),
        non_empty(req.redirect_uri),
        non_empty(req.response_type),
    ) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "client_id, redirect_uri and response_type are required",
        );
    };

    let client = match state.registry.get_client(&client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_client", "Unknown client");
        }
        Err(e) => {
            tracing::error!("Failed to get OAuth client: {}", e);
            return server_error();
        }
    };

    if !client.has_redirect_uri(&redirect_uri) {
        tracing::warn!(
            "Rejected authorization for {}: unregistered redirect_uri {}",
            client_id,
            redirect_uri
        );
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "redirect_uri is not registered for this client",
        );
    }

    if response_type != "code" {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "Only response_type=code is supported",
        );
    }

    let scope = non_empty(req.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string());
    let pending = AuthorizationState::new(&client_id, &redirect_uri, &scope, req.state.as_deref());

    let signed_state = match state.state_signer.sign(&pending) {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!("Failed to sign state parameter: {}", e);
            return server_error();
        }
    };

    match state.provider.authorization_url(&signed_state) {
        Ok(url) => {
            tracing::debug!(
                "Sending authorization for {} to {}",
                client_id,
                state.provider.name()
            );
            found(&url)
        }
        Err(e) => {
            tracing::error!("Failed to build provider authorization URL: {}", e);
            server_error()
        }
    }
}

/// Handle the upstream provider's redirect back to this server
async fn handle_callback(
    State(state): State<Arc<OAuthServerState>>,
    Query(req): Query<CallbackRequest>,
) -> Response {
    if let Some(error) = non_empty(req.error) {
        tracing::warn!(
            "Identity provider returned error: {} ({})",
            error,
            req.error_description.unwrap_or_default()
        );
        telemetry::record_login_rejected("provider_denied");
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "access_denied",
            "Authorization was denied by the identity provider",
        );
    }

    let (Some(code), Some(raw_state)) = (non_empty(req.code), non_empty(req.state)) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "code and state are required",
        );
    };

    let pending = match state.state_signer.verify(&raw_state) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!("Rejected callback with invalid state: {}", e);
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Invalid state parameter",
            );
        }
    };

    // The client may have been deactivated during the provider round trip
    match state
        .registry
        .validate_redirect_uri(&pending.client_id, &pending.redirect_uri)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_client",
                "Client is no longer registered",
            );
        }
        Err(e) => {
            tracing::error!("Failed to get OAuth client: {}", e);
            return server_error();
        }
    }

    let identity = match resolve_identity(state.provider.as_ref(), &code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("Identity provider {} failed: {}", state.provider.name(), e);
            telemetry::record_login_rejected("provider_error");
            return redirect_with_error(
                &pending.redirect_uri,
                "access_denied",
                "Authentication failed",
                &pending.state,
            );
        }
    };

    let user = match state.storage.find_user_by_email(&identity.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(
                "Login rejected: {} is not an active whitelisted user (client {})",
                identity.email,
                pending.client_id
            );
            telemetry::record_login_rejected("not_whitelisted");
            return redirect_with_error(
                &pending.redirect_uri,
                "access_denied",
                "User not authorized",
                &pending.state,
            );
        }
        Err(e) => {
            tracing::error!("Failed to look up user {}: {}", identity.email, e);
            return redirect_with_error(
                &pending.redirect_uri,
                "server_error",
                "Internal server error",
                &pending.state,
            );
        }
    };

    if !user.has_linked_provider()
        && let Err(e) = state
            .storage
            .update_user_provider(
                &user.id,
                state.provider.name(),
                &identity.subject,
                &identity.name,
                identity.picture.as_deref(),
            )
            .await
    {
        tracing::warn!("Failed to link provider identity for {}: {}", user.email, e);
    }

    if let Err(e) = state.storage.update_last_login(&user.id).await {
        tracing::warn!("Failed to update last login for {}: {}", user.email, e);
    }

    let code = state.codes.issue(
        &pending.client_id,
        &pending.redirect_uri,
        &pending.scope,
        identity,
    );
    tracing::info!(
        "Issued authorization code for {} to client {}",
        user.email,
        pending.client_id
    );

    redirect_with_params(
        &pending.redirect_uri,
        &[("code", code.as_str()), ("state", pending.state.as_str())],
    )
}

async fn resolve_identity(provider: &dyn IdentityProvider, code: &str) -> crate::Result<Identity> {
    let access_token = provider.exchange_code(code).await?;
    provider.fetch_identity(&access_token).await
}

/// Handle token request
async fn handle_token(
    State(state): State<Arc<OAuthServerState>>,
    axum::Form(req): axum::Form<TokenRequest>,
) -> Response {
    let Some(grant_type) = req.grant_type.as_deref().filter(|g| !g.is_empty()) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "grant_type is required",
        );
    };

    match GrantType::parse(grant_type) {
        GrantType::AuthorizationCode => handle_authorization_code_grant(state, req).await,
        GrantType::RefreshToken => handle_refresh_token_grant(state, req).await,
        GrantType::Unsupported(other) => oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            &format!("Unsupported grant_type: {}", other),
        ),
    }
}

async fn handle_authorization_code_grant(
    state: Arc<OAuthServerState>,
    req: TokenRequest,
) -> Response {
    let (Some(code), Some(client_id)) = (non_empty(req.code), non_empty(req.client_id)) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "code and client_id are required",
        );
    };

    let grant = match state.codes.redeem(&code) {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!("Rejected authorization code for client {}: {}", client_id, e);
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", &e.to_string());
        }
    };

    if grant.client_id != client_id {
        tracing::warn!(
            "Authorization code for {} presented by {}",
            grant.client_id,
            client_id
        );
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "Client mismatch");
    }

    if let Some(redirect_uri) = non_empty(req.redirect_uri)
        && redirect_uri != grant.redirect_uri
    {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "Redirect URI mismatch",
        );
    }

    let user = match state.storage.find_user_by_email(&grant.identity.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(
                "Token exchange refused: {} is no longer active",
                grant.identity.email
            );
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "User not found or inactive",
            );
        }
        Err(e) => {
            tracing::error!("Failed to look up user {}: {}", grant.identity.email, e);
            return server_error();
        }
    };

    match state
        .tokens
        .create_token_pair(&user, &grant.client_id, &grant.scope)
        .await
    {
        Ok(pair) => token_response(TokenResponse::from(pair)),
        Err(e) => {
            tracing::error!("Failed to issue tokens for {}: {}", user.email, e);
            server_error()
        }
    }
}

async fn handle_refresh_token_grant(state: Arc<OAuthServerState>, req: TokenRequest) -> Response {
    let Some(refresh_token) = non_empty(req.refresh_token) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "refresh_token is required",
        );
    };

    // A mismatched client must not burn the token, so check before rotating
    if let Some(client_id) = non_empty(req.client_id) {
        match state.tokens.validate_token(&refresh_token).await {
            Ok(claims) if claims.client_id != client_id => {
                tracing::warn!(
                    "Refresh token for {} presented by {}",
                    claims.client_id,
                    client_id
                );
                return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "Client mismatch");
            }
            Err(e) if e.is_storage_failure() => {
                tracing::error!("Failed to validate refresh token: {}", e);
                return server_error();
            }
            _ => {}
        }
    }

    match state.tokens.refresh_token_pair(&refresh_token).await {
        Ok(pair) => token_response(TokenResponse::from(pair)),
        Err(e) if e.is_storage_failure() => {
            tracing::error!("Failed to refresh tokens: {}", e);
            server_error()
        }
        Err(e) => {
            tracing::debug!("Refresh rejected: {}", e);
            oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "Invalid refresh token",
            )
        }
    }
}

/// Claims of the bearer's access token
async fn handle_userinfo(user: AuthenticatedUser) -> impl IntoResponse {
    Json(json!({
        "sub": user.user_id,
        "email": user.email,
        "name": user.name,
        "picture": user.picture,
    }))
}

/// Handle token introspection (RFC 7662)
async fn handle_introspect(
    State(state): State<Arc<OAuthServerState>>,
    axum::Form(params): axum::Form<TokenParam>,
) -> Response {
    let Some(token) = non_empty(params.token) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "token is required");
    };

    Json(state.tokens.introspect(&token).await).into_response()
}

/// Handle token revocation (RFC 7009)
async fn handle_revoke(
    State(state): State<Arc<OAuthServerState>>,
    axum::Form(params): axum::Form<TokenParam>,
) -> Response {
    let Some(token) = non_empty(params.token) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "token is required");
    };

    // Always 200, even for unknown or already revoked tokens
    if let Err(e) = state.tokens.revoke_token(&token).await
        && e.is_storage_failure()
    {
        tracing::error!("Failed to revoke token: {}", e);
    }

    (StatusCode::OK, Json(json!({}))).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response()
}

fn server_error() -> Response {
    oauth_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "server_error",
        "Internal server error",
    )
}

fn token_response(body: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
        Json(body),
    )
        .into_response()
}

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect to a registered URI with extra query parameters. Empty values
/// are left out.
fn redirect_with_params(redirect_uri: &str, params: &[(&str, &str)]) -> Response {
    let mut url = match url::Url::parse(redirect_uri) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Registered redirect URI {} is invalid: {}", redirect_uri, e);
            return server_error();
        }
    };

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            query.append_pair(key, value);
        }
    }

    found(url.as_str())
}

fn redirect_with_error(redirect_uri: &str, error: &str, description: &str, state: &str) -> Response {
    redirect_with_params(
        redirect_uri,
        &[
            ("error", error),
            ("error_description", description),
            ("state", state),
        ],
    )
}
