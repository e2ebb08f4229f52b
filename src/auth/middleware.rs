//! Bearer-token middleware
//!
//! Requests outside the public path prefixes must carry
//! `Authorization: Bearer <access token>`. Every failure gets the same 401 and
//! challenge header; the cause is only logged.

use crate::auth::tokens::{Claims, TokenManager};
use crate::constants::AUTH_REALM;
use crate::model::TokenKind;
use crate::{WardenError, telemetry};
use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

/// Identity of a verified bearer, available to handlers as an extractor
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub claims: Claims,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            picture: claims.picture.clone(),
            client_id: claims.client_id.clone(),
            scopes: claims.scopes().map(String::from).collect(),
            claims,
        }
    }
}

/// State for the bearer middleware
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenManager>,
    pub public_paths: Arc<Vec<String>>,
}

impl AuthState {
    pub fn new(tokens: Arc<TokenManager>, public_paths: Vec<String>) -> Self {
        Self {
            tokens,
            public_paths: Arc::new(public_paths),
        }
    }

    /// Whether `path` starts with one of the public prefixes
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Extractor for the user resolved by [`auth_middleware`]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = std::result::Result<Self, Self::Rejection>> + Send {
        let user = parts.extensions.get::<AuthenticatedUser>().cloned();

        async move { user.ok_or_else(unauthorized) }
    }
}

/// Gate non-public routes on a valid access token
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.is_public(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(token) = extract_bearer_token(req.headers()) else {
        tracing::debug!("Rejected {}: missing bearer token", req.uri().path());
        telemetry::record_auth_failure();
        return unauthorized();
    };

    match state.tokens.validate_token(&token).await {
        Ok(claims) if claims.token_type == TokenKind::Access => {
            req.extensions_mut().insert(AuthenticatedUser::from(claims));
            next.run(req).await
        }
        Ok(claims) => {
            tracing::debug!(
                "Rejected {}: {} used as bearer",
                req.uri().path(),
                claims.token_type
            );
            telemetry::record_auth_failure();
            unauthorized()
        }
        Err(WardenError::InvalidToken) => {
            tracing::debug!("Rejected {}: invalid bearer token", req.uri().path());
            telemetry::record_auth_failure();
            unauthorized()
        }
        Err(e) => {
            tracing::error!("Failed to validate bearer token: {}", e);
            telemetry::record_auth_failure();
            unauthorized()
        }
    }
}

/// Extract the token from an `Authorization: Bearer` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| {
            s.strip_prefix("Bearer ")
                .or_else(|| s.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// The one response every authentication failure gets
pub fn unauthorized() -> Response {
    let challenge = format!(
        "Bearer realm=\"{}\", error=\"invalid_token\"",
        AUTH_REALM
    );

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "invalid_token",
            "error_description": "Missing or invalid access token"
        })),
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }

    response
}

#[cfg(test)]
mod middleware_test {
    include!("middleware_test.rs");
}
