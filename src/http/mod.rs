//! HTTP server for Warden
//!
//! Assembles the authorization server routes, the bearer middleware, and the
//! system endpoints behind tracing, CORS and timeout layers.

use crate::auth::{
    AuthState, AuthorizationCodeCache, IdentityProvider, OAuthServerState, OidcProvider,
    TokenManager, auth_middleware, create_oauth_routes,
};
use crate::config::{AdminConfig, Config, HttpConfig};
use crate::constants::{PATH_HEALTH, PATH_METRICS};
use crate::model::User;
use crate::storage::{Storage, create_storage_from_config};
use crate::{Result, WardenError};
use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Application state shared across the router
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub oauth: Arc<OAuthServerState>,
    pub auth: AuthState,
}

impl AppState {
    /// Wire the token manager, authorization server and middleware state
    pub fn new(
        config: &Config,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenManager::from_config(storage.clone(), config)?);
        let oauth = Arc::new(OAuthServerState::new(
            config,
            storage.clone(),
            tokens.clone(),
            provider,
        ));
        let auth = AuthState::new(tokens, config.oauth.public_paths.clone());

        Ok(Self {
            storage,
            oauth,
            auth,
        })
    }
}

/// Error type for the non-OAuth handlers
#[derive(Debug)]
pub struct AppError(WardenError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self.0 {
            WardenError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            WardenError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Missing or invalid access token".to_string(),
            ),
            WardenError::Storage(crate::error::StorageError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found: {}", entity, id),
            ),
            _ => {
                // Log full error details internally
                tracing::error!("Internal error: {:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": {
                "type": error_type,
                "message": message,
                "status": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<WardenError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    config.validate_for_server()?;

    let storage = create_storage_from_config(&config.storage).await?;
    if let Some(admin) = &config.admin {
        seed_admin(storage.as_ref(), admin).await?;
    }

    let provider = Arc::new(OidcProvider::new(
        config.provider.clone(),
        config.callback_url(),
    )?);
    let state = AppState::new(&config, storage, provider)?;

    spawn_purge_task(
        state.storage.clone(),
        state.oauth.codes.clone(),
        Duration::from_secs(config.oauth.purge_interval_secs),
    );

    let app = build_router(state, &config.http);

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| WardenError::config(format!("Invalid address {}: {}", addr, e)))?;

    tracing::info!(
        "Starting authorization server on {} (issuer {}, provider {})",
        socket_addr,
        config.server_url(),
        config.provider.name
    );

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| WardenError::config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Build the router with all endpoints
pub fn build_router(state: AppState, http_config: &HttpConfig) -> Router {
    Router::new()
        .route(PATH_HEALTH, get(health_handler))
        .route(PATH_METRICS, get(metrics_handler))
        .merge(create_oauth_routes(state.oauth.clone()))
        .layer(from_fn_with_state(state.auth.clone(), auth_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().include_headers(false))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Micros),
                        ),
                )
                .layer(cors_layer(http_config))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    http_config.request_timeout_secs,
                ))),
        )
}

fn cors_layer(http_config: &HttpConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = match &http_config.allowed_origins {
        Some(origins) => origins.clone(),
        None => vec![
            format!("http://localhost:{}", http_config.port),
            format!("http://127.0.0.1:{}", http_config.port),
        ],
    }
    .into_iter()
    .filter_map(|origin| match origin.parse::<HeaderValue>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS origin: {}", origin);
            None
        }
    })
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Insert the configured administrator unless an active account already exists
pub async fn seed_admin(storage: &dyn Storage, admin: &AdminConfig) -> Result<()> {
    if storage.find_user_by_email(&admin.email).await?.is_some() {
        return Ok(());
    }

    let name = if admin.name.trim().is_empty() {
        admin.email.clone()
    } else {
        admin.name.clone()
    };
    storage
        .save_user(&User::new(admin.email.clone(), name, "admin"))
        .await?;
    tracing::info!("Seeded default admin {}", admin.email);

    Ok(())
}

/// Periodically drop expired token records and authorization codes
pub fn spawn_purge_task(
    storage: Arc<dyn Storage>,
    codes: Arc<AuthorizationCodeCache>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            purge_expired(storage.as_ref(), &codes).await;
        }
    })
}

/// One purge pass. Failures are logged; expiry is also checked live.
pub async fn purge_expired(storage: &dyn Storage, codes: &AuthorizationCodeCache) {
    match storage.cleanup_expired_tokens().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Purged {} expired token records", removed),
        Err(e) => tracing::warn!("Failed to purge expired token records: {}", e),
    }

    let removed = codes.purge_expired();
    if removed > 0 {
        tracing::debug!("Purged {} expired authorization codes", removed);
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_handler() -> std::result::Result<(StatusCode, String), AppError> {
    let metrics = crate::telemetry::get_metrics()?;
    Ok((StatusCode::OK, metrics))
}
