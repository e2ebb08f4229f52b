//! Utility functions and helpers
//!
//! Test scaffolding shared by unit and integration tests.

use crate::auth::{ClientRegistrationRequest, IdentityProvider};
use crate::config::{Config, StorageConfig};
use crate::http::{AppState, build_router};
use crate::model::{Identity, OAuthClient, User};
use crate::storage::{SqliteStorage, Storage};
use crate::{Result, WardenError};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Code the scripted provider accepts at its token endpoint
pub const TEST_UPSTREAM_CODE: &str = "upstream-code";

/// Access token the scripted provider hands out
pub const TEST_UPSTREAM_TOKEN: &str = "upstream-token";

/// Signing secret used by [`TestEnvironment`]
pub const TEST_JWT_SECRET: &str = "test-environment-secret-at-least-32-bytes";

/// Scripted identity provider for tests
///
/// Accepts [`TEST_UPSTREAM_CODE`] and resolves it to whatever identity is
/// currently configured. Clearing the identity makes every userinfo call
/// fail, which is how tests simulate an upstream outage.
pub struct StaticIdentityProvider {
    identity: Mutex<Option<Identity>>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }

    /// Replace the identity returned by the next login
    pub fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.lock() = identity;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn name(&self) -> &str {
        "test"
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let url = url::Url::parse_with_params("https://idp.test/authorize", &[("state", state)])
            .map_err(|e| WardenError::auth(format!("Invalid auth URL: {}", e)))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        if code != TEST_UPSTREAM_CODE {
            return Err(WardenError::auth("Token exchange failed"));
        }
        Ok(TEST_UPSTREAM_TOKEN.to_string())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity> {
        if access_token != TEST_UPSTREAM_TOKEN {
            return Err(WardenError::auth("Userinfo request failed"));
        }
        self.identity
            .lock()
            .clone()
            .ok_or_else(|| WardenError::auth("Userinfo request failed"))
    }
}

/// Test environment with isolated temporary storage (test builds only)
///
/// This struct provides a complete, isolated environment that mirrors
/// production wiring:
/// - SQLite database in a temporary directory (auto-cleaned on drop)
/// - Config with a signing secret and a fixed issuer
/// - The full application state and router, with a scripted provider
///
/// # Example
///
/// ```no_run
/// use warden::utils::TestEnvironment;
///
/// #[tokio::test]
/// async fn my_test() {
///     let env = TestEnvironment::new().await;
///     let user = env.seed_user("alice@example.com", "Alice").await;
///     // Cleanup happens automatically when env drops
/// }
/// ```
pub struct TestEnvironment {
    /// Temporary directory - kept alive for test duration
    _temp_dir: TempDir,

    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub provider: Arc<StaticIdentityProvider>,
    pub state: AppState,
}

impl TestEnvironment {
    /// Create a new isolated environment whose provider signs in
    /// `alice@example.com`
    pub async fn new() -> Self {
        Self::with_identity(Identity {
            subject: "upstream-alice".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            picture: Some("https://idp.test/alice.png".to_string()),
        })
        .await
    }

    /// Create an environment whose provider resolves to `identity`
    pub async fn with_identity(identity: Identity) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join(".warden").join("warden.db");
        let dsn = db_path
            .to_str()
            .expect("Temp path is not valid UTF-8")
            .to_string();

        let mut config = Config {
            storage: StorageConfig {
                driver: "sqlite".to_string(),
                dsn: dsn.clone(),
            },
            ..Default::default()
        };
        config.oauth.jwt_secret = TEST_JWT_SECRET.to_string();
        config.oauth.server_url = Some("http://localhost:8080".to_string());

        let storage: Arc<dyn Storage> = Arc::new(
            SqliteStorage::new(&dsn)
                .await
                .expect("Failed to create SQLite storage"),
        );

        let provider = Arc::new(StaticIdentityProvider::new(identity));
        let state = AppState::new(&config, storage.clone(), provider.clone())
            .expect("Failed to build application state");

        Self {
            _temp_dir: temp_dir,
            config,
            storage,
            provider,
            state,
        }
    }

    /// Full application router, middleware included
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config.http)
    }

    /// Whitelist a user
    pub async fn seed_user(&self, email: &str, name: &str) -> User {
        let user = User::new(email, name, "user");
        self.storage
            .save_user(&user)
            .await
            .expect("Failed to save user");
        user
    }

    /// Register a client with a single redirect URI
    pub async fn register_client(&self, redirect_uri: &str) -> OAuthClient {
        self.state
            .oauth
            .registry
            .register(ClientRegistrationRequest {
                client_name: Some("Test Client".to_string()),
                redirect_uris: Some(vec![redirect_uri.to_string()]),
                ..Default::default()
            })
            .await
            .expect("Failed to register client")
    }

    /// Drive `/oauth/authorize` and `/oauth/callback` and return the
    /// redirect the client receives
    pub async fn login(&self, client_id: &str, redirect_uri: &str, state: &str) -> url::Url {
        let authorize = url::Url::parse_with_params(
            "http://localhost:8080/oauth/authorize",
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("state", state),
            ],
        )
        .expect("Invalid authorize URL");

        let response = self.get(&path_and_query(&authorize)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let provider_url = location(&response);
        let signed_state = query_param(&provider_url, "state").expect("Missing signed state");

        let callback = url::Url::parse_with_params(
            "http://localhost:8080/oauth/callback",
            &[("code", TEST_UPSTREAM_CODE), ("state", signed_state.as_str())],
        )
        .expect("Invalid callback URL");

        let response = self.get(&path_and_query(&callback)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        location(&response)
    }

    /// GET through the full router
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("Invalid request");
        self.router()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    /// Form POST through the full router
    pub async fn post_form(&self, uri: &str, params: &[(&str, &str)]) -> axum::response::Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Invalid request");
        self.router()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }
}

/// The `Location` header of a redirect, parsed
pub fn location(response: &axum::response::Response) -> url::Url {
    let value = response
        .headers()
        .get(header::LOCATION)
        .expect("Missing Location header")
        .to_str()
        .expect("Location is not ASCII");
    url::Url::parse(value).expect("Location is not an absolute URL")
}

/// First value of a query parameter
pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn path_and_query(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
