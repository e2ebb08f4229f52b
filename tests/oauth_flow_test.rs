//! End-to-end authorization flow through the full router

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use warden::model::Identity;
use warden::utils::{TestEnvironment, query_param};

const REDIRECT_URI: &str = "http://localhost:6274/oauth/callback";

async fn json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_with_bearer(env: &TestEnvironment, uri: &str, token: &str) -> axum::response::Response {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    env.router().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let env = TestEnvironment::new().await;
    env.seed_user("alice@example.com", "Alice").await;

    // Dynamic registration over HTTP
    let request = Request::builder()
        .method("POST")
        .uri("/oauth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "client_name": "MCP Inspector",
                "redirect_uris": [REDIRECT_URI]
            })
            .to_string(),
        ))
        .unwrap();
    let registered = json(env.router().oneshot(request).await.unwrap()).await;
    let client_id = registered["client_id"].as_str().unwrap().to_string();

    // Sign in through the provider
    let redirect = env.login(&client_id, REDIRECT_URI, "opaque-state").await;
    assert!(redirect.as_str().starts_with(REDIRECT_URI));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("opaque-state"));
    let code = query_param(&redirect, "code").unwrap();

    // Redeem the code
    let response = env
        .post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", client_id.as_str()),
                ("redirect_uri", REDIRECT_URI),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = json(response).await;
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["token_type"], "Bearer");

    // The access token opens protected routes
    let userinfo = get_with_bearer(&env, "/oauth/userinfo", &access_token).await;
    assert_eq!(userinfo.status(), StatusCode::OK);
    let profile = json(userinfo).await;
    assert_eq!(profile["email"], "alice@example.com");
    assert_eq!(profile["picture"], "https://idp.test/alice.png");

    // Rotate, then revoke
    let rotated = json(
        env.post_form(
            "/oauth/token",
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ],
        )
        .await,
    )
    .await;
    let new_access = rotated["access_token"].as_str().unwrap().to_string();

    let response = env
        .post_form("/oauth/revoke", &[("token", new_access.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let rejected = get_with_bearer(&env, "/oauth/userinfo", &new_access).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    // Revoking one token leaves the rest of the session alone
    let still_valid = get_with_bearer(&env, "/oauth/userinfo", &access_token).await;
    assert_eq!(still_valid.status(), StatusCode::OK);

    let introspection = json(
        env.post_form("/oauth/introspect", &[("token", new_access.as_str())])
            .await,
    )
    .await;
    assert_eq!(introspection["active"], false);
}

#[tokio::test]
async fn test_sign_in_is_limited_to_whitelist() {
    let env = TestEnvironment::with_identity(Identity {
        subject: "upstream-mallory".to_string(),
        email: "mallory@example.com".to_string(),
        name: "Mallory".to_string(),
        picture: None,
    })
    .await;
    env.seed_user("alice@example.com", "Alice").await;
    let client = env.register_client(REDIRECT_URI).await;

    let redirect = env.login(&client.id, REDIRECT_URI, "s1").await;
    assert_eq!(query_param(&redirect, "error").as_deref(), Some("access_denied"));
    assert!(query_param(&redirect, "code").is_none());
}

#[tokio::test]
async fn test_configured_public_paths_bypass_middleware() {
    let env = TestEnvironment::new().await;

    for path in [
        "/health",
        "/.well-known/oauth-authorization-server",
        "/.well-known/openid-configuration",
        "/.well-known/jwks.json",
    ] {
        let response = env.get(path).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
    }

    let response = env.get("/oauth/userinfo").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["error"], "invalid_token");
}
