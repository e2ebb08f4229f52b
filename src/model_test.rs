use super::*;
use chrono::Duration;

#[test]
fn test_user_status_round_trips_through_storage_strings() {
    assert_eq!(UserStatus::parse("active"), UserStatus::Active);
    assert_eq!(UserStatus::parse("suspended"), UserStatus::Suspended);
    // Anything unrecognized must never grant access
    assert_eq!(UserStatus::parse("ACTIVE"), UserStatus::Suspended);
    assert_eq!(UserStatus::parse(""), UserStatus::Suspended);
}

#[test]
fn test_new_user_is_active_and_unlinked() {
    let user = User::new("alice@example.com", "Alice", "user");
    assert!(user.is_active());
    assert!(!user.has_linked_provider());
    assert!(user.last_login_at.is_none());
    assert!(!user.id.is_empty());
}

#[test]
fn test_linked_provider_requires_both_fields() {
    let mut user = User::new("alice@example.com", "Alice", "user");
    user.provider = Some("google".to_string());
    assert!(!user.has_linked_provider());

    user.provider_user_id = Some(String::new());
    assert!(!user.has_linked_provider());

    user.provider_user_id = Some("1234".to_string());
    assert!(user.has_linked_provider());
}

#[test]
fn test_redirect_uri_match_is_exact() {
    let now = Utc::now();
    let client = OAuthClient {
        id: "mcp-1".to_string(),
        secret: "s".to_string(),
        name: "Test".to_string(),
        redirect_uris: vec!["http://localhost/cb".to_string()],
        grant_types: vec![],
        response_types: vec![],
        scope: String::new(),
        application_type: "web".to_string(),
        token_endpoint_auth_method: "none".to_string(),
        active: true,
        created_at: now,
        updated_at: now,
    };

    assert!(client.has_redirect_uri("http://localhost/cb"));
    assert!(!client.has_redirect_uri("http://localhost/cb/"));
    assert!(!client.has_redirect_uri("http://localhost/cb?x=1"));
    assert!(!client.has_redirect_uri("HTTP://localhost/cb"));
    assert!(!client.has_redirect_uri("http://localhost"));
}

#[test]
fn test_token_kind_serializes_as_claim_value() {
    assert_eq!(
        serde_json::to_value(TokenKind::Access).unwrap(),
        serde_json::json!("access_token")
    );
    assert_eq!(
        serde_json::from_value::<TokenKind>(serde_json::json!("refresh_token")).unwrap(),
        TokenKind::Refresh
    );
    assert_eq!(TokenKind::parse("id_token"), None);
    assert_eq!(TokenKind::Refresh.to_string(), "refresh_token");
}

#[test]
fn test_token_record_expiry() {
    let record = TokenRecord {
        token_id: "t".to_string(),
        client_id: "c".to_string(),
        user_id: "u".to_string(),
        kind: TokenKind::Access,
        scope: "openid".to_string(),
        expires_at: Utc::now() - Duration::seconds(1),
        active: true,
        created_at: Utc::now() - Duration::hours(1),
    };
    assert!(record.is_expired());
}
