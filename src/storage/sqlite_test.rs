use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("warden.db");
    let dsn = path.to_str().unwrap().to_string();

    let user = User::new("carol@example.com", "Carol", "admin");
    {
        let storage = SqliteStorage::new(&dsn).await.unwrap();
        storage.save_user(&user).await.unwrap();
    }

    let reopened = SqliteStorage::new(&dsn).await.unwrap();
    let found = reopened
        .find_user_by_email("carol@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.role, "admin");
    assert!(path.exists());
}

#[tokio::test]
async fn test_rejects_path_traversal() {
    let result = SqliteStorage::new("../outside.db").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_save_user_upsert_keeps_original_id() {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    let first = User::new("dave@example.com", "Dave", "user");
    storage.save_user(&first).await.unwrap();

    // A second insert for the same email updates the existing row
    let mut second = User::new("dave@example.com", "David", "admin");
    second.status = UserStatus::Active;
    storage.save_user(&second).await.unwrap();

    let found = storage
        .find_user_by_email("dave@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.name, "David");
    assert_eq!(found.role, "admin");
}

#[tokio::test]
async fn test_duplicate_client_id_is_rejected() {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    let now = Utc::now();
    let client = OAuthClient {
        id: "mcp-dup".to_string(),
        secret: "s".to_string(),
        name: "Dup".to_string(),
        redirect_uris: vec!["https://a/cb".to_string()],
        grant_types: vec!["authorization_code".to_string()],
        response_types: vec!["code".to_string()],
        scope: "openid".to_string(),
        application_type: "web".to_string(),
        token_endpoint_auth_method: "none".to_string(),
        active: true,
        created_at: now,
        updated_at: now,
    };

    storage.create_client(&client).await.unwrap();
    assert!(storage.create_client(&client).await.is_err());
}

#[tokio::test]
async fn test_token_expiry_is_stored_as_unix_seconds() {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    let expires_at = Utc::now() + Duration::days(30);
    let record = TokenRecord {
        token_id: "t-1".to_string(),
        client_id: "c".to_string(),
        user_id: "u".to_string(),
        kind: TokenKind::Refresh,
        scope: "openid".to_string(),
        expires_at,
        active: true,
        created_at: Utc::now(),
    };
    storage.save_token_metadata(&record).await.unwrap();

    let loaded = storage.get_token_metadata("t-1").await.unwrap().unwrap();
    assert_eq!(loaded.expires_at.timestamp(), expires_at.timestamp());
    assert_eq!(loaded.kind, TokenKind::Refresh);
}
