use super::*;
use chrono::{Duration, Utc};

fn sample_client(id: &str) -> OAuthClient {
    let now = Utc::now();
    OAuthClient {
        id: id.to_string(),
        secret: "secret".to_string(),
        name: "Test".to_string(),
        redirect_uris: vec!["http://localhost/cb".to_string(), "https://app/cb".to_string()],
        grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        response_types: vec!["code".to_string()],
        scope: "openid profile email".to_string(),
        application_type: "web".to_string(),
        token_endpoint_auth_method: "none".to_string(),
        active: true,
        created_at: now,
        updated_at: now,
    }
}

fn sample_record(token_id: &str, kind: TokenKind, expires_in: Duration) -> TokenRecord {
    TokenRecord {
        token_id: token_id.to_string(),
        client_id: "mcp-client".to_string(),
        user_id: "user-1".to_string(),
        kind,
        scope: "openid".to_string(),
        expires_at: Utc::now() + expires_in,
        active: true,
        created_at: Utc::now(),
    }
}

/// Runs every storage operation so Memory and SQLite stay in parity
async fn test_all_storage_operations<S: Storage>(storage: Arc<S>) {
    // Users: only active users are found
    let alice = User::new("alice@example.com", "Alice", "user");
    storage.save_user(&alice).await.expect("save_user should succeed");

    let found = storage
        .find_user_by_email("alice@example.com")
        .await
        .expect("find_user_by_email should succeed")
        .expect("active user should be found");
    assert_eq!(found.id, alice.id);
    assert_eq!(found.name, "Alice");

    assert!(
        storage
            .find_user_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none()
    );

    let mut suspended = User::new("mallory@example.com", "Mallory", "user");
    suspended.status = UserStatus::Suspended;
    storage.save_user(&suspended).await.unwrap();
    assert!(
        storage
            .find_user_by_email("mallory@example.com")
            .await
            .unwrap()
            .is_none(),
        "suspended users are not whitelisted"
    );

    // Provider backfill and login timestamp
    storage
        .update_user_provider(&alice.id, "google", "g-123", "Alice A.", Some("https://pic"))
        .await
        .expect("update_user_provider should succeed");
    storage
        .update_last_login(&alice.id)
        .await
        .expect("update_last_login should succeed");

    let updated = storage
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.provider.as_deref(), Some("google"));
    assert_eq!(updated.provider_user_id.as_deref(), Some("g-123"));
    assert_eq!(updated.name, "Alice A.");
    assert_eq!(updated.picture.as_deref(), Some("https://pic"));
    assert!(updated.last_login_at.is_some());
    assert!(updated.has_linked_provider());

    // Blank name keeps the stored one
    storage
        .update_user_provider(&alice.id, "google", "g-123", "", None)
        .await
        .unwrap();
    let unchanged = storage
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.name, "Alice A.");
    assert_eq!(unchanged.picture.as_deref(), Some("https://pic"));

    // Clients: stored exactly, inactive ones are hidden
    let client = sample_client("mcp-one");
    storage.create_client(&client).await.expect("create_client should succeed");
    let loaded = storage
        .get_client("mcp-one")
        .await
        .unwrap()
        .expect("client should be found");
    assert_eq!(loaded.redirect_uris, client.redirect_uris);
    assert_eq!(loaded.grant_types, client.grant_types);
    assert_eq!(loaded.response_types, client.response_types);
    assert_eq!(loaded.secret, "secret");

    let mut inactive = sample_client("mcp-two");
    inactive.active = false;
    storage.create_client(&inactive).await.unwrap();
    assert!(storage.get_client("mcp-two").await.unwrap().is_none());
    assert!(storage.get_client("mcp-missing").await.unwrap().is_none());

    // Token metadata lifecycle
    let record = sample_record("tok-1", TokenKind::Refresh, Duration::hours(1));
    storage.save_token_metadata(&record).await.unwrap();

    let loaded = storage.get_token_metadata("tok-1").await.unwrap().unwrap();
    assert_eq!(loaded.kind, TokenKind::Refresh);
    assert!(loaded.active);
    assert!(!storage.is_token_revoked("tok-1").await.unwrap());

    assert!(storage.revoke_token("tok-1").await.unwrap());
    assert!(storage.is_token_revoked("tok-1").await.unwrap());
    // Only the first revoke reports that it consumed the record
    assert!(!storage.revoke_token("tok-1").await.unwrap());
    assert!(!storage.get_token_metadata("tok-1").await.unwrap().unwrap().active);

    // Missing records count as revoked, revoking them is a no-op
    assert!(storage.is_token_revoked("tok-unknown").await.unwrap());
    assert!(!storage.revoke_token("tok-unknown").await.unwrap());

    // Purge removes only expired records
    let expired = sample_record("tok-old", TokenKind::Access, Duration::seconds(-10));
    let fresh = sample_record("tok-new", TokenKind::Access, Duration::hours(1));
    storage.save_token_metadata(&expired).await.unwrap();
    storage.save_token_metadata(&fresh).await.unwrap();

    let removed = storage.cleanup_expired_tokens().await.unwrap();
    assert_eq!(removed, 1);
    assert!(storage.get_token_metadata("tok-old").await.unwrap().is_none());
    assert!(storage.get_token_metadata("tok-new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_memory_storage_operations() {
    test_all_storage_operations(Arc::new(MemoryStorage::new())).await;
}

#[tokio::test]
async fn test_sqlite_storage_operations() {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    test_all_storage_operations(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_create_storage_from_config() {
    let memory = create_storage_from_config(&crate::config::StorageConfig {
        driver: "memory".to_string(),
        dsn: String::new(),
    })
    .await;
    assert!(memory.is_ok());

    let unknown = create_storage_from_config(&crate::config::StorageConfig {
        driver: "postgres".to_string(),
        dsn: "postgres://localhost".to_string(),
    })
    .await;
    assert!(unknown.is_err());
}
