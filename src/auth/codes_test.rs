use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn identity() -> Identity {
    Identity {
        subject: "sub-1".to_string(),
        email: "alice@example.com".to_string(),
        name: "Alice".to_string(),
        picture: None,
    }
}

#[test]
fn test_issue_then_redeem_returns_grant() {
    let cache = AuthorizationCodeCache::new(Duration::minutes(10));
    let code = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());

    assert_eq!(cache.len(), 1);
    let grant = cache.redeem(&code).expect("fresh code should redeem");
    assert_eq!(grant.client_id, "mcp-1");
    assert_eq!(grant.redirect_uri, "http://localhost/cb");
    assert_eq!(grant.scope, "openid");
    assert_eq!(grant.identity.email, "alice@example.com");
    assert!(cache.is_empty());
}

#[test]
fn test_codes_are_unique_and_opaque() {
    let cache = AuthorizationCodeCache::new(Duration::minutes(10));
    let a = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());
    let b = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());

    assert_ne!(a, b);
    // 32 random bytes, base64url without padding
    assert_eq!(a.len(), 43);
    assert!(!a.contains('='));
}

#[test]
fn test_second_redeem_fails() {
    let cache = AuthorizationCodeCache::new(Duration::minutes(10));
    let code = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());

    assert!(cache.redeem(&code).is_ok());
    assert_eq!(cache.redeem(&code).unwrap_err(), RedeemError::Unknown);
}

#[test]
fn test_unknown_code_is_rejected() {
    let cache = AuthorizationCodeCache::new(Duration::minutes(10));
    assert_eq!(cache.redeem("nope").unwrap_err(), RedeemError::Unknown);
}

#[test]
fn test_expired_code_is_rejected_and_consumed() {
    let cache = AuthorizationCodeCache::new(Duration::zero());
    let code = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());

    assert_eq!(cache.redeem(&code).unwrap_err(), RedeemError::Expired);
    // The failed attempt still removed it
    assert_eq!(cache.redeem(&code).unwrap_err(), RedeemError::Unknown);
}

#[test]
fn test_purge_expired_keeps_live_grants() {
    let expired = AuthorizationCodeCache::new(Duration::seconds(-1));
    expired.issue("mcp-1", "http://localhost/cb", "openid", identity());
    expired.issue("mcp-1", "http://localhost/cb", "openid", identity());
    assert_eq!(expired.purge_expired(), 2);
    assert!(expired.is_empty());

    let live = AuthorizationCodeCache::new(Duration::minutes(10));
    live.issue("mcp-1", "http://localhost/cb", "openid", identity());
    assert_eq!(live.purge_expired(), 0);
    assert_eq!(live.len(), 1);
}

#[test]
fn test_concurrent_redeem_succeeds_once() {
    let cache = Arc::new(AuthorizationCodeCache::new(Duration::minutes(10)));
    let code = cache.issue("mcp-1", "http://localhost/cb", "openid", identity());
    let successes = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                if cache.redeem(&code).is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
}
