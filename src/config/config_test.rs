use super::*;
use std::fs;
use tempfile::TempDir;

fn server_ready_config() -> Config {
    let mut config = Config::default();
    config.oauth.jwt_secret = "x".repeat(32);
    config.provider.client_id = "client".to_string();
    config.provider.client_secret = "secret".to_string();
    config.provider.auth_url = "https://accounts.example.com/authorize".to_string();
    config.provider.token_url = "https://accounts.example.com/token".to_string();
    config.provider.userinfo_url = "https://accounts.example.com/userinfo".to_string();
    config
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.storage.driver, "sqlite");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.http.host, "0.0.0.0");
    assert_eq!(config.oauth.access_token_lifetime_secs, 604_800);
    assert_eq!(config.oauth.refresh_token_lifetime_secs, 2_592_000);
    assert_eq!(config.oauth.code_ttl_secs, 600);
    assert_eq!(config.provider.scopes, vec!["openid", "profile", "email"]);
    assert_eq!(config.provider.subject_fallback, SubjectFallback::Email);
    assert!(config.validate().is_ok());
}

#[test]
fn test_server_url_defaults_to_host_and_port() {
    let mut config = Config::default();
    config.http.host = "127.0.0.1".to_string();
    config.http.port = 9000;
    assert_eq!(config.server_url(), "http://127.0.0.1:9000");
    assert_eq!(config.callback_url(), "http://127.0.0.1:9000/oauth/callback");

    config.oauth.server_url = Some("https://auth.example.com/".to_string());
    assert_eq!(config.server_url(), "https://auth.example.com");
    assert_eq!(config.callback_url(), "https://auth.example.com/oauth/callback");
}

#[test]
fn test_config_validation() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.storage.driver = String::new();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.storage.driver = "postgres".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.http.port = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.oauth.code_ttl_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.oauth.server_url = Some("ftp://example.com".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_durations_are_bounded() {
    let mut config = Config::default();
    config.oauth.access_token_lifetime_secs = i64::MAX;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("oauth.accessTokenLifetimeSecs must be at most"));

    let mut config = Config::default();
    config.oauth.refresh_token_lifetime_secs = MAX_TOKEN_LIFETIME_SECS + 1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.oauth.refresh_token_lifetime_secs = MAX_TOKEN_LIFETIME_SECS;
    assert!(config.validate().is_ok());

    let mut config = Config::default();
    config.oauth.code_ttl_secs = i64::MAX;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.oauth.access_token_lifetime_secs = -5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.oauth.purge_interval_secs = u64::MAX;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.http.request_timeout_secs = u64::MAX;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.provider.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_unknown_subject_fallback_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fallback.json");
    fs::write(&path, r#"{"provider": {"subjectFallback": "guess"}}"#).unwrap();
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_server_validation_enforces_secret_length() {
    let config = server_ready_config();
    assert!(config.validate_for_server().is_ok());

    let mut short = server_ready_config();
    short.oauth.jwt_secret = "x".repeat(31);
    let err = short.validate_for_server().unwrap_err();
    assert!(err.to_string().contains("at least 32"));

    let mut missing = server_ready_config();
    missing.oauth.jwt_secret = String::new();
    assert!(missing.validate_for_server().is_err());
}

#[test]
fn test_server_validation_requires_provider() {
    let mut config = server_ready_config();
    config.provider.userinfo_url = String::new();
    assert!(config.validate_for_server().is_err());

    let mut config = server_ready_config();
    config.provider.token_url = "not a url".to_string();
    assert!(config.validate_for_server().is_err());
}

#[test]
fn test_load_missing_file_returns_default() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_from_path(temp.path().join("nope.json")).unwrap();
    assert_eq!(config.storage.driver, "sqlite");
}

#[test]
fn test_load_json_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("warden.config.json");
    fs::write(
        &path,
        r#"{
            "storage": {"driver": "memory", "dsn": ""},
            "http": {"host": "127.0.0.1", "port": 9100},
            "oauth": {"serverUrl": "https://auth.example.com", "codeTtlSecs": 120},
            "provider": {
                "name": "microsoft",
                "scopes": ["openid", "User.Read"],
                "subjectFallback": "reject"
            }
        }"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.storage.driver, "memory");
    assert_eq!(config.http.port, 9100);
    assert_eq!(config.oauth.code_ttl_secs, 120);
    assert_eq!(config.oauth.access_token_lifetime_secs, 604_800);
    assert_eq!(config.provider.name, "microsoft");
    assert_eq!(config.provider.scopes, vec!["openid", "User.Read"]);
    assert_eq!(config.provider.subject_fallback, SubjectFallback::Reject);
    assert_eq!(config.server_url(), "https://auth.example.com");
}

#[test]
fn test_load_yaml_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("warden.yaml");
    fs::write(
        &path,
        r#"
storage:
  driver: sqlite
  dsn: /tmp/warden-test.db
oauth:
  publicPaths: ["/health"]
admin:
  email: root@example.com
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.storage.dsn, "/tmp/warden-test.db");
    assert_eq!(config.oauth.public_paths, vec!["/health"]);
    assert_eq!(config.admin.unwrap().email, "root@example.com");
}

#[test]
fn test_load_invalid_config_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.json");
    fs::write(&path, r#"{"storage": {"driver": "oracle", "dsn": "x"}}"#).unwrap();
    assert!(Config::load_from_path(&path).is_err());

    fs::write(&path, "{ not json").unwrap();
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_secrets_are_not_serialized() {
    let config = server_ready_config();
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains(&"x".repeat(32)));
    assert!(!json.contains("clientSecret"));
}

#[test]
fn test_parse_comma_list() {
    assert_eq!(
        parse_comma_list("openid, profile,,email "),
        vec!["openid", "profile", "email"]
    );
    assert!(parse_comma_list(" , ").is_empty());
}
