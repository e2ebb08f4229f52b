//! Telemetry module for Warden
//!
//! Prometheus counters for the OAuth lifecycle, exposed at `/metrics`.

use crate::model::TokenKind;
use crate::{Result, WardenError};
use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, IntCounter, TextEncoder, register_counter_vec, register_int_counter,
};

/// Tokens minted, by kind
static TOKENS_ISSUED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "warden_tokens_issued_total",
        "Total number of tokens issued",
        &["kind"]
    )
    .unwrap()
});

/// Refresh-token rotations
static REFRESH_ROTATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "warden_refresh_rotations_total",
        "Total number of refresh token rotations"
    )
    .unwrap()
});

/// Explicit token revocations
static REVOCATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "warden_token_revocations_total",
        "Total number of revoked tokens"
    )
    .unwrap()
});

/// Logins refused at the callback, by reason
static LOGIN_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "warden_login_rejections_total",
        "Total number of rejected logins",
        &["reason"]
    )
    .unwrap()
});

/// Requests refused by the bearer middleware
static AUTH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "warden_auth_failures_total",
        "Total number of requests rejected for a missing or invalid bearer token"
    )
    .unwrap()
});

pub fn record_token_issued(kind: TokenKind) {
    TOKENS_ISSUED_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_refresh_rotation() {
    REFRESH_ROTATIONS_TOTAL.inc();
}

pub fn record_revocation() {
    REVOCATIONS_TOTAL.inc();
}

/// Record a refused login (`not_whitelisted`, `provider_error`, ...)
pub fn record_login_rejected(reason: &str) {
    LOGIN_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_auth_failure() {
    AUTH_FAILURES_TOTAL.inc();
}

/// Get Prometheus metrics in text format
pub fn get_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| WardenError::config(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| WardenError::config(format!("Failed to convert metrics to UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_exposition() {
        record_token_issued(TokenKind::Access);
        record_refresh_rotation();
        record_login_rejected("not_whitelisted");

        let metrics = get_metrics().unwrap();
        assert!(metrics.contains("warden_tokens_issued_total"));
        assert!(metrics.contains("warden_refresh_rotations_total"));
        assert!(metrics.contains("not_whitelisted"));
    }
}
