//! Signed `state` parameter
//!
//! The provider only echoes back what it was given, so the original client
//! request travels through the provider round trip inside `state`. The payload
//! is HMAC-SHA256 signed with the server secret; a tampered or stale value is
//! rejected at the callback.

use crate::{Result, WardenError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The client's original authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Client-supplied opaque state, echoed back verbatim
    #[serde(default)]
    pub state: String,
    /// Unix seconds when the request was accepted
    pub issued_at: i64,
}

impl AuthorizationState {
    pub fn new(client_id: &str, redirect_uri: &str, scope: &str, state: Option<&str>) -> Self {
        Self {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            state: state.unwrap_or_default().to_string(),
            issued_at: Utc::now().timestamp(),
        }
    }
}

/// Encodes and verifies `<base64url(json)>.<hex(hmac)>` state values
#[derive(Clone)]
pub struct StateSigner {
    key: Vec<u8>,
    max_age: Duration,
}

impl StateSigner {
    pub fn new(secret: &str, max_age: Duration) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            max_age,
        }
    }

    pub fn sign(&self, state: &AuthorizationState) -> Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(state)?);
        let signature = hex::encode(self.mac(payload.as_bytes())?);
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, value: &str) -> Result<AuthorizationState> {
        let (payload, signature) = value
            .split_once('.')
            .ok_or_else(|| WardenError::validation("Malformed state parameter"))?;

        let provided = hex::decode(signature)
            .map_err(|_| WardenError::validation("Malformed state signature"))?;
        let expected = self.mac(payload.as_bytes())?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(WardenError::validation("State signature mismatch"));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| WardenError::validation("Malformed state payload"))?;
        let state: AuthorizationState = serde_json::from_slice(&bytes)?;

        if Utc::now().timestamp() - state.issued_at > self.max_age.num_seconds() {
            return Err(WardenError::validation("State parameter expired"));
        }

        Ok(state)
    }

    fn mac(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| WardenError::config(format!("Invalid state signing key: {}", e)))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
