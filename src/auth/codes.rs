//! Authorization-code cache
//!
//! Pending grants minted at callback time, keyed by a one-time code and
//! redeemed at the token endpoint. The map lives in process memory behind a
//! single mutex, so redemption is only exclusive within one server instance.

use crate::auth::generate_secure_token;
use crate::model::Identity;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

/// A pending grant waiting to be exchanged for tokens
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Why a code could not be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RedeemError {
    #[error("Invalid authorization code")]
    Unknown,

    #[error("Authorization code expired")]
    Expired,
}

/// Single-redeem store of pending grants
pub struct AuthorizationCodeCache {
    grants: Mutex<HashMap<String, AuthorizationGrant>>,
    ttl: Duration,
}

impl AuthorizationCodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            grants: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a grant and return the fresh code that redeems it
    pub fn issue(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        identity: Identity,
    ) -> String {
        let grant = AuthorizationGrant {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            identity,
            expires_at: Utc::now() + self.ttl,
        };

        let mut grants = self.grants.lock();
        loop {
            let code = generate_secure_token();
            if let std::collections::hash_map::Entry::Vacant(slot) = grants.entry(code.clone()) {
                slot.insert(grant);
                return code;
            }
        }
    }

    /// Take the grant for `code`.
    ///
    /// The entry is removed before its expiry is checked, so a code can never
    /// be presented twice, even when the first attempt fails.
    pub fn redeem(&self, code: &str) -> Result<AuthorizationGrant, RedeemError> {
        let grant = self.grants.lock().remove(code).ok_or(RedeemError::Unknown)?;

        if grant.is_expired() {
            return Err(RedeemError::Expired);
        }

        Ok(grant)
    }

    /// Drop grants whose TTL has passed, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut grants = self.grants.lock();
        let before = grants.len();
        grants.retain(|_, grant| grant.expires_at > now);
        before - grants.len()
    }

    pub fn len(&self) -> usize {
        self.grants.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.lock().is_empty()
    }
}

#[cfg(test)]
mod codes_test {
    include!("codes_test.rs");
}
