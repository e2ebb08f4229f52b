//! In-memory storage implementation
//!
//! Fast, non-persistent storage for development and testing.
//! Uses DashMap for lock-free concurrent access.
//!
//! **WARNING:** MemoryStorage is NOT recommended for production use:
//! - Users, clients, and token records are lost on process restart
//! - Does not coordinate state across multiple process instances
//!
//! For production deployments, use SqliteStorage.

use super::*;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory storage implementation
#[derive(Clone)]
pub struct MemoryStorage {
    users: Arc<DashMap<String, User>>, // email -> user
    clients: Arc<DashMap<String, OAuthClient>>,
    tokens: Arc<DashMap<String, TokenRecord>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            clients: Arc::new(DashMap::new()),
            tokens: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .get(email)
            .filter(|u| u.is_active())
            .map(|u| u.clone()))
    }

    async fn update_user_provider(
        &self,
        user_id: &str,
        provider: &str,
        provider_user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        if let Some(mut user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.provider = Some(provider.to_string());
            user.provider_user_id = Some(provider_user_id.to_string());
            if !name.is_empty() {
                user.name = name.to_string();
            }
            if let Some(picture) = picture {
                user.picture = Some(picture.to_string());
            }
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_last_login(&self, user_id: &str) -> Result<()> {
        if let Some(mut user) = self.users.iter_mut().find(|u| u.id == user_id) {
            let now = Utc::now();
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn create_client(&self, client: &OAuthClient) -> Result<()> {
        self.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, id: &str) -> Result<Option<OAuthClient>> {
        Ok(self
            .clients
            .get(id)
            .filter(|c| c.active)
            .map(|c| c.clone()))
    }

    async fn save_token_metadata(&self, record: &TokenRecord) -> Result<()> {
        self.tokens.insert(record.token_id.clone(), record.clone());
        Ok(())
    }

    async fn get_token_metadata(&self, token_id: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.get(token_id).map(|r| r.clone()))
    }

    async fn revoke_token(&self, token_id: &str) -> Result<bool> {
        // The shard lock is held across the check and the flip
        match self.tokens.get_mut(token_id) {
            Some(mut record) if record.active => {
                record.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn is_token_revoked(&self, token_id: &str) -> Result<bool> {
        Ok(self.tokens.get(token_id).is_none_or(|r| !r.active))
    }

    async fn cleanup_expired_tokens(&self) -> Result<u64> {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, record| record.expires_at > now);
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}
