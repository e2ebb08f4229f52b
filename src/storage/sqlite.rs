//! SQLite storage implementation
//!
//! Persists users, registered clients, and token shadow records using SQLite.

use crate::model::*;
use crate::storage::{Storage, sql_common::*};
use crate::{Result, WardenError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite storage backend
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage
    ///
    /// # Arguments
    /// * `dsn` - Database path (e.g., ".warden/warden.db" or ":memory:" for in-memory)
    pub async fn new(dsn: &str) -> Result<Self> {
        let connection_string = if dsn.starts_with("sqlite:") {
            dsn.to_string()
        } else {
            format!("sqlite:{}", dsn)
        };

        // Extract actual file path for directory creation
        let file_path = dsn
            .strip_prefix("sqlite://")
            .or_else(|| dsn.strip_prefix("sqlite:"))
            .unwrap_or(dsn);
        let file_path = file_path.split('?').next().unwrap_or(file_path);

        if file_path.contains("..") {
            return Err(WardenError::config(
                "Database path cannot contain '..' (path traversal not allowed)",
            ));
        }

        if file_path != ":memory:"
            && let Some(parent) = Path::new(file_path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| WardenError::config(format!("Invalid SQLite DSN '{}': {}", dsn, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| WardenError::storage(format!("Failed to connect to SQLite: {}", e)))?;

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .map_err(|e| WardenError::storage(format!("Failed to run migrations: {}", e)))?;

        Ok(Self { pool })
    }

    fn parse_user(row: &SqliteRow) -> Result<User> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            picture: row.try_get("picture")?,
            provider: row.try_get("provider")?,
            provider_user_id: row.try_get("provider_user_id")?,
            status: UserStatus::parse(&row.try_get::<String, _>("status")?),
            role: row.try_get("role")?,
            created_at: datetime_from_unix(row.try_get("created_at")?),
            updated_at: datetime_from_unix(row.try_get("updated_at")?),
            last_login_at: row
                .try_get::<Option<i64>, _>("last_login_at")?
                .map(datetime_from_unix),
        })
    }

    fn parse_client(row: &SqliteRow) -> Result<OAuthClient> {
        Ok(OAuthClient {
            id: row.try_get("id")?,
            secret: row.try_get("secret")?,
            name: row.try_get("name")?,
            redirect_uris: string_list_from_text(&row.try_get::<String, _>("redirect_uris")?)?,
            grant_types: string_list_from_text(&row.try_get::<String, _>("grant_types")?)?,
            response_types: string_list_from_text(&row.try_get::<String, _>("response_types")?)?,
            scope: row.try_get("scope")?,
            application_type: row.try_get("application_type")?,
            token_endpoint_auth_method: row.try_get("token_endpoint_auth_method")?,
            active: bool_from_int(row.try_get("active")?),
            created_at: datetime_from_unix(row.try_get("created_at")?),
            updated_at: datetime_from_unix(row.try_get("updated_at")?),
        })
    }

    fn parse_token(row: &SqliteRow) -> Result<TokenRecord> {
        let token_type: String = row.try_get("token_type")?;
        let kind = TokenKind::parse(&token_type).ok_or_else(|| {
            WardenError::storage(format!("Unknown token_type '{}' in token_metadata", token_type))
        })?;

        Ok(TokenRecord {
            token_id: row.try_get("token_id")?,
            client_id: row.try_get("client_id")?,
            user_id: row.try_get("user_id")?,
            kind,
            scope: row.try_get("scope")?,
            expires_at: datetime_from_unix(row.try_get("expires_at")?),
            active: bool_from_int(row.try_get("active")?),
            created_at: datetime_from_unix(row.try_get("created_at")?),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users
             (id, email, name, picture, provider, provider_user_id, status, role, created_at, updated_at, last_login_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                picture = excluded.picture,
                provider = excluded.provider,
                provider_user_id = excluded.provider_user_id,
                status = excluded.status,
                role = excluded.role,
                updated_at = excluded.updated_at,
                last_login_at = excluded.last_login_at",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.picture)
        .bind(&user.provider)
        .bind(&user.provider_user_id)
        .bind(user.status.as_str())
        .bind(&user.role)
        .bind(datetime_to_unix(user.created_at))
        .bind(datetime_to_unix(user.updated_at))
        .bind(user.last_login_at.map(datetime_to_unix))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, picture, provider, provider_user_id, status, role,
                    created_at, updated_at, last_login_at
             FROM users
             WHERE email = ? AND status = 'active'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_user).transpose()
    }

    async fn update_user_provider(
        &self,
        user_id: &str,
        provider: &str,
        provider_user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET
                provider = ?,
                provider_user_id = ?,
                name = CASE WHEN ? = '' THEN name ELSE ? END,
                picture = COALESCE(?, picture),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(provider)
        .bind(provider_user_id)
        .bind(name)
        .bind(name)
        .bind(picture)
        .bind(Utc::now().timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_last_login(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_client(&self, client: &OAuthClient) -> Result<()> {
        sqlx::query(
            "INSERT INTO oauth_clients
             (id, secret, name, redirect_uris, grant_types, response_types, scope,
              application_type, token_endpoint_auth_method, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&client.id)
        .bind(&client.secret)
        .bind(&client.name)
        .bind(string_list_to_text(&client.redirect_uris)?)
        .bind(string_list_to_text(&client.grant_types)?)
        .bind(string_list_to_text(&client.response_types)?)
        .bind(&client.scope)
        .bind(&client.application_type)
        .bind(&client.token_endpoint_auth_method)
        .bind(bool_to_int(client.active))
        .bind(datetime_to_unix(client.created_at))
        .bind(datetime_to_unix(client.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_client(&self, id: &str) -> Result<Option<OAuthClient>> {
        let row = sqlx::query(
            "SELECT id, secret, name, redirect_uris, grant_types, response_types, scope,
                    application_type, token_endpoint_auth_method, active, created_at, updated_at
             FROM oauth_clients
             WHERE id = ? AND active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_client).transpose()
    }

    async fn save_token_metadata(&self, record: &TokenRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO token_metadata
             (token_id, client_id, user_id, token_type, scope, expires_at, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(token_id) DO UPDATE SET
                active = excluded.active,
                expires_at = excluded.expires_at",
        )
        .bind(&record.token_id)
        .bind(&record.client_id)
        .bind(&record.user_id)
        .bind(record.kind.as_str())
        .bind(&record.scope)
        .bind(datetime_to_unix(record.expires_at))
        .bind(bool_to_int(record.active))
        .bind(datetime_to_unix(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_token_metadata(&self, token_id: &str) -> Result<Option<TokenRecord>> {
        let row = sqlx::query(
            "SELECT token_id, client_id, user_id, token_type, scope, expires_at, active, created_at
             FROM token_metadata
             WHERE token_id = ?",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_token).transpose()
    }

    async fn revoke_token(&self, token_id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE token_metadata SET active = 0 WHERE token_id = ? AND active = 1")
                .bind(token_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_token_revoked(&self, token_id: &str) -> Result<bool> {
        let active: Option<i64> =
            sqlx::query_scalar("SELECT active FROM token_metadata WHERE token_id = ?")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(!active.is_some_and(bool_from_int))
    }

    async fn cleanup_expired_tokens(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM token_metadata WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
