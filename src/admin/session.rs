//! Admin sessions: an opaque cookie token, stored only as its SHA-256 hash.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::users::store::is_unique_violation;

/// A logged-in admin. `device_id` is the OTP device that verified the login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminSession {
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    #[must_use]
    pub fn is_otp_verified(&self) -> bool {
        self.device_id.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for AdminSession {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            device_id: row.try_get("device_id")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

/// Create a new session token for the admin cookie.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the raw token; only its hash is kept.
    async fn create(&self, user_id: Uuid, device_id: Option<Uuid>, ttl: Duration) -> Result<String>;

    /// Unexpired session for `token`, if any.
    async fn lookup(&self, token: &str) -> Result<Option<AdminSession>>;

    /// Idempotent.
    async fn delete(&self, token: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid, device_id: Option<Uuid>, ttl: Duration) -> Result<String> {
        let query = r"
            INSERT INTO admin_sessions (token_hash, user_id, device_id, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..3 {
            let token = generate_session_token()?;
            let result = sqlx::query(query)
                .bind(hash_session_token(&token))
                .bind(user_id)
                .bind(device_id)
                .bind(ttl.num_seconds())
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    async fn lookup(&self, token: &str) -> Result<Option<AdminSession>> {
        let query = r"
            SELECT user_id, device_id, created_at, expires_at
            FROM admin_sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, AdminSession>(query)
            .bind(hash_session_token(token))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let query = "DELETE FROM admin_sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

/// In-process session store keyed by token hash.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, AdminSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid, device_id: Option<Uuid>, ttl: Duration) -> Result<String> {
        let token = generate_session_token()?;
        let now = Utc::now();
        let session = AdminSession {
            user_id,
            device_id,
            created_at: now,
            expires_at: now + ttl,
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash_session_token(&token), session);
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<AdminSession>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hash_session_token(token))
            .filter(|session| session.expires_at > now)
            .cloned())
    }

    async fn delete(&self, token: &str) -> Result<()> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&hash_session_token(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn tokens_are_url_safe_and_unique() {
        let a = generate_session_token().unwrap();
        let b = generate_session_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_stable_sha256() {
        assert_eq!(hash_session_token("abc"), hash_session_token("abc"));
        assert_eq!(hash_session_token("abc").len(), 32);
        assert_ne!(hash_session_token("abc"), hash_session_token("abd"));
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn create_lookup_delete() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        let device_id = Uuid::new_v4();
        let token = store
            .create(user_id, Some(device_id), Duration::hours(1))
            .await
            .unwrap();

        let session = store.lookup(&token).await.unwrap().unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(session.is_otp_verified());
        assert!(store.lookup("not-a-token").await.unwrap().is_none());

        store.delete(&token).await.unwrap();
        assert!(store.lookup(&token).await.unwrap().is_none());
        store.delete(&token).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn expired_sessions_are_not_returned() {
        let store = MemorySessionStore::new();
        let token = store
            .create(Uuid::new_v4(), None, Duration::seconds(-1))
            .await
            .unwrap();
        assert!(store.lookup(&token).await.unwrap().is_none());
    }
}
