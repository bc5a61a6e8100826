//! Single-use tokens emailed to members to activate a login or reset a password.
//!
//! Only a SHA-256 digest of each token is stored, so a leaked database doesn't
//! hand out working links.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::util::{current_time, normalize_email};

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum TokenKind {
    /// Activates the login a member registered, carrying their chosen password
    Activate,
    /// Lets a member choose a new password
    Reset,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AuthToken {
    pub id: i64,
    pub token_hash: Vec<u8>,
    pub email: String,
    /// The password hash to install on activation
    pub pass_hash: Option<String>,
    pub kind: TokenKind,
    /// Unix timestamp of when the token was issued
    pub created_at: i64,
}

impl AuthToken {
    pub fn hash(token: &str) -> Vec<u8> {
        Sha256::digest(token.as_bytes()).to_vec()
    }

    pub fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now.unix_timestamp() - self.created_at >= ttl.whole_seconds()
    }

    /// Issues a new token for the member, replacing any earlier token of the same
    /// kind. Returns the token to email; it can't be recovered afterwards.
    pub async fn issue(
        email: &str,
        kind: TokenKind,
        pass_hash: Option<&str>,
        pool: &SqlitePool,
    ) -> AppResult<String> {
        let email = normalize_email(email);
        let token = Uuid::new_v4().simple().to_string();

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM auth_token WHERE email = ? AND kind = ?")
            .bind(&email)
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO auth_token (token_hash, email, pass_hash, kind, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Self::hash(&token))
        .bind(&email)
        .bind(pass_hash)
        .bind(kind)
        .bind(current_time().unix_timestamp())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(token)
    }

    /// Finds the token if it is of the right kind and still valid, without using it up.
    pub async fn find_valid(
        token: &str,
        kind: TokenKind,
        ttl: Duration,
        pool: &SqlitePool,
    ) -> AppResult<Self> {
        Self::find_valid_at(token, kind, ttl, current_time(), pool).await
    }

    pub async fn find_valid_at(
        token: &str,
        kind: TokenKind,
        ttl: Duration,
        now: OffsetDateTime,
        pool: &SqlitePool,
    ) -> AppResult<Self> {
        let found: Option<Self> = sqlx::query_as("SELECT * FROM auth_token WHERE token_hash = ?")
            .bind(Self::hash(token))
            .fetch_optional(pool)
            .await?;

        let auth_token = match found {
            Some(auth_token) if auth_token.kind == kind => auth_token,
            _ => {
                return Err(AppError::bad_request(
                    "The link is invalid or has already been used. Please request a new one.",
                ))
            }
        };

        if auth_token.is_expired(ttl, now) {
            Self::delete(auth_token.id, pool).await?;
            return Err(AppError::bad_request(format!(
                "The link expired after {} minutes. Please request a new one.",
                ttl.whole_minutes()
            )));
        }

        Ok(auth_token)
    }

    /// Validates the token and uses it up. A token can only be consumed once,
    /// even by concurrent requests.
    pub async fn consume(
        token: &str,
        kind: TokenKind,
        ttl: Duration,
        pool: &SqlitePool,
    ) -> AppResult<Self> {
        Self::consume_at(token, kind, ttl, current_time(), pool).await
    }

    pub async fn consume_at(
        token: &str,
        kind: TokenKind,
        ttl: Duration,
        now: OffsetDateTime,
        pool: &SqlitePool,
    ) -> AppResult<Self> {
        let auth_token = Self::find_valid_at(token, kind, ttl, now, pool).await?;
        if !Self::delete(auth_token.id, pool).await? {
            return Err(AppError::bad_request(
                "The link has already been used. Please request a new one.",
            ));
        }

        Ok(auth_token)
    }

    /// Removes every token older than `ttl`.
    pub async fn purge_expired(ttl: Duration, pool: &SqlitePool) -> AppResult<u64> {
        let cutoff = current_time().unix_timestamp() - ttl.whole_seconds();
        let result = sqlx::query("DELETE FROM auth_token WHERE created_at <= ?")
            .bind(cutoff)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete(id: i64, pool: &SqlitePool) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM auth_token WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
