//! Database repository for magic login tokens.
//!
//! Lookups go through the SHA-256 digest of the raw token, so a database leak
//! never exposes redeemable credentials. Single-use marking is a conditional
//! UPDATE: whichever concurrent redemption flips `used_at` first wins, the
//! rest observe zero affected rows.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::magic_tokens::{MagicToken, MagicTokenCreateDBRequest},
    },
    types::{TokenId, abbrev_uuid},
};

pub struct MagicTokens<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for MagicTokens<'c> {
    type CreateRequest = MagicTokenCreateDBRequest;
    type Response = MagicToken;
    type Id = TokenId;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, MagicToken>(
            "INSERT INTO magic_tokens (email, token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, email, token_hash, expires_at, created_at, used_at",
        )
        .bind(&request.email)
        .bind(&request.token_hash)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), fields(id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let token = sqlx::query_as::<_, MagicToken>(
            "SELECT id, email, token_hash, expires_at, created_at, used_at FROM magic_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), fields(id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM magic_tokens WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> MagicTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a token by the SHA-256 digest of its raw value
    #[instrument(skip_all, err)]
    pub async fn find_by_hash(&mut self, token_hash: &str) -> Result<Option<MagicToken>> {
        let token = sqlx::query_as::<_, MagicToken>(
            "SELECT id, email, token_hash, expires_at, created_at, used_at FROM magic_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Atomically mark a token as used.
    ///
    /// Returns `false` when the token was already used (or gone), which callers
    /// must treat as a failed redemption. The `used_at IS NULL` guard is what
    /// makes concurrent redemptions race-safe.
    #[instrument(skip(self), fields(id = %abbrev_uuid(&id)), err)]
    pub async fn mark_used(&mut self, id: TokenId) -> Result<bool> {
        let result = sqlx::query("UPDATE magic_tokens SET used_at = NOW() WHERE id = $1 AND used_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete tokens whose expiry deadline has passed.
    ///
    /// Called opportunistically from the issuance path to bound table growth;
    /// there is no background sweeper.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM magic_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
