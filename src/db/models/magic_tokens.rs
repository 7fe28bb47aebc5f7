//! Database models for magic login tokens.

use crate::types::TokenId;
use chrono::{DateTime, Utc};

/// Database request for persisting a new magic token.
///
/// `token_hash` is the SHA-256 digest of the raw token; the raw value itself
/// never reaches the database.
#[derive(Debug, Clone)]
pub struct MagicTokenCreateDBRequest {
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Database response for a magic token
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MagicToken {
    pub id: TokenId,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl MagicToken {
    /// Whether the token has passed its expiry deadline
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the token has already been redeemed
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}
