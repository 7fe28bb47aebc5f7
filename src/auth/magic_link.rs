//! Magic-link issuance and redemption.
//!
//! The issuance path is written so a caller cannot tell whether an email maps
//! to an account: unknown addresses take the same code path, return the same
//! response, and differ only in a server-side log line and a skipped send.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    AppState,
    api::models::users::SessionUser,
    auth::{
        cooldown::Cooldowns,
        token::{generate_token, hash_token},
    },
    config::Config,
    db::{
        errors::DbError,
        handlers::{MagicTokens, Repository, Users},
        models::magic_tokens::MagicTokenCreateDBRequest,
    },
    email::{Delivery, EmailService},
    errors::{Error, Result},
};

/// An email address that passed validation and normalization.
///
/// Normalization trims whitespace and lowercases, so `"Foo@Bar.com "` and
/// `"foo@bar.com"` address the same account and the same cooldown slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEmail(String);

impl NormalizedEmail {
    const MAX_LENGTH: usize = 200;

    /// Validate and normalize a raw email address
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() || normalized.len() > Self::MAX_LENGTH {
            return Err(Error::BadRequest {
                message: "A valid email address is required.".to_string(),
            });
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(Error::BadRequest {
                message: "A valid email address is required.".to_string(),
            });
        };

        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(Error::BadRequest {
                message: "A valid email address is required.".to_string(),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues and redeems one-time login links.
pub struct MagicLinkService {
    db: PgPool,
    config: Config,
    cooldowns: Arc<Cooldowns>,
}

impl MagicLinkService {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            config: state.config.clone(),
            cooldowns: state.cooldowns.clone(),
        }
    }

    /// Issue a login link for `email`.
    ///
    /// Returns `Ok(())` for unknown addresses too; only the cooldown and
    /// validation failures surface to the caller. The token row is committed
    /// before the email send is attempted, and a failed send is logged rather
    /// than propagated.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn issue_login_link(&self, email: &NormalizedEmail) -> Result<()> {
        if let Err(retry_after) = self.cooldowns.check_and_update(email.as_str()) {
            return Err(Error::RateLimited {
                retry_after: Some(retry_after),
            });
        }

        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        // Keep the table bounded while we are here anyway
        let purged = MagicTokens::new(&mut *tx).purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "removed expired login tokens");
        }

        let user = Users::new(&mut *tx).get_user_by_email(email.as_str()).await?;
        let Some(user) = user else {
            tx.commit().await.map_err(DbError::from)?;
            tracing::info!("login link requested for unknown email");
            return Ok(());
        };

        let raw_token = generate_token();
        MagicTokens::new(&mut *tx)
            .create(&MagicTokenCreateDBRequest {
                email: email.as_str().to_string(),
                token_hash: hash_token(&raw_token),
                expires_at: Utc::now() + self.config.auth.magic_link.token_ttl,
            })
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        let login_link = format!("{}/auth/verify?token={}", self.config.public_url.trim_end_matches('/'), raw_token);

        let email_service = EmailService::new(&self.config)?;
        match email_service.send_login_email(user.email.as_str(), &login_link).await {
            Delivery::Delivered => {
                tracing::info!("login link sent");
            }
            Delivery::Failed(reason) => {
                tracing::error!(reason, "failed to deliver login link");
            }
        }

        Ok(())
    }

    /// Redeem a raw token for an authenticated identity.
    ///
    /// Every failure mode collapses to `InvalidToken` so the caller learns
    /// nothing beyond "this link no longer works". Spent and orphaned rows are
    /// deleted on the way out.
    #[instrument(skip_all)]
    pub async fn redeem_token(&self, raw_token: &str) -> Result<SessionUser> {
        let token_hash = hash_token(raw_token);

        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let Some(token) = MagicTokens::new(&mut *tx).find_by_hash(&token_hash).await? else {
            return Err(Error::InvalidToken);
        };

        if token.is_used() || token.is_expired(Utc::now()) {
            MagicTokens::new(&mut *tx).delete(token.id).await?;
            tx.commit().await.map_err(DbError::from)?;
            tracing::info!(used = token.is_used(), "rejected spent or expired login token");
            return Err(Error::InvalidToken);
        }

        // Re-verify the account still exists and read the current role
        let user = Users::new(&mut *tx).get_user_by_email(&token.email).await?;
        let Some(user) = user else {
            MagicTokens::new(&mut *tx).delete(token.id).await?;
            tx.commit().await.map_err(DbError::from)?;
            tracing::warn!("login token referenced an account that no longer exists");
            return Err(Error::InvalidToken);
        };

        if !MagicTokens::new(&mut *tx).mark_used(token.id).await? {
            // A concurrent redemption won the race
            return Err(Error::InvalidToken);
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(SessionUser {
            email: user.email,
            role: user.role,
        })
    }
}
