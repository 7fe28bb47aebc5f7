//! Request extractors for the session cookie.
//!
//! `SessionUser` is the strict extractor (401 when no valid session) and
//! `OptionalUser` the lenient one (never rejects). Both go through the same
//! cookie-parse and verify path, so there is exactly one place that decides
//! what counts as an authenticated request.

use crate::{
    AppState,
    api::models::users::SessionUser,
    auth::session,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// Extract user from JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present, or the cookie failed verification
/// - Some(user): Valid JWT found and verified
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<SessionUser> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;
    let cookie_name = &config.auth.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == cookie_name
        {
            // Invalid/expired tokens are expected here and treated the same as
            // no cookie at all
            match session::verify_session_token(value, config) {
                Ok(user) => return Some(user),
                Err(_) => continue,
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_jwt_session_auth(parts, &state.config) {
            Some(user) => Ok(user),
            None => {
                trace!("No valid session cookie found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// Lenient variant of [`SessionUser`] for endpoints that serve both
/// authenticated and anonymous callers.
#[derive(Debug)]
pub struct OptionalUser(pub Option<SessionUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        Ok(OptionalUser(try_jwt_session_auth(parts, &state.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::users::Role,
        auth::session::create_session_token,
        test_utils::{build_test_state, create_test_config},
    };
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;

    fn create_test_parts_with_cookie(cookie: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(axum::http::header::COOKIE, cookie)
            .body(())
            .unwrap();

        let (parts, _body) = request.into_parts();
        parts
    }

    fn session_cookie(user: &SessionUser) -> String {
        let config = create_test_config();
        let token = create_session_token(user, &config).unwrap();
        format!("{}={}", config.auth.session.cookie_name, token)
    }

    #[sqlx::test]
    async fn test_valid_cookie_extraction(pool: PgPool) {
        let state = build_test_state(pool).await;
        let user = SessionUser {
            email: "alice@example.com".to_string(),
            role: Role::Editor,
        };

        let mut parts = create_test_parts_with_cookie(&session_cookie(&user));
        let extracted = SessionUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted, user);
    }

    #[sqlx::test]
    async fn test_missing_cookie_rejected(pool: PgPool) {
        let state = build_test_state(pool).await;

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let result = SessionUser::from_request_parts(&mut parts, &state).await;
        let error = result.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_tampered_cookie_rejected(pool: PgPool) {
        let state = build_test_state(pool).await;

        let mut parts = create_test_parts_with_cookie("sid=not.a.valid.jwt");
        let result = SessionUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }

    #[sqlx::test]
    async fn test_optional_user_is_infallible(pool: PgPool) {
        let state = build_test_state(pool).await;

        let mut parts = create_test_parts_with_cookie("sid=garbage");
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(user.is_none());

        let valid = SessionUser {
            email: "bob@example.com".to_string(),
            role: Role::Viewer,
        };
        let mut parts = create_test_parts_with_cookie(&session_cookie(&valid));
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user, Some(valid));
    }

    #[sqlx::test]
    async fn test_cookie_found_among_others(pool: PgPool) {
        let state = build_test_state(pool).await;
        let user = SessionUser {
            email: "carol@example.com".to_string(),
            role: Role::Admin,
        };

        let cookie = format!("theme=dark; {}; lang=en", session_cookie(&user));
        let mut parts = create_test_parts_with_cookie(&cookie);
        let extracted = SessionUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.email, "carol@example.com");
    }
}
