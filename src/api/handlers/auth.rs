use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    api::models::auth::{LogoutResponse, MagicLinkRequest, MagicLinkResponse, VerifyQuery, WithSessionCookie},
    auth::{
        magic_link::{MagicLinkService, NormalizedEmail},
        session,
    },
    errors::Error,
};

/// Request a magic login link
#[utoipa::path(
    post,
    path = "/auth/magic-link",
    request_body = MagicLinkRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Request accepted (whether or not the account exists)", body = MagicLinkResponse),
        (status = 400, description = "Invalid email address"),
        (status = 429, description = "Too many requests"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<MagicLinkRequest>,
) -> Result<Json<MagicLinkResponse>, Error> {
    let email = NormalizedEmail::parse(&request.email)?;

    let service = MagicLinkService::from_state(&state);
    service.issue_login_link(&email).await?;

    Ok(Json(MagicLinkResponse::accepted()))
}

/// Redeem a magic login link
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyQuery),
    tag = "authentication",
    responses(
        (status = 303, description = "Token accepted; session cookie set, redirect to the frontend"),
        (status = 400, description = "Missing, unknown, expired, or already used token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_magic_link(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Result<Response, Error> {
    let cleared_cookie = session::clear_session_cookie(&state.config);

    let Some(token) = query.token else {
        return Ok(WithSessionCookie {
            body: Error::InvalidToken,
            cookie: cleared_cookie,
        }
        .into_response());
    };

    let service = MagicLinkService::from_state(&state);
    match service.redeem_token(&token).await {
        Ok(user) => {
            let session_token = session::create_session_token(&user, &state.config)?;
            let cookie = session::create_session_cookie(&session_token, &state.config);
            Ok(WithSessionCookie {
                body: Redirect::to(&state.config.frontend_origin),
                cookie,
            }
            .into_response())
        }
        Err(Error::InvalidToken) => Ok(WithSessionCookie {
            body: Error::InvalidToken,
            cookie: cleared_cookie,
        }
        .into_response()),
        Err(e) => Err(e),
    }
}

/// End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Session cookie cleared", body = LogoutResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    WithSessionCookie {
        body: Json(LogoutResponse { ok: true }),
        cookie: session::clear_session_cookie(&state.config),
    }
}
