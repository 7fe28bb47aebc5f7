use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{auth::MeResponse, users::SessionUser},
    auth::current_user::OptionalUser,
    db::handlers::Users,
};

/// Get the current session's user
#[utoipa::path(
    get,
    path = "/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user, or null when not signed in", body = MeResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_session(State(state): State<AppState>, OptionalUser(user): OptionalUser) -> Json<MeResponse> {
    let Some(claimed) = user else {
        return Json(MeResponse { user: None });
    };

    // Roles can change between login and now; prefer what the identity store
    // says today over what the token was signed with. The claimed role is the
    // fallback when the lookup does not produce a fresher answer.
    let role = match fetch_current_role(&state, &claimed.email).await {
        Ok(Some(role)) => role,
        Ok(None) => claimed.role,
        Err(e) => {
            tracing::warn!("failed to refresh role for current session: {e:#}");
            claimed.role
        }
    };

    Json(MeResponse {
        user: Some(SessionUser {
            email: claimed.email,
            role,
        }),
    })
}

async fn fetch_current_role(state: &AppState, email: &str) -> anyhow::Result<Option<crate::api::models::users::Role>> {
    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn).get_user_by_email(email).await?;
    Ok(user.map(|u| u.role))
}
